use thiserror::Error;
use url::Url;

/// Fallback endpoints for local development against the dev server.
const DEFAULT_SERVER_URL: &str = "ws://localhost:9001";
const DEFAULT_API_URL: &str = "http://localhost:9000";

/// Client configuration: where the backend lives and the ambient session.
/// The session cookie is issued by the backend's login flow; this client
/// only carries it, it never authenticates by itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// Messaging channel endpoint (ws or wss)
    pub server_url: Url,
    /// Data service base URL (http or https)
    pub api_url: Url,
    /// Full cookie header value, e.g. `session=...`. May be empty for
    /// endpoints that do not require a logged-in user.
    pub session_cookie: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    #[error("{key} must use the {expected} scheme, got {got}")]
    UnexpectedScheme {
        key: &'static str,
        expected: &'static str,
        got: String,
    },
}

impl Config {
    /// Build a configuration from the environment. URL sources are checked in
    /// priority order: build-time env, then runtime env, then the local
    /// default. A `.env` file is honored when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let server_url = option_env!("BAZAAR_SERVER_URL")
            .map(String::from)
            .or_else(|| std::env::var("BAZAAR_SERVER_URL").ok())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let api_url = option_env!("BAZAAR_API_URL")
            .map(String::from)
            .or_else(|| std::env::var("BAZAAR_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let session_cookie = std::env::var("BAZAAR_SESSION_COOKIE").unwrap_or_default();

        Self::new(&server_url, &api_url, session_cookie)
    }

    /// Build a configuration from explicit endpoints.
    pub fn new(
        server_url: &str,
        api_url: &str,
        session_cookie: String,
    ) -> Result<Self, ConfigError> {
        let server_url = parse_url("BAZAAR_SERVER_URL", server_url, &["ws", "wss"])?;
        let api_url = parse_url("BAZAAR_API_URL", api_url, &["http", "https"])?;

        Ok(Self {
            server_url,
            api_url,
            session_cookie,
        })
    }
}

fn parse_url(key: &'static str, value: &str, schemes: &[&'static str]) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::UnexpectedScheme {
            key,
            expected: schemes[0],
            got: url.scheme().to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config() {
        let config = Config::new(
            "ws://127.0.0.1:9001",
            "http://127.0.0.1:9000",
            "session=alice".to_string(),
        )
        .unwrap();

        assert_eq!(config.server_url.scheme(), "ws");
        assert_eq!(config.api_url.port(), Some(9000));
        assert_eq!(config.session_cookie, "session=alice");
    }

    #[test]
    fn test_secure_schemes_accepted() {
        assert!(Config::new(
            "wss://store.example/chat",
            "https://store.example",
            String::new()
        )
        .is_ok());
    }

    #[test]
    fn test_scheme_mixups_rejected() {
        // http where a websocket endpoint is expected
        let result = Config::new("http://store.example", "http://store.example", String::new());
        assert!(matches!(
            result,
            Err(ConfigError::UnexpectedScheme { key: "BAZAAR_SERVER_URL", .. })
        ));

        // ws where the data service is expected
        let result = Config::new("ws://store.example", "ws://store.example", String::new());
        assert!(matches!(
            result,
            Err(ConfigError::UnexpectedScheme { key: "BAZAAR_API_URL", .. })
        ));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            Config::new("not a url", "http://store.example", String::new()),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}
