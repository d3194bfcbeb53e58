//! Client for an e-commerce storefront backend.
//!
//! Presentation-layer plumbing only: the backend owns inventory, pricing,
//! authentication, and message storage. This crate provides
//! - [`session::ChatSession`], the real-time buyer-seller chat session
//!   (conversation list, joined conversation log, send reconciliation),
//! - [`api::ApiClient`], the request/response client for products, cart,
//!   purchases, and account verification,
//! - [`config::Config`], the ambient endpoints and session cookie.

pub mod api;
pub mod channel;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use session::{ChatSession, LoadState, SendError, SessionPhase};
