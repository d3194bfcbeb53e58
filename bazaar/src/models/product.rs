use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product as listed in grids and search results. The store backend uses
/// flat lowercase field names; they are kept verbatim.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BaseProduct {
    pub productid: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub imageurls: Vec<String>,
}

/// Full product detail, as returned by `/products/showProduct`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    pub productid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub categoryid: i64,
    #[serde(default)]
    pub imageurls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub categoryid: i64,
    pub category: String,
}

/// A line of the user's cart.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CartProduct {
    pub cartproductid: String,
    pub productid: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub imageurl: Option<String>,
}

/// A completed purchase line.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PurchasedProduct {
    pub productid: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub imageurl: Option<String>,
    pub createdat: DateTime<Utc>,
}
