use std::collections::HashMap;

use serde::Deserialize;

/// Body of `GET /prices/current/{coins}`.
#[derive(Debug, Deserialize)]
pub struct CoinsPrice {
    #[serde(default)]
    pub coins: HashMap<String, CoinPrice>,
}

#[derive(Debug, Deserialize)]
pub struct CoinPrice {
    pub price: f64,
}
