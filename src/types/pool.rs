use serde::Serialize;

/// Normalized yield record of one market.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub pool: String,
    pub chain: String,
    pub project: String,
    pub symbol: String,
    pub tvl_usd: f64,
    pub apy_base: f64,
    /// May be NaN when the supply side has no value or the reward price is
    /// unknown; serialized as `null`.
    pub apy_reward: f64,
    pub underlying_tokens: Vec<String>,
    pub reward_tokens: Vec<String>,
    #[serde(flatten)]
    pub borrow: Option<BorrowFields>,
}

/// Present only for markets whose mint guardian reads exactly `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowFields {
    pub total_supply_usd: f64,
    pub total_borrow_usd: f64,
    pub apy_base_borrow: f64,
    pub apy_reward_borrow: f64,
    pub ltv: f64,
}
