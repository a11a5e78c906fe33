pub const DAYS_PER_YEAR: i32 = 365;

/// Annualized percentage of a per-block rate, compounded daily.
pub fn calculate_apy(rate_per_block: f64, blocks_per_day: f64) -> f64 {
    ((rate_per_block * blocks_per_day + 1.0).powf(f64::from(DAYS_PER_YEAR)) - 1.0) * 100.0
}

/// Yearly USD value of a reward emission as a percentage of `base_usd`.
/// `speed` is already scaled by the reward token decimals.
pub fn calculate_reward_apy(
    speed: f64,
    blocks_per_day: f64,
    reward_price: f64,
    base_usd: f64,
) -> f64 {
    speed * blocks_per_day * f64::from(DAYS_PER_YEAR) * reward_price / base_usd * 100.0
}

/// Borrow side never reports NaN or infinity, an empty borrow base yields 0.
pub fn calculate_borrow_reward_apy(
    speed: f64,
    blocks_per_day: f64,
    reward_price: f64,
    total_borrow_usd: f64,
) -> f64 {
    if total_borrow_usd == 0.0 {
        return 0.0;
    }

    let apy = calculate_reward_apy(speed, blocks_per_day, reward_price, total_borrow_usd);
    if apy.is_finite() {
        apy
    } else {
        0.0
    }
}
