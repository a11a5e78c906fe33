use std::collections::HashMap;

use tracing::{debug, info};

use crate::{
    configuration::{Config, State},
    error::Error,
    handler::apy::{calculate_apy, calculate_borrow_reward_apy, calculate_reward_apy},
    helpers::{format_chain, lower_hex, scale_amount},
    types::{BorrowFields, Market, Pool},
};

const RATE_DECIMALS: u8 = 18;

/// One full pass: market reads, price quotes, then per-market assembly.
pub async fn fetch_pools(state: &State) -> Result<Vec<Pool>, Error> {
    let config = &state.config;
    let reward_coins = [config.coin_id(&config.protocol_token.address)];

    let markets_with_prices = async {
        let columns = state.evm.get_market_columns().await?;

        let mut coins: Vec<String> = columns
            .underlying
            .iter()
            .flatten()
            .map(|token| config.coin_id(token))
            .collect();
        coins.push(config.coin_id(&config.native_token.address));
        coins.sort();
        coins.dedup();

        let prices = state.http.get_prices(&coins).await?;
        Ok::<_, Error>((columns, prices))
    };

    let ((columns, prices), reward_prices) = tokio::try_join!(
        markets_with_prices,
        state.http.get_prices(&reward_coins)
    )?;

    let reward_price = reward_prices
        .get(&lower_hex(&config.protocol_token.address))
        .copied();
    if reward_price.is_none() {
        info!("No price for reward token {}", config.protocol_token.symbol);
    }

    let markets = columns.into_markets()?;
    let pools = assemble_pools(config, &markets, &prices, reward_price);
    info!("Assembled {} pools", pools.len());

    Ok(pools)
}

pub fn assemble_pools(
    config: &Config,
    markets: &[Market],
    prices: &HashMap<String, f64>,
    reward_price: Option<f64>,
) -> Vec<Pool> {
    markets
        .iter()
        .map(|market| build_pool(config, market, prices, reward_price))
        .collect()
}

pub fn build_pool(
    config: &Config,
    market: &Market,
    prices: &HashMap<String, f64>,
    reward_price: Option<f64>,
) -> Pool {
    let native = &config.native_token;
    let token = lower_hex(&market.underlying.unwrap_or(native.address));
    let symbol = display_symbol(config, market);
    let decimals = market
        .underlying_decimals
        .filter(|decimals| *decimals != 0)
        .unwrap_or(native.decimals);

    let price = match prices.get(&token) {
        Some(price) => *price,
        None => {
            let price = fallback_price(&symbol);
            debug!("No price for {} ({}), using {}", symbol, token, price);
            price
        },
    };
    let reward_price = reward_price.unwrap_or(f64::NAN);
    let blocks_per_day = config.blocks_per_day();
    let reward_decimals = config.protocol_token.decimals;

    let total_supply = &market.cash + &market.total_borrows;
    let tvl_usd = scale_amount(&market.cash, decimals) * price;
    let total_supply_usd = scale_amount(&total_supply, decimals) * price;
    let total_borrow_usd = scale_amount(&market.total_borrows, decimals) * price;

    let apy_base = calculate_apy(scale_amount(&market.supply_rate, RATE_DECIMALS), blocks_per_day);
    let apy_reward = calculate_reward_apy(
        scale_amount(&market.supply_speed, reward_decimals),
        blocks_per_day,
        reward_price,
        total_supply_usd,
    );

    let reward_tokens = if apy_reward != 0.0 && !apy_reward.is_nan() {
        vec![lower_hex(&config.protocol_token.address)]
    } else {
        vec![]
    };

    let borrow = match market.paused {
        Some(false) => Some(BorrowFields {
            total_supply_usd,
            total_borrow_usd,
            apy_base_borrow: calculate_apy(
                scale_amount(&market.borrow_rate, RATE_DECIMALS),
                blocks_per_day,
            ),
            apy_reward_borrow: calculate_borrow_reward_apy(
                scale_amount(&market.borrow_speed, reward_decimals),
                blocks_per_day,
                reward_price,
                total_borrow_usd,
            ),
            ltv: scale_amount(&market.collateral_factor, RATE_DECIMALS),
        }),
        _ => None,
    };

    Pool {
        pool: lower_hex(&market.address),
        chain: format_chain(&config.chain),
        project: config.project_name.to_owned(),
        symbol,
        tvl_usd,
        apy_base,
        apy_reward,
        underlying_tokens: vec![token],
        reward_tokens,
        borrow,
    }
}

/// Override table first, then the on-chain symbol, then the native token.
fn display_symbol(config: &Config, market: &Market) -> String {
    if let Some(symbol) = market
        .underlying
        .and_then(|token| config.symbol_overrides.get(&lower_hex(&token)))
    {
        return symbol.to_owned();
    }

    match &market.underlying_symbol {
        Some(symbol) if !symbol.is_empty() => symbol.to_owned(),
        _ => config.native_token.symbol.to_owned(),
    }
}

/// Stablecoins without a quote are valued at 1, anything else at 0.
pub fn fallback_price(symbol: &str) -> f64 {
    if symbol.to_lowercase().contains("usd") {
        1.0
    } else {
        0.0
    }
}
