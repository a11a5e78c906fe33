use std::{collections::HashMap, env, fs, ops::Deref, str::FromStr, sync::Arc};

use alloy::primitives::Address;

use crate::{
    error::Error,
    helpers::{format_chain, lower_hex, parse_tuple_string},
    provider::{Evm, HTTP},
    types::{ProjectInfo, Token},
};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub evm: Evm,
    pub http: HTTP,
}

impl State {
    pub fn new(config: Config, evm: Evm, http: HTTP) -> State {
        State { config, evm, http }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chain: String,
    pub project_name: String,
    pub project_url: String,
    pub rpc_host: String,
    pub prices_host: String,
    pub comptroller_address: Address,
    pub multicall_address: Address,
    pub multicall_batch_size: usize,
    pub max_tasks: usize,
    pub block_time_seconds: u64,
    pub timeout: u64,
    pub native_token: Token,
    pub protocol_token: Token,
    /// Lower-cased token address -> display symbol.
    pub symbol_overrides: HashMap<String, String>,
}

impl Config {
    pub fn blocks_per_day(&self) -> f64 {
        SECONDS_PER_DAY / self.block_time_seconds as f64
    }

    pub fn project_info(&self) -> ProjectInfo {
        ProjectInfo {
            project: self.project_name.to_owned(),
            chain: format_chain(&self.chain),
            url: self.project_url.to_owned(),
            timetravel: false,
        }
    }

    pub fn get_prices_url(&self, coins: &[String]) -> String {
        format!(
            "{}/prices/current/{}",
            self.prices_host.trim_end_matches('/'),
            coins.join(",").to_lowercase()
        )
    }

    pub fn coin_id(&self, address: &Address) -> String {
        format!("{}:{}", self.chain, lower_hex(address))
    }
}

pub fn get_configuration() -> Result<Config, Error> {
    let chain = env::var("CHAIN")?;
    let project_name = env::var("PROJECT_NAME")?;
    let project_url = env::var("PROJECT_URL")?;
    let rpc_host = env::var("RPC_HOST")?;
    let prices_host = env::var("PRICES_HOST")?;
    let comptroller_address = Address::from_str(&env::var("COMPTROLLER_ADDRESS")?)?;
    let multicall_address = Address::from_str(&env::var("MULTICALL_ADDRESS")?)?;
    let multicall_batch_size: usize = env::var("MULTICALL_BATCH_SIZE")?.parse()?;
    let max_tasks: usize = env::var("MAX_TASKS")?.parse()?;
    let block_time_seconds: u64 = env::var("BLOCK_TIME_SECONDS")?.parse()?;
    let timeout: u64 = env::var("TIMEOUT")?.parse()?;

    if multicall_batch_size == 0 || max_tasks == 0 || block_time_seconds == 0 {
        return Err(Error::ConfigurationError(String::from(
            "MULTICALL_BATCH_SIZE, MAX_TASKS and BLOCK_TIME_SECONDS must be positive",
        )));
    }

    let native_token = parse_token(env::var("NATIVE_TOKEN")?)?;
    let protocol_token = parse_token(env::var("PROTOCOL_TOKEN")?)?;
    let symbol_overrides = parse_symbol_overrides(env::var("SYMBOL_OVERRIDES")?)?;

    let config = Config {
        chain,
        project_name,
        project_url,
        rpc_host,
        prices_host,
        comptroller_address,
        multicall_address,
        multicall_batch_size,
        max_tasks,
        block_time_seconds,
        timeout,
        native_token,
        protocol_token,
        symbol_overrides,
    };

    Ok(config)
}

pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";
    let yield_config_file: &str = "yield.conf";

    let directory = env!("CARGO_MANIFEST_DIR");
    let path = format!("{}/{}", directory, config_file);
    let yield_config_path = format!("{}/{}", directory, yield_config_file);

    let config_string = fs::read_to_string(path)?;
    let yield_config_string = fs::read_to_string(yield_config_path)?;

    parse_config_string(config_string);
    parse_config_string(yield_config_string);

    Ok(())
}

fn parse_config_string(config: String) {
    for (key, value) in parse_config_pairs(&config) {
        env::set_var(key, value);
    }
}

fn parse_config_pairs(config: &str) -> Vec<(&str, &str)> {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            line.find('=').map(|e| {
                let (k, v) = line.split_at(e);
                (k.trim(), v[1..].trim())
            })
        })
        .collect()
}

/// `(address,symbol,decimals)`
fn parse_token(data: String) -> Result<Token, Error> {
    let items = parse_tuple_string(data.to_owned());
    let item = items.first().ok_or_else(|| {
        Error::ConfigurationError(format!("Invalid token tuple {}", data))
    })?;

    let parts: Vec<&str> = item.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(Error::ConfigurationError(format!(
            "Invalid token tuple {}",
            data
        )));
    }

    Ok(Token {
        address: Address::from_str(parts[0])?,
        symbol: parts[1].to_owned(),
        decimals: parts[2].parse()?,
    })
}

/// `(address,symbol),(address,symbol)`
fn parse_symbol_overrides(
    data: String,
) -> Result<HashMap<String, String>, Error> {
    let mut overrides = HashMap::new();

    for item in parse_tuple_string(data) {
        let parts: Vec<&str> = item.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(Error::ConfigurationError(format!(
                "Invalid symbol override {}",
                item
            )));
        }
        let address = Address::from_str(parts[0])?;
        overrides.insert(lower_hex(&address), parts[1].to_owned());
    }

    Ok(overrides)
}
