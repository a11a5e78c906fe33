use std::{collections::HashMap, time::Duration};

use reqwest::Client;
use tracing::{debug, info};

use crate::{
    configuration::Config,
    error::{self, Error},
    types::CoinsPrice,
};

#[derive(Debug)]
pub struct HTTP {
    pub config: Config,
    pub http: Client,
}

impl HTTP {
    pub fn new(config: Config) -> Result<HTTP, Error> {
        let http = match Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                return Err(error::Error::ReqwestError(e));
            },
        };

        Ok(HTTP { config, http })
    }

    /// Current USD prices keyed by lower-cased bare address. Coins the
    /// oracle does not know are left out of the map.
    pub async fn get_prices(
        &self,
        coins: &[String],
    ) -> Result<HashMap<String, f64>, Error> {
        let url = self.config.get_prices_url(coins);
        info!("Fetching {} prices", coins.len());
        debug!("{}", &url);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::PriceOracleStatus(status.as_u16()));
        }

        let json = response.json::<CoinsPrice>().await?;

        Ok(prices_by_address(json))
    }
}

pub fn prices_by_address(data: CoinsPrice) -> HashMap<String, f64> {
    data.coins
        .into_iter()
        .map(|(coin, item)| {
            let address = match coin.split_once(':') {
                Some((_, address)) => address,
                None => coin.as_str(),
            };
            (address.to_lowercase(), item.price)
        })
        .collect()
}
