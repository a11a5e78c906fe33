use alloy::primitives::Address;
use bigdecimal::BigDecimal;

use crate::error::Error;

/// On-chain readings of one market, raw integers in their native scale.
#[derive(Debug, Clone)]
pub struct Market {
    pub address: Address,
    pub underlying: Option<Address>,
    pub underlying_symbol: Option<String>,
    pub underlying_decimals: Option<u8>,
    pub collateral_factor: BigDecimal,
    pub cash: BigDecimal,
    pub total_borrows: BigDecimal,
    pub supply_rate: BigDecimal,
    pub borrow_rate: BigDecimal,
    pub supply_speed: BigDecimal,
    pub borrow_speed: BigDecimal,
    pub paused: Option<bool>,
}

/// One vector per batched read, indexed like `markets`.
#[derive(Debug, Default)]
pub struct MarketColumns {
    pub markets: Vec<Address>,
    pub collateral_factors: Vec<BigDecimal>,
    pub supply_speeds: Vec<BigDecimal>,
    pub borrow_speeds: Vec<BigDecimal>,
    pub paused: Vec<Option<bool>>,
    pub supply_rates: Vec<BigDecimal>,
    pub borrow_rates: Vec<BigDecimal>,
    pub cash: Vec<BigDecimal>,
    pub total_borrows: Vec<BigDecimal>,
    pub underlying: Vec<Option<Address>>,
    pub symbols: Vec<Option<String>>,
    pub decimals: Vec<Option<u8>>,
}

impl MarketColumns {
    pub fn into_markets(self) -> Result<Vec<Market>, Error> {
        let expected = self.markets.len();
        let lengths = [
            ("markets", self.collateral_factors.len()),
            ("compSupplySpeeds", self.supply_speeds.len()),
            ("compBorrowSpeeds", self.borrow_speeds.len()),
            ("mintGuardianPaused", self.paused.len()),
            ("supplyRatePerBlock", self.supply_rates.len()),
            ("borrowRatePerBlock", self.borrow_rates.len()),
            ("getCash", self.cash.len()),
            ("totalBorrows", self.total_borrows.len()),
            ("underlying", self.underlying.len()),
            ("symbol", self.symbols.len()),
            ("decimals", self.decimals.len()),
        ];

        for (field, actual) in lengths {
            if actual != expected {
                return Err(Error::LengthMismatch {
                    field: field.to_owned(),
                    expected,
                    actual,
                });
            }
        }

        let rates = self.supply_rates.into_iter().zip(self.borrow_rates);
        let speeds = self.supply_speeds.into_iter().zip(self.borrow_speeds);
        let balances = self.cash.into_iter().zip(self.total_borrows);
        let tokens = self
            .underlying
            .into_iter()
            .zip(self.symbols)
            .zip(self.decimals);

        let markets = self
            .markets
            .into_iter()
            .zip(self.collateral_factors)
            .zip(self.paused)
            .zip(rates)
            .zip(speeds)
            .zip(balances)
            .zip(tokens)
            .map(|((((((address, collateral_factor), paused), rates), speeds), balances), tokens)| {
                let (supply_rate, borrow_rate) = rates;
                let (supply_speed, borrow_speed) = speeds;
                let (cash, total_borrows) = balances;
                let ((underlying, underlying_symbol), underlying_decimals) = tokens;

                Market {
                    address,
                    underlying,
                    underlying_symbol,
                    underlying_decimals,
                    collateral_factor,
                    cash,
                    total_borrows,
                    supply_rate,
                    borrow_rate,
                    supply_speed,
                    borrow_speed,
                    paused,
                }
            })
            .collect();

        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(len: usize) -> MarketColumns {
        MarketColumns {
            markets: (0..len).map(|i| Address::with_last_byte(i as u8)).collect(),
            collateral_factors: vec![BigDecimal::from(0); len],
            supply_speeds: vec![BigDecimal::from(0); len],
            borrow_speeds: vec![BigDecimal::from(0); len],
            paused: vec![Some(false); len],
            supply_rates: (0..len).map(|i| BigDecimal::from(i as u64)).collect(),
            borrow_rates: vec![BigDecimal::from(0); len],
            cash: vec![BigDecimal::from(0); len],
            total_borrows: vec![BigDecimal::from(0); len],
            underlying: vec![None; len],
            symbols: vec![None; len],
            decimals: vec![None; len],
        }
    }

    #[test]
    fn test_into_markets_keeps_order() {
        let markets = columns(3).into_markets().unwrap();
        assert_eq!(markets.len(), 3);

        for (i, market) in markets.iter().enumerate() {
            assert_eq!(market.address, Address::with_last_byte(i as u8));
            assert_eq!(market.supply_rate, BigDecimal::from(i as u64));
        }
    }

    #[test]
    fn test_into_markets_length_mismatch() {
        let mut data = columns(3);
        data.cash.pop();

        let err = data.into_markets().unwrap_err();
        assert!(
            matches!(
                &err,
                Error::LengthMismatch { field, expected: 3, actual: 2 } if field == "getCash"
            ),
            "unexpected error {}",
            err
        );
    }
}
