use std::{fmt, num::NonZeroUsize, str::FromStr, sync::Arc};

use alloy::{
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    sol,
    sol_types::SolCall,
};
use anyhow::Context;
use bigdecimal::BigDecimal;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use crate::{
    configuration::Config, error::Error, futures_set::try_join_ordered,
    types::MarketColumns,
};

sol! {
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }

    interface IComptroller {
        function getAllMarkets() external view returns (address[] memory);
        function markets(address market) external view returns (bool isListed, uint256 collateralFactorMantissa, bool isComped);
        function compSupplySpeeds(address market) external view returns (uint256);
        function compBorrowSpeeds(address market) external view returns (uint256);
        function mintGuardianPaused(address market) external view returns (bool);
    }

    interface ICToken {
        function supplyRatePerBlock() external view returns (uint256);
        function borrowRatePerBlock() external view returns (uint256);
        function totalBorrows() external view returns (uint256);
        function getCash() external view returns (uint256);
        function underlying() external view returns (address);
    }

    interface IERC20Metadata {
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
    }
}

pub struct Evm {
    pub config: Config,
    provider: DynProvider,
    /// `MAX_TASKS` multicalls in flight across every field read.
    permits: Arc<Semaphore>,
}

impl fmt::Debug for Evm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evm")
            .field("rpc_host", &self.config.rpc_host)
            .field("multicall", &self.config.multicall_address)
            .finish()
    }
}

impl Evm {
    pub fn new(config: Config) -> Result<Evm, Error> {
        let url = Url::parse(&config.rpc_host)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Evm::with_provider(config, provider))
    }

    pub fn with_provider(config: Config, provider: DynProvider) -> Evm {
        let permits = Arc::new(Semaphore::new(config.max_tasks.max(1)));

        Evm {
            config,
            provider,
            permits,
        }
    }

    /// Reads every per-market field of the registry. Reads without a data
    /// dependency run concurrently; symbol and decimals wait for the
    /// underlying token addresses.
    pub async fn get_market_columns(&self) -> Result<MarketColumns, Error> {
        let markets = self.get_all_markets().await?;
        info!("Registry lists {} markets", markets.len());

        let token_fields = async {
            let underlying = self.get_underlying(&markets).await?;
            let (symbols, decimals) = tokio::try_join!(
                self.get_symbols(&underlying),
                self.get_decimals(&underlying)
            )?;
            Ok::<_, Error>((underlying, symbols, decimals))
        };

        let (
            collateral_factors,
            supply_speeds,
            borrow_speeds,
            paused,
            supply_rates,
            borrow_rates,
            cash,
            total_borrows,
            (underlying, symbols, decimals),
        ) = tokio::try_join!(
            self.get_collateral_factors(&markets),
            self.get_supply_speeds(&markets),
            self.get_borrow_speeds(&markets),
            self.get_paused(&markets),
            self.get_supply_rates(&markets),
            self.get_borrow_rates(&markets),
            self.get_cash(&markets),
            self.get_total_borrows(&markets),
            token_fields,
        )?;

        Ok(MarketColumns {
            markets,
            collateral_factors,
            supply_speeds,
            borrow_speeds,
            paused,
            supply_rates,
            borrow_rates,
            cash,
            total_borrows,
            underlying,
            symbols,
            decimals,
        })
    }

    pub async fn get_all_markets(&self) -> Result<Vec<Address>, Error> {
        const QUERY_CONTRACT_ERROR: &str =
            "Failed to run getAllMarkets against comptroller contract!";

        let calldata = IComptroller::getAllMarketsCall {}.abi_encode();
        let tx = TransactionRequest::default()
            .to(self.config.comptroller_address)
            .input(calldata.into());

        let data = self
            .provider
            .call(tx)
            .await
            .context(QUERY_CONTRACT_ERROR)?;
        let markets = IComptroller::getAllMarketsCall::abi_decode_returns(&data)?;

        Ok(markets)
    }

    pub async fn get_collateral_factors(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = self.registry_calls(markets, |market| {
            IComptroller::marketsCall { market }
        });
        let data = self.aggregate_required("markets", calls).await?;

        data.into_iter()
            .map(|item| to_amount(item.collateralFactorMantissa))
            .collect()
    }

    pub async fn get_supply_speeds(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = self.registry_calls(markets, |market| {
            IComptroller::compSupplySpeedsCall { market }
        });
        to_amounts(self.aggregate_required("compSupplySpeeds", calls).await?)
    }

    pub async fn get_borrow_speeds(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = self.registry_calls(markets, |market| {
            IComptroller::compBorrowSpeedsCall { market }
        });
        to_amounts(self.aggregate_required("compBorrowSpeeds", calls).await?)
    }

    pub async fn get_paused(
        &self,
        markets: &[Address],
    ) -> Result<Vec<Option<bool>>, Error> {
        let calls = self.registry_calls(markets, |market| {
            IComptroller::mintGuardianPausedCall { market }
        });
        self.aggregate_optional("mintGuardianPaused", calls).await
    }

    pub async fn get_supply_rates(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = market_calls(markets, || ICToken::supplyRatePerBlockCall {});
        to_amounts(self.aggregate_required("supplyRatePerBlock", calls).await?)
    }

    pub async fn get_borrow_rates(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = market_calls(markets, || ICToken::borrowRatePerBlockCall {});
        to_amounts(self.aggregate_required("borrowRatePerBlock", calls).await?)
    }

    pub async fn get_cash(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = market_calls(markets, || ICToken::getCashCall {});
        to_amounts(self.aggregate_required("getCash", calls).await?)
    }

    pub async fn get_total_borrows(
        &self,
        markets: &[Address],
    ) -> Result<Vec<BigDecimal>, Error> {
        let calls = market_calls(markets, || ICToken::totalBorrowsCall {});
        to_amounts(self.aggregate_required("totalBorrows", calls).await?)
    }

    /// `None` for markets without an ERC-20 underlying (native token market).
    pub async fn get_underlying(
        &self,
        markets: &[Address],
    ) -> Result<Vec<Option<Address>>, Error> {
        let calls = market_calls(markets, || ICToken::underlyingCall {});
        let data = self.aggregate_optional("underlying", calls).await?;

        Ok(data
            .into_iter()
            .map(|item| item.filter(|address| !address.is_zero()))
            .collect())
    }

    pub async fn get_symbols(
        &self,
        tokens: &[Option<Address>],
    ) -> Result<Vec<Option<String>>, Error> {
        self.aggregate_sparse("symbol", tokens, || IERC20Metadata::symbolCall {})
            .await
    }

    pub async fn get_decimals(
        &self,
        tokens: &[Option<Address>],
    ) -> Result<Vec<Option<u8>>, Error> {
        self.aggregate_sparse("decimals", tokens, || {
            IERC20Metadata::decimalsCall {}
        })
        .await
    }

    fn registry_calls<C, F>(&self, markets: &[Address], call: F) -> Vec<(Address, C)>
    where
        F: Fn(Address) -> C,
    {
        markets
            .iter()
            .map(|market| (self.config.comptroller_address, call(*market)))
            .collect()
    }

    /// Every call must succeed; a single revert fails the whole batch.
    async fn aggregate_required<C>(
        &self,
        field: &'static str,
        calls: Vec<(Address, C)>,
    ) -> Result<Vec<C::Return>, Error>
    where
        C: SolCall + Send + 'static,
        C::Return: Send + 'static,
    {
        self.aggregate(field, calls, false)
            .await?
            .into_iter()
            .map(|item| item.ok_or_else(|| Error::CallReverted(field.to_owned())))
            .collect()
    }

    /// Reverted or undecodable calls come back as `None`.
    async fn aggregate_optional<C>(
        &self,
        field: &'static str,
        calls: Vec<(Address, C)>,
    ) -> Result<Vec<Option<C::Return>>, Error>
    where
        C: SolCall + Send + 'static,
        C::Return: Send + 'static,
    {
        self.aggregate(field, calls, true).await
    }

    /// Queries only the present targets and spreads the answers back over
    /// the original positions.
    async fn aggregate_sparse<C, F>(
        &self,
        field: &'static str,
        targets: &[Option<Address>],
        call: F,
    ) -> Result<Vec<Option<C::Return>>, Error>
    where
        C: SolCall + Send + 'static,
        C::Return: Send + 'static,
        F: Fn() -> C,
    {
        let calls = targets
            .iter()
            .flatten()
            .map(|target| (*target, call()))
            .collect();
        let mut values = self.aggregate_optional(field, calls).await?.into_iter();

        Ok(targets
            .iter()
            .map(|target| match target {
                Some(_) => values.next().flatten(),
                None => None,
            })
            .collect())
    }

    async fn aggregate<C>(
        &self,
        field: &'static str,
        calls: Vec<(Address, C)>,
        allow_failure: bool,
    ) -> Result<Vec<Option<C::Return>>, Error>
    where
        C: SolCall + Send + 'static,
        C::Return: Send + 'static,
    {
        let batch_size = self.config.multicall_batch_size.max(1);
        let capacity = NonZeroUsize::new(self.config.max_tasks).unwrap_or(NonZeroUsize::MIN);
        let total = calls.len();

        let mut chunks = vec![];
        let mut calls = calls.into_iter().peekable();
        while calls.peek().is_some() {
            let chunk: Vec<(Address, C)> = (&mut calls).take(batch_size).collect();
            chunks.push(aggregate_chunk(
                self.provider.clone(),
                self.permits.clone(),
                self.config.multicall_address,
                field,
                chunk,
                allow_failure,
            ));
        }

        debug!("{}: {} calls in {} batches", field, total, chunks.len());

        let data = try_join_ordered(chunks, capacity).await?;

        Ok(data.into_iter().flatten().collect())
    }
}

fn market_calls<C, F>(markets: &[Address], call: F) -> Vec<(Address, C)>
where
    F: Fn() -> C,
{
    markets.iter().map(|market| (*market, call())).collect()
}

async fn aggregate_chunk<C>(
    provider: DynProvider,
    permits: Arc<Semaphore>,
    multicall: Address,
    field: &'static str,
    calls: Vec<(Address, C)>,
    allow_failure: bool,
) -> Result<Vec<Option<C::Return>>, Error>
where
    C: SolCall,
{
    let expected = calls.len();
    let call3 = calls
        .iter()
        .map(|(target, call)| IMulticall3::Call3 {
            target: *target,
            allowFailure: allow_failure,
            callData: call.abi_encode().into(),
        })
        .collect();

    let calldata = IMulticall3::aggregate3Call { calls: call3 }.abi_encode();
    let tx = TransactionRequest::default()
        .to(multicall)
        .input(calldata.into());

    let _permit = permits.acquire().await?;
    let data = provider
        .call(tx)
        .await
        .with_context(|| format!("Failed to run multicall for {}", field))?;
    let results = IMulticall3::aggregate3Call::abi_decode_returns(&data)?;

    if results.len() != expected {
        return Err(Error::LengthMismatch {
            field: field.to_owned(),
            expected,
            actual: results.len(),
        });
    }

    results
        .into_iter()
        .map(|result| {
            if !result.success {
                return Ok(None);
            }

            match C::abi_decode_returns(&result.returnData) {
                Ok(value) => Ok(Some(value)),
                Err(_) if allow_failure => Ok(None),
                Err(e) => Err(Error::SolTypesError(e)),
            }
        })
        .collect()
}

fn to_amount(value: U256) -> Result<BigDecimal, Error> {
    Ok(BigDecimal::from_str(&value.to_string())?)
}

fn to_amounts(values: Vec<U256>) -> Result<Vec<BigDecimal>, Error> {
    values.into_iter().map(to_amount).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::configuration::tests::test_config;
    use alloy::{primitives::Bytes, providers::mock::Asserter, sol_types::SolValue};
    use std::time::Duration;

    fn market(byte: u8) -> Address {
        Address::with_last_byte(byte)
    }

    pub(crate) fn mocked_evm(asserter: Asserter, batch_size: usize, max_tasks: usize) -> Evm {
        let mut config = test_config();
        config.multicall_batch_size = batch_size;
        config.max_tasks = max_tasks;

        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter)
            .erased();
        Evm::with_provider(config, provider)
    }

    pub(crate) fn ok<T: SolValue>(value: T) -> IMulticall3::Result {
        IMulticall3::Result {
            success: true,
            returnData: value.abi_encode().into(),
        }
    }

    pub(crate) fn reverted() -> IMulticall3::Result {
        IMulticall3::Result {
            success: false,
            returnData: Bytes::new(),
        }
    }

    /// Queues the answer of one `aggregate3` call.
    pub(crate) fn push_batch(asserter: &Asserter, results: Vec<IMulticall3::Result>) {
        asserter.push_success(&Bytes::from(results.abi_encode()));
    }

    #[test]
    fn test_to_amount() {
        let value = U256::from(10).pow(U256::from(30));
        assert_eq!(
            to_amount(value).unwrap(),
            BigDecimal::from_str("1000000000000000000000000000000").unwrap()
        );
    }

    #[test]
    fn test_market_calls_keep_order() {
        let markets = [market(3), market(1), market(2)];
        let calls = market_calls(&markets, || ICToken::getCashCall {});
        let targets: Vec<Address> = calls.iter().map(|(target, _)| *target).collect();

        assert_eq!(targets, markets.to_vec());
    }

    #[test]
    fn test_registry_call_encoding() {
        let call = IComptroller::compSupplySpeedsCall { market: market(7) };
        let encoded = call.abi_encode();

        assert_eq!(&encoded[..4], &IComptroller::compSupplySpeedsCall::SELECTOR);
        assert_eq!(encoded.len(), 36);
        assert_eq!(encoded[35], 7);
    }

    #[test]
    fn test_decode_aggregate3_returns() {
        let results = vec![
            IMulticall3::Result {
                success: true,
                returnData: U256::from(42).abi_encode().into(),
            },
            IMulticall3::Result {
                success: false,
                returnData: Default::default(),
            },
        ];
        let encoded = results.abi_encode();
        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&encoded).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].success);
        assert!(!decoded[1].success);

        let value = ICToken::getCashCall::abi_decode_returns(&decoded[0].returnData).unwrap();
        assert_eq!(value, U256::from(42));
    }

    #[tokio::test]
    async fn test_get_all_markets() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 100, 1);
        asserter.push_success(&Bytes::from(vec![market(2), market(1)].abi_encode()));

        let markets = evm.get_all_markets().await.unwrap();
        assert_eq!(markets, vec![market(2), market(1)]);
    }

    #[tokio::test]
    async fn test_reads_keep_order_across_batches() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 2, 1);
        let markets: Vec<Address> = (1..=5).map(market).collect();

        push_batch(&asserter, vec![ok(U256::from(10)), ok(U256::from(20))]);
        push_batch(&asserter, vec![ok(U256::from(30)), ok(U256::from(40))]);
        push_batch(&asserter, vec![ok(U256::from(50))]);

        let rates = evm.get_supply_rates(&markets).await.unwrap();
        let expected: Vec<BigDecimal> = [10, 20, 30, 40, 50].into_iter().map(BigDecimal::from).collect();
        assert_eq!(rates, expected);
    }

    #[tokio::test]
    async fn test_sparse_reads_spread_over_missing_targets() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 2, 1);
        let tokens = [Some(market(1)), None, Some(market(2)), Some(market(3))];

        push_batch(&asserter, vec![ok(U256::from(6)), reverted()]);
        push_batch(&asserter, vec![ok(U256::from(8))]);

        let decimals = evm.get_decimals(&tokens).await.unwrap();
        assert_eq!(decimals, vec![Some(6), None, None, Some(8)]);
    }

    #[tokio::test]
    async fn test_sparse_reads_without_targets_skip_rpc() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 2, 1);

        let symbols = evm.get_symbols(&[None, None]).await.unwrap();
        assert_eq!(symbols, vec![None, None]);
        assert!(asserter.read_q().is_empty());
    }

    #[tokio::test]
    async fn test_optional_reverts_become_none() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 2, 1);
        let markets = [market(1), market(2), market(3)];

        push_batch(&asserter, vec![ok(false), reverted()]);
        push_batch(&asserter, vec![ok(true)]);

        let paused = evm.get_paused(&markets).await.unwrap();
        assert_eq!(paused, vec![Some(false), None, Some(true)]);
    }

    #[tokio::test]
    async fn test_zero_underlying_is_none() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 100, 1);
        let markets = [market(1), market(2), market(3)];

        push_batch(&asserter, vec![ok(market(9)), ok(Address::ZERO), reverted()]);

        let underlying = evm.get_underlying(&markets).await.unwrap();
        assert_eq!(underlying, vec![Some(market(9)), None, None]);
    }

    #[tokio::test]
    async fn test_required_revert_is_fatal() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 2, 1);
        let markets = [market(1), market(2)];

        push_batch(&asserter, vec![ok(U256::from(1)), reverted()]);

        let err = evm.get_cash(&markets).await.unwrap_err();
        assert!(
            matches!(&err, Error::CallReverted(field) if field == "getCash"),
            "unexpected error {}",
            err
        );
        assert_eq!(err.to_string(), "Contract call reverted: getCash");
    }

    #[tokio::test]
    async fn test_short_batch_answer_is_fatal() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 100, 1);
        let markets = [market(1), market(2)];

        push_batch(&asserter, vec![ok(U256::from(1))]);

        let err = evm.get_total_borrows(&markets).await.unwrap_err();
        assert!(
            matches!(
                &err,
                Error::LengthMismatch { field, expected: 2, actual: 1 } if field == "totalBorrows"
            ),
            "unexpected error {}",
            err
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 100, 1);

        asserter.push_failure_msg("connection refused");

        let err = evm.get_cash(&[market(1)]).await.unwrap_err();
        assert!(matches!(err, Error::AnyHowError(_)), "unexpected error {}", err);
        assert_eq!(err.to_string(), "Failed to run multicall for getCash");
    }

    #[tokio::test]
    async fn test_fields_share_one_limit() {
        let asserter = Asserter::new();
        let evm = mocked_evm(asserter.clone(), 100, 1);
        let markets = [market(1)];

        push_batch(&asserter, vec![ok(U256::from(5))]);

        let permit = evm.permits.clone().acquire_owned().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(100), evm.get_cash(&markets)).await;
        assert!(blocked.is_err());
        assert_eq!(asserter.read_q().len(), 1);
        drop(permit);

        let cash = evm.get_cash(&markets).await.unwrap();
        assert_eq!(cash, vec![BigDecimal::from(5)]);
    }
}
