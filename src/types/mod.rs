pub use self::{
    coins_price::{CoinPrice, CoinsPrice},
    market::{Market, MarketColumns},
    pool::{BorrowFields, Pool},
    project_info::ProjectInfo,
    token::Token,
};

mod coins_price;
mod market;
mod pool;
mod project_info;
mod token;
