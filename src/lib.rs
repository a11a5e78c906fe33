pub mod configuration;
pub mod error;
pub mod futures_set;
pub mod handler;
pub mod helpers;
pub mod provider;
pub mod types;
