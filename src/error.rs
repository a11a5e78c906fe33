use std::{env::VarError, io::Error as IO_ERROR, num::ParseIntError};

use alloy::primitives::hex::FromHexError as FROM_HEX_ERROR;
use alloy::sol_types::Error as SOL_TYPES_ERROR;
use anyhow::Error as ANYHOW_ERROR;
use bigdecimal::ParseBigDecimalError as BIG_DECIMAL_ERROR;
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use thiserror::Error;
use tokio::{sync::AcquireError as ACQUIRE_ERROR, task::JoinError};
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    VAR(#[from] VarError),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("{0}")]
    BigDecimalError(#[from] BIG_DECIMAL_ERROR),

    #[error("{0}")]
    AcquireError(#[from] ACQUIRE_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Task message error: {0}")]
    TaskError(String),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("{0}")]
    AnyHowError(#[from] ANYHOW_ERROR),

    #[error("{0}")]
    ReqwestError(#[from] REQWEST_ERROR),

    #[error("Abi decode error: {0}")]
    SolTypesError(#[from] SOL_TYPES_ERROR),

    #[error("Invalid address: {0}")]
    FromHexError(#[from] FROM_HEX_ERROR),

    #[error("Contract call reverted: {0}")]
    CallReverted(String),

    #[error("Batch length mismatch: {field} expected {expected}, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Price oracle responded with status {0}")]
    PriceOracleStatus(u16),
}
