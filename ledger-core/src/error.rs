//! Error types for the ledger

use crate::types::UserId;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Deposit not found
    #[error("Deposit not found for invoice {0}")]
    DepositNotFound(i64),

    /// Withdrawal not found
    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(Uuid),

    /// Debit would make the balance negative
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the debit needed
        required: Decimal,
        /// Balance at the time of the attempt
        available: Decimal,
    },

    /// Amount rejected before any state change
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Duplicate insert or illegal state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
