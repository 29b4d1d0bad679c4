//! CoinPerk Ledger Core
//!
//! Append-only transaction ledger with idempotency keys and a cached
//! per-user balance projection.
//!
//! # Architecture
//!
//! - **Append-only log**: every balance change is an immutable transaction;
//!   corrections are new transactions
//! - **Cached projection**: `balance` is co-updated with the log inside a
//!   single atomic storage commit, never mutated independently
//! - **Idempotency keys**: replayed provider webhooks and double-submitted
//!   requests have at-most-once effect
//! - **Per-user serializability**: concurrent debits for one user never
//!   observe a stale balance
//!
//! # Invariants
//!
//! - `balance == Σ(transaction.amount)` for every user, at all times
//! - Balance never goes negative as the result of any ledger operation
//! - One transaction row and one balance update per logical call, or none

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use types::{
    Applied, Deposit, DepositStatus, NewUser, Transaction, TxKind, User, UserId, Withdrawal,
    WithdrawalStatus,
};
