//! CoinPerk wallet HTTP API
//!
//! Hosts the deposit, withdrawal, and referral workflows on top of the
//! ledger store. All balance mutations flow through
//! [`ledger_core::Ledger::apply_transaction`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod services;

pub use config::Config;
pub use errors::{ApiError, Result};
