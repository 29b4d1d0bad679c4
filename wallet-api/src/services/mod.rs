//! Workflow services built on the ledger store.
//!
//! Each service mutates balances exclusively through
//! [`ledger_core::Ledger::apply_transaction`]; none of them touch balance
//! state directly.

pub mod deposits;
pub mod users;
pub mod withdrawals;

pub use deposits::DepositService;
pub use users::UserService;
pub use withdrawals::WithdrawalService;
