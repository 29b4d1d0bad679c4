//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Platform user identifier (numeric, assigned by the messenger frontend)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UserId(i64);

impl UserId {
    /// Create new user ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get as raw integer
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Transaction kind: the tagged mutation contract.
///
/// Every balance change is one of these variants; there is no other legal
/// path to balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// One-time welcome credit on registration
    Bonus,
    /// Credit to a referrer for a referred registration
    Referral,
    /// Credit from a paid provider invoice
    Deposit,
    /// Debit hold for a withdrawal request (or its compensating credit)
    Withdrawal,
    /// Manual admin correction
    Adjustment,
}

impl TxKind {
    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Bonus => "bonus",
            TxKind::Referral => "referral",
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Adjustment => "adjustment",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bonus" => Some(TxKind::Bonus),
            "referral" => Some(TxKind::Referral),
            "deposit" => Some(TxKind::Deposit),
            "withdrawal" => Some(TxKind::Withdrawal),
            "adjustment" => Some(TxKind::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User record.
///
/// `balance` is a cached projection: it must always equal the sum of the
/// user's transaction amounts. The ledger keeps the two consistent inside a
/// single atomic storage commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Platform identity
    pub user_id: UserId,

    /// Optional handle
    pub username: Option<String>,

    /// Display name
    pub first_name: String,

    /// Cached balance projection (sum of the transaction log)
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,

    /// Weak reference to the referring user (an id, not an ownership link)
    pub referrer_id: Option<UserId>,

    /// Cumulative bonus/referral credits
    #[serde(with = "rust_decimal::serde::str")]
    pub total_earned: Decimal,

    /// Number of referred registrations credited to this user
    pub total_referred: u32,

    /// Registration timestamp
    pub registration_date: DateTime<Utc>,
}

/// Parameters for creating a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Platform identity
    pub user_id: UserId,
    /// Optional handle
    pub username: Option<String>,
    /// Display name
    pub first_name: String,
    /// Referring user, if any
    pub referrer_id: Option<UserId>,
}

/// Immutable ledger entry. Never updated or deleted; corrections are new
/// transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning user
    pub user_id: UserId,

    /// Mutation kind
    pub kind: TxKind,

    /// Signed amount (credits positive, debits negative)
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Human-readable context
    pub description: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Deposit invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    /// Invoice issued, awaiting provider confirmation
    Pending,
    /// Provider reported payment; balance credited
    Paid,
    /// Invoice expired unpaid
    Expired,
    /// Provider reported failure
    Failed,
}

impl DepositStatus {
    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Paid => "paid",
            DepositStatus::Expired => "expired",
            DepositStatus::Failed => "failed",
        }
    }

    /// Terminal statuses admit no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deposit row. Created before any balance effect; balance is credited only
/// on the `pending -> paid` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    /// Internal id
    pub id: Uuid,

    /// Owning user
    pub user_id: UserId,

    /// Requested amount
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Provider asset code
    pub currency: String,

    /// External invoice id (unique per provider)
    pub invoice_id: i64,

    /// Lifecycle status
    pub status: DepositStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Withdrawal request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Awaiting admin decision; funds already held
    Pending,
    /// Admin approved, payout in flight
    Approved,
    /// Admin rejected; held funds restored
    Rejected,
    /// Paid out
    Completed,
}

impl WithdrawalStatus {
    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Completed => "completed",
        }
    }

    /// Resolved requests admit no further transitions
    pub fn is_resolved(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Withdrawal row. Funds are debited at creation time (hold semantics), not
/// at approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Internal id (UUIDv7 so per-user listings are time-ordered)
    pub id: Uuid,

    /// Owning user
    pub user_id: UserId,

    /// Held amount (positive)
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Payout asset code
    pub currency: String,

    /// Destination wallet
    pub wallet_address: String,

    /// Lifecycle status
    pub status: WithdrawalStatus,

    /// The hold debit in the transaction log
    pub transaction_id: Uuid,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Result of a successfully applied ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    /// The appended transaction
    pub transaction_id: Uuid,

    /// Balance after the mutation
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
}

/// Stored under an idempotency key so a replayed call returns the original
/// result without re-applying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IdempotencyRecord {
    pub transaction_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
}
