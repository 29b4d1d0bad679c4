use chrono::{DateTime, Utc};
use ledger_core::{User, Withdrawal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User registration request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct RegisterUserRequest {
    pub user_id: i64,
    pub username: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    pub referrer_id: Option<i64>,
}

/// Deposit creation request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateDepositRequest {
    pub user_id: i64,
    pub amount: Decimal,
    #[validate(length(min = 2, max = 10))]
    pub currency: String,
}

/// Provider webhook payload for an invoice update
#[derive(Debug, Deserialize)]
pub struct InvoiceCallback {
    pub invoice_id: i64,
    pub status: String,
}

/// Admin balance adjustment (PATCH /users/{id})
#[derive(Debug, Deserialize)]
pub struct AdjustBalanceRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
}

/// Withdrawal creation request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateWithdrawalRequest {
    pub user_id: i64,
    pub amount: Decimal,
    #[validate(length(min = 2, max = 10))]
    pub currency: String,
    #[validate(length(min = 8, max = 128))]
    pub wallet_address: String,
}

/// Query for listing a user's withdrawals
#[derive(Debug, Deserialize)]
pub struct WithdrawalsQuery {
    pub user_id: i64,
}

/// Admin decision on a pending withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Withdrawal resolution request
#[derive(Debug, Deserialize)]
pub struct ResolveWithdrawalRequest {
    pub decision: Decision,
}

/// User record response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub balance: Decimal,
    pub referrer_id: Option<i64>,
    pub total_earned: Decimal,
    pub total_referred: u32,
    pub registration_date: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id.as_i64(),
            username: user.username,
            first_name: user.first_name,
            balance: user.balance,
            referrer_id: user.referrer_id.map(|id| id.as_i64()),
            total_earned: user.total_earned,
            total_referred: user.total_referred,
            registration_date: user.registration_date,
        }
    }
}

/// Response for a freshly created deposit invoice
#[derive(Debug, Serialize)]
pub struct DepositCreatedResponse {
    pub invoice_id: i64,
    pub pay_url: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Response for a created withdrawal request
#[derive(Debug, Serialize)]
pub struct WithdrawalCreatedResponse {
    pub withdrawal_id: Uuid,
    pub message: String,
}

/// One row in the withdrawal listing
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub wallet_address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(wd: Withdrawal) -> Self {
        Self {
            id: wd.id,
            amount: wd.amount,
            currency: wd.currency,
            wallet_address: wd.wallet_address,
            status: wd.status.as_str().to_string(),
            created_at: wd.created_at,
        }
    }
}
