//! Withdrawal workflow: hold-at-request debits and the admin approval
//! lifecycle.

use crate::config::LimitConfig;
use crate::errors::{ApiError, Result};
use crate::metrics;
use crate::models::{CreateWithdrawalRequest, Decision, WithdrawalCreatedResponse};
use ledger_core::{Error as LedgerError, Ledger, TxKind, UserId, Withdrawal, WithdrawalStatus};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Listing page size, matching the platform frontend
const RECENT_WITHDRAWALS_LIMIT: usize = 20;

pub struct WithdrawalService {
    ledger: Arc<Ledger>,
    limits: LimitConfig,
}

impl WithdrawalService {
    pub fn new(ledger: Arc<Ledger>, limits: LimitConfig) -> Self {
        WithdrawalService { ledger, limits }
    }

    /// Create a withdrawal request, debiting the funds immediately (hold
    /// semantics). The pending row is only written once the hold succeeded;
    /// an insufficient balance leaves no trace.
    pub fn request_withdrawal(
        &self,
        request: CreateWithdrawalRequest,
    ) -> Result<WithdrawalCreatedResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        if request.amount < self.limits.min_withdrawal {
            return Err(ApiError::Validation(format!(
                "Minimum withdrawal amount: ${}",
                self.limits.min_withdrawal
            )));
        }

        let currency = request.currency.to_uppercase();
        if !self.limits.supported_currencies.contains(&currency) {
            return Err(ApiError::Validation(format!(
                "Unsupported currency: {}",
                currency
            )));
        }

        let user = self.ledger.get_user(UserId::new(request.user_id))?;

        // The hold enforces sufficient balance; no row exists until it lands
        let hold = self.ledger.apply_transaction(
            user.user_id,
            TxKind::Withdrawal,
            -request.amount,
            &format!("Withdrawal request to {} ({})", request.wallet_address, currency),
            None,
        )?;

        let withdrawal = self.ledger.record_withdrawal(
            user.user_id,
            request.amount,
            &currency,
            &request.wallet_address,
            hold.transaction_id,
        )?;

        metrics::WITHDRAWALS_REQUESTED.inc();
        info!(
            "Held {} {} for withdrawal {} (user {})",
            withdrawal.amount, withdrawal.currency, withdrawal.id, user.user_id
        );

        Ok(WithdrawalCreatedResponse {
            withdrawal_id: withdrawal.id,
            message: "Withdrawal request created successfully".to_string(),
        })
    }

    /// Resolve a pending withdrawal.
    ///
    /// Approval completes the request with no further balance effect (funds
    /// were held at request time). Rejection restores the held funds through
    /// a compensating credit keyed on `withdrawal-refund:{id}`, so repeating
    /// a rejection (or retrying after a partial failure) can never refund
    /// twice. A contradictory re-resolution is a conflict and changes
    /// nothing.
    pub fn resolve_withdrawal(&self, id: &Uuid, decision: Decision) -> Result<Withdrawal> {
        let target = match decision {
            Decision::Approve => WithdrawalStatus::Completed,
            Decision::Reject => WithdrawalStatus::Rejected,
        };

        let withdrawal = match self.ledger.update_withdrawal_status(id, target) {
            Ok(wd) => wd,
            Err(LedgerError::Conflict(_)) => {
                let wd = self.ledger.get_withdrawal(id)?;
                if wd.status != target {
                    return Err(ApiError::Conflict(format!(
                        "withdrawal {} already {}",
                        id, wd.status
                    )));
                }
                // Same decision replayed; for rejections fall through so the
                // idempotent refund also covers a retry after partial failure
                wd
            }
            Err(e) => return Err(e.into()),
        };

        if decision == Decision::Reject {
            self.ledger.apply_transaction(
                withdrawal.user_id,
                TxKind::Withdrawal,
                withdrawal.amount,
                &format!("Refund for rejected withdrawal {}", withdrawal.id),
                Some(&format!("withdrawal-refund:{}", withdrawal.id)),
            )?;
        }

        let label = match decision {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        };
        metrics::WITHDRAWALS_RESOLVED.with_label_values(&[label]).inc();
        info!("Withdrawal {} resolved: {}", id, label);

        Ok(self.ledger.get_withdrawal(id)?)
    }

    /// Most-recent withdrawal requests for a user
    pub fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        Ok(self
            .ledger
            .withdrawals_for_user(UserId::new(user_id), RECENT_WITHDRAWALS_LIMIT)?)
    }
}
