//! Deposit workflow: invoice creation and provider-callback reconciliation.

use crate::config::LimitConfig;
use crate::errors::{ApiError, Result};
use crate::metrics;
use crate::models::{CreateDepositRequest, DepositCreatedResponse};
use crate::provider::InvoiceProvider;
use ledger_core::{Deposit, DepositStatus, Ledger, TxKind, UserId};
use std::sync::Arc;
use tracing::{info, warn};

pub struct DepositService {
    ledger: Arc<Ledger>,
    provider: Arc<dyn InvoiceProvider>,
    limits: LimitConfig,
}

impl DepositService {
    pub fn new(
        ledger: Arc<Ledger>,
        provider: Arc<dyn InvoiceProvider>,
        limits: LimitConfig,
    ) -> Self {
        DepositService {
            ledger,
            provider,
            limits,
        }
    }

    /// Create a provider invoice and a `pending` deposit row.
    ///
    /// Validation and the user lookup happen before the provider call; the
    /// deposit row is only written once the invoice exists, so a provider
    /// failure leaves no state behind.
    pub async fn create_deposit(
        &self,
        request: CreateDepositRequest,
    ) -> Result<DepositCreatedResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        if request.amount < self.limits.min_deposit || request.amount > self.limits.max_deposit {
            return Err(ApiError::Validation(format!(
                "Amount must be between ${} and ${}",
                self.limits.min_deposit, self.limits.max_deposit
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

        // The provider round trip runs outside any ledger lock
        let description = format!("Balance top-up of {} {}", request.amount, currency);
        let invoice = self
            .provider
            .create_invoice(&currency, request.amount, &description)
            .await?;

        let deposit =
            self.ledger
                .record_deposit(user.user_id, request.amount, &currency, invoice.invoice_id)?;

        metrics::DEPOSITS_CREATED.inc();
        info!(
            "Created deposit {} (invoice {}) for user {}",
            deposit.id, deposit.invoice_id, user.user_id
        );

        Ok(DepositCreatedResponse {
            invoice_id: deposit.invoice_id,
            pay_url: invoice.pay_url,
            amount: deposit.amount,
            currency: deposit.currency,
        })
    }

    /// Reconcile a provider callback for an invoice.
    ///
    /// Tolerates at-least-once delivery in any order: a deposit that already
    /// reached a terminal status is returned unchanged, and the credit itself
    /// is keyed on `invoice:{id}` so a replay can never double-pay.
    pub fn confirm_deposit(&self, invoice_id: i64, provider_status: &str) -> Result<Deposit> {
        metrics::DEPOSIT_CALLBACKS
            .with_label_values(&[provider_status])
            .inc();

        let deposit = self.ledger.deposit_by_invoice(invoice_id)?;
        if deposit.status.is_terminal() {
            if provider_status == "paid" && deposit.status != DepositStatus::Paid {
                warn!(
                    "Invoice {} reported paid after terminal status {}, ignoring",
                    invoice_id, deposit.status
                );
            }
            return Ok(deposit);
        }

        match provider_status {
            "paid" => {
                self.ledger.apply_transaction(
                    deposit.user_id,
                    TxKind::Deposit,
                    deposit.amount,
                    &format!(
                        "Deposit of {} {} (invoice {})",
                        deposit.amount, deposit.currency, invoice_id
                    ),
                    Some(&format!("invoice:{}", invoice_id)),
                )?;
                let updated = self
                    .ledger
                    .update_deposit_status(invoice_id, DepositStatus::Paid)?;

                metrics::DEPOSITS_PAID.inc();
                info!(
                    "Credited deposit of {} {} to user {} (invoice {})",
                    updated.amount, updated.currency, updated.user_id, invoice_id
                );
                Ok(updated)
            }
            "expired" => {
                info!("Invoice {} expired unpaid", invoice_id);
                Ok(self
                    .ledger
                    .update_deposit_status(invoice_id, DepositStatus::Expired)?)
            }
            other => {
                warn!("Invoice {} reported status {:?}", invoice_id, other);
                Ok(self
                    .ledger
                    .update_deposit_status(invoice_id, DepositStatus::Failed)?)
            }
        }
    }
}
