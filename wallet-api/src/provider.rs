//! Crypto Pay provider client
//!
//! Invoice creation is the only unbounded-latency operation in the system;
//! it always runs outside any ledger lock. Transport failures and provider
//! 5xx responses are retried a bounded number of times with exponential
//! backoff before surfacing an external-service error; rejections
//! (`{ok: false}` or 4xx) fail fast since a retry would be rejected again.

use crate::config::ProviderConfig;
use crate::errors::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// A created provider invoice
#[derive(Debug, Clone)]
pub struct Invoice {
    pub invoice_id: i64,
    pub pay_url: String,
}

/// Seam to the external payment provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    /// Create a payment invoice for the given asset/amount
    async fn create_invoice(
        &self,
        asset: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Invoice>;
}

/// Crypto Pay HTTP client
pub struct CryptoPayClient {
    config: ProviderConfig,
    http_client: Client,
}

#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    asset: &'a str,
    amount: String,
    description: &'a str,
    paid_btn_name: &'a str,
    paid_btn_url: String,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    ok: bool,
    result: Option<ProviderInvoice>,
}

#[derive(Debug, Deserialize)]
struct ProviderInvoice {
    invoice_id: i64,
    pay_url: String,
}

enum CallError {
    Retryable(String),
    Fatal(String),
}

impl CryptoPayClient {
    pub fn new(config: ProviderConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    async fn request_invoice(
        &self,
        asset: &str,
        amount: Decimal,
        description: &str,
    ) -> std::result::Result<Invoice, CallError> {
        let url = format!("{}/api/createInvoice", self.config.base_url);
        let body = CreateInvoiceBody {
            asset,
            amount: amount.to_string(),
            description,
            paid_btn_name: "callback",
            paid_btn_url: format!("{}/payment_success", self.config.webapp_url),
        };

        let response = self
            .http_client
            .post(&url)
            .header("Crypto-Pay-API-Token", &self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("createInvoice request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CallError::Retryable(format!(
                "provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(CallError::Fatal(format!("provider returned {}", status)));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| CallError::Fatal(format!("invalid provider response: {}", e)))?;

        match parsed {
            ProviderResponse {
                ok: true,
                result: Some(invoice),
            } => Ok(Invoice {
                invoice_id: invoice.invoice_id,
                pay_url: invoice.pay_url,
            }),
            _ => Err(CallError::Fatal("provider rejected invoice".to_string())),
        }
    }
}

#[async_trait]
impl InvoiceProvider for CryptoPayClient {
    async fn create_invoice(
        &self,
        asset: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Invoice> {
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        for attempt in 1..=self.config.max_retries {
            match self.request_invoice(asset, amount, description).await {
                Ok(invoice) => {
                    info!(
                        "Created invoice {} for {} {} (attempt {})",
                        invoice.invoice_id, amount, asset, attempt
                    );
                    return Ok(invoice);
                }
                Err(CallError::Fatal(detail)) => {
                    return Err(ApiError::ExternalService(detail));
                }
                Err(CallError::Retryable(detail)) => {
                    warn!(
                        "createInvoice attempt {}/{} failed: {}",
                        attempt, self.config.max_retries, detail
                    );
                    if attempt == self.config.max_retries {
                        return Err(ApiError::ExternalService(detail));
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        Err(ApiError::ExternalService(
            "invoice creation attempts exhausted".to_string(),
        ))
    }
}
