use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub provider: ProviderConfig,
    pub bonuses: BonusConfig,
    pub limits: LimitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_token: String,
    pub webapp_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BonusConfig {
    pub welcome: Decimal,
    pub referral: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitConfig {
    pub min_deposit: Decimal,
    pub max_deposit: Decimal,
    pub min_withdrawal: Decimal,
    pub supported_currencies: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("ledger.data_dir", "./data/ledger")?
            .set_default("provider.base_url", "https://pay.crypt.bot")?
            .set_default("provider.api_token", "")?
            .set_default("provider.webapp_url", "https://app.coinperk.io")?
            .set_default("provider.timeout_secs", 30)?
            .set_default("provider.max_retries", 3)?
            .set_default("provider.retry_delay_ms", 500)?
            .set_default("bonuses.welcome", "10")?
            .set_default("bonuses.referral", "25")?
            .set_default("limits.min_deposit", "10")?
            .set_default("limits.max_deposit", "50000")?
            .set_default("limits.min_withdrawal", "20")?
            .set_default(
                "limits.supported_currencies",
                vec!["USDT", "TON", "BTC", "ETH", "LTC", "USDC"],
            )?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("WALLET_API")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(token) = env::var("CRYPTO_PAY_TOKEN") {
            builder = builder.set_override("provider.api_token", token)?;
        }

        if let Ok(url) = env::var("WEBAPP_URL") {
            builder = builder.set_override("provider.webapp_url", url)?;
        }

        if let Ok(data_dir) = env::var("LEDGER_DATA_DIR") {
            builder = builder.set_override("ledger.data_dir", data_dir)?;
        }

        if let Ok(port) = env::var("WALLET_API_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.provider.api_token.is_empty() {
            return Err("Provider API token is required (CRYPTO_PAY_TOKEN)".to_string());
        }

        if self.provider.max_retries == 0 {
            return Err("Provider max_retries must be at least 1".to_string());
        }

        if self.limits.min_deposit > self.limits.max_deposit {
            return Err("Minimum deposit cannot exceed maximum deposit".to_string());
        }

        if self.limits.supported_currencies.is_empty() {
            return Err("At least one supported currency is required".to_string());
        }

        Ok(())
    }
}
