use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    // Business metrics
    pub static ref USERS_REGISTERED: IntCounter = IntCounter::new(
        "users_registered_total",
        "Total users registered"
    ).expect("metric can be created");

    pub static ref REFERRAL_BONUSES_PAID: IntCounter = IntCounter::new(
        "referral_bonuses_paid_total",
        "Total referral bonuses credited"
    ).expect("metric can be created");

    pub static ref DEPOSITS_CREATED: IntCounter = IntCounter::new(
        "deposits_created_total",
        "Total deposit invoices created"
    ).expect("metric can be created");

    pub static ref DEPOSIT_CALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("deposit_callbacks_total", "Provider invoice callbacks received"),
        &["status"]
    ).expect("metric can be created");

    pub static ref DEPOSITS_PAID: IntCounter = IntCounter::new(
        "deposits_paid_total",
        "Total deposits credited to balances"
    ).expect("metric can be created");

    pub static ref WITHDRAWALS_REQUESTED: IntCounter = IntCounter::new(
        "withdrawals_requested_total",
        "Total withdrawal requests accepted"
    ).expect("metric can be created");

    pub static ref WITHDRAWALS_RESOLVED: IntCounterVec = IntCounterVec::new(
        Opts::new("withdrawals_resolved_total", "Withdrawal resolutions"),
        &["decision"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.register(Box::new(USERS_REGISTERED.clone()))?;
    registry.register(Box::new(REFERRAL_BONUSES_PAID.clone()))?;
    registry.register(Box::new(DEPOSITS_CREATED.clone()))?;
    registry.register(Box::new(DEPOSIT_CALLBACKS.clone()))?;
    registry.register(Box::new(DEPOSITS_PAID.clone()))?;
    registry.register(Box::new(WITHDRAWALS_REQUESTED.clone()))?;
    registry.register(Box::new(WITHDRAWALS_RESOLVED.clone()))?;
    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
