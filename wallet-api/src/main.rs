use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use ledger_core::Ledger;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wallet_api::{
    config::Config,
    handlers, metrics,
    provider::{CryptoPayClient, InvoiceProvider},
    services::{DepositService, UserService, WithdrawalService},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting wallet API on port {}", config.server.port);

    metrics::register_metrics(prometheus::default_registry())
        .expect("Failed to register metrics");

    let ledger = Arc::new(
        Ledger::open(ledger_core::Config::with_data_dir(&config.ledger.data_dir))
            .expect("Failed to open ledger"),
    );

    let provider: Arc<dyn InvoiceProvider> =
        Arc::new(CryptoPayClient::new(config.provider.clone()));

    let deposit_service = Arc::new(DepositService::new(
        ledger.clone(),
        provider,
        config.limits.clone(),
    ));
    let withdrawal_service = Arc::new(WithdrawalService::new(
        ledger.clone(),
        config.limits.clone(),
    ));
    let user_service = Arc::new(UserService::new(ledger, config.bonuses.clone()));

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(deposit_service.clone()))
            .app_data(web::Data::new(withdrawal_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .configure(handlers::configure_routes)
            .default_service(web::route().to(handlers::method_not_allowed))
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
