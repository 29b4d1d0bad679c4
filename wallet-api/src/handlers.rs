use crate::errors::ApiError;
use crate::metrics;
use crate::models::{
    AdjustBalanceRequest, CreateDepositRequest, CreateWithdrawalRequest, InvoiceCallback,
    RegisterUserRequest, ResolveWithdrawalRequest, UserResponse, WithdrawalResponse,
    WithdrawalsQuery,
};
use crate::services::{DepositService, UserService, WithdrawalService};
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "wallet-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create deposit invoice
pub async fn create_deposit(
    service: web::Data<Arc<DepositService>>,
    request: web::Json<CreateDepositRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.create_deposit(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Provider invoice callback (at-least-once delivery)
pub async fn deposit_callback(
    service: web::Data<Arc<DepositService>>,
    request: web::Json<InvoiceCallback>,
) -> Result<HttpResponse, ApiError> {
    let deposit = service.confirm_deposit(request.invoice_id, &request.status)?;
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "invoice_id": deposit.invoice_id,
        "status": deposit.status
    })))
}

/// Register user (idempotent): 201 for a new record, 200 for an existing one
pub async fn register_user(
    service: web::Data<Arc<UserService>>,
    request: web::Json<RegisterUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let registration = service.register_user(request.into_inner())?;
    let response = UserResponse::from(registration.user);
    if registration.created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

/// Get user record
pub async fn get_user(
    service: web::Data<Arc<UserService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let user = service.get_user(*user_id)?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Admin balance adjustment
pub async fn adjust_balance(
    service: web::Data<Arc<UserService>>,
    user_id: web::Path<i64>,
    request: web::Json<AdjustBalanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = service.adjust_balance(*user_id, request.into_inner())?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Create withdrawal request
pub async fn request_withdrawal(
    service: web::Data<Arc<WithdrawalService>>,
    request: web::Json<CreateWithdrawalRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.request_withdrawal(request.into_inner())?;
    Ok(HttpResponse::Ok().json(response))
}

/// List recent withdrawals for a user
pub async fn list_withdrawals(
    service: web::Data<Arc<WithdrawalService>>,
    query: web::Query<WithdrawalsQuery>,
) -> Result<HttpResponse, ApiError> {
    let withdrawals: Vec<WithdrawalResponse> = service
        .list_withdrawals(query.user_id)?
        .into_iter()
        .map(WithdrawalResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(withdrawals))
}

/// Resolve a pending withdrawal (admin)
pub async fn resolve_withdrawal(
    service: web::Data<Arc<WithdrawalService>>,
    withdrawal_id: web::Path<Uuid>,
    request: web::Json<ResolveWithdrawalRequest>,
) -> Result<HttpResponse, ApiError> {
    let withdrawal = service.resolve_withdrawal(&withdrawal_id.into_inner(), request.decision)?;
    Ok(HttpResponse::Ok().json(WithdrawalResponse::from(withdrawal)))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Fallback for known paths hit with an unsupported method
pub async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/deposits", web::post().to(create_deposit))
        .route("/deposits/callback", web::post().to(deposit_callback))
        .route("/users", web::post().to(register_user))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}", web::patch().to(adjust_balance))
        .route("/withdrawals", web::post().to(request_withdrawal))
        .route("/withdrawals", web::get().to(list_withdrawals))
        .route("/withdrawals/{id}/resolve", web::post().to(resolve_withdrawal))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint));
}
