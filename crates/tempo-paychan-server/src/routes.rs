use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use alloy::primitives::U256;
use alloy::providers::Provider;
use paychan::{ContractLedger, Ledger, StateStore};

use crate::error::GateError;
use crate::metrics::metrics_output;
use crate::middleware::require_channel_payment;
use crate::security::bearer_matches;
use crate::state::AppState;

/// Register the paid demo route and channel administration.
pub fn configure<L: Ledger + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/pay", web::get().to(pay::<L>))
        .service(
            web::resource("/channels/{channel}")
                .route(web::get().to(get_channel_state::<L>))
                .route(web::delete().to(delete_channel_state::<L>)),
        );
}

/// Costs the gate's required amount per request.
pub async fn pay<L: Ledger + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<L>>,
) -> Result<HttpResponse, GateError> {
    let payment = require_channel_payment(&req, &state.admission, &state.gate).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(format!("You paid {} for this.", payment.amount)))
}

/// Prometheus exposition. Requires `Bearer METRICS_TOKEN`; forbidden when unset.
pub async fn metrics_endpoint<L: Ledger + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<L>>,
) -> HttpResponse {
    match &state.metrics_token {
        Some(expected) if bearer_matches(&req, expected) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics_output()),
        Some(_) => HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "unauthorized",
            "message": "Valid Bearer token required for /metrics"
        })),
        None => HttpResponse::Forbidden().json(serde_json::json!({
            "error": "forbidden",
            "message": "Set METRICS_TOKEN to access /metrics"
        })),
    }
}

/// Liveness plus ledger RPC reachability.
pub async fn health<P>(state: web::Data<AppState<ContractLedger<P>>>) -> HttpResponse
where
    P: Provider + Send + Sync + 'static,
{
    match state.admission.ledger().health_check().await {
        Ok(block) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "paychan-server",
            "block": block,
        })),
        Err(e) => {
            tracing::error!(error = %e, "health check: ledger RPC unreachable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "degraded",
                "service": "paychan-server",
            }))
        }
    }
}

fn authorize_admin<L>(req: &HttpRequest, state: &AppState<L>) -> Result<(), HttpResponse> {
    match &state.admin_token {
        Some(expected) if bearer_matches(req, expected) => Ok(()),
        Some(_) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "unauthorized",
            "message": "Valid Bearer token required for /channels"
        }))),
        None => Err(HttpResponse::Forbidden().json(serde_json::json!({
            "error": "forbidden",
            "message": "Set ADMIN_TOKEN to enable channel administration"
        }))),
    }
}

fn parse_channel(raw: &str) -> Result<U256, HttpResponse> {
    U256::from_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(serde_json::json!({
            "error": "invalid_channel",
            "message": format!("'{raw}' is not a channel id")
        }))
    })
}

fn store_failure(e: paychan::StoreError) -> HttpResponse {
    tracing::error!("Store error: {}", e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "internal_error",
        "message": "An internal error occurred"
    }))
}

/// Last accepted state of one channel, for audit.
pub async fn get_channel_state<L: Ledger + 'static>(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState<L>>,
) -> HttpResponse {
    if let Err(resp) = authorize_admin(&req, &state) {
        return resp;
    }
    let channel_id = match parse_channel(&path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.admission.store().get(channel_id) {
        Ok(Some(channel)) => HttpResponse::Ok().json(channel),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "channel_not_found",
            "message": format!("No state stored for channel {channel_id}")
        })),
        Err(e) => store_failure(e),
    }
}

/// Administrative reset of one channel's stored state.
pub async fn delete_channel_state<L: Ledger + 'static>(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState<L>>,
) -> HttpResponse {
    if let Err(resp) = authorize_admin(&req, &state) {
        return resp;
    }
    let channel_id = match parse_channel(&path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.admission.store().delete(channel_id) {
        Ok(true) => {
            tracing::warn!(channel = %channel_id, "channel state deleted by administrator");
            HttpResponse::NoContent().finish()
        }
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "channel_not_found",
            "message": format!("No state stored for channel {channel_id}")
        })),
        Err(e) => store_failure(e),
    }
}
