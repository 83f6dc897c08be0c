use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use paychan::AdmissionError;
use thiserror::Error;

/// Response header repeating the pay URI, for clients that skip the body.
pub const PAY_URI_HEADER: &str = "Pay-Uri";

/// A request that did not get through the payment gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// No claim presented; the normal first-contact answer.
    #[error("payment required: {pay_uri}")]
    PaymentRequired { pay_uri: String },

    /// The claim itself was rejected.
    #[error("invalid payment: {reason}")]
    InvalidPayment {
        reason: AdmissionError,
        pay_uri: String,
    },

    /// The check could not be completed; says nothing about the claim.
    #[error("payment processing failed: {0}")]
    Processing(AdmissionError),
}

impl GateError {
    pub fn from_admission(err: AdmissionError, pay_uri: String) -> Self {
        if err.is_invalid_payment() {
            GateError::InvalidPayment {
                reason: err,
                pay_uri,
            }
        } else {
            GateError::Processing(err)
        }
    }

    /// Metrics label for this outcome.
    pub fn result_label(&self) -> &'static str {
        match self {
            GateError::PaymentRequired { .. } => "payment_required",
            GateError::InvalidPayment { .. } => "invalid",
            GateError::Processing(AdmissionError::ConcurrentUpdate { .. }) => "conflict",
            GateError::Processing(AdmissionError::LedgerUnavailable(_)) => "ledger_unavailable",
            GateError::Processing(_) => "store_unavailable",
        }
    }
}

impl ResponseError for GateError {
    fn status_code(&self) -> StatusCode {
        match self {
            GateError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            GateError::InvalidPayment { .. } => StatusCode::UNAUTHORIZED,
            GateError::Processing(AdmissionError::ConcurrentUpdate { .. }) => StatusCode::CONFLICT,
            GateError::Processing(AdmissionError::LedgerUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GateError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            GateError::PaymentRequired { pay_uri } => HttpResponse::build(status)
                .insert_header((PAY_URI_HEADER, pay_uri.as_str()))
                .json(serde_json::json!({
                    "error": "payment_required",
                    "message": "Payment Required",
                    "payUri": pay_uri,
                })),
            GateError::InvalidPayment { reason, pay_uri } => HttpResponse::build(status)
                .insert_header((PAY_URI_HEADER, pay_uri.as_str()))
                .json(serde_json::json!({
                    "error": "invalid_payment",
                    "message": reason.to_string(),
                    "payUri": pay_uri,
                })),
            GateError::Processing(err @ AdmissionError::ConcurrentUpdate { .. }) => {
                HttpResponse::build(status).json(serde_json::json!({
                    "error": "concurrent_update",
                    "message": err.to_string(),
                }))
            }
            GateError::Processing(err @ AdmissionError::LedgerUnavailable(_)) => {
                tracing::error!("Ledger error: {}", err);
                HttpResponse::build(status).json(serde_json::json!({
                    "error": "ledger_unavailable",
                    "message": "Payment channel ledger is unreachable, try again later"
                }))
            }
            GateError::Processing(err) => {
                tracing::error!("Internal error: {}", err);
                HttpResponse::build(status).json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}
