use actix_web::{HttpMessage, HttpRequest};
use paychan::{
    Admission, AdmissionError, ChannelAdmission, GateConfig, Ledger, Payment, CLAIM_HEADER,
};

use crate::error::GateError;
use crate::metrics::record_admission;

/// Raw claim header. A present but non-ASCII value is a malformed claim.
pub fn claim_header(req: &HttpRequest) -> Result<Option<&str>, AdmissionError> {
    match req.headers().get(CLAIM_HEADER) {
        None => Ok(None),
        Some(value) => value.to_str().map(Some).map_err(|_| {
            AdmissionError::MalformedClaim(format!("{CLAIM_HEADER} header is not visible ASCII"))
        }),
    }
}

/// Payment gate: decode, verify and commit the request's claim.
///
/// On success the [`Payment`] is also placed in the request extensions for
/// downstream handlers.
pub async fn require_channel_payment<L: Ledger>(
    req: &HttpRequest,
    admission: &ChannelAdmission<L>,
    gate: &GateConfig,
) -> Result<Payment, GateError> {
    // Use the matched route pattern (not raw path) to keep label cardinality bounded
    let endpoint_label = req.match_pattern().unwrap_or_else(|| "unknown".to_string());

    let outcome = match claim_header(req) {
        Ok(header) => admission.check(gate, header).await,
        Err(e) => Err(e),
    };

    let result = match outcome {
        Ok(Admission::Admitted(payment)) => {
            req.extensions_mut().insert(payment.clone());
            Ok(payment)
        }
        Ok(Admission::NotPresented { pay_uri }) => Err(GateError::PaymentRequired { pay_uri }),
        Err(e) => Err(GateError::from_admission(e, gate.pay_uri())),
    };

    match &result {
        Ok(payment) => {
            record_admission(&endpoint_label, "admitted", 200);
            tracing::debug!(
                channel = %payment.channel_id,
                amount = %payment.amount,
                "request admitted"
            );
        }
        Err(e) => {
            use actix_web::ResponseError;
            record_admission(&endpoint_label, e.result_label(), e.status_code().as_u16());
        }
    }
    result
}
