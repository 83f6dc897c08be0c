//! Wire format of channel claims.
//!
//! The `X-Signature` header holds base64 (standard alphabet) over JSON:
//!
//! ```json
//! {"channel": 7, "value": 2, "signature": {"v": 27, "r": "0x…", "s": "0x…"}}
//! ```
//!
//! `channel` and `value` may be JSON numbers or decimal / `0x` strings.

use alloy::primitives::{B256, U256};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::AdmissionError;

/// ECDSA signature triple over the contract's claim hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// A sender's signed assertion of the cumulative amount owed on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "channel", with = "uint_repr")]
    pub channel_id: U256,
    /// New cumulative total, not the increment.
    #[serde(with = "uint_repr")]
    pub value: U256,
    pub signature: ClaimSignature,
}

/// Decode the `X-Signature` header value into a [`Claim`].
pub fn decode_claim_header(header_value: &str) -> Result<Claim, AdmissionError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .map_err(|e| AdmissionError::MalformedClaim(format!("invalid base64: {e}")))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| AdmissionError::MalformedClaim(format!("invalid utf-8: {e}")))?;
    serde_json::from_str(text)
        .map_err(|e| AdmissionError::MalformedClaim(format!("invalid claim JSON: {e}")))
}

/// Encode a claim for the `X-Signature` header.
pub fn encode_claim_header(claim: &Claim) -> Result<String, AdmissionError> {
    let json = serde_json::to_vec(claim)
        .map_err(|e| AdmissionError::MalformedClaim(format!("serialization failed: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Serde for channel integers: decimal string out, number or string in.
///
/// Numbers are read from their raw JSON text, so totals past `u64::MAX`
/// decode exactly. Fractional, negative and exponent forms are rejected.
pub(crate) mod uint_repr {
    use std::str::FromStr;

    use alloy::primitives::U256;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::value::RawValue;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let text = raw.get().trim();
        if text.starts_with('"') {
            let s: String = serde_json::from_str(text).map_err(D::Error::custom)?;
            return U256::from_str(s.trim())
                .map_err(|e| D::Error::custom(format!("invalid integer '{s}': {e}")));
        }
        U256::from_str_radix(text, 10)
            .map_err(|e| D::Error::custom(format!("expected an unsigned integer, got {text}: {e}")))
    }
}
