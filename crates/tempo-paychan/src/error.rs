use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Why a presented claim was not admitted.
///
/// Every variant is recoverable at the request boundary. An absent claim is
/// not an error, see [`crate::Admission::NotPresented`].
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("malformed claim: {0}")]
    MalformedClaim(String),

    #[error("payment channel target {actual} should be {expected}")]
    WrongReceiver { expected: Address, actual: Address },

    #[error(
        "payment channel value increment {} too small, expected +{required} to {}",
        signed_delta(.claimed, .current),
        expected_total(.current, .required)
    )]
    InsufficientIncrement {
        claimed: U256,
        current: U256,
        required: U256,
    },

    #[error(
        "payment channel value increment {} too large, expected +{required} to {}",
        signed_delta(.claimed, .current),
        expected_total(.current, .required)
    )]
    ExcessIncrement {
        claimed: U256,
        current: U256,
        required: U256,
    },

    #[error("signature invalid")]
    InvalidSignature,

    #[error("invalid amount {0}")]
    InvalidAmount(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("channel {channel_id} was updated concurrently, retry with a fresh claim")]
    ConcurrentUpdate { channel_id: U256 },
}

impl AdmissionError {
    /// True for rejections caused by the claim itself, as opposed to the
    /// ledger or the store failing underneath it.
    pub fn is_invalid_payment(&self) -> bool {
        matches!(
            self,
            Self::MalformedClaim(_)
                | Self::WrongReceiver { .. }
                | Self::InsufficientIncrement { .. }
                | Self::ExcessIncrement { .. }
                | Self::InvalidSignature
        )
    }
}

fn expected_total(current: &U256, required: &U256) -> U256 {
    current.saturating_add(*required)
}

/// Render `claimed - current` with an explicit sign; claims may regress.
fn signed_delta(claimed: &U256, current: &U256) -> String {
    if claimed >= current {
        format!("+{}", claimed - current)
    } else {
        format!("-{}", current - claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_messages_show_expected_target() {
        let err = AdmissionError::InsufficientIncrement {
            claimed: U256::from(5u64),
            current: U256::from(5u64),
            required: U256::from(2u64),
        };
        assert_eq!(
            err.to_string(),
            "payment channel value increment +0 too small, expected +2 to 7"
        );

        let err = AdmissionError::ExcessIncrement {
            claimed: U256::from(10u64),
            current: U256::from(5u64),
            required: U256::from(2u64),
        };
        assert_eq!(
            err.to_string(),
            "payment channel value increment +5 too large, expected +2 to 7"
        );
    }

    #[test]
    fn test_regressed_claim_renders_negative_increment() {
        let err = AdmissionError::InsufficientIncrement {
            claimed: U256::from(1u64),
            current: U256::from(4u64),
            required: U256::from(1u64),
        };
        assert!(err.to_string().contains("increment -3 too small"));
    }

    #[test]
    fn test_invalid_payment_classification() {
        assert!(AdmissionError::InvalidSignature.is_invalid_payment());
        assert!(AdmissionError::MalformedClaim("x".into()).is_invalid_payment());
        assert!(!AdmissionError::LedgerUnavailable("down".into()).is_invalid_payment());
        assert!(!AdmissionError::StoreUnavailable("disk".into()).is_invalid_payment());
        assert!(!AdmissionError::ConcurrentUpdate {
            channel_id: U256::from(7u64)
        }
        .is_invalid_payment());
    }
}
