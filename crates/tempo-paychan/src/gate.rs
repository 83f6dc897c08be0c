use std::fmt;

use alloy::primitives::{Address, U256};

use crate::{AdmissionError, Ledger, PAY_URI_SCHEME};

/// A route's price, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredAmount {
    /// Already in the smallest denomination.
    Smallest(U256),
    /// `"<number>"` or `"<number> <unit>"`, e.g. `"1 wei"`.
    Text(String),
}

impl From<u64> for RequiredAmount {
    fn from(amount: u64) -> Self {
        Self::Smallest(U256::from(amount))
    }
}

impl From<U256> for RequiredAmount {
    fn from(amount: U256) -> Self {
        Self::Smallest(amount)
    }
}

impl From<&str> for RequiredAmount {
    fn from(amount: &str) -> Self {
        Self::Text(amount.to_string())
    }
}

impl From<String> for RequiredAmount {
    fn from(amount: String) -> Self {
        Self::Text(amount)
    }
}

/// Binds the receiving account once; each [`require`](Self::require) call
/// prices one protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelGate {
    receiver_account: Address,
}

impl ChannelGate {
    pub fn new(receiver_account: Address) -> Self {
        Self { receiver_account }
    }

    pub fn receiver_account(&self) -> Address {
        self.receiver_account
    }

    /// Build the immutable gate configuration for one route.
    ///
    /// Text amounts are normalized through the ledger's unit conversion.
    /// Unrecognized or zero amounts fail with [`AdmissionError::InvalidAmount`].
    pub fn require<L: Ledger>(
        &self,
        ledger: &L,
        amount: impl Into<RequiredAmount>,
    ) -> Result<GateConfig, AdmissionError> {
        let required_amount = match amount.into() {
            RequiredAmount::Smallest(amount) => amount,
            RequiredAmount::Text(text) => ledger.to_smallest_unit(&text)?,
        };
        GateConfig::new(self.receiver_account, required_amount)
    }
}

/// Receiver and exact per-request increment for one protected route.
///
/// Displays as its pay URI, `pay://<account>/<amount>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    receiver_account: Address,
    required_amount: U256,
}

impl GateConfig {
    pub fn new(receiver_account: Address, required_amount: U256) -> Result<Self, AdmissionError> {
        if required_amount.is_zero() {
            return Err(AdmissionError::InvalidAmount(
                "required amount must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            receiver_account,
            required_amount,
        })
    }

    pub fn receiver_account(&self) -> Address {
        self.receiver_account
    }

    /// Exact increment each request must add, in wei.
    pub fn required_amount(&self) -> U256 {
        self.required_amount
    }

    /// Destination advertised to clients in payment-required responses.
    pub fn pay_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PAY_URI_SCHEME}://{:#x}/{}",
            self.receiver_account, self.required_amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelInfo, ClaimSignature, LedgerError};
    use alloy::primitives::address;

    const ACCOUNT: Address = address!("0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3");

    /// Only unit conversion is exercised here.
    struct OfflineLedger;

    impl Ledger for OfflineLedger {
        async fn get_channel(&self, _channel_id: U256) -> Result<ChannelInfo, LedgerError> {
            Err(LedgerError::Unavailable("offline".to_string()))
        }

        async fn verify_signature(
            &self,
            _channel_id: U256,
            _value: U256,
            _signature: &ClaimSignature,
        ) -> Result<bool, LedgerError> {
            Err(LedgerError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_pay_uri_from_unit_string() {
        let gate = ChannelGate::new(ACCOUNT)
            .require(&OfflineLedger, "1 wei")
            .unwrap();
        assert_eq!(
            gate.pay_uri(),
            "pay://0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3/1"
        );
        assert_eq!(gate.to_string(), gate.pay_uri());
    }

    #[test]
    fn test_pay_uri_normalizes_units() {
        let gate = ChannelGate::new(ACCOUNT)
            .require(&OfflineLedger, "2 gwei")
            .unwrap();
        assert_eq!(gate.required_amount(), U256::from(2_000_000_000u64));
        assert!(gate.pay_uri().ends_with("/2000000000"));
    }

    #[test]
    fn test_integer_amount_is_used_as_is() {
        let gate = ChannelGate::new(ACCOUNT).require(&OfflineLedger, 5u64).unwrap();
        assert_eq!(gate.required_amount(), U256::from(5u64));
        assert_eq!(gate.receiver_account(), ACCOUNT);
    }

    #[test]
    fn test_one_account_many_routes() {
        let gate = ChannelGate::new(ACCOUNT);
        let cheap = gate.require(&OfflineLedger, 1u64).unwrap();
        let dear = gate.require(&OfflineLedger, "1 kwei").unwrap();
        assert_eq!(cheap.receiver_account(), dear.receiver_account());
        assert_ne!(cheap.required_amount(), dear.required_amount());
    }

    #[test]
    fn test_invalid_amount_fails_fast() {
        let err = ChannelGate::new(ACCOUNT)
            .require(&OfflineLedger, "one wei")
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidAmount(_)));
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert!(matches!(
            ChannelGate::new(ACCOUNT).require(&OfflineLedger, 0u64),
            Err(AdmissionError::InvalidAmount(_))
        ));
        assert!(ChannelGate::new(ACCOUNT)
            .require(&OfflineLedger, "0 ether")
            .is_err());
    }
}
