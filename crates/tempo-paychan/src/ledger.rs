//! The external channel ledger.
//!
//! [`Ledger`] is the narrow seam between the admission check and the chain:
//! look up a channel, ask the contract whether a claim signature is valid,
//! and normalize configured amounts. [`ContractLedger`] implements it over
//! any alloy [`Provider`]; tests substitute a deterministic fake.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use thiserror::Error;

use crate::{units, AdmissionError, ChannelContract, ClaimSignature, LedgerConfig};

/// Ledger-held channel attributes. Read-only from this side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: U256,
    pub sender: Address,
    pub receiver: Address,
    /// Total deposited into the channel.
    pub value: U256,
    pub expiry: U256,
    pub valid: bool,
}

/// Transport-level ledger failures. Never a verdict on the claim itself.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{method} timed out after {after:?}")]
    Timeout {
        method: &'static str,
        after: Duration,
    },
}

impl From<LedgerError> for AdmissionError {
    fn from(e: LedgerError) -> Self {
        AdmissionError::LedgerUnavailable(e.to_string())
    }
}

/// Read access to the payment channel ledger.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Ledger: Send + Sync {
    /// Fetch the channel's registered attributes.
    fn get_channel(
        &self,
        channel_id: U256,
    ) -> impl Future<Output = Result<ChannelInfo, LedgerError>> + Send;

    /// Ask the ledger whether `signature` authorizes `value` on the channel.
    ///
    /// `Ok(false)` is a rejected claim; `Err` means the ledger could not answer.
    fn verify_signature(
        &self,
        channel_id: U256,
        value: U256,
        signature: &ClaimSignature,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Normalize a configured amount (`"1"`, `"2 gwei"`, `"0.5 ether"`) to wei.
    fn to_smallest_unit(&self, amount: &str) -> Result<U256, AdmissionError> {
        units::to_smallest_unit(amount)
    }
}

/// [`Ledger`] backed by the on-chain channel contract.
pub struct ContractLedger<P> {
    provider: P,
    contract_address: Address,
    timeout: Duration,
}

impl<P> ContractLedger<P> {
    pub fn new(provider: P, config: &LedgerConfig) -> Self {
        Self {
            provider,
            contract_address: config.contract_address,
            timeout: config.timeout,
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run one RPC call under the configured timeout.
    async fn bounded<F, T, E>(&self, method: &'static str, call: F) -> Result<T, LedgerError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| LedgerError::Timeout {
                method,
                after: self.timeout,
            })?
            .map_err(|e| LedgerError::Unavailable(format!("{method} failed: {e}")))
    }

    /// Check RPC connectivity by fetching the latest block number.
    pub async fn health_check(&self) -> Result<u64, LedgerError>
    where
        P: Provider,
    {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }
}

impl<P> Ledger for ContractLedger<P>
where
    P: Provider + Send + Sync,
{
    async fn get_channel(&self, channel_id: U256) -> Result<ChannelInfo, LedgerError> {
        let contract = ChannelContract::new(self.contract_address, &self.provider);
        let channel = self
            .bounded("channels", contract.channels(channel_id).call())
            .await?;

        tracing::debug!(
            channel = %channel_id,
            receiver = %channel.receiver,
            deposit = %channel.value,
            valid = channel.valid,
            "fetched channel from ledger"
        );

        Ok(ChannelInfo {
            channel_id,
            sender: channel.sender,
            receiver: channel.receiver,
            value: channel.value,
            expiry: channel.expiry,
            valid: channel.valid,
        })
    }

    async fn verify_signature(
        &self,
        channel_id: U256,
        value: U256,
        signature: &ClaimSignature,
    ) -> Result<bool, LedgerError> {
        let contract = ChannelContract::new(self.contract_address, &self.provider);
        self.bounded(
            "verify",
            contract
                .verify(channel_id, value, signature.v, signature.r, signature.s)
                .call(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::RootProvider;

    fn unreachable_ledger() -> ContractLedger<RootProvider> {
        let config = LedgerConfig {
            rpc_url: "http://localhost:1".to_string(),
            timeout: Duration::from_secs(5),
            ..LedgerConfig::default()
        };
        let provider = RootProvider::new_http(config.rpc_url.parse().unwrap());
        ContractLedger::new(provider, &config)
    }

    #[tokio::test]
    async fn test_unreachable_node_is_unavailable_not_rejection() {
        let ledger = unreachable_ledger();
        let err = ledger.get_channel(U256::from(7u64)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_) | LedgerError::Timeout { .. }));

        let admission: AdmissionError = err.into();
        assert!(matches!(admission, AdmissionError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_verify_against_unreachable_node_errors() {
        let ledger = unreachable_ledger();
        let signature = ClaimSignature {
            v: 27,
            r: Default::default(),
            s: Default::default(),
        };
        let result = ledger
            .verify_signature(U256::from(7u64), U256::from(1u64), &signature)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_unit_conversion() {
        let ledger = unreachable_ledger();
        assert_eq!(
            ledger.to_smallest_unit("3 gwei").unwrap(),
            U256::from(3_000_000_000u64)
        );
        assert!(ledger.to_smallest_unit("3 bananas").is_err());
    }

    #[test]
    fn test_timeout_message() {
        let err = LedgerError::Timeout {
            method: "verify",
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "verify timed out after 10s");
    }
}
