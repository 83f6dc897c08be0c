#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{address, Address, B256, U256};
use paychan::{encode_claim_header, ChannelInfo, Claim, ClaimSignature, Ledger, LedgerError};

pub const RECEIVER: Address = address!("0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3");
pub const OTHER: Address = address!("0x00000000000000000000000000000000deadbeef");

/// Deterministic stand-in for the channel contract.
///
/// Channels must be registered before use; unknown channels report the zero
/// address as receiver, like an unset mapping slot on chain.
#[derive(Default)]
pub struct FakeLedger {
    receivers: Mutex<HashMap<U256, Address>>,
    bad_signatures: Mutex<HashSet<(U256, U256)>>,
    offline: AtomicBool,
    latency: Option<Duration>,
    pub verify_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield for `latency` inside every call, widening race windows.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn open_channel(&self, channel: u64, receiver: Address) {
        self.receivers
            .lock()
            .unwrap()
            .insert(U256::from(channel), receiver);
    }

    /// Make the signature check fail for exactly this `(channel, value)`.
    pub fn reject_signature(&self, channel: u64, value: u64) {
        self.bad_signatures
            .lock()
            .unwrap()
            .insert((U256::from(channel), U256::from(value)));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    async fn round_trip(&self) -> Result<(), LedgerError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Ledger for FakeLedger {
    async fn get_channel(&self, channel_id: U256) -> Result<ChannelInfo, LedgerError> {
        self.round_trip().await?;
        let receiver = self
            .receivers
            .lock()
            .unwrap()
            .get(&channel_id)
            .copied()
            .unwrap_or(Address::ZERO);
        Ok(ChannelInfo {
            channel_id,
            sender: address!("0x1111111111111111111111111111111111111111"),
            receiver,
            value: U256::from(1_000_000u64),
            expiry: U256::from(u64::MAX),
            valid: receiver != Address::ZERO,
        })
    }

    async fn verify_signature(
        &self,
        channel_id: U256,
        value: U256,
        _signature: &ClaimSignature,
    ) -> Result<bool, LedgerError> {
        self.round_trip().await?;
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self
            .bad_signatures
            .lock()
            .unwrap()
            .contains(&(channel_id, value)))
    }
}

pub fn claim(channel: u64, value: u64) -> Claim {
    Claim {
        channel_id: U256::from(channel),
        value: U256::from(value),
        signature: ClaimSignature {
            v: 27,
            r: B256::repeat_byte(0x42),
            s: B256::repeat_byte(0x24),
        },
    }
}

pub fn header(channel: u64, value: u64) -> String {
    encode_claim_header(&claim(channel, value)).unwrap()
}
