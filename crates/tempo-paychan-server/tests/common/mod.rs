#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, Address, B256, U256};
use paychan::{
    encode_claim_header, ChannelAdmission, ChannelGate, ChannelInfo, Claim, ClaimSignature,
    InMemoryStateStore, Ledger, LedgerError,
};
use paychan_server::AppState;

pub const RECEIVER: Address = address!("0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3");
pub const ADMIN_TOKEN: &str = "admin-secret";
pub const METRICS_TOKEN: &str = "metrics-secret";

/// Channel contract stand-in: every registered channel pays `RECEIVER` and
/// every signature verifies unless the channel is marked forged.
#[derive(Default)]
pub struct FakeLedger {
    receivers: Mutex<HashMap<U256, Address>>,
    forged: Mutex<Vec<U256>>,
    offline: AtomicBool,
}

impl FakeLedger {
    pub fn open_channel(&self, channel: u64, receiver: Address) {
        self.receivers
            .lock()
            .unwrap()
            .insert(U256::from(channel), receiver);
    }

    pub fn forge(&self, channel: u64) {
        self.forged.lock().unwrap().push(U256::from(channel));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn reachable(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Ledger for FakeLedger {
    async fn get_channel(&self, channel_id: U256) -> Result<ChannelInfo, LedgerError> {
        self.reachable()?;
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
            value: U256::from(1_000u64),
            expiry: U256::from(u64::MAX),
            valid: true,
        })
    }

    async fn verify_signature(
        &self,
        channel_id: U256,
        _value: U256,
        _signature: &ClaimSignature,
    ) -> Result<bool, LedgerError> {
        self.reachable()?;
        Ok(!self.forged.lock().unwrap().contains(&channel_id))
    }
}

/// State with a 1 wei gate over a fresh in-memory store.
pub fn make_state(ledger: FakeLedger) -> AppState<FakeLedger> {
    let gate = ChannelGate::new(RECEIVER).require(&ledger, 1u64).unwrap();
    let admission = ChannelAdmission::new(ledger, Arc::new(InMemoryStateStore::new()));
    AppState::new(admission, gate)
        .with_admin_token(Some(ADMIN_TOKEN.to_string()))
        .with_metrics_token(Some(METRICS_TOKEN.to_string()))
}

pub fn header(channel: u64, value: u64) -> String {
    encode_claim_header(&Claim {
        channel_id: U256::from(channel),
        value: U256::from(value),
        signature: ClaimSignature {
            v: 28,
            r: B256::repeat_byte(0x11),
            s: B256::repeat_byte(0x22),
        },
    })
    .unwrap()
}
