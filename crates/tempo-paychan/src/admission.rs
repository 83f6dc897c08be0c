//! The admission check.
//!
//! [`ChannelAdmission::check`] takes a route's [`GateConfig`] and the raw
//! claim header and either admits the request, asks for payment, or rejects
//! the claim. A successful check durably advances the channel's state before
//! returning.

use std::sync::Arc;

use alloy::primitives::U256;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{decode_claim_header, AdmissionError, Claim, GateConfig, Ledger, StateStore};

/// Attached to an admitted request for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub channel_id: U256,
    /// Amount paid by this request (the gate's required amount).
    pub amount: U256,
    /// Channel total after this payment.
    pub cumulative_value: U256,
}

/// Non-error outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No claim header. The caller should answer "payment required" and
    /// advertise `pay_uri`.
    NotPresented { pay_uri: String },
    Admitted(Payment),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    pub fn payment(&self) -> Option<&Payment> {
        match self {
            Self::Admitted(payment) => Some(payment),
            Self::NotPresented { .. } => None,
        }
    }
}

/// Runs admission checks against a ledger and a shared state store.
///
/// Holds no per-request state. The only thing shared between calls besides
/// the store is a per-channel lock that serializes the read, verify and
/// commit sequence for one channel.
pub struct ChannelAdmission<L> {
    ledger: L,
    store: Arc<dyn StateStore>,
    /// Per-channel mutex for atomic read-verify-commit.
    channel_locks: Arc<DashMap<U256, Arc<Mutex<()>>>>,
}

impl<L> ChannelAdmission<L> {
    /// Maximum number of concurrent channel locks to prevent memory exhaustion.
    const MAX_CHANNEL_LOCKS: usize = 100_000;

    pub fn new(ledger: L, store: Arc<dyn StateStore>) -> Self {
        Self {
            ledger,
            store,
            channel_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Get or create the mutex for one channel.
    /// The cap check is not atomic with `entry()`, so it can be overshot by
    /// the number of concurrent workers.
    fn channel_lock(&self, channel_id: U256) -> Result<Arc<Mutex<()>>, AdmissionError> {
        if self.channel_locks.len() >= Self::MAX_CHANNEL_LOCKS
            && !self.channel_locks.contains_key(&channel_id)
        {
            tracing::warn!(channel = %channel_id, "channel lock table full");
            return Err(AdmissionError::StoreUnavailable(format!(
                "channel lock table full ({} channels in flight)",
                Self::MAX_CHANNEL_LOCKS
            )));
        }
        Ok(self
            .channel_locks
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Drop locks that no request holds or waits on. Returns number removed.
    pub fn purge_idle_locks(&self) -> usize {
        purge_idle(&self.channel_locks)
    }

    /// Start a background task that purges idle channel locks every 60 seconds.
    pub fn start_lock_cleanup(&self) {
        let channel_locks = Arc::clone(&self.channel_locks);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let removed = purge_idle(&channel_locks);
                if removed > 0 {
                    tracing::info!(removed, "cleaned up idle channel locks");
                }
            }
        });
    }
}

// An entry is idle only if nobody cloned the Arc AND nobody holds the mutex;
// checking both keeps a concurrent `channel_lock()` from ending up with a
// different mutex than a request already inside the critical section.
fn purge_idle(locks: &DashMap<U256, Arc<Mutex<()>>>) -> usize {
    let before = locks.len();
    locks.retain(|_, lock| Arc::strong_count(lock) > 1 || lock.try_lock().is_err());
    before - locks.len()
}

impl<L: Ledger> ChannelAdmission<L> {
    /// Check one request against `gate`.
    ///
    /// `header` is the raw `X-Signature` value, if the request carried one.
    pub async fn check(
        &self,
        gate: &GateConfig,
        header: Option<&str>,
    ) -> Result<Admission, AdmissionError> {
        let Some(header) = header else {
            tracing::debug!(pay_uri = %gate, "no claim presented");
            return Ok(Admission::NotPresented {
                pay_uri: gate.pay_uri(),
            });
        };

        let claim = decode_claim_header(header).inspect_err(|e| {
            tracing::warn!(error = %e, "malformed claim header");
        })?;
        self.admit(gate, &claim).await.map(Admission::Admitted)
    }

    /// Verify an already decoded claim and commit it.
    pub async fn admit(&self, gate: &GateConfig, claim: &Claim) -> Result<Payment, AdmissionError> {
        let channel_id = claim.channel_id;

        let lock = self.channel_lock(channel_id)?;
        let _guard = lock.lock().await;

        let existing = self.store.get_or_zero(channel_id)?;

        let channel = self.ledger.get_channel(channel_id).await.inspect_err(|e| {
            tracing::error!(channel = %channel_id, error = %e, "channel lookup failed");
        })?;
        if channel.receiver != gate.receiver_account() {
            tracing::warn!(
                channel = %channel_id,
                receiver = %channel.receiver,
                expected = %gate.receiver_account(),
                "claim rejected: channel pays a different receiver"
            );
            return Err(AdmissionError::WrongReceiver {
                expected: gate.receiver_account(),
                actual: channel.receiver,
            });
        }
        if !channel.valid {
            tracing::warn!(channel = %channel_id, "ledger reports channel as not valid");
        }

        let required = gate.required_amount();
        let current = existing.cumulative_value;
        let claimed = claim.value;
        if claimed < current || claimed - current < required {
            tracing::info!(
                channel = %channel_id,
                %claimed,
                %current,
                %required,
                "claim rejected: increment too small"
            );
            return Err(AdmissionError::InsufficientIncrement {
                claimed,
                current,
                required,
            });
        }
        if claimed - current > required {
            tracing::info!(
                channel = %channel_id,
                %claimed,
                %current,
                %required,
                "claim rejected: increment too large"
            );
            return Err(AdmissionError::ExcessIncrement {
                claimed,
                current,
                required,
            });
        }

        let verified = self
            .ledger
            .verify_signature(channel_id, claimed, &claim.signature)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    channel = %channel_id,
                    error = %e,
                    "signature verification unavailable"
                );
            })?;
        if !verified {
            tracing::warn!(channel = %channel_id, %claimed, "claim rejected: signature invalid");
            return Err(AdmissionError::InvalidSignature);
        }

        let state = self.store.commit(&existing, claim).inspect_err(|e| {
            tracing::error!(channel = %channel_id, error = %e, "failed to commit channel state");
        })?;

        tracing::info!(
            channel = %channel_id,
            amount = %required,
            total = %state.cumulative_value,
            "channel payment admitted"
        );

        Ok(Payment {
            channel_id,
            amount: required,
            cumulative_value: state.cumulative_value,
        })
    }
}
