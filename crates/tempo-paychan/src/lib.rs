//! Payment-channel admission checks.
//!
//! Gates a resource behind an off-chain, incrementally funded payment
//! channel. Every request carries a signed claim whose cumulative value must
//! exceed the last accepted claim for that channel by exactly the price of
//! the resource.
//!
//! # Pieces
//!
//! - [`claim`]: decodes the `X-Signature` header into a [`Claim`]
//! - [`ledger`]: the [`Ledger`] trait over the on-chain channel contract,
//!   and [`ContractLedger`], its alloy-backed implementation
//! - [`state_store`]: durable `channel -> last accepted claim` mapping
//! - [`gate`]: [`ChannelGate`] binds a receiver once, then prices routes
//! - [`admission`]: [`ChannelAdmission`] runs the check and advances state
//!
//! # Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//! use alloy::providers::RootProvider;
//! use paychan::{ChannelAdmission, ChannelGate, ContractLedger, LedgerConfig, SqliteStateStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LedgerConfig::default();
//! let provider = RootProvider::new_http(config.rpc_url.parse()?);
//! let ledger = ContractLedger::new(provider, &config);
//!
//! let gate = ChannelGate::new("0x3b63b366a72e5742b2aaa13a5e86725ed06a68f3".parse()?)
//!     .require(&ledger, "1 wei")?;
//!
//! let store = Arc::new(SqliteStateStore::open(paychan::DEFAULT_STORE_PATH)?);
//! let admission = ChannelAdmission::new(ledger, store);
//!
//! let outcome = admission.check(&gate, None).await?;
//! assert!(!outcome.is_admitted());
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod claim;
pub mod constants;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod state_store;
pub mod units;

use alloy::sol;

// On-chain payment channel contract. Only the read-only surface is bound;
// opening, funding and settling channels is the sender's business.
sol! {
    #[sol(rpc)]
    interface ChannelContract {
        function channels(uint256 channel) external view returns (
            address sender,
            address receiver,
            uint256 value,
            uint256 expiry,
            bool valid
        );
        function verify(
            uint256 channel,
            uint256 value,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external view returns (bool);
    }
}

// Re-exports
pub use admission::{Admission, ChannelAdmission, Payment};
pub use claim::{decode_claim_header, encode_claim_header, Claim, ClaimSignature};
pub use constants::*;
pub use error::AdmissionError;
pub use gate::{ChannelGate, GateConfig, RequiredAmount};
pub use ledger::{ChannelInfo, ContractLedger, Ledger, LedgerError};
pub use state_store::{ChannelState, InMemoryStateStore, SqliteStateStore, StateStore, StoreError};
