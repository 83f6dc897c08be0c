use std::time::Duration;

use alloy::primitives::{address, Address};

/// Request header carrying the base64-encoded channel claim.
pub const CLAIM_HEADER: &str = "X-Signature";

/// URI scheme advertised in payment-required responses.
pub const PAY_URI_SCHEME: &str = "pay";

/// Default on-disk location of the channel state database.
pub const DEFAULT_STORE_PATH: &str = "signatures.db";

/// Default JSON-RPC endpoint of the ledger node.
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Channel contract deployed on the Ropsten testnet.
pub const DEFAULT_CHANNEL_CONTRACT: Address =
    address!("0x1eecb87de18ac28c1824d9274f2cebc5442f8c57");

/// Upper bound on a single ledger RPC call.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: DEFAULT_CHANNEL_CONTRACT,
            timeout: DEFAULT_LEDGER_TIMEOUT,
        }
    }
}
