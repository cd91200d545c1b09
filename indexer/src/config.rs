// SPDX-License-Identifier: CC0-1.0

//! Indexer and builder configuration surface.

use std::path::PathBuf;

use bitcoin::{BlockHash, FeeRate, Network};
use pixelplot_client::Auth;

/// Hash of the block that roots the protocol's state lineage on mainnet.
pub const MAINNET_GENESIS: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

/// Hash of the block that roots the protocol's state lineage on testnet.
pub const TESTNET_GENESIS: &str =
    "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943";

/// Hash of the block that roots the protocol's state lineage on signet.
pub const SIGNET_GENESIS: &str =
    "00000008819873e925422c1ff0f99f7cc9bbb232af63a077a480a3633bee1ef6";

/// Hash of the regtest genesis block.
pub const REGTEST_GENESIS: &str =
    "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206";

/// The default epoch block hash for `network`.
pub fn default_genesis_hash(network: Network) -> BlockHash {
    let hash = match network {
        Network::Bitcoin => MAINNET_GENESIS,
        Network::Testnet => TESTNET_GENESIS,
        Network::Signet => SIGNET_GENESIS,
        _ => REGTEST_GENESIS,
    };
    hash.parse().expect("hardcoded genesis hashes are valid")
}

/// The default JSON-RPC URL for `network`.
pub fn default_rpc_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "http://127.0.0.1:8332",
        Network::Testnet => "http://127.0.0.1:18332",
        Network::Signet => "http://127.0.0.1:38332",
        _ => "http://127.0.0.1:18443",
    }
}

/// Everything the indexer and builder need to know about their environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// The network being indexed.
    pub network: Network,
    /// The protocol's epoch marker; state lineage is rooted at this block.
    pub genesis_hash: BlockHash,
    /// JSON-RPC URL of the node.
    pub rpc_url: String,
    /// JSON-RPC credentials.
    pub rpc_auth: Auth,
    /// Wallet to fund builder transactions from, if any.
    pub wallet: Option<String>,
    /// Passphrase for an encrypted wallet.
    pub wallet_passphrase: Option<String>,
    /// Builder fee rate.
    pub fee_rate: FeeRate,
    /// Root of the persisted state layout.
    pub data_dir: PathBuf,
}

impl Config {
    /// A configuration with per-network defaults.
    pub fn new(network: Network) -> Self {
        Config {
            network,
            genesis_hash: default_genesis_hash(network),
            rpc_url: default_rpc_url(network).to_owned(),
            rpc_auth: Auth::None,
            wallet: None,
            wallet_passphrase: None,
            fee_rate: FeeRate::from_sat_per_vb_unchecked(1),
            data_dir: PathBuf::from("data"),
        }
    }

    /// The RPC URL routed to the configured wallet, for wallet-bound calls.
    pub fn wallet_url(&self) -> String {
        match &self.wallet {
            Some(wallet) => format!("{}/wallet/{}", self.rpc_url.trim_end_matches('/'), wallet),
            None => self.rpc_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        for network in [Network::Bitcoin, Network::Testnet, Network::Signet, Network::Regtest] {
            let config = Config::new(network);
            assert_eq!(config.genesis_hash, default_genesis_hash(network));
        }
    }

    #[test]
    fn wallet_url_appends_wallet_path() {
        let mut config = Config::new(Network::Regtest);
        assert_eq!(config.wallet_url(), "http://127.0.0.1:18443");
        config.wallet = Some("plots".into());
        assert_eq!(config.wallet_url(), "http://127.0.0.1:18443/wallet/plots");
    }
}
