// SPDX-License-Identifier: CC0-1.0

//! JSON-RPC methods found under the `== Wallet ==` section of the node's API
//! docs.

use bitcoin::OutPoint;

use crate::types::{GetNewAddress, ListLockUnspent, ListUnspent, LockUnspent};
use crate::{into_json, Client, LockUnspentOutput, Result};

impl Client {
    /// Calls the JSON-RPC method `getnewaddress`.
    pub fn get_new_address(&self) -> Result<GetNewAddress> {
        self.call("getnewaddress", &[])
    }

    /// Calls the JSON-RPC method `listunspent`.
    ///
    /// Locked outputs are not returned.
    pub fn list_unspent(&self, min_conf: u32) -> Result<ListUnspent> {
        self.call("listunspent", &[min_conf.into()])
    }

    /// Calls the JSON-RPC method `lockunspent` to lock specific outputs.
    pub fn lock_unspent(&self, outputs: &[OutPoint]) -> Result<LockUnspent> {
        let outputs: Vec<LockUnspentOutput> =
            outputs.iter().copied().map(LockUnspentOutput::from).collect();
        self.call("lockunspent", &[false.into(), into_json(outputs)?])
    }

    /// Calls the JSON-RPC method `lockunspent` to unlock specific outputs.
    pub fn unlock_unspent(&self, outputs: &[OutPoint]) -> Result<LockUnspent> {
        let outputs: Vec<LockUnspentOutput> =
            outputs.iter().copied().map(LockUnspentOutput::from).collect();
        self.call("lockunspent", &[true.into(), into_json(outputs)?])
    }

    /// Calls the JSON-RPC method `listlockunspent`.
    pub fn list_lock_unspent(&self) -> Result<ListLockUnspent> {
        self.call("listlockunspent", &[])
    }

    /// Calls the JSON-RPC method `walletpassphrase`.
    ///
    /// Unlocks an encrypted wallet for `timeout` seconds.
    pub fn wallet_passphrase(&self, passphrase: &str, timeout: u64) -> Result<()> {
        self.call("walletpassphrase", &[passphrase.into(), timeout.into()])
    }
}
