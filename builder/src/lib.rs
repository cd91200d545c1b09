// SPDX-License-Identifier: CC0-1.0

//! Construction and wallet funding of pixelplot transactions.
//!
//! The builder's job is mundane except for one hard guarantee: deed outputs
//! are never spent implicitly. Every wallet-known 600-sat output is locked
//! before funding, and after signing the transaction is decoded and its
//! inputs checked against their previous-output values; a transaction that
//! would spend any deed other than the caller-designated one is aborted with
//! [`Error::WouldBrickPlot`] and never broadcast.
//!
//! Each build call is a critical section with respect to the wallet's locked
//! output set, so construct one [`Builder`] per `(node, wallet)` pair and
//! share it.

mod error;
mod safety;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bitcoin::{Address, Amount, FeeRate, Network, OutPoint, Transaction, Txid};
use pixelplot_client::types::LockUnspent;
use pixelplot_client::{Client, FundOptions, Input, Output};
use pixelplot_protocol::{Payload, DEED_VALUE};

pub use crate::error::Error;
pub use crate::safety::{find_deed_output, verify_funding};

/// Crate-specific Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// How long `walletpassphrase` keeps an encrypted wallet unlocked.
const PASSPHRASE_TIMEOUT_SECS: u64 = 60;

/// Options shared by all build calls.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Recipient of the new deed output; a fresh wallet address if `None`.
    pub recipient: Option<Address>,
    /// Recipient of the change output; wallet's choice if `None`.
    pub change_address: Option<Address>,
    /// Overrides the builder's fee rate for this call.
    pub fee_rate: Option<FeeRate>,
    /// When `false` the signed transaction is returned without broadcasting.
    pub broadcast: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { recipient: None, change_address: None, fee_rate: None, broadcast: true }
    }
}

/// A built (and possibly broadcast) transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltTransaction {
    /// Txid of the signed transaction.
    pub txid: Txid,
    /// The new deed outpoint.
    pub deed: OutPoint,
    /// The signed transaction, hex-encoded.
    pub hex: String,
}

/// Builds, funds and broadcasts pixelplot transactions through a wallet.
#[derive(Debug)]
pub struct Builder {
    client: Client,
    network: Network,
    fee_rate: FeeRate,
    wallet_passphrase: Option<String>,
    /// Serializes build calls; see the module docs.
    wallet_lock: Mutex<()>,
}

impl Builder {
    /// Creates a builder over a wallet-enabled RPC client.
    ///
    /// The default fee rate is 1 sat/vB.
    pub fn new(client: Client, network: Network) -> Self {
        Builder {
            client,
            network,
            fee_rate: FeeRate::from_sat_per_vb_unchecked(1),
            wallet_passphrase: None,
            wallet_lock: Mutex::new(()),
        }
    }

    /// Sets the default fee rate.
    pub fn fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Sets the passphrase used to unlock an encrypted wallet before signing.
    pub fn wallet_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.wallet_passphrase = Some(passphrase.into());
        self
    }

    /// Builds a CLAIM for a plot at `(x0, y0)` showing `bmp`.
    pub fn build_claim(
        &self,
        x0: u16,
        y0: u16,
        uri: &str,
        bmp: Vec<u8>,
        opts: &BuildOptions,
    ) -> Result<BuiltTransaction> {
        let payload = Payload::claim(x0, y0, uri.to_owned(), bmp)?;
        self.submit(None, Some(payload), opts)
    }

    /// Builds a RETRY-CLAIM moving the plot controlled by `deed` to `(x0, y0)`.
    pub fn build_retry_claim(
        &self,
        deed: OutPoint,
        x0: u16,
        y0: u16,
        opts: &BuildOptions,
    ) -> Result<BuiltTransaction> {
        self.submit(Some(deed), Some(Payload::retry_claim(x0, y0)), opts)
    }

    /// Builds an UPDATE replacing the image and URI of the plot controlled by
    /// `deed`.
    ///
    /// `(x0, y0)` and the image dimensions must match the plot on-chain or
    /// the protocol will brick it; the builder encodes what it is given.
    pub fn build_update(
        &self,
        deed: OutPoint,
        x0: u16,
        y0: u16,
        uri: &str,
        bmp: Vec<u8>,
        opts: &BuildOptions,
    ) -> Result<BuiltTransaction> {
        let payload = Payload::update(x0, y0, uri.to_owned(), bmp)?;
        self.submit(Some(deed), Some(payload), opts)
    }

    /// Builds a TRANSFER handing the plot controlled by `deed` to a new owner.
    pub fn build_transfer(&self, deed: OutPoint, opts: &BuildOptions) -> Result<BuiltTransaction> {
        self.submit(Some(deed), None, opts)
    }

    /// The shared pipeline: lock stray deeds, create, fund, sign, verify,
    /// locate the new deed, broadcast, lock it.
    fn submit(
        &self,
        spend: Option<OutPoint>,
        payload: Option<Payload>,
        opts: &BuildOptions,
    ) -> Result<BuiltTransaction> {
        let _wallet = self.wallet_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(passphrase) = &self.wallet_passphrase {
            self.client.wallet_passphrase(passphrase, PASSPHRASE_TIMEOUT_SECS)?;
        }

        // The lock set is soft state shared with the node; re-assert it on
        // every call rather than trusting earlier sweeps.
        self.assert_deed_locks(spend)?;

        let recipient = match &opts.recipient {
            Some(address) => address.clone(),
            None => self
                .client
                .get_new_address()?
                .address()?
                .require_network(self.network)?,
        };

        let mut outputs = vec![Output::Address { address: recipient, amount: DEED_VALUE }];
        if let Some(payload) = &payload {
            outputs.push(Output::Data(payload.encode()));
        }
        let inputs: Vec<Input> = spend.into_iter().map(Input::from).collect();

        let raw = self.client.create_raw_transaction(&inputs, &outputs)?;
        let fee_rate = opts.fee_rate.unwrap_or(self.fee_rate);
        let funded = self.client.fund_raw_transaction(
            &raw.0,
            &FundOptions {
                add_inputs: Some(true),
                change_address: opts.change_address.as_ref().map(|a| a.to_string()),
                fee_rate: Some(fee_rate_btc_per_kvb(fee_rate)),
                lock_unspents: None,
            },
        )?;

        let signed = self.client.sign_raw_transaction_with_wallet(&funded.hex)?;
        if !signed.complete {
            return Err(Error::IncompleteSignature);
        }
        let tx = signed.transaction()?;

        let prevouts = self.prevout_values(&tx)?;
        verify_funding(&tx, &prevouts, spend)?;
        let deed_vout = find_deed_output(&tx).ok_or(Error::MissingDeedOutput)?;

        let txid = tx.compute_txid();
        let deed = OutPoint { txid, vout: deed_vout };

        if !opts.broadcast {
            log::debug!(target: "pixelplot", "built {} (deed {}), not broadcasting", txid, deed);
            return Ok(BuiltTransaction { txid, deed, hex: signed.hex });
        }

        self.client.send_raw_transaction(&signed.hex)?;
        log::info!(target: "pixelplot", "broadcast {} (deed {})", txid, deed);

        match self.client.lock_unspent(&[deed]) {
            Ok(LockUnspent(true)) => {}
            Ok(LockUnspent(false)) => return Err(Error::LockFailed),
            Err(e) => {
                log::warn!(target: "pixelplot", "failed to lock new deed {}: {}", deed, e);
                return Err(Error::LockFailed);
            }
        }

        Ok(BuiltTransaction { txid, deed, hex: signed.hex })
    }

    /// Locks every wallet-known 600-sat output except the one being spent.
    ///
    /// `listunspent` does not return already-locked outputs, so this is
    /// idempotent.
    fn assert_deed_locks(&self, spend: Option<OutPoint>) -> Result<()> {
        let unspent = self.client.list_unspent(0)?;
        let mut stray = Vec::new();
        for item in &unspent.0 {
            if item.amount()? != DEED_VALUE {
                continue;
            }
            let outpoint = item.outpoint()?;
            if Some(outpoint) != spend {
                stray.push(outpoint);
            }
        }
        if stray.is_empty() {
            return Ok(());
        }
        log::debug!(target: "pixelplot", "locking {} deed outputs before funding", stray.len());
        let LockUnspent(locked) = self.client.lock_unspent(&stray)?;
        if !locked {
            return Err(Error::LockFailed);
        }
        Ok(())
    }

    /// Previous-output values for every input of `tx`.
    fn prevout_values(&self, tx: &Transaction) -> Result<HashMap<OutPoint, Amount>> {
        let mut values = HashMap::with_capacity(tx.input.len());
        let mut fetched: HashMap<Txid, Transaction> = HashMap::new();
        for input in &tx.input {
            let outpoint = input.previous_output;
            let prev = match fetched.entry(outpoint.txid) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(slot) => {
                    let prev_tx = self.client.get_raw_transaction(&outpoint.txid)?.transaction()?;
                    slot.insert(prev_tx)
                }
            };
            let txout = prev
                .output
                .get(outpoint.vout as usize)
                .ok_or(Error::MissingPrevout(outpoint))?;
            values.insert(outpoint, txout.value);
        }
        Ok(values)
    }
}

/// Converts a sat/vB fee rate into the BTC/kvB the funder expects.
fn fee_rate_btc_per_kvb(fee_rate: FeeRate) -> f64 {
    Amount::from_sat(fee_rate.to_sat_per_vb_ceil().saturating_mul(1_000)).to_btc()
}
