// SPDX-License-Identifier: CC0-1.0

//! The pixelplot indexer.
//!
//! Scans confirmed blocks from the configured epoch block forward, folds
//! each block through the protocol state engine and persists one canvas
//! state per tip. The emitted sequence of states is block-atomic: a state is
//! only written, and the tip pointer only advanced, after a full block has
//! been read and applied.
//!
//! Reorg handling is shallow by design: if the node abandons the indexed
//! tip, the indexer steps back along its stored parent states until it
//! re-attaches to the main chain. Reorgs deeper than the stored lineage (or
//! than the node itself exposes) are out of scope.

pub mod config;
pub mod store;

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bitcoin::consensus::encode;
use bitcoin::hex::HexToArrayError;
use bitcoin::{BlockHash, Network};
use pixelplot_client::Client;
use pixelplot_protocol::CanvasState;

pub use crate::config::Config;
pub use crate::store::StateStore;

/// Crate-specific Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Scans the chain and maintains the persisted canvas state.
#[derive(Debug)]
pub struct Indexer {
    client: Client,
    store: StateStore,
    network: Network,
    genesis_hash: BlockHash,
}

impl Indexer {
    /// Creates an indexer over the configured node and data directory.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::new_with_auth(&config.rpc_url, config.rpc_auth.clone())?;
        let store = StateStore::open(&config.data_dir, config.network, &config.genesis_hash)?;
        Ok(Indexer { client, store, network: config.network, genesis_hash: config.genesis_hash })
    }

    /// The persisted store this indexer writes to.
    pub fn store(&self) -> &StateStore { &self.store }

    /// The state at the current tip, if anything has been indexed yet.
    pub fn state_at_tip(&self) -> Result<Option<CanvasState>> {
        match self.store.tip()? {
            Some(hash) => Ok(Some(self.store.load(&hash)?)),
            None => Ok(None),
        }
    }

    /// Builds and persists the state rooted at the epoch block.
    fn bootstrap(&self) -> Result<CanvasState> {
        let header = self.client.get_block_header(&self.genesis_hash)?;
        let block = self.client.get_block(&self.genesis_hash)?.block()?;
        let state = CanvasState::bootstrap(&block, header.height, self.network);
        self.store.save(&state)?;
        self.store.advance_tip(&state.block_hash())?;
        log::info!(
            target: "pixelplot",
            "bootstrapped at epoch {} (height {})",
            state.block_hash(),
            state.block_height(),
        );
        Ok(state)
    }

    /// Catches up with the node's main chain; returns the new tip.
    ///
    /// Fails without advancing the tip if the node cannot be read
    /// consistently or storage fails; call again to resume.
    pub fn sync_once(&self) -> Result<BlockHash> {
        let mut state = match self.store.tip()? {
            Some(hash) => self.store.load(&hash)?,
            None => self.bootstrap()?,
        };

        // Step back while the node no longer considers our tip canonical.
        while !self.client.get_block_header(&state.block_hash())?.is_on_main_chain() {
            let abandoned = state.block_hash();
            let parent = state.parent_hash();
            if abandoned == self.genesis_hash || !self.store.contains(&parent) {
                return Err(Error::ReorgBeyondStoredLineage(abandoned));
            }
            log::warn!(
                target: "pixelplot",
                "tip {} abandoned by the node, stepping back to {}",
                abandoned,
                parent,
            );
            state = self.store.load(&parent)?;
            self.store.advance_tip(&parent)?;
        }

        // Walk forward along the header chain.
        loop {
            let header = self.client.get_block_header(&state.block_hash())?;
            let Some(next_hash) = header.next_block_hash()? else { break };
            let block = self.client.get_block(&next_hash)?.block()?;
            if block.header.prev_blockhash != state.block_hash() {
                // The chain moved under us; pick it up on the next call.
                break;
            }
            let next = state.apply_block(&block, state.block_height() + 1, self.network);
            self.store.save(&next)?;
            self.store.advance_tip(&next.block_hash())?;
            log::info!(
                target: "pixelplot",
                "indexed block {} at height {} ({} txs, {} plots)",
                next.block_hash(),
                next.block_height(),
                next.transaction_count(),
                next.plot_count(),
            );
            state = next;
        }

        Ok(state.block_hash())
    }

    /// Polls the node until `stop` is set, logging and retrying on errors.
    pub fn run(&self, poll_interval: Duration, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.sync_once() {
                log::error!(target: "pixelplot", "sync failed, will retry: {}", e);
            }
            std::thread::sleep(poll_interval);
        }
    }
}

/// An indexer error.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An RPC call failed; retry on the next tick.
    Rpc(pixelplot_client::Error),
    /// Storage failure; fatal for the run.
    Store(store::Error),
    /// The node returned a block that does not decode.
    Decode(encode::FromHexError),
    /// The node returned a malformed block hash.
    Hex(HexToArrayError),
    /// The node reorganized past every state this indexer has stored.
    ReorgBeyondStoredLineage(BlockHash),
}

impl From<pixelplot_client::Error> for Error {
    fn from(e: pixelplot_client::Error) -> Self { Error::Rpc(e) }
}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Self { Error::Store(e) }
}

impl From<encode::FromHexError> for Error {
    fn from(e: encode::FromHexError) -> Self { Error::Decode(e) }
}

impl From<HexToArrayError> for Error {
    fn from(e: HexToArrayError) -> Self { Error::Hex(e) }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match *self {
            Rpc(ref e) => write!(f, "RPC failure: {}", e),
            Store(ref e) => write!(f, "{}", e),
            Decode(ref e) => write!(f, "returned block does not decode: {}", e),
            Hex(ref e) => write!(f, "returned block hash malformed: {}", e),
            ReorgBeyondStoredLineage(hash) =>
                write!(f, "node reorganized past stored lineage at {}", hash),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            Rpc(ref e) => Some(e),
            Store(ref e) => Some(e),
            Decode(ref e) => Some(e),
            Hex(ref e) => Some(e),
            ReorgBeyondStoredLineage(_) => None,
        }
    }
}
