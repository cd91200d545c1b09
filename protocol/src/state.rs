// SPDX-License-Identifier: CC0-1.0

//! The canvas state engine.
//!
//! The engine folds a block's transactions, in the block's serialization
//! order, over the previous state. Each transaction is classified against the
//! state produced by the transactions before it in the same block, so a deed
//! created earlier in a block is live for later transactions of that block,
//! and same-block placement conflicts are resolved by transaction order
//! (earlier wins).
//!
//! The engine is total: every classified event either mutates state or is a
//! BRICK. There is no error state, nothing is retried, and a block is never
//! rejected.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::{sha256, Hash as _};
use bitcoin::{Address, Block, BlockHash, Network, OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::classify::{classify, DeedLookup, TxEvent};
use crate::in_bounds;

/// Visibility of a plot on the canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlotStatus {
    /// Visible on the canvas.
    Placed,
    /// Created, but out of bounds or overlapping at its current position.
    Unplaced,
    /// Deed destroyed; permanently inert.
    Bricked,
}

impl fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            PlotStatus::Placed => "PLACED",
            PlotStatus::Unplaced => "UNPLACED",
            PlotStatus::Bricked => "BRICKED",
        })
    }
}

impl FromStr for PlotStatus {
    type Err = ParsePlotStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(PlotStatus::Placed),
            "UNPLACED" => Ok(PlotStatus::Unplaced),
            "BRICKED" => Ok(PlotStatus::Bricked),
            _ => Err(ParsePlotStatusError(())),
        }
    }
}

/// Error parsing a [`PlotStatus`] from a string.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParsePlotStatusError(());

impl fmt::Display for ParsePlotStatusError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown plot status (expected PLACED, UNPLACED or BRICKED)")
    }
}

impl std::error::Error for ParsePlotStatusError {}

/// A plot and everything the canvas knows about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    /// Plot identity: the txid of the originating CLAIM.
    pub txid: Txid,
    /// Left edge on the canvas.
    pub x0: u16,
    /// Top edge on the canvas.
    pub y0: u16,
    /// Plot width; fixed at claim time.
    pub width: u32,
    /// Plot height; fixed at claim time.
    pub height: u32,
    /// Visibility on the canvas.
    pub status: PlotStatus,
    /// The live deed controlling this plot; `None` once bricked.
    #[serde(rename = "deed_utxo")]
    pub deed: Option<OutPoint>,
    /// Canonical digest of the current image bytes.
    pub image_hash: sha256::Hash,
    /// Height of the block that created the plot.
    #[serde(rename = "created_at")]
    pub created_height: u64,
    /// Height of the block that last touched the plot.
    #[serde(rename = "last_updated")]
    pub last_updated_height: u64,
    /// Address controlling the deed; `None` once bricked (or for deed
    /// scripts that no address encodes).
    pub owner: Option<Address<NetworkUnchecked>>,
    /// Link shown next to the plot.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    /// Whether the plot was visible at the moment it bricked.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub was_placed_before_bricking: bool,
}

impl Plot {
    /// Whether this plot's rectangle lies fully on the canvas.
    pub fn is_in_bounds(&self) -> bool { in_bounds(self.x0, self.y0, self.width, self.height) }

    /// Whether this plot's rectangle intersects the given rectangle.
    pub fn overlaps(&self, x0: u16, y0: u16, width: u32, height: u32) -> bool {
        let (ax0, ay0) = (u64::from(self.x0), u64::from(self.y0));
        let (ax1, ay1) = (ax0 + u64::from(self.width), ay0 + u64::from(self.height));
        let (bx0, by0) = (u64::from(x0), u64::from(y0));
        let (bx1, by1) = (bx0 + u64::from(width), by0 + u64::from(height));
        ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
    }

    /// Whether the pixel `(x, y)` falls inside this plot's rectangle.
    pub fn contains(&self, x: u16, y: u16) -> bool { self.overlaps(x, y, 1, 1) }
}

/// The authoritative canvas state at one block.
///
/// Produced exclusively by [`CanvasState::bootstrap`] and
/// [`CanvasState::apply_block`]; the indexer persists one per tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasState {
    /// Hash of the block this state is at.
    block_hash: BlockHash,
    /// Hash of that block's parent.
    parent_hash: BlockHash,
    /// Height of the block this state is at.
    block_height: u64,
    /// Number of transactions in the block this state is at.
    transaction_count: u64,
    /// Every plot ever created, keyed by origin txid.
    plots: BTreeMap<Txid, Plot>,
    /// Live deed index: outpoint to the plot it controls.
    deeds: BTreeMap<OutPoint, Txid>,
}

impl DeedLookup for CanvasState {
    fn plot_for_deed(&self, outpoint: &OutPoint) -> Option<Txid> {
        self.deeds.get(outpoint).copied()
    }
}

impl CanvasState {
    /// The state rooted at the protocol's epoch block: the fold of the epoch
    /// block's own transactions over an empty canvas.
    pub fn bootstrap(block: &Block, height: u64, network: Network) -> CanvasState {
        let empty = CanvasState {
            block_hash: block.header.prev_blockhash,
            parent_hash: BlockHash::all_zeros(),
            block_height: height.saturating_sub(1),
            transaction_count: 0,
            plots: BTreeMap::new(),
            deeds: BTreeMap::new(),
        };
        empty.apply_block(block, height, network)
    }

    /// Folds one block into the state, producing the state at the new tip.
    ///
    /// Pure and infallible: unparseable payloads are non-protocol, deed
    /// spends without successors are BRICKs, and the block is never rejected.
    pub fn apply_block(&self, block: &Block, height: u64, network: Network) -> CanvasState {
        let mut next = self.clone();
        next.parent_hash = next.block_hash;
        next.block_hash = block.block_hash();
        next.block_height = height;
        next.transaction_count = block.txdata.len() as u64;

        for tx in &block.txdata {
            if let Some(event) = classify(tx, &next, network) {
                next.apply_event(event, height);
            }
        }
        next
    }

    /// Applies a single classified event.
    ///
    /// Exposed so tests can drive the engine without assembling blocks; the
    /// indexer always goes through [`CanvasState::apply_block`].
    pub fn apply_event(&mut self, event: TxEvent, height: u64) {
        match event {
            TxEvent::Claim { plot, x0, y0, uri, info, deed, owner } => {
                let status = if self.fits(x0, y0, info.width, info.height, None) {
                    PlotStatus::Placed
                } else {
                    PlotStatus::Unplaced
                };
                self.deeds.insert(deed, plot);
                self.plots.insert(
                    plot,
                    Plot {
                        txid: plot,
                        x0,
                        y0,
                        width: info.width,
                        height: info.height,
                        status,
                        deed: Some(deed),
                        image_hash: info.image_hash,
                        created_height: height,
                        last_updated_height: height,
                        owner,
                        uri,
                        was_placed_before_bricking: false,
                    },
                );
            }
            TxEvent::RetryClaim { plot, x0, y0, deed, owner } => {
                let Some((width, height_px, old_deed)) = self.plot_dims(plot) else { return };
                let status = if self.fits(x0, y0, width, height_px, Some(plot)) {
                    PlotStatus::Placed
                } else {
                    PlotStatus::Unplaced
                };
                self.replace_deed(plot, old_deed, deed);
                let entry = self.plots.get_mut(&plot).expect("plot_dims checked presence");
                entry.x0 = x0;
                entry.y0 = y0;
                entry.status = status;
                entry.owner = owner;
                entry.last_updated_height = height;
            }
            TxEvent::Update { plot, x0, y0, uri, info, deed, owner } => {
                let Some(current) = self.plots.get(&plot) else { return };
                let legitimate = info.width == current.width
                    && info.height == current.height
                    && x0 == current.x0
                    && y0 == current.y0;
                if !legitimate {
                    // The deed was spent without a valid replacement; the
                    // 600-sat output of a mismatched UPDATE is not a deed.
                    self.brick(plot, height);
                    return;
                }
                let old_deed = current.deed;
                let status = if self.fits(x0, y0, info.width, info.height, Some(plot)) {
                    PlotStatus::Placed
                } else {
                    PlotStatus::Unplaced
                };
                self.replace_deed(plot, old_deed, deed);
                let entry = self.plots.get_mut(&plot).expect("presence checked above");
                entry.image_hash = info.image_hash;
                entry.uri = uri;
                entry.status = status;
                entry.owner = owner;
                entry.last_updated_height = height;
            }
            TxEvent::Transfer { plot, deed, owner } => {
                let Some((_, _, old_deed)) = self.plot_dims(plot) else { return };
                self.replace_deed(plot, old_deed, deed);
                let entry = self.plots.get_mut(&plot).expect("plot_dims checked presence");
                entry.owner = owner;
                entry.last_updated_height = height;
            }
            TxEvent::Brick { plots } => {
                for plot in plots {
                    self.brick(plot, height);
                }
            }
        }
    }

    fn brick(&mut self, plot: Txid, height: u64) {
        let Some(entry) = self.plots.get_mut(&plot) else { return };
        if let Some(deed) = entry.deed.take() {
            self.deeds.remove(&deed);
        }
        entry.was_placed_before_bricking = entry.status == PlotStatus::Placed;
        entry.status = PlotStatus::Bricked;
        entry.owner = None;
        entry.last_updated_height = height;
    }

    /// Width, height and current deed of a plot, if it exists.
    fn plot_dims(&self, plot: Txid) -> Option<(u32, u32, Option<OutPoint>)> {
        self.plots.get(&plot).map(|p| (p.width, p.height, p.deed))
    }

    fn replace_deed(&mut self, plot: Txid, old: Option<OutPoint>, new: OutPoint) {
        if let Some(old) = old {
            self.deeds.remove(&old);
        }
        self.deeds.insert(new, plot);
        if let Some(entry) = self.plots.get_mut(&plot) {
            entry.deed = Some(new);
        }
    }

    /// Whether a rectangle is in bounds and free of every PLACED plot other
    /// than `ignore`. Bricked and unplaced rectangles do not occupy space.
    fn fits(&self, x0: u16, y0: u16, width: u32, height: u32, ignore: Option<Txid>) -> bool {
        in_bounds(x0, y0, width, height)
            && !self.plots.values().any(|p| {
                p.status == PlotStatus::Placed
                    && Some(p.txid) != ignore
                    && p.overlaps(x0, y0, width, height)
            })
    }

    /// Hash of the block this state is at.
    pub fn block_hash(&self) -> BlockHash { self.block_hash }

    /// Hash of the tip block's parent.
    pub fn parent_hash(&self) -> BlockHash { self.parent_hash }

    /// Height of the block this state is at.
    pub fn block_height(&self) -> u64 { self.block_height }

    /// Number of transactions in the tip block.
    pub fn transaction_count(&self) -> u64 { self.transaction_count }

    /// The plot with the given origin txid.
    pub fn plot(&self, txid: &Txid) -> Option<&Plot> { self.plots.get(txid) }

    /// Every plot ever created, ordered by origin txid.
    pub fn plots(&self) -> impl Iterator<Item = &Plot> { self.plots.values() }

    /// Every plot ever created, in creation order.
    ///
    /// Ordered by creation height, with the origin txid as a stable tiebreak
    /// for plots claimed in the same block. This is the order viewers see in
    /// the emitted record.
    pub fn plots_by_creation(&self) -> Vec<&Plot> {
        let mut plots: Vec<&Plot> = self.plots.values().collect();
        plots.sort_by_key(|plot| (plot.created_height, plot.txid));
        plots
    }

    /// Number of plots ever created.
    pub fn plot_count(&self) -> usize { self.plots.len() }

    /// Live deed outpoints, ordered.
    pub fn deed_utxos(&self) -> impl Iterator<Item = &OutPoint> { self.deeds.keys() }

    /// The PLACED plot covering pixel `(x, y)`, if any.
    ///
    /// At most one exists: PLACED rectangles are disjoint.
    pub fn plot_at(&self, x: u16, y: u16) -> Option<&Plot> {
        self.plots.values().find(|p| p.status == PlotStatus::Placed && p.contains(x, y))
    }

    /// Rebuilds a state from its parts, re-deriving the deed index.
    ///
    /// Used by [`crate::record`] when loading a persisted state; validation
    /// lives there.
    pub(crate) fn from_parts(
        block_hash: BlockHash,
        parent_hash: BlockHash,
        block_height: u64,
        transaction_count: u64,
        plots: BTreeMap<Txid, Plot>,
        deeds: BTreeMap<OutPoint, Txid>,
    ) -> CanvasState {
        CanvasState { block_hash, parent_hash, block_height, transaction_count, plots, deeds }
    }
}
