// SPDX-License-Identifier: CC0-1.0

//! The consumer-facing (and on-disk) state record.
//!
//! [`StateRecord`] is shaped for the JSON that viewers consume and the
//! indexer persists; [`crate::CanvasState`] is the strongly-typed engine
//! state. Conversion is lossless: the deed index is derived from the plots
//! and cross-checked against the record's `deed_utxos` list on the way in.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use bitcoin::{BlockHash, OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::state::{CanvasState, Plot, PlotStatus};

/// One indexed tip, as emitted to consumers and written to disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Hash of the tip block.
    pub block_hash: BlockHash,
    /// Hash of the tip block's parent.
    pub parent_hash: BlockHash,
    /// Height of the tip block.
    pub block_height: u64,
    /// Every plot ever created, in creation order (height, then origin txid).
    pub plots: Vec<Plot>,
    /// Live deed outpoints, ordered.
    pub deed_utxos: Vec<OutPoint>,
    /// Number of transactions in the tip block.
    pub transaction_count: u64,
}

impl From<&CanvasState> for StateRecord {
    fn from(state: &CanvasState) -> Self {
        StateRecord {
            block_hash: state.block_hash(),
            parent_hash: state.parent_hash(),
            block_height: state.block_height(),
            plots: state.plots_by_creation().into_iter().cloned().collect(),
            deed_utxos: state.deed_utxos().copied().collect(),
            transaction_count: state.transaction_count(),
        }
    }
}

impl TryFrom<StateRecord> for CanvasState {
    type Error = RecordError;

    fn try_from(record: StateRecord) -> Result<Self, Self::Error> {
        use RecordError as E;

        let mut plots = BTreeMap::new();
        let mut deeds = BTreeMap::new();

        for plot in record.plots {
            match (plot.status, plot.deed) {
                (PlotStatus::Bricked, Some(_)) | (PlotStatus::Placed, None)
                | (PlotStatus::Unplaced, None) => return Err(E::StatusDeedMismatch(plot.txid)),
                (PlotStatus::Bricked, None) => {}
                (_, Some(deed)) =>
                    if deeds.insert(deed, plot.txid).is_some() {
                        return Err(E::DuplicateDeed(deed));
                    },
            }
            let txid = plot.txid;
            if plots.insert(txid, plot).is_some() {
                return Err(E::DuplicatePlot(txid));
            }
        }

        // The record's deed list must be exactly the derived index.
        let listed: BTreeSet<&OutPoint> = record.deed_utxos.iter().collect();
        if listed.len() != deeds.len() || listed.into_iter().any(|op| !deeds.contains_key(op)) {
            return Err(E::DeedSetMismatch);
        }

        Ok(CanvasState::from_parts(
            record.block_hash,
            record.parent_hash,
            record.block_height,
            record.transaction_count,
            plots,
            deeds,
        ))
    }
}

/// Error validating a [`StateRecord`] into a [`CanvasState`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    /// Two plots share an origin txid.
    DuplicatePlot(Txid),
    /// Two plots reference the same deed outpoint.
    DuplicateDeed(OutPoint),
    /// A bricked plot holds a deed, or a live plot holds none.
    StatusDeedMismatch(Txid),
    /// The `deed_utxos` list disagrees with the plots' deeds.
    DeedSetMismatch,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RecordError as E;

        match *self {
            E::DuplicatePlot(txid) => write!(f, "duplicate plot {}", txid),
            E::DuplicateDeed(op) => write!(f, "deed {} referenced by two plots", op),
            E::StatusDeedMismatch(txid) =>
                write!(f, "plot {} has a status inconsistent with its deed", txid),
            E::DeedSetMismatch => write!(f, "deed_utxos list disagrees with the plots"),
        }
    }
}

impl std::error::Error for RecordError {}
