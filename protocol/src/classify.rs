// SPDX-License-Identifier: CC0-1.0

//! Classification of chain transactions against the live deed set.
//!
//! Classification never errors: a transaction that does not match the
//! protocol is simply not an event, and a deed spent without a valid
//! successor is a BRICK, which is a first-class outcome rather than a
//! failure.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, OutPoint, Transaction, TxOut, Txid};

use crate::bmp::BmpInfo;
use crate::payload::Payload;
use crate::DEED_VALUE;

/// Lookup into the set of live deed outpoints.
///
/// Implemented by [`crate::CanvasState`]; tests implement it over plain maps.
pub trait DeedLookup {
    /// The plot controlled by `outpoint`, if `outpoint` is a live deed.
    fn plot_for_deed(&self, outpoint: &OutPoint) -> Option<Txid>;
}

impl DeedLookup for std::collections::BTreeMap<OutPoint, Txid> {
    fn plot_for_deed(&self, outpoint: &OutPoint) -> Option<Txid> { self.get(outpoint).copied() }
}

/// A classified protocol event, ready for the state engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxEvent {
    /// A fresh plot claim; the plot id is the claiming transaction's txid.
    Claim {
        /// Plot identity (the claiming txid).
        plot: Txid,
        /// Left edge of the requested placement.
        x0: u16,
        /// Top edge of the requested placement.
        y0: u16,
        /// Link shown next to the plot, possibly empty.
        uri: String,
        /// Dimensions and digest of the claimed image.
        info: BmpInfo,
        /// The freshly created deed output.
        deed: OutPoint,
        /// Address controlling the deed, when the script expresses one.
        owner: Option<Address<NetworkUnchecked>>,
    },
    /// An existing plot moves to a new position.
    RetryClaim {
        /// Plot identity.
        plot: Txid,
        /// New left edge.
        x0: u16,
        /// New top edge.
        y0: u16,
        /// The replacement deed output.
        deed: OutPoint,
        /// Address controlling the replacement deed.
        owner: Option<Address<NetworkUnchecked>>,
    },
    /// An existing plot's image and URI are replaced in place.
    Update {
        /// Plot identity.
        plot: Txid,
        /// Stated left edge (must match the plot or the plot bricks).
        x0: u16,
        /// Stated top edge (must match the plot or the plot bricks).
        y0: u16,
        /// New link, possibly empty.
        uri: String,
        /// Dimensions and digest of the replacement image.
        info: BmpInfo,
        /// The replacement deed output.
        deed: OutPoint,
        /// Address controlling the replacement deed.
        owner: Option<Address<NetworkUnchecked>>,
    },
    /// A deed moved to a new owner without touching the plot.
    Transfer {
        /// Plot identity.
        plot: Txid,
        /// The replacement deed output.
        deed: OutPoint,
        /// Address controlling the replacement deed.
        owner: Option<Address<NetworkUnchecked>>,
    },
    /// Deeds were destroyed; the listed plots are permanently inert.
    Brick {
        /// Every plot whose deed the transaction spent.
        plots: Vec<Txid>,
    },
}

/// Classifies a confirmed transaction against the live deed set.
///
/// Returns `None` for non-protocol transactions. First match wins:
///
/// 1. no deed spent + parseable CLAIM payload + 600-sat output: CLAIM;
/// 2. one deed spent + parseable RETRY-CLAIM: RETRY-CLAIM, or BRICK without
///    a 600-sat output;
/// 3. one deed spent + parseable UPDATE: UPDATE, or BRICK without a 600-sat
///    output;
/// 4. one deed spent, no parseable payload, 600-sat output: TRANSFER;
/// 5. any other deed spend (several deeds, no fresh deed, or a CLAIM payload
///    riding a deed spend): BRICK for every spent deed's plot.
///
/// A parseable payload always wins over the TRANSFER fallback. When several
/// outputs carry exactly 600 sats the lowest-indexed one is the new deed. A
/// transaction with more than one `OP_RETURN` output is treated as carrying
/// no parseable payload.
pub fn classify<L: DeedLookup>(tx: &Transaction, deeds: &L, network: Network) -> Option<TxEvent> {
    let spent: Vec<Txid> = tx
        .input
        .iter()
        .filter_map(|input| deeds.plot_for_deed(&input.previous_output))
        .collect();

    let payload = parse_payload(tx);
    let deed_output = find_deed_output(tx);
    let new_deed = |vout: usize, output: &TxOut| {
        (OutPoint { txid: tx.compute_txid(), vout: vout as u32 }, output_address(output, network))
    };

    match spent.len() {
        0 => match payload {
            Some(Payload::Claim { x0, y0, uri, info, .. }) => {
                let (vout, output) = deed_output?;
                let (deed, owner) = new_deed(vout, output);
                Some(TxEvent::Claim { plot: deed.txid, x0, y0, uri, info, deed, owner })
            }
            _ => None,
        },
        1 => {
            let plot = spent[0];
            let brick = || Some(TxEvent::Brick { plots: vec![plot] });
            match payload {
                Some(Payload::RetryClaim { x0, y0 }) => match deed_output {
                    Some((vout, output)) => {
                        let (deed, owner) = new_deed(vout, output);
                        Some(TxEvent::RetryClaim { plot, x0, y0, deed, owner })
                    }
                    None => brick(),
                },
                Some(Payload::Update { x0, y0, uri, info, .. }) => match deed_output {
                    Some((vout, output)) => {
                        let (deed, owner) = new_deed(vout, output);
                        Some(TxEvent::Update { plot, x0, y0, uri, info, deed, owner })
                    }
                    None => brick(),
                },
                // A CLAIM payload riding a deed spend matches no rule.
                Some(Payload::Claim { .. }) => brick(),
                None => match deed_output {
                    Some((vout, output)) => {
                        let (deed, owner) = new_deed(vout, output);
                        Some(TxEvent::Transfer { plot, deed, owner })
                    }
                    None => brick(),
                },
            }
        }
        _ => Some(TxEvent::Brick { plots: spent }),
    }
}

/// The decoded payload of the transaction's single `OP_RETURN` output.
///
/// `None` when there is no `OP_RETURN`, more than one, or the payload does
/// not decode.
fn parse_payload(tx: &Transaction) -> Option<Payload> {
    let mut op_returns = tx.output.iter().filter(|output| output.script_pubkey.is_op_return());
    let candidate = op_returns.next()?;
    if op_returns.next().is_some() {
        log::debug!(target: "pixelplot", "multiple OP_RETURN outputs, payload ignored");
        return None;
    }
    let data = Payload::extract(&candidate.script_pubkey)?;
    match Payload::decode(&data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            log::debug!(target: "pixelplot", "payload rejected: {}", e);
            None
        }
    }
}

/// The lowest-indexed output of value exactly [`DEED_VALUE`].
fn find_deed_output(tx: &Transaction) -> Option<(usize, &TxOut)> {
    tx.output.iter().enumerate().find(|(_, output)| output.value == DEED_VALUE)
}

fn output_address(output: &TxOut, network: Network) -> Option<Address<NetworkUnchecked>> {
    Address::from_script(&output.script_pubkey, network).ok().map(Address::into_unchecked)
}
