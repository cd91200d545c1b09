// SPDX-License-Identifier: CC0-1.0

//! Shared fixtures: minimal BMPs, protocol transactions and chained blocks.

#![allow(dead_code)] // Not every test binary uses every fixture.

use bitcoin::absolute::LockTime;
use bitcoin::block::{self, Header};
use bitcoin::hashes::Hash as _;
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{self, PushBytesBuf};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, Block, BlockHash, CompactTarget, Network, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxMerkleNode, TxOut, Txid, WPubkeyHash, Witness,
};
use pixelplot_protocol::{CanvasState, Payload, DEED_VALUE};

/// Builds a minimal valid bottom-up 24-bit BMP filled with `fill`.
pub fn bmp_filled(width: i32, height: i32, fill: u8) -> Vec<u8> {
    let stride = (width as u64 * 24).div_ceil(8).next_multiple_of(4) as usize;
    let file_len = 54 + stride * height as usize;

    let mut out = Vec::with_capacity(file_len);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_len as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&54u32.to_le_bytes());
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.resize(file_len, fill);
    out
}

/// Builds a minimal valid 24-bit BMP.
pub fn bmp(width: i32, height: i32) -> Vec<u8> { bmp_filled(width, height, 0) }

/// A distinct P2WPKH script per tag, so deed outputs carry real addresses.
pub fn deed_script(tag: u8) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([tag; 20]))
}

/// A wallet-ish funding input; the salt keeps txids distinct.
pub fn funding_input(salt: u8) -> TxIn {
    TxIn {
        previous_output: OutPoint { txid: Txid::from_byte_array([salt; 32]), vout: 0 },
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// An input spending the given outpoint.
pub fn spend(outpoint: OutPoint) -> TxIn {
    TxIn {
        previous_output: outpoint,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// A fresh 600-sat deed output paying to `deed_script(tag)`.
pub fn deed_output(tag: u8) -> TxOut {
    TxOut { value: DEED_VALUE, script_pubkey: deed_script(tag) }
}

/// A zero-value output carrying the payload.
pub fn payload_output(payload: &Payload) -> TxOut {
    TxOut { value: Amount::ZERO, script_pubkey: payload.to_script() }
}

/// A zero-value `OP_RETURN` output carrying arbitrary bytes.
pub fn raw_payload_output(bytes: Vec<u8>) -> TxOut {
    let data = PushBytesBuf::try_from(bytes).unwrap();
    let script = script::Builder::new().push_opcode(OP_RETURN).push_slice(data).into_script();
    TxOut { value: Amount::ZERO, script_pubkey: script }
}

/// Encodes a CLAIM payload without the codec's bounds checks, for forcing
/// malformed placements on-chain.
pub fn raw_claim_bytes(x0: u16, y0: u16, bmp: &[u8]) -> Vec<u8> {
    let mut out = vec![0x13, 0x37, 0x01, 0x01];
    out.extend_from_slice(&x0.to_le_bytes());
    out.extend_from_slice(&y0.to_le_bytes());
    out.push(0x60); // empty URI
    out.extend_from_slice(bmp);
    out
}

pub fn tx(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
    Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input, output }
}

/// A CLAIM transaction with an empty URI; deed at output 0.
pub fn claim_tx(salt: u8, x0: u16, y0: u16, bmp: Vec<u8>) -> Transaction {
    let payload = Payload::claim(x0, y0, String::new(), bmp).unwrap();
    tx(vec![funding_input(salt)], vec![deed_output(salt), payload_output(&payload)])
}

/// The deed outpoint a CLAIM built by [`claim_tx`] creates.
pub fn deed_of(claim: &Transaction) -> OutPoint {
    OutPoint { txid: claim.compute_txid(), vout: 0 }
}

pub fn block(parent: BlockHash, time: u32, txdata: Vec<Transaction>) -> Block {
    Block {
        header: Header {
            version: block::Version::TWO,
            prev_blockhash: parent,
            merkle_root: TxMerkleNode::all_zeros(),
            time,
            bits: CompactTarget::from_consensus(0x1d00_ffff),
            nonce: 0,
        },
        txdata,
    }
}

/// An empty canvas rooted at a synthetic epoch block.
pub fn genesis_state() -> CanvasState {
    CanvasState::bootstrap(&block(BlockHash::all_zeros(), 1, vec![]), 0, Network::Regtest)
}

/// Folds one more block of transactions onto `state`.
pub fn extend(state: &CanvasState, txdata: Vec<Transaction>) -> CanvasState {
    let next = block(state.block_hash(), state.block_height() as u32 + 2, txdata);
    state.apply_block(&next, state.block_height() + 1, Network::Regtest)
}
