// SPDX-License-Identifier: CC0-1.0

//! Typed results for the JSON-RPC methods this client implements.
//!
//! These structs are shaped for the JSON data returned by the node and use
//! stdlib types; where useful they provide conversion helpers into
//! `rust-bitcoin` types. Fields this crate's consumers never read are kept
//! when the node always returns them, so the structs stay honest about the
//! wire shape.

use bitcoin::address::{Address, NetworkUnchecked, ParseError};
use bitcoin::amount::ParseAmountError;
use bitcoin::consensus::encode;
use bitcoin::hex::HexToArrayError;
use bitcoin::{Amount, Block, BlockHash, OutPoint, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// Result of JSON-RPC method `getbestblockhash`.
///
/// > getbestblockhash
/// >
/// > Returns the hash of the best (tip) block in the most-work fully-validated chain.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetBestBlockHash(
    /// The block hash, hex-encoded.
    pub String,
);

impl GetBestBlockHash {
    /// Converts json straight to a `bitcoin::BlockHash`.
    pub fn block_hash(&self) -> Result<BlockHash, HexToArrayError> { self.0.parse() }
}

/// Result of JSON-RPC method `getblockhash`.
///
/// > getblockhash height
/// >
/// > Returns hash of block in best-block-chain at height provided.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetBlockHash(
    /// The block hash, hex-encoded.
    pub String,
);

impl GetBlockHash {
    /// Converts json straight to a `bitcoin::BlockHash`.
    pub fn block_hash(&self) -> Result<BlockHash, HexToArrayError> { self.0.parse() }
}

/// Result of JSON-RPC method `getblockcount`.
///
/// > getblockcount
/// >
/// > Returns the height of the most-work fully-validated chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetBlockCount(
    /// The current block count.
    pub u64,
);

/// Result of JSON-RPC method `getblock` with verbosity set to 0.
///
/// > getblock "blockhash" ( verbosity )
/// >
/// > Returns a string that is serialized, hex-encoded data for block 'blockhash'.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetBlock(
    /// The raw block, hex-encoded.
    pub String,
);

impl GetBlock {
    /// Converts json straight to a `bitcoin::Block`.
    ///
    /// The block's transactions come back in serialization order, which is
    /// the order the protocol's conflict resolution is defined over.
    pub fn block(&self) -> Result<Block, encode::FromHexError> {
        encode::deserialize_hex(&self.0)
    }
}

/// Result of JSON-RPC method `getblockheader` with verbose set to `true`.
///
/// > getblockheader "blockhash" ( verbose )
/// >
/// > If verbose is true, returns an Object with information about blockheader 'blockhash'.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GetBlockHeader {
    /// The block hash.
    pub hash: String,
    /// The number of confirmations, or -1 if the block is not on the main chain.
    pub confirmations: i64,
    /// The block height or index.
    pub height: u64,
    /// The block version.
    pub version: i32,
    /// The merkle root.
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    /// The block time expressed in UNIX epoch time.
    pub time: u64,
    /// The median block time expressed in UNIX epoch time.
    #[serde(rename = "mediantime")]
    pub median_time: Option<u64>,
    /// The nonce.
    pub nonce: u64,
    /// The bits.
    pub bits: String,
    /// The difficulty.
    pub difficulty: f64,
    /// Expected number of hashes required to produce the current chain.
    pub chainwork: String,
    /// The number of transactions in the block.
    #[serde(rename = "nTx")]
    pub n_tx: u64,
    /// The hash of the previous block (absent for the genesis block).
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    /// The hash of the next block (absent for the tip).
    #[serde(rename = "nextblockhash")]
    pub next_block_hash: Option<String>,
}

impl GetBlockHeader {
    /// Whether the node still considers this block part of the main chain.
    pub fn is_on_main_chain(&self) -> bool { self.confirmations >= 0 }

    /// Converts the `nextblockhash` field to a `bitcoin::BlockHash`.
    pub fn next_block_hash(&self) -> Result<Option<BlockHash>, HexToArrayError> {
        self.next_block_hash.as_deref().map(str::parse).transpose()
    }

    /// Converts the `previousblockhash` field to a `bitcoin::BlockHash`.
    pub fn previous_block_hash(&self) -> Result<Option<BlockHash>, HexToArrayError> {
        self.previous_block_hash.as_deref().map(str::parse).transpose()
    }
}

/// Result of JSON-RPC method `getrawtransaction` with verbose set to `false`.
///
/// > getrawtransaction "txid" ( verbose "blockhash" )
/// >
/// > Return the raw transaction data.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetRawTransaction(
    /// The serialized transaction, hex-encoded.
    pub String,
);

impl GetRawTransaction {
    /// Converts json straight to a `bitcoin::Transaction`.
    pub fn transaction(&self) -> Result<Transaction, encode::FromHexError> {
        encode::deserialize_hex(&self.0)
    }
}

/// Result of JSON-RPC method `createrawtransaction`.
///
/// > createrawtransaction [{"txid":"id","vout":n},...] [{"address":amount},{"data":"hex"},...]
/// >
/// > Create a transaction spending the given inputs and creating new outputs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreateRawTransaction(
    /// hex string of the transaction.
    pub String,
);

/// Result of JSON-RPC method `fundrawtransaction`.
///
/// > fundrawtransaction "hexstring" ( options iswitness )
/// >
/// > If the transaction has no inputs, they will be automatically selected to meet its out value.
/// > Note that inputs which were signed may need to be resigned after completion since in/outputs have been added.
/// > The inputs added will not be signed, use signrawtransactionwithwallet for that.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FundRawTransaction {
    /// The resulting raw transaction, hex-encoded.
    pub hex: String,
    /// Fee in BTC the resulting transaction pays.
    pub fee: f64,
    /// The position of the added change output, or -1.
    pub changepos: i64,
}

impl FundRawTransaction {
    /// Converts json straight to a `bitcoin::Transaction`.
    pub fn transaction(&self) -> Result<Transaction, encode::FromHexError> {
        encode::deserialize_hex(&self.hex)
    }

    /// Converts the fee field to a `bitcoin::Amount`.
    pub fn fee(&self) -> Result<Amount, ParseAmountError> { Amount::from_btc(self.fee) }
}

/// Result of JSON-RPC method `signrawtransactionwithwallet`.
///
/// > signrawtransactionwithwallet "hexstring" ( [{"txid":"hex",...},...] "sighashtype" )
/// >
/// > Sign inputs for raw transaction (serialized, hex-encoded).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignRawTransaction {
    /// The hex-encoded raw transaction with signature(s).
    pub hex: String,
    /// Whether the transaction has a complete set of signatures.
    pub complete: bool,
    /// Script verification errors, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<SignFail>>,
}

impl SignRawTransaction {
    /// Converts json straight to a `bitcoin::Transaction`.
    pub fn transaction(&self) -> Result<Transaction, encode::FromHexError> {
        encode::deserialize_hex(&self.hex)
    }
}

/// A script verification error returned by `signrawtransactionwithwallet`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignFail {
    /// The txid of the input with the error.
    pub txid: String,
    /// The vout of the input with the error.
    pub vout: u32,
    /// The hex-encoded signature script.
    #[serde(rename = "scriptSig")]
    pub script_sig: String,
    /// The input's sequence number.
    pub sequence: u32,
    /// Verification or signing error related to the input.
    pub error: String,
}

/// Result of JSON-RPC method `sendrawtransaction`.
///
/// > sendrawtransaction "hexstring" ( maxfeerate )
/// >
/// > Submit a raw transaction (serialized, hex-encoded) to local node and network.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SendRawTransaction(
    /// The transaction hash, hex-encoded.
    pub String,
);

impl SendRawTransaction {
    /// Converts json straight to a `bitcoin::Txid`.
    pub fn txid(&self) -> Result<Txid, HexToArrayError> { self.0.parse() }
}

/// Result of the JSON-RPC method `getnewaddress`.
///
/// > getnewaddress ( "label" "address_type" )
/// >
/// > Returns a new Bitcoin address for receiving payments.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetNewAddress(
    /// The new address.
    pub String,
);

impl GetNewAddress {
    /// Converts json straight to an unchecked `bitcoin::Address`.
    pub fn address(&self) -> Result<Address<NetworkUnchecked>, ParseError> { self.0.parse() }
}

/// Result of the JSON-RPC method `listunspent`.
///
/// > listunspent ( minconf maxconf ["address",...] include_unsafe query_options )
/// >
/// > Returns array of unspent transaction outputs
/// > with between minconf and maxconf (inclusive) confirmations.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ListUnspent(pub Vec<ListUnspentItem>);

/// Unspent transaction output, returned as part of `listunspent`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ListUnspentItem {
    /// The transaction id.
    pub txid: String,
    /// The vout value.
    pub vout: u32,
    /// The address of the output (absent for non-standard scripts).
    pub address: Option<String>,
    /// The associated label, if any.
    pub label: Option<String>,
    /// The script key.
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
    /// The transaction amount in BTC.
    pub amount: f64,
    /// The number of confirmations.
    pub confirmations: i64,
    /// Whether we have the private keys to spend this output.
    pub spendable: bool,
    /// Whether we know how to spend this output, ignoring the lack of keys.
    pub solvable: bool,
    /// Whether this output is considered safe to spend.
    pub safe: bool,
}

impl ListUnspentItem {
    /// Converts the txid and vout fields to a `bitcoin::OutPoint`.
    pub fn outpoint(&self) -> Result<OutPoint, HexToArrayError> {
        Ok(OutPoint { txid: self.txid.parse()?, vout: self.vout })
    }

    /// Converts the amount field to a `bitcoin::Amount`.
    pub fn amount(&self) -> Result<Amount, ParseAmountError> { Amount::from_btc(self.amount) }
}

/// Result of the JSON-RPC method `lockunspent`.
///
/// > lockunspent unlock ( [{"txid":"hex","vout":n},...] persistent )
/// >
/// > Updates list of temporarily unspendable outputs.
/// > Temporarily lock (unlock=false) or unlock (unlock=true) specified transaction outputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LockUnspent(
    /// Whether the command was successful.
    pub bool,
);

/// Result of the JSON-RPC method `listlockunspent`.
///
/// > listlockunspent
/// >
/// > Returns list of temporarily unspendable outputs.
/// > See the lockunspent call to lock and unlock transactions for spending.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListLockUnspent(pub Vec<ListLockUnspentItem>);

/// List item returned as part of `listlockunspent`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListLockUnspentItem {
    /// The transaction id locked.
    pub txid: String,
    /// The vout value.
    pub vout: u32,
}

impl ListLockUnspentItem {
    /// Converts the txid and vout fields to a `bitcoin::OutPoint`.
    pub fn outpoint(&self) -> Result<OutPoint, HexToArrayError> {
        Ok(OutPoint { txid: self.txid.parse()?, vout: self.vout })
    }
}
