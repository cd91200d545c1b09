// SPDX-License-Identifier: CC0-1.0

//! JSON-RPC methods found under the `== Blockchain ==` section of the node's
//! API docs.

use bitcoin::BlockHash;

use crate::types::{GetBestBlockHash, GetBlock, GetBlockCount, GetBlockHash, GetBlockHeader};
use crate::{into_json, Client, Result};

impl Client {
    /// Calls the JSON-RPC method `getbestblockhash`.
    pub fn get_best_block_hash(&self) -> Result<GetBestBlockHash> {
        self.call("getbestblockhash", &[])
    }

    /// Calls the JSON-RPC method `getblockhash`.
    pub fn get_block_hash(&self, height: u64) -> Result<GetBlockHash> {
        self.call("getblockhash", &[height.into()])
    }

    /// Calls the JSON-RPC method `getblockcount`.
    pub fn get_block_count(&self) -> Result<GetBlockCount> {
        self.call("getblockcount", &[])
    }

    /// Calls the JSON-RPC method `getblock` with verbosity 0 (raw block).
    pub fn get_block(&self, hash: &BlockHash) -> Result<GetBlock> {
        self.call("getblock", &[into_json(hash)?, 0.into()])
    }

    /// Calls the JSON-RPC method `getblockheader` with verbose `true`.
    pub fn get_block_header(&self, hash: &BlockHash) -> Result<GetBlockHeader> {
        self.call("getblockheader", &[into_json(hash)?, true.into()])
    }
}
