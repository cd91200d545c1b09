// SPDX-License-Identifier: CC0-1.0

//! JSON-RPC methods found under the `== Rawtransactions ==` section of the
//! node's API docs.

use bitcoin::Txid;

use crate::types::{
    CreateRawTransaction, FundRawTransaction, GetRawTransaction, SendRawTransaction,
    SignRawTransaction,
};
use crate::{into_json, Client, FundOptions, Input, Output, Result};

impl Client {
    /// Calls the JSON-RPC method `getrawtransaction` with verbose `false`.
    pub fn get_raw_transaction(&self, txid: &Txid) -> Result<GetRawTransaction> {
        self.call("getrawtransaction", &[into_json(txid)?])
    }

    /// Calls the JSON-RPC method `createrawtransaction`.
    pub fn create_raw_transaction(
        &self,
        inputs: &[Input],
        outputs: &[Output],
    ) -> Result<CreateRawTransaction> {
        self.call("createrawtransaction", &[into_json(inputs)?, into_json(outputs)?])
    }

    /// Calls the JSON-RPC method `fundrawtransaction`.
    ///
    /// The wallet selects inputs to meet the template's out value; selection
    /// never touches locked outputs.
    pub fn fund_raw_transaction(&self, hex: &str, options: &FundOptions) -> Result<FundRawTransaction> {
        self.call("fundrawtransaction", &[hex.into(), into_json(options)?])
    }

    /// Calls the JSON-RPC method `signrawtransactionwithwallet`.
    pub fn sign_raw_transaction_with_wallet(&self, hex: &str) -> Result<SignRawTransaction> {
        self.call("signrawtransactionwithwallet", &[hex.into()])
    }

    /// Calls the JSON-RPC method `sendrawtransaction`.
    pub fn send_raw_transaction(&self, hex: &str) -> Result<SendRawTransaction> {
        self.call("sendrawtransaction", &[hex.into()])
    }
}
