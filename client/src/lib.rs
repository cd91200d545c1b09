// SPDX-License-Identifier: CC0-1.0

//! Blocking JSON-RPC client for a Bitcoin Core compatible node.
//!
//! Only the node surface the pixelplot indexer and transaction builder
//! consume is implemented: block and transaction fetching, raw transaction
//! construction/funding/signing/broadcast, and the wallet's unspent-output
//! and output-locking calls. Any node exposing the equivalent JSON-RPC API
//! works.
//!
//! Result types are shaped for the JSON the node returns and provide
//! conversion helpers into strongly-typed `rust-bitcoin` values.

mod blockchain;
mod raw_transactions;
pub mod types;
mod wallet;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Crate-specific Result type.
///
/// Shorthand for `std::result::Result` with our crate-specific [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// The different authentication methods for the client.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Auth {
    /// No authentication.
    None,
    /// Username and password.
    UserPass(String, String),
    /// A `.cookie` file written by the node.
    CookieFile(PathBuf),
}

impl Auth {
    /// Convert into the arguments that `jsonrpc::Client` needs.
    pub fn get_user_pass(self) -> Result<(Option<String>, Option<String>)> {
        match self {
            Auth::None => Ok((None, None)),
            Auth::UserPass(u, p) => Ok((Some(u), Some(p))),
            Auth::CookieFile(path) => {
                let line = BufReader::new(File::open(path)?)
                    .lines()
                    .next()
                    .ok_or(Error::InvalidCookieFile)??;
                let colon = line.find(':').ok_or(Error::InvalidCookieFile)?;
                Ok((Some(line[..colon].into()), Some(line[colon + 1..].into())))
            }
        }
    }
}

/// Client implements a JSON-RPC client for a Bitcoin Core compatible daemon.
pub struct Client {
    inner: jsonrpc::client::Client,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pixelplot_client::Client({:?})", self.inner)
    }
}

impl Client {
    /// Creates a client to a node's JSON-RPC server without authentication.
    pub fn new(url: &str) -> Self {
        let transport = jsonrpc::http::minreq_http::Builder::new()
            .url(url)
            .expect("jsonrpc v0.18, this function does not error")
            .build();
        let inner = jsonrpc::client::Client::with_transport(transport);

        Self { inner }
    }

    /// Creates a client to a node's JSON-RPC server with authentication.
    pub fn new_with_auth(url: &str, auth: Auth) -> Result<Self> {
        if matches!(auth, Auth::None) {
            return Ok(Self::new(url));
        }
        let (user, pass) = auth.get_user_pass()?;

        let transport = jsonrpc::http::minreq_http::Builder::new()
            .url(url)
            .expect("jsonrpc v0.18, this function does not error")
            .basic_auth(user.expect("checked non-None above"), pass)
            .build();
        let inner = jsonrpc::client::Client::with_transport(transport);

        Ok(Self { inner })
    }

    /// Call an RPC `method` with given `args` list.
    pub fn call<T: for<'a> serde::de::Deserialize<'a>>(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<T> {
        let raw = serde_json::value::to_raw_value(args)?;
        let req = self.inner.build_request(method, Some(&*raw));
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(target: "pixelplot", "request: {} {}", method, serde_json::Value::from(args));
        }

        let resp = self.inner.send_request(req).map_err(Error::from);
        log_response(method, &resp);
        Ok(resp?.result()?)
    }
}

/// Shorthand for converting a variable into a `serde_json::Value`.
pub(crate) fn into_json<T>(val: T) -> Result<serde_json::Value>
where
    T: serde::ser::Serialize,
{
    Ok(serde_json::to_value(val)?)
}

/// Helper to log an RPC response.
fn log_response(method: &str, resp: &Result<jsonrpc::Response>) {
    use log::Level::{Debug, Trace, Warn};

    if log::log_enabled!(Warn) || log::log_enabled!(Debug) || log::log_enabled!(Trace) {
        match resp {
            Err(ref e) =>
                if log::log_enabled!(Debug) {
                    log::debug!(target: "pixelplot", "error: {}: {:?}", method, e);
                },
            Ok(ref resp) =>
                if let Some(ref e) = resp.error {
                    if log::log_enabled!(Debug) {
                        log::debug!(target: "pixelplot", "response error for {}: {:?}", method, e);
                    }
                } else if log::log_enabled!(Trace) {
                    let def =
                        serde_json::value::to_raw_value(&serde_json::value::Value::Null)
                            .expect("null is a valid raw value");
                    let result = resp.result.as_ref().unwrap_or(&def);
                    log::trace!(target: "pixelplot", "response for {}: {}", method, result);
                },
        }
    }
}

/// A library error.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from the underlying JSON-RPC transport or server.
    JsonRpc(jsonrpc::Error),
    /// JSON (de)serialization error.
    Json(serde_json::Error),
    /// The cookie file is malformed.
    InvalidCookieFile,
    /// Error reading the cookie file.
    Io(std::io::Error),
}

impl From<jsonrpc::Error> for Error {
    fn from(e: jsonrpc::Error) -> Self { Error::JsonRpc(e) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Error::Json(e) }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Error::Io(e) }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match *self {
            JsonRpc(ref e) => write!(f, "JSON-RPC error: {}", e),
            Json(ref e) => write!(f, "JSON error: {}", e),
            InvalidCookieFile => write!(f, "invalid cookie file"),
            Io(ref e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            JsonRpc(ref e) => Some(e),
            Json(ref e) => Some(e),
            InvalidCookieFile => None,
            Io(ref e) => Some(e),
        }
    }
}

/// Input used as parameter to `create_raw_transaction`.
#[derive(Clone, Debug, Serialize)]
pub struct Input {
    /// The txid of the transaction that contains the UTXO.
    pub txid: bitcoin::Txid,
    /// The vout for the UTXO.
    pub vout: u32,
    /// Sequence number if needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<bitcoin::Sequence>,
}

impl From<bitcoin::OutPoint> for Input {
    fn from(op: bitcoin::OutPoint) -> Self {
        Input { txid: op.txid, vout: op.vout, sequence: None }
    }
}

/// Output used as parameter to `create_raw_transaction`.
#[derive(Clone, Debug)]
pub enum Output {
    /// Pay `amount` to `address`.
    Address {
        /// Destination address.
        address: bitcoin::Address,
        /// Amount to pay.
        amount: bitcoin::Amount,
    },
    /// A zero-value data-carrier (`OP_RETURN`) output.
    Data(Vec<u8>),
}

impl Serialize for Output {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use bitcoin::hex::DisplayHex as _;
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Output::Address { address, amount } =>
                map.serialize_entry(&address.to_string(), &amount.to_btc())?,
            Output::Data(data) => map.serialize_entry("data", &data.to_lower_hex_string())?,
        }
        map.end()
    }
}

/// Options object for the `fundrawtransaction` method.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FundOptions {
    /// Let the wallet add inputs (required when the template has none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_inputs: Option<bool>,
    /// Address to receive the change.
    #[serde(rename = "changeAddress", skip_serializing_if = "Option::is_none")]
    pub change_address: Option<String>,
    /// Fee rate in BTC per kvB.
    #[serde(rename = "feeRate", skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<f64>,
    /// Lock the selected unspent outputs.
    #[serde(rename = "lockUnspents", skip_serializing_if = "Option::is_none")]
    pub lock_unspents: Option<bool>,
}

/// Args for the `lockunspent` method.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct LockUnspentOutput {
    /// The transaction id.
    pub txid: bitcoin::Txid,
    /// The output number.
    pub vout: u32,
}

impl From<bitcoin::OutPoint> for LockUnspentOutput {
    fn from(op: bitcoin::OutPoint) -> Self { LockUnspentOutput { txid: op.txid, vout: op.vout } }
}
