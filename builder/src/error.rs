// SPDX-License-Identifier: CC0-1.0

//! Builder errors.
//!
//! Safety violations (`WouldBrickPlot`, `MissingDeedOutput`, `LockFailed`)
//! are fatal for the build call; the transaction is never broadcast.

use core::fmt;

use bitcoin::amount::ParseAmountError;
use bitcoin::consensus::encode;
use bitcoin::hex::HexToArrayError;
use bitcoin::{address, OutPoint};
use pixelplot_protocol::EncodeError;

/// A builder error.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The funded transaction would spend a deed other than the designated
    /// one (or any deed at all, for a CLAIM).
    WouldBrickPlot,
    /// The funded transaction has no 600-sat output to serve as the deed.
    MissingDeedOutput,
    /// A deed output could not be locked in the wallet.
    LockFailed,
    /// The wallet could not produce a complete set of signatures.
    IncompleteSignature,
    /// The designated deed is not an input with a 600-sat previous output.
    UnknownDeed(OutPoint),
    /// An input's previous output does not exist.
    MissingPrevout(OutPoint),
    /// The payload could not be encoded.
    Encode(EncodeError),
    /// An RPC call failed.
    Rpc(pixelplot_client::Error),
    /// The node returned a transaction that does not decode.
    Decode(encode::FromHexError),
    /// The node returned an address that does not parse (or is for the
    /// wrong network).
    Address(address::ParseError),
    /// The node returned an out-of-range amount.
    Amount(ParseAmountError),
    /// The node returned a malformed txid.
    Hex(HexToArrayError),
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self { Error::Encode(e) }
}

impl From<pixelplot_client::Error> for Error {
    fn from(e: pixelplot_client::Error) -> Self { Error::Rpc(e) }
}

impl From<encode::FromHexError> for Error {
    fn from(e: encode::FromHexError) -> Self { Error::Decode(e) }
}

impl From<address::ParseError> for Error {
    fn from(e: address::ParseError) -> Self { Error::Address(e) }
}

impl From<ParseAmountError> for Error {
    fn from(e: ParseAmountError) -> Self { Error::Amount(e) }
}

impl From<HexToArrayError> for Error {
    fn from(e: HexToArrayError) -> Self { Error::Hex(e) }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match *self {
            WouldBrickPlot => write!(f, "funded transaction would spend a protected deed output"),
            MissingDeedOutput => write!(f, "funded transaction has no 600-sat deed output"),
            LockFailed => write!(f, "failed to lock a deed output in the wallet"),
            IncompleteSignature => write!(f, "wallet produced an incomplete set of signatures"),
            UnknownDeed(op) => write!(f, "designated deed {} is not a spendable 600-sat output", op),
            MissingPrevout(op) => write!(f, "previous output {} does not exist", op),
            Encode(ref e) => write!(f, "payload encoding failed: {}", e),
            Rpc(ref e) => write!(f, "RPC failure: {}", e),
            Decode(ref e) => write!(f, "returned transaction does not decode: {}", e),
            Address(ref e) => write!(f, "returned address does not parse: {}", e),
            Amount(ref e) => write!(f, "returned amount out of range: {}", e),
            Hex(ref e) => write!(f, "returned txid malformed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            WouldBrickPlot | MissingDeedOutput | LockFailed | IncompleteSignature
            | UnknownDeed(_) | MissingPrevout(_) => None,
            Encode(ref e) => Some(e),
            Rpc(ref e) => Some(e),
            Decode(ref e) => Some(e),
            Address(ref e) => Some(e),
            Amount(ref e) => Some(e),
            Hex(ref e) => Some(e),
        }
    }
}
