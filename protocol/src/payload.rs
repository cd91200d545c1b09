// SPDX-License-Identifier: CC0-1.0

//! The `OP_RETURN` envelope codec.
//!
//! Wire format: `magic[2] | version[1] | type[1] | body`, all multi-byte
//! integers little-endian. The URI field is a definite-length CBOR text
//! string; the image rides as raw bytes to the end of the payload.
//!
//! | type | name        | body                                   |
//! |------|-------------|----------------------------------------|
//! | 0x01 | CLAIM       | `x0[2]`, `y0[2]`, `uri` (CBOR), `bmp`  |
//! | 0x02 | RETRY-CLAIM | `x0[2]`, `y0[2]`                       |
//! | 0x03 | UPDATE      | `x0[2]`, `y0[2]`, `uri` (CBOR), `bmp`  |
//!
//! A TRANSFER (type 0x04) carries no payload; it is recognised purely from
//! transaction shape by the classifier.

use core::fmt;

use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{self, Instruction, PushBytesBuf, Script, ScriptBuf};

use crate::bmp::{self, BmpError, BmpInfo};
use crate::in_bounds;

/// Two magic bytes that open every payload.
pub const MAGIC: [u8; 2] = [0x13, 0x37];

/// Protocol version carried in the third payload byte.
pub const VERSION: u8 = 0x01;

const TYPE_CLAIM: u8 = 0x01;
const TYPE_RETRY_CLAIM: u8 = 0x02;
const TYPE_UPDATE: u8 = 0x03;

/// A decoded metaprotocol payload.
///
/// CLAIM and UPDATE variants always carry a [`BmpInfo`]: construction and
/// decoding both validate the image, so holding a `Payload` is proof that the
/// embedded bytes are a well-formed BMP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Claims a fresh plot at `(x0, y0)`.
    Claim {
        /// Left edge of the plot.
        x0: u16,
        /// Top edge of the plot.
        y0: u16,
        /// Link shown next to the plot, possibly empty.
        uri: String,
        /// Raw image bytes.
        bmp: Vec<u8>,
        /// Validated dimensions and digest of `bmp`.
        info: BmpInfo,
    },
    /// Moves an existing plot to `(x0, y0)`.
    RetryClaim {
        /// New left edge.
        x0: u16,
        /// New top edge.
        y0: u16,
    },
    /// Replaces a plot's image (same dimensions, same position).
    Update {
        /// Must equal the plot's current left edge.
        x0: u16,
        /// Must equal the plot's current top edge.
        y0: u16,
        /// New link, possibly empty.
        uri: String,
        /// Raw replacement image bytes.
        bmp: Vec<u8>,
        /// Validated dimensions and digest of `bmp`.
        info: BmpInfo,
    },
}

impl Payload {
    /// Builds a CLAIM payload, validating the image and the placement.
    pub fn claim(x0: u16, y0: u16, uri: String, bmp: Vec<u8>) -> Result<Self, EncodeError> {
        let info = bmp::validate(&bmp)?;
        if !in_bounds(x0, y0, info.width, info.height) {
            return Err(EncodeError::OutOfBounds);
        }
        Ok(Payload::Claim { x0, y0, uri, bmp, info })
    }

    /// Builds a RETRY-CLAIM payload.
    pub fn retry_claim(x0: u16, y0: u16) -> Self { Payload::RetryClaim { x0, y0 } }

    /// Builds an UPDATE payload, validating the image and the placement.
    pub fn update(x0: u16, y0: u16, uri: String, bmp: Vec<u8>) -> Result<Self, EncodeError> {
        let info = bmp::validate(&bmp)?;
        if !in_bounds(x0, y0, info.width, info.height) {
            return Err(EncodeError::OutOfBounds);
        }
        Ok(Payload::Update { x0, y0, uri, bmp, info })
    }

    /// Serializes the payload to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let (ty, x0, y0) = match *self {
            Payload::Claim { x0, y0, .. } => (TYPE_CLAIM, x0, y0),
            Payload::RetryClaim { x0, y0 } => (TYPE_RETRY_CLAIM, x0, y0),
            Payload::Update { x0, y0, .. } => (TYPE_UPDATE, x0, y0),
        };

        let mut out = vec![MAGIC[0], MAGIC[1], VERSION, ty];
        out.extend_from_slice(&x0.to_le_bytes());
        out.extend_from_slice(&y0.to_le_bytes());

        if let Payload::Claim { uri, bmp, .. } | Payload::Update { uri, bmp, .. } = self {
            let cbor = minicbor::to_vec(uri.as_str()).expect("encoding to Vec is infallible");
            out.extend_from_slice(&cbor);
            out.extend_from_slice(bmp);
        }
        out
    }

    /// Builds the `OP_RETURN` script carrying this payload.
    pub fn to_script(&self) -> ScriptBuf {
        let data = PushBytesBuf::try_from(self.encode()).expect("payload length fits u32");
        script::Builder::new().push_opcode(OP_RETURN).push_slice(data).into_script()
    }

    /// Deserializes a payload from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        use DecodeError as E;

        if bytes.len() < 2 {
            return Err(E::Truncated);
        }
        if bytes[0..2] != MAGIC {
            return Err(E::BadMagic([bytes[0], bytes[1]]));
        }
        if bytes.len() < 4 {
            return Err(E::Truncated);
        }
        if bytes[2] != VERSION {
            return Err(E::UnknownVersion(bytes[2]));
        }

        let ty = bytes[3];
        let body = &bytes[4..];
        if body.len() < 4 {
            return Err(E::Truncated);
        }
        let x0 = u16::from_le_bytes([body[0], body[1]]);
        let y0 = u16::from_le_bytes([body[2], body[3]]);

        match ty {
            TYPE_RETRY_CLAIM => Ok(Payload::RetryClaim { x0, y0 }),
            TYPE_CLAIM | TYPE_UPDATE => {
                let rest = &body[4..];
                let (uri, consumed) = decode_uri(rest)?;
                let bmp = rest[consumed..].to_vec();
                let info = bmp::validate(&bmp)?;
                if ty == TYPE_CLAIM {
                    Ok(Payload::Claim { x0, y0, uri, bmp, info })
                } else {
                    Ok(Payload::Update { x0, y0, uri, bmp, info })
                }
            }
            other => Err(E::UnknownType(other)),
        }
    }

    /// Extracts the raw payload bytes carried by an `OP_RETURN` script.
    ///
    /// The payload is the concatenation of the script's data pushes. Returns
    /// `None` for non-`OP_RETURN` scripts and for scripts containing anything
    /// other than data pushes after the `OP_RETURN` opcode.
    pub fn extract(script: &Script) -> Option<Vec<u8>> {
        if !script.is_op_return() {
            return None;
        }
        let mut instructions = script.instructions();
        match instructions.next() {
            Some(Ok(Instruction::Op(OP_RETURN))) => {}
            _ => return None,
        }
        let mut data = Vec::new();
        for instruction in instructions {
            match instruction {
                Ok(Instruction::PushBytes(push)) => data.extend_from_slice(push.as_bytes()),
                _ => return None,
            }
        }
        Some(data)
    }
}

/// Decodes the CBOR text string at the head of `bytes`.
///
/// Accepts definite-length short and long forms; indefinite-length strings
/// are rejected. Returns the string and the number of bytes consumed.
fn decode_uri(bytes: &[u8]) -> Result<(String, usize), DecodeError> {
    let mut decoder = minicbor::Decoder::new(bytes);
    match decoder.str() {
        Ok(uri) => Ok((uri.to_owned(), decoder.position())),
        Err(e) if e.is_end_of_input() => Err(DecodeError::Truncated),
        Err(_) => Err(DecodeError::InvalidUri),
    }
}

/// Error building a payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeError {
    /// The embedded image failed validation.
    InvalidBmp(BmpError),
    /// The placement would exceed the canvas.
    OutOfBounds,
}

impl From<BmpError> for EncodeError {
    fn from(e: BmpError) -> Self { EncodeError::InvalidBmp(e) }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EncodeError::InvalidBmp(ref e) => write!(f, "invalid BMP: {}", e),
            EncodeError::OutOfBounds => write!(f, "placement would exceed the canvas"),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            EncodeError::InvalidBmp(ref e) => Some(e),
            EncodeError::OutOfBounds => None,
        }
    }
}

/// Error decoding a payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The first two bytes are not the protocol magic.
    BadMagic([u8; 2]),
    /// Unsupported protocol version byte.
    UnknownVersion(u8),
    /// Unsupported payload type byte.
    UnknownType(u8),
    /// The payload ends before a required field.
    Truncated,
    /// The URI is not a definite-length CBOR text string.
    InvalidUri,
    /// The embedded image failed validation.
    InvalidBmp(BmpError),
}

impl From<BmpError> for DecodeError {
    fn from(e: BmpError) -> Self { DecodeError::InvalidBmp(e) }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DecodeError as E;

        match *self {
            E::BadMagic(got) => write!(f, "bad magic bytes {:02x}{:02x}", got[0], got[1]),
            E::UnknownVersion(v) => write!(f, "unknown protocol version {:#04x}", v),
            E::UnknownType(t) => write!(f, "unknown payload type {:#04x}", t),
            E::Truncated => write!(f, "payload truncated"),
            E::InvalidUri => write!(f, "URI is not a definite-length CBOR text string"),
            E::InvalidBmp(ref e) => write!(f, "invalid BMP: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            DecodeError::InvalidBmp(ref e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash as _;

    use super::*;

    /// Builds a minimal valid bottom-up 24-bit BMP.
    fn bmp(width: i32, height: i32) -> Vec<u8> {
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
        out.resize(file_len, 0);
        out
    }

    #[test]
    fn claim_round_trip() {
        let payload =
            Payload::claim(100, 200, "https://example.com/plot".into(), bmp(10, 10)).unwrap();
        let decoded = Payload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn update_round_trip() {
        let payload = Payload::update(0, 0, String::new(), bmp(3, 5)).unwrap();
        let decoded = Payload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn retry_claim_round_trip() {
        let payload = Payload::retry_claim(65_535, 0);
        let decoded = Payload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn empty_uri_encodes_as_single_byte() {
        let payload = Payload::claim(0, 0, String::new(), bmp(1, 1)).unwrap();
        let bytes = payload.encode();
        // magic(2) + version + type + coords(4), then the empty text string.
        assert_eq!(bytes[8], 0x60);
    }

    #[test]
    fn claim_out_of_bounds_rejected_at_build_time() {
        assert_eq!(
            Payload::claim(65_534, 0, String::new(), bmp(3, 2)).unwrap_err(),
            EncodeError::OutOfBounds,
        );
    }

    #[test]
    fn claim_at_far_corner_accepted() {
        assert!(Payload::claim(65_535, 65_535, String::new(), bmp(1, 1)).is_ok());
        assert!(Payload::claim(65_534, 65_534, String::new(), bmp(2, 2)).is_ok());
    }

    #[test]
    fn bad_magic() {
        let mut bytes = Payload::retry_claim(1, 2).encode();
        bytes[0] = 0xff;
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::BadMagic([0xff, 0x37])));
    }

    #[test]
    fn unknown_version() {
        let mut bytes = Payload::retry_claim(1, 2).encode();
        bytes[2] = 0x02;
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::UnknownVersion(0x02)));
    }

    #[test]
    fn unknown_type() {
        let mut bytes = Payload::retry_claim(1, 2).encode();
        bytes[3] = 0x09;
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::UnknownType(0x09)));
    }

    #[test]
    fn truncated_coords() {
        let bytes = [MAGIC[0], MAGIC[1], VERSION, TYPE_RETRY_CLAIM, 0x01];
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn truncated_uri() {
        // Claim with coords but nothing after them.
        let bytes = [MAGIC[0], MAGIC[1], VERSION, TYPE_CLAIM, 0, 0, 0, 0];
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn indefinite_length_uri_rejected() {
        let mut bytes = vec![MAGIC[0], MAGIC[1], VERSION, TYPE_CLAIM, 0, 0, 0, 0];
        // 0x7f opens an indefinite-length text string, 0xff closes it.
        bytes.extend_from_slice(&[0x7f, 0x61, b'a', 0xff]);
        bytes.extend_from_slice(&bmp(1, 1));
        assert_eq!(Payload::decode(&bytes), Err(DecodeError::InvalidUri));
    }

    #[test]
    fn long_form_definite_uri_accepted() {
        let uri = "u".repeat(300); // Needs a two-byte length (0x79).
        let payload = Payload::claim(5, 5, uri.clone(), bmp(2, 2)).unwrap();
        match Payload::decode(&payload.encode()).unwrap() {
            Payload::Claim { uri: decoded, .. } => assert_eq!(decoded, uri),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn garbage_bmp_rejected() {
        let mut bytes = vec![MAGIC[0], MAGIC[1], VERSION, TYPE_UPDATE, 0, 0, 0, 0, 0x60];
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(Payload::decode(&bytes), Err(DecodeError::InvalidBmp(_))));
    }

    #[test]
    fn script_round_trip() {
        let payload = Payload::claim(7, 9, "x".into(), bmp(4, 4)).unwrap();
        let script = payload.to_script();
        let extracted = Payload::extract(&script).unwrap();
        assert_eq!(Payload::decode(&extracted).unwrap(), payload);
    }

    #[test]
    fn extract_ignores_non_op_return() {
        let script = bitcoin::ScriptBuf::new_p2wsh(&bitcoin::WScriptHash::all_zeros());
        assert_eq!(Payload::extract(&script), None);
    }
}
