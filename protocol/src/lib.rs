// SPDX-License-Identifier: CC0-1.0

//! # Pixelplot protocol core.
//!
//! A metaprotocol layered on top of Bitcoin that awards ownership of
//! rectangular image plots on a fixed 65,536 x 65,536 pixel canvas. A plot is
//! controlled by its *deed*: an unspent output of value exactly 600 satoshis.
//! Protocol payloads ride in `OP_RETURN` outputs; spending a deed without
//! producing a valid successor permanently bricks the plot.
//!
//! This crate is the pure core: it never performs I/O. It provides
//!
//! * [`bmp`] - validation of plot images (classic Windows BMP only).
//! * [`payload`] - the `OP_RETURN` envelope codec.
//! * [`classify`] - classification of chain transactions against the live
//!   deed set.
//! * [`state`] - the per-block canvas state transition.
//! * [`record`] - the consumer-facing (and on-disk) state record.

pub mod bmp;
pub mod classify;
pub mod payload;
pub mod record;
pub mod state;

use bitcoin::Amount;

#[rustfmt::skip]
#[doc(inline)]
pub use self::{
    bmp::{BmpError, BmpInfo},
    classify::{classify, DeedLookup, TxEvent},
    payload::{DecodeError, EncodeError, Payload},
    record::{RecordError, StateRecord},
    state::{CanvasState, Plot, PlotStatus},
};

/// Width and height of the canvas, in pixels.
pub const CANVAS_SIZE: u32 = 65_536;

/// The output value that marks an output as a plot deed.
pub const DEED_VALUE: Amount = Amount::from_sat(600);

/// Whether a `w` x `h` rectangle anchored at `(x0, y0)` lies fully on the canvas.
pub(crate) fn in_bounds(x0: u16, y0: u16, width: u32, height: u32) -> bool {
    u64::from(x0) + u64::from(width) <= u64::from(CANVAS_SIZE)
        && u64::from(y0) + u64::from(height) <= u64::from(CANVAS_SIZE)
}
