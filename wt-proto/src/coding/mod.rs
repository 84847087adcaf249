//! This module contains encoding and decoding helpers.

mod decode;
mod encode;
mod varint;

pub use decode::*;
pub use encode::*;
pub use varint::*;
