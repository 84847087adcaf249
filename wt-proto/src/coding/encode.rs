use thiserror::Error;

use super::BoundsExceeded;

pub trait Encode: Sized {
	// Encode the value to the given writer.
	// This will panic if the Buf is not large enough; use a Vec or BytesMut.
	fn encode<W: bytes::BufMut>(&self, w: &mut W);

	// Return the size of the encoded value
	fn encode_size(&self) -> usize;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
	#[error("varint too large")]
	BoundsExceeded(#[from] BoundsExceeded),

	#[error("path too long: {0} bytes")]
	PathTooLong(usize),
}
