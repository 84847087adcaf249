use thiserror::Error;

use super::BoundsExceeded;

pub trait Decode: Sized {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;

	// Helper function to make sure we have enough bytes to decode
	fn decode_remaining<B: bytes::Buf>(buf: &mut B, required: usize) -> Result<(), DecodeError> {
		let needed = required.saturating_sub(buf.remaining());
		if needed > 0 {
			Err(DecodeError::More(needed))
		} else {
			Ok(())
		}
	}
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	/// At least this many more bytes are needed; nothing was consumed.
	#[error("fill buffer")]
	More(usize),

	#[error("invalid stream type: {0:#x}")]
	InvalidStreamType(u64),

	#[error("unexpected stream type: {0:#x}")]
	UnexpectedStreamType(u64),

	#[error("frame too large: {0}")]
	FrameTooLarge(u64),

	#[error("bounds exceeded")]
	BoundsExceeded,
}

impl From<BoundsExceeded> for DecodeError {
	fn from(_: BoundsExceeded) -> Self {
		Self::BoundsExceeded
	}
}

impl DecodeError {
	/// Returns true if the error only means "wait for more bytes".
	pub fn is_short(&self) -> bool {
		matches!(self, Self::More(_))
	}
}
