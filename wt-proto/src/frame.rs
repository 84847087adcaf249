//! Length-prefixed application frames carried on raw WebTransport streams.
//!
//! The prefix is WebSocket style rather than a varint:
//! a length below 126 is a single byte, 126 is followed by a u16 length and 127 by a u64 length.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::coding::{Decode, DecodeError, Encode};

const LEN_U16: u8 = 126;
const LEN_U64: u8 = 127;

/// The length prefix of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
	pub size: u64,
}

impl Decode for FrameHeader {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_remaining(r, 1)?;

		let size = match r.chunk()[0] {
			LEN_U16 => {
				Self::decode_remaining(r, 3)?;
				r.advance(1);
				r.get_u16() as u64
			}
			LEN_U64 => {
				Self::decode_remaining(r, 9)?;
				r.advance(1);
				r.get_u64()
			}
			size => {
				r.advance(1);
				size as u64
			}
		};

		Ok(Self { size })
	}
}

impl Encode for FrameHeader {
	fn encode<W: BufMut>(&self, w: &mut W) {
		if self.size < LEN_U16 as u64 {
			w.put_u8(self.size as u8);
		} else if self.size <= u16::MAX as u64 {
			w.put_u8(LEN_U16);
			w.put_u16(self.size as u16);
		} else {
			w.put_u8(LEN_U64);
			w.put_u64(self.size);
		}
	}

	fn encode_size(&self) -> usize {
		if self.size < LEN_U16 as u64 {
			1
		} else if self.size <= u16::MAX as u64 {
			3
		} else {
			9
		}
	}
}

/// Encode a payload as a single frame.
pub fn encode_frame<W: BufMut>(payload: &[u8], w: &mut W) {
	FrameHeader {
		size: payload.len() as u64,
	}
	.encode(w);
	w.put_slice(payload);
}

/// Reassembles frames from arbitrarily fragmented reads.
///
/// Bytes are appended with [Self::push] and complete frames are pulled with [Self::next_frame].
/// A frame is only emitted once its prefix and entire payload are buffered.
pub struct FrameDecoder {
	buffer: BytesMut,
	max_size: u64,
}

impl FrameDecoder {
	/// The default limit on a single frame.
	pub const MAX_SIZE: u64 = 16 * 1024 * 1024;

	pub fn new(max_size: u64) -> Self {
		Self {
			buffer: BytesMut::new(),
			max_size,
		}
	}

	/// Append bytes received from the network.
	pub fn push(&mut self, data: &[u8]) {
		self.buffer.extend_from_slice(data);
	}

	/// Pop the next complete frame, or `None` if more bytes are needed.
	pub fn next_frame(&mut self) -> Result<Option<Bytes>, DecodeError> {
		// Decode through a cursor so a short read leaves the buffer exactly as it was.
		let mut cursor = io::Cursor::new(&self.buffer[..]);

		let header = match FrameHeader::decode(&mut cursor) {
			Ok(header) => header,
			Err(err) if err.is_short() => return Ok(None),
			Err(err) => return Err(err),
		};

		if header.size > self.max_size {
			return Err(DecodeError::FrameTooLarge(header.size));
		}

		let prefix = cursor.position() as usize;
		let size = header.size as usize;

		if cursor.remaining() < size {
			return Ok(None);
		}

		self.buffer.advance(prefix);
		Ok(Some(self.buffer.split_to(size).freeze()))
	}

	/// The number of buffered bytes not yet emitted as a frame.
	pub fn buffered(&self) -> usize {
		self.buffer.len()
	}
}

impl Default for FrameDecoder {
	fn default() -> Self {
		Self::new(Self::MAX_SIZE)
	}
}
