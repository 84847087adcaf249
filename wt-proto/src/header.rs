use std::io;

use bytes::{Buf, BytesMut};

use crate::coding::{Decode, DecodeError, Encode, VarInt};

/// The type of a raw WebTransport stream, sent as the first varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
	/// A session-bound bidirectional stream.
	Bi,

	/// A unidirectional stream.
	Uni,
}

impl StreamType {
	pub const BI: u64 = 0x41;
	pub const UNI: u64 = 0x54;

	pub fn code(&self) -> u64 {
		match self {
			Self::Bi => Self::BI,
			Self::Uni => Self::UNI,
		}
	}
}

impl TryFrom<u64> for StreamType {
	type Error = DecodeError;

	fn try_from(code: u64) -> Result<Self, Self::Error> {
		match code {
			Self::BI => Ok(Self::Bi),
			Self::UNI => Ok(Self::Uni),
			_ => Err(DecodeError::InvalidStreamType(code)),
		}
	}
}

/// The prologue of a raw WebTransport stream: `{streamType, sessionId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
	pub typ: StreamType,
	pub session_id: VarInt,
}

impl StreamHeader {
	/// Consume the header from the front of `buf`, leaving any payload behind.
	///
	/// Returns `Ok(None)` when the header is incomplete, in which case `buf` is untouched.
	/// A truncated session id never leaves the stream type half consumed.
	pub fn parse(buf: &mut BytesMut, expected: StreamType) -> Result<Option<Self>, DecodeError> {
		let mut cursor = io::Cursor::new(&buf[..]);

		let header = match Self::decode(&mut cursor) {
			Ok(header) => header,
			Err(err) if err.is_short() => return Ok(None),
			Err(err) => return Err(err),
		};

		if header.typ != expected {
			return Err(DecodeError::UnexpectedStreamType(header.typ.code()));
		}

		let size = cursor.position() as usize;
		buf.advance(size);

		Ok(Some(header))
	}
}

impl Decode for StreamHeader {
	fn decode<R: Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let typ = StreamType::try_from(u64::decode(r)?)?;
		let session_id = VarInt::decode(r)?;

		Ok(Self { typ, session_id })
	}
}

impl Encode for StreamHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		VarInt::from(self.typ.code() as u32).encode(w);
		self.session_id.encode(w);
	}

	fn encode_size(&self) -> usize {
		VarInt::from(self.typ.code() as u32).encode_size() + self.session_id.encode_size()
	}
}
