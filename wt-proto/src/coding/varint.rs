// Based on quinn-proto
// https://github.com/quinn-rs/quinn/blob/main/quinn-proto/src/varint.rs
// Licensed via Apache 2.0 and MIT

use std::convert::{TryFrom, TryInto};
use std::fmt;

use thiserror::Error;

use super::{Decode, DecodeError, Encode};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("value out of range")]
pub struct BoundsExceeded;

/// An integer less than 2^62
///
/// Values of this type are suitable for encoding as QUIC variable-length integer.
/// The two high bits of the first byte select a width of 1, 2, 4 or 8 bytes.
#[derive(Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest possible value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The smallest possible value.
	pub const ZERO: Self = Self(0);

	/// Construct a `VarInt` infallibly using the largest available type.
	/// Larger values need to use `try_from` instead.
	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	/// Extract the integer value
	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes needed to encode a varint, given its first byte.
	pub const fn size_of_tag(first: u8) -> usize {
		1 << (first >> 6)
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self(x.into())
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^62
	fn try_from(x: u64) -> Result<Self, BoundsExceeded> {
		let x = Self(x);
		if x <= Self::MAX {
			Ok(x)
		} else {
			Err(BoundsExceeded)
		}
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^62
	fn try_from(x: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(x as u64)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	/// Decode a varint from the given reader.
	///
	/// Nothing is consumed unless the entire varint is available.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		Self::decode_remaining(r, 1)?;

		let first = r.chunk()[0];
		let size = Self::size_of_tag(first);
		Self::decode_remaining(r, size)?;

		let mut buf = [0u8; 8];
		r.copy_to_slice(&mut buf[..size]);
		buf[0] &= 0b0011_1111;

		let x = match size {
			1 => u64::from(buf[0]),
			2 => u64::from(u16::from_be_bytes([buf[0], buf[1]])),
			4 => u64::from(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
			_ => u64::from_be_bytes(buf),
		};

		Ok(Self(x))
	}
}

impl Encode for VarInt {
	/// Encode a varint to the given writer.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		match self.encode_size() {
			1 => w.put_u8(self.0 as u8),
			2 => w.put_u16(0b01 << 14 | self.0 as u16),
			4 => w.put_u32(0b10 << 30 | self.0 as u32),
			_ => w.put_u64(0b11 << 62 | self.0),
		}
	}

	fn encode_size(&self) -> usize {
		if self.0 < 2u64.pow(6) {
			1
		} else if self.0 < 2u64.pow(14) {
			2
		} else if self.0 < 2u64.pow(30) {
			4
		} else {
			8
		}
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(|v| v.into_inner())
	}
}

/// Encode a raw integer as a varint, failing if it doesn't fit in 62 bits.
pub fn encode_varint<W: bytes::BufMut>(x: u64, w: &mut W) -> Result<(), BoundsExceeded> {
	let v: VarInt = x.try_into()?;
	v.encode(w);
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use bytes::{Buf, BytesMut};

	fn encode(x: u64) -> BytesMut {
		let mut buf = BytesMut::new();
		encode_varint(x, &mut buf).unwrap();
		buf
	}

	#[test]
	fn minimal_width() {
		let cases = [
			(0, 1),
			(63, 1),
			(64, 2),
			(16_383, 2),
			(16_384, 4),
			(1_073_741_823, 4),
			(1_073_741_824, 8),
			(VarInt::MAX.into_inner(), 8),
		];

		for (value, width) in cases {
			let mut buf = encode(value);
			assert_eq!(buf.len(), width, "width of {value}");

			let decoded = VarInt::decode(&mut buf).unwrap();
			assert_eq!(decoded.into_inner(), value);
			assert!(buf.is_empty(), "consumed exactly {width} bytes");
		}
	}

	#[test]
	fn known_encodings() {
		// Examples from RFC 9000 appendix A.1
		assert_eq!(encode(37).to_vec(), vec![0x25]);
		assert_eq!(encode(15_293).to_vec(), vec![0x7b, 0xbd]);
		assert_eq!(encode(494_878_333).to_vec(), vec![0x9d, 0x7f, 0x3e, 0x7d]);
		assert_eq!(
			encode(151_288_809_941_952_652).to_vec(),
			vec![0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
		);

		// The WebTransport stream signals.
		assert_eq!(encode(0x41).to_vec(), vec![0x40, 0x41]);
		assert_eq!(encode(0x54).to_vec(), vec![0x40, 0x54]);
	}

	#[test]
	fn out_of_range() {
		let mut buf = BytesMut::new();
		assert_eq!(encode_varint(1 << 62, &mut buf), Err(BoundsExceeded));
		assert_eq!(encode_varint(u64::MAX, &mut buf), Err(BoundsExceeded));
		assert!(buf.is_empty());
	}

	#[test]
	fn short_input_is_untouched() {
		for value in [0x41, 16_384, VarInt::MAX.into_inner()] {
			let full = encode(value);

			for len in 0..full.len() {
				let mut cursor = std::io::Cursor::new(&full[..len]);
				match VarInt::decode(&mut cursor) {
					Err(DecodeError::More(needed)) => assert!(needed > 0),
					other => panic!("expected More for {len} bytes, got {other:?}"),
				}
				assert_eq!(cursor.position(), 0, "cursor moved on a short read");
				assert_eq!(cursor.remaining(), len);
			}
		}
	}
}
