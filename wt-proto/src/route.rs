use bytes::BufMut;

use crate::coding::EncodeError;

/// The routing header written first on a server-initiated push stream.
///
/// A single length byte followed by the UTF-8 path, so the client can route the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHeader<'a> {
	pub path: &'a str,
}

impl<'a> RouteHeader<'a> {
	pub const MAX_PATH: usize = u8::MAX as usize;

	pub fn new(path: &'a str) -> Result<Self, EncodeError> {
		if path.len() > Self::MAX_PATH {
			return Err(EncodeError::PathTooLong(path.len()));
		}

		Ok(Self { path })
	}

	pub fn encode<W: BufMut>(&self, w: &mut W) {
		w.put_u8(self.path.len() as u8);
		w.put_slice(self.path.as_bytes());
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn encode() {
		let mut buf = Vec::new();
		RouteHeader::new("/news").unwrap().encode(&mut buf);
		assert_eq!(buf, b"\x05/news");

		let mut buf = Vec::new();
		RouteHeader::new("").unwrap().encode(&mut buf);
		assert_eq!(buf, vec![0]);
	}

	#[test]
	fn too_long() {
		let path = "a".repeat(256);
		assert_eq!(RouteHeader::new(&path), Err(EncodeError::PathTooLong(256)));
		assert!(RouteHeader::new(&path[..255]).is_ok());
	}
}
