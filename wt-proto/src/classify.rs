//! Disambiguate HTTP/3 request streams from raw WebTransport streams.
//!
//! A bidirectional stream carries no out-of-band signal about its protocol family.
//! HTTP/3 frame types used on request streams are single byte varints (<= 0x0D),
//! while a raw WebTransport stream always starts with the two byte varint 0x4041.

/// HTTP/3 frame types that may start a request stream, encoded as single byte varints.
pub const HTTP3_FRAME_TYPES: [u8; 7] = [
	0x00, // DATA
	0x01, // HEADERS
	0x03, // CANCEL_PUSH
	0x04, // SETTINGS
	0x05, // PUSH_PROMISE
	0x07, // GOAWAY
	0x0d, // MAX_PUSH_ID
];

/// The leading bytes of a raw WebTransport bidirectional stream (varint 0x41).
pub const WEBTRANSPORT_BIDI_SIGNAL: [u8; 2] = [0x40, 0x41];

/// The protocol family of a stream, decided from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
	/// A standard HTTP/3 request stream.
	Http3,

	/// A raw WebTransport bidirectional stream.
	WebTransport,

	/// Neither; the bytes are passed through untouched.
	Unknown,
}

/// Decide the protocol family from the bytes received so far.
///
/// Returns `None` when more bytes are required before a decision can be made.
pub fn classify(prefix: &[u8]) -> Option<Protocol> {
	let first = *prefix.first()?;

	if HTTP3_FRAME_TYPES.contains(&first) {
		return Some(Protocol::Http3);
	}

	let second = *prefix.get(1)?;

	if [first, second] == WEBTRANSPORT_BIDI_SIGNAL {
		Some(Protocol::WebTransport)
	} else {
		Some(Protocol::Unknown)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn http3() {
		for first in HTTP3_FRAME_TYPES {
			assert_eq!(classify(&[first]), Some(Protocol::Http3));
			assert_eq!(classify(&[first, 0xff]), Some(Protocol::Http3));
		}

		assert_eq!(classify(&[0x04, 0x41]), Some(Protocol::Http3));
	}

	#[test]
	fn webtransport() {
		assert_eq!(classify(&[0x40, 0x41]), Some(Protocol::WebTransport));
		assert_eq!(classify(&[0x40, 0x41, 0x00, 0x05]), Some(Protocol::WebTransport));
	}

	#[test]
	fn pending() {
		assert_eq!(classify(&[]), None);

		// Could still become WebTransport or unknown.
		assert_eq!(classify(&[0x40]), None);
		assert_eq!(classify(&[0x02]), None);
	}

	#[test]
	fn unknown() {
		// Unidirectional WebTransport never shows up on a bidirectional stream.
		assert_eq!(classify(&[0x40, 0x54]), Some(Protocol::Unknown));
		assert_eq!(classify(&[0x02, 0x00]), Some(Protocol::Unknown));
		assert_eq!(classify(b"GET"), Some(Protocol::Unknown));
	}
}
