//! The per-stream state machine.
//!
//! A stream starts out sniffing its leading bytes, then commits to exactly one handler chain for its lifetime.
//! Leaving the sniffing state is the only transition that inspects the prefix, so classification can't run twice.

use std::mem;

use bytes::{Bytes, BytesMut};
use wt_proto::coding::DecodeError;
use wt_proto::{classify, FrameDecoder, Protocol, StreamHeader, StreamType};

/// Bytes handed back to the substrate untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
	/// Destined for the HTTP/3 request codec.
	Http3(Bytes),

	/// Neither protocol; passed through unmodified.
	PassThrough(Bytes),
}

/// The result of feeding one chunk into a [Pipeline].
#[derive(Debug, Default)]
pub struct Output {
	pub forward: Option<Forward>,

	/// Set exactly once, on the chunk that completes the prologue.
	pub header: Option<StreamHeader>,

	/// Complete application frames, in stream order.
	pub frames: Vec<Bytes>,
}

enum Raw {
	Header {
		expected: StreamType,
		buffer: BytesMut,
		max_frame_size: u64,
	},
	Body {
		header: StreamHeader,
		frames: FrameDecoder,
	},
}

impl Raw {
	fn new(expected: StreamType, max_frame_size: u64) -> Self {
		Self::Header {
			expected,
			buffer: BytesMut::new(),
			max_frame_size,
		}
	}

	fn push(&mut self, data: &[u8]) -> Result<Output, DecodeError> {
		let mut output = Output::default();

		match self {
			Self::Header {
				expected,
				buffer,
				max_frame_size,
			} => {
				buffer.extend_from_slice(data);

				let header = match StreamHeader::parse(buffer, *expected)? {
					Some(header) => header,
					None => return Ok(output),
				};

				// Whatever followed the prologue is the start of the payload.
				let mut frames = FrameDecoder::new(*max_frame_size);
				frames.push(&buffer[..]);

				output.header = Some(header);
				*self = Self::Body { header, frames };
			}
			Self::Body { frames, .. } => frames.push(data),
		}

		if let Self::Body { frames, .. } = self {
			while let Some(frame) = frames.next_frame()? {
				output.frames.push(frame);
			}
		}

		Ok(output)
	}
}

enum State {
	Sniffing(BytesMut),
	Http3,
	RawWebTransport(Raw),
	PassThrough,
}

pub struct Pipeline {
	state: State,
	max_frame_size: u64,
}

impl Pipeline {
	/// A bidirectional stream, which could be HTTP/3 or raw WebTransport.
	pub fn bi(max_frame_size: u64) -> Self {
		Self {
			state: State::Sniffing(BytesMut::new()),
			max_frame_size,
		}
	}

	/// A unidirectional stream, which always starts with a WebTransport prologue.
	pub fn uni(max_frame_size: u64) -> Self {
		Self {
			state: State::RawWebTransport(Raw::new(StreamType::Uni, max_frame_size)),
			max_frame_size,
		}
	}

	/// Feed the next chunk of stream bytes.
	///
	/// An error means the peer violated the protocol and the stream should be closed.
	pub fn push(&mut self, chunk: Bytes) -> Result<Output, DecodeError> {
		match &mut self.state {
			State::Sniffing(prefix) => {
				prefix.extend_from_slice(&chunk);

				let protocol = match classify(prefix) {
					Some(protocol) => protocol,
					None => return Ok(Output::default()),
				};

				let prefix = mem::take(prefix);
				tracing::debug!(?protocol, "classified stream");

				match protocol {
					Protocol::Http3 => {
						self.state = State::Http3;
						Ok(Output::forward(Forward::Http3(prefix.freeze())))
					}
					Protocol::Unknown => {
						self.state = State::PassThrough;
						Ok(Output::forward(Forward::PassThrough(prefix.freeze())))
					}
					Protocol::WebTransport => {
						let mut raw = Raw::new(StreamType::Bi, self.max_frame_size);
						let output = raw.push(&prefix);
						self.state = State::RawWebTransport(raw);
						output
					}
				}
			}
			State::Http3 => Ok(Output::forward(Forward::Http3(chunk))),
			State::PassThrough => Ok(Output::forward(Forward::PassThrough(chunk))),
			State::RawWebTransport(raw) => raw.push(&chunk),
		}
	}

	/// The protocol family, once decided.
	pub fn protocol(&self) -> Option<Protocol> {
		match self.state {
			State::Sniffing(_) => None,
			State::Http3 => Some(Protocol::Http3),
			State::RawWebTransport(_) => Some(Protocol::WebTransport),
			State::PassThrough => Some(Protocol::Unknown),
		}
	}

	/// The WebTransport prologue, once parsed.
	pub fn header(&self) -> Option<StreamHeader> {
		match &self.state {
			State::RawWebTransport(Raw::Body { header, .. }) => Some(*header),
			_ => None,
		}
	}
}

impl Output {
	fn forward(forward: Forward) -> Self {
		Self {
			forward: Some(forward),
			..Default::default()
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	use bytes::BufMut;
	use wt_proto::coding::{Encode, VarInt};
	use wt_proto::encode_frame;

	fn raw(typ: StreamType, session_id: u32, payloads: &[&[u8]]) -> Vec<u8> {
		let mut buf = Vec::new();
		StreamHeader {
			typ,
			session_id: VarInt::from_u32(session_id),
		}
		.encode(&mut buf);

		for payload in payloads {
			encode_frame(payload, &mut buf);
		}

		buf
	}

	#[test]
	fn http3() {
		let mut pipeline = Pipeline::bi(FrameDecoder::MAX_SIZE);

		let output = pipeline.push(Bytes::from_static(&[0x04, 0x99])).unwrap();
		assert_eq!(output.forward, Some(Forward::Http3(Bytes::from_static(&[0x04, 0x99]))));
		assert_eq!(pipeline.protocol(), Some(Protocol::Http3));

		// Later bytes are never sniffed again, even if they look like WebTransport.
		let output = pipeline.push(Bytes::from_static(&[0x40, 0x41])).unwrap();
		assert_eq!(output.forward, Some(Forward::Http3(Bytes::from_static(&[0x40, 0x41]))));
		assert!(output.header.is_none());
	}

	#[test]
	fn pass_through() {
		let mut pipeline = Pipeline::bi(FrameDecoder::MAX_SIZE);

		// A single byte is not enough to decide.
		let output = pipeline.push(Bytes::from_static(&[0x40])).unwrap();
		assert!(output.forward.is_none());
		assert_eq!(pipeline.protocol(), None);

		// The buffered byte is not lost.
		let output = pipeline.push(Bytes::from_static(&[0x42, 0x01])).unwrap();
		assert_eq!(
			output.forward,
			Some(Forward::PassThrough(Bytes::from_static(&[0x40, 0x42, 0x01])))
		);
		assert_eq!(pipeline.protocol(), Some(Protocol::Unknown));
	}

	#[test]
	fn webtransport_one_byte_at_a_time() {
		let data = raw(StreamType::Bi, 4, &[b"hello", b"", b"world"]);
		let mut pipeline = Pipeline::bi(FrameDecoder::MAX_SIZE);

		let mut headers = Vec::new();
		let mut frames = Vec::new();

		for byte in data {
			let output = pipeline.push(Bytes::copy_from_slice(&[byte])).unwrap();
			assert!(output.forward.is_none());
			headers.extend(output.header);
			frames.extend(output.frames);
		}

		assert_eq!(headers.len(), 1, "rewired more than once");
		assert_eq!(headers[0].session_id.into_inner(), 4);
		assert_eq!(pipeline.header(), Some(headers[0]));
		assert_eq!(frames, vec![&b"hello"[..], &b""[..], &b"world"[..]]);
	}

	#[test]
	fn webtransport_single_read() {
		let data = raw(StreamType::Bi, 8, &[b"a", b"bc"]);
		let mut pipeline = Pipeline::bi(FrameDecoder::MAX_SIZE);

		let output = pipeline.push(data.into()).unwrap();
		assert_eq!(output.header.unwrap().session_id.into_inner(), 8);
		assert_eq!(output.frames, vec![&b"a"[..], &b"bc"[..]]);
	}

	#[test]
	fn uni_skips_sniffing() {
		let data = raw(StreamType::Uni, 0, &[b"x"]);
		let mut pipeline = Pipeline::uni(FrameDecoder::MAX_SIZE);
		assert_eq!(pipeline.protocol(), Some(Protocol::WebTransport));

		let output = pipeline.push(data.into()).unwrap();
		assert_eq!(output.header.unwrap().typ, StreamType::Uni);
		assert_eq!(output.frames, vec![&b"x"[..]]);
	}

	#[test]
	fn wrong_stream_type() {
		let data = raw(StreamType::Bi, 0, &[]);
		let mut pipeline = Pipeline::uni(FrameDecoder::MAX_SIZE);

		assert_eq!(
			pipeline.push(data.into()).unwrap_err(),
			DecodeError::UnexpectedStreamType(StreamType::BI)
		);
	}

	#[test]
	fn frame_too_large() {
		let mut data = raw(StreamType::Bi, 0, &[]);
		data.put_u8(126);
		data.put_u16(1000);

		let mut pipeline = Pipeline::bi(999);
		assert_eq!(pipeline.push(data.into()).unwrap_err(), DecodeError::FrameTooLarge(1000));
	}
}
