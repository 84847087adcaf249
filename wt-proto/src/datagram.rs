use bytes::{BufMut, Bytes};

use crate::coding::{BoundsExceeded, Decode, DecodeError, Encode, VarInt};

/// The correlation id written on datagrams sent by the server.
pub const REPLY_CORRELATION: VarInt = VarInt::ZERO;

/// An inbound datagram, split into its session and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
	/// The quarter stream id, which is the session id divided by four.
	pub quarter_stream_id: VarInt,
	pub payload: Bytes,
}

impl Datagram {
	/// Strip the leading quarter stream id.
	pub fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
		let quarter_stream_id = VarInt::decode(&mut data)?;
		Ok(Self {
			quarter_stream_id,
			payload: data,
		})
	}

	/// The session id, which is the CONNECT stream id.
	pub fn session_id(&self) -> Result<VarInt, BoundsExceeded> {
		let quarter = self.quarter_stream_id.into_inner();
		quarter.checked_mul(4).ok_or(BoundsExceeded)?.try_into()
	}
}

/// Encode an outbound datagram: `varint(0)` followed by the payload.
pub fn encode_reply<W: BufMut>(payload: &[u8], w: &mut W) {
	REPLY_CORRELATION.encode(w);
	w.put_slice(payload);
}
