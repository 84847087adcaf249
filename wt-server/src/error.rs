use wt_proto::coding::{BoundsExceeded, DecodeError, EncodeError};
use wt_proto::ConnectError;

use crate::WriteError;

/// A list of possible errors that can occur on a connection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] EncodeError),

	/// Some VarInt was too large.
	#[error("varint bounds exceeded")]
	BoundsExceeded(#[from] BoundsExceeded),

	#[error("connect rejected: {0}")]
	Connect(#[from] ConnectError),

	#[error("write error: {0}")]
	Write(#[from] WriteError),

	/// A stream referenced a session that was never registered.
	#[error("unknown session: {0}")]
	UnknownSession(u64),

	/// Bytes arrived for a stream that was never accepted.
	#[error("unknown stream: {0}")]
	UnknownStream(u64),

	/// A stream was attached without a prior announcement.
	#[error("unannounced stream: {0}")]
	UnannouncedStream(u64),

	/// A session already holds as many announcements as it allows.
	#[error("too many announced streams in session: {0}")]
	TooManyAnnouncements(u64),

	/// Replies are only possible on bidirectional streams and datagrams.
	#[error("cannot reply to a unidirectional stream")]
	ReplyUnidirectional,

	#[error("closed")]
	Closed,
}

impl Error {
	/// An integer code, used when resetting streams.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Closed => 0,
			Self::Decode(_) => 1,
			Self::Encode(_) => 2,
			Self::BoundsExceeded(_) => 3,
			Self::Connect(_) => 4,
			Self::Write(_) => 5,
			Self::UnknownSession(_) => 6,
			Self::UnknownStream(_) => 7,
			Self::UnannouncedStream(_) => 8,
			Self::ReplyUnidirectional => 9,
			Self::TooManyAnnouncements(_) => 10,
		}
	}

	/// Returns true if the peer broke the protocol, as opposed to a local or transport failure.
	pub fn is_violation(&self) -> bool {
		matches!(
			self,
			Self::Decode(_)
				| Self::UnknownSession(_)
				| Self::UnannouncedStream(_)
				| Self::TooManyAnnouncements(_)
				| Self::ReplyUnidirectional
		)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
