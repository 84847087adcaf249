use std::{fmt, str::FromStr};

use wt_proto::FrameDecoder;

/// Whether session-bound streams must be announced before they are attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Admission {
	/// Any stream naming a registered session is accepted.
	#[default]
	Open,

	/// Only streams previously announced on their session are accepted.
	Announced,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown admission mode: {0}")]
pub struct ParseAdmissionError(String);

impl FromStr for Admission {
	type Err = ParseAdmissionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"open" => Ok(Self::Open),
			"announced" => Ok(Self::Announced),
			_ => Err(ParseAdmissionError(s.to_string())),
		}
	}
}

impl fmt::Display for Admission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Open => write!(f, "open"),
			Self::Announced => write!(f, "announced"),
		}
	}
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
	pub admission: Admission,

	/// The largest length-prefixed frame accepted on a raw stream.
	pub max_frame_size: u64,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self {
			admission: Admission::default(),
			max_frame_size: FrameDecoder::MAX_SIZE,
		}
	}
}
