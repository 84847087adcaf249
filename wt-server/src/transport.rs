//! The seam between this crate and the QUIC/HTTP-3 substrate.
//!
//! The substrate owns congestion control, loss recovery, TLS and the HTTP/3 frame codec.
//! It delivers stream bytes and datagrams to a [crate::Connection] and provides these handles for writing.

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::util::spawn;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
	#[error("stream closed")]
	StreamClosed,

	#[error("connection closed")]
	ConnectionClosed,

	#[error("transport error: {0}")]
	Transport(String),
}

/// A QUIC stream owned by the substrate.
///
/// Handles are cheap to clone and all clones refer to the same stream.
pub trait StreamHandle: Clone + Send + Sync + 'static {
	/// The QUIC stream id.
	fn id(&self) -> u64;

	/// Queue bytes on the stream, resolving once the write completes or fails.
	fn write(&self, data: Bytes) -> BoxFuture<'static, Result<(), WriteError>>;

	/// Close the stream; any in-flight writes may fail.
	fn close(&self);

	fn is_closed(&self) -> bool;

	/// Resolves once the stream is closed, by either side.
	fn closed(&self) -> BoxFuture<'static, ()>;
}

/// A QUIC connection owned by the substrate.
pub trait Transport: Clone + Send + Sync + 'static {
	type Stream: StreamHandle;

	/// Open a server-initiated unidirectional stream.
	fn open_uni(&self) -> BoxFuture<'static, Result<Self::Stream, WriteError>>;

	/// Send an unreliable datagram on the connection.
	fn send_datagram(&self, data: Bytes) -> Result<(), WriteError>;
}

/// Write without waiting; a failure is reported through the completion and logged.
///
/// There is no retry, so delivery is at-most-once.
pub(crate) fn write_detached<S: StreamHandle>(stream: &S, data: Bytes) {
	let stream_id = stream.id();
	let size = data.len();
	let done = stream.write(data);

	spawn(async move {
		match done.await {
			Ok(()) => tracing::trace!(stream_id, size, "write complete"),
			Err(err) => tracing::warn!(?err, stream_id, size, "write failed"),
		}
	});
}
