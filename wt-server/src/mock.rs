//! An in-memory transport, recording everything written to it.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::watch;

use crate::util::Lock;
use crate::{StreamHandle, Transport, WriteError};

#[derive(Default, Debug)]
struct MockStreamState {
	writes: Vec<Bytes>,
	closed: bool,
}

#[derive(Clone, Debug)]
pub struct MockStream {
	id: u64,
	state: Lock<MockStreamState>,
	closed: Arc<watch::Sender<bool>>,
}

impl MockStream {
	pub fn new(id: u64) -> Self {
		Self {
			id,
			state: Default::default(),
			closed: Arc::new(watch::channel(false).0),
		}
	}

	/// Each call to write, in order.
	pub fn writes(&self) -> Vec<Bytes> {
		self.state.lock().writes.clone()
	}

	/// Every byte written, concatenated.
	pub fn written(&self) -> Bytes {
		let state = self.state.lock();
		let mut buf = BytesMut::new();
		for write in &state.writes {
			buf.extend_from_slice(write);
		}
		buf.freeze()
	}
}

impl StreamHandle for MockStream {
	fn id(&self) -> u64 {
		self.id
	}

	fn write(&self, data: Bytes) -> BoxFuture<'static, Result<(), WriteError>> {
		let mut state = self.state.lock();
		if state.closed {
			return future::ready(Err(WriteError::StreamClosed)).boxed();
		}

		state.writes.push(data);
		future::ready(Ok(())).boxed()
	}

	fn close(&self) {
		self.state.lock().closed = true;
		self.closed.send_replace(true);
	}

	fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	fn closed(&self) -> BoxFuture<'static, ()> {
		let mut closed = self.closed.subscribe();
		async move {
			let _ = closed.wait_for(|closed| *closed).await;
		}
		.boxed()
	}
}

#[derive(Debug)]
struct MockTransportState {
	next_uni: u64,
	datagrams: Vec<Bytes>,
	opened: Vec<MockStream>,
	closed: bool,
}

impl Default for MockTransportState {
	fn default() -> Self {
		Self {
			// Server-initiated unidirectional stream ids end in 0b11.
			next_uni: 3,
			datagrams: Vec::new(),
			opened: Vec::new(),
			closed: false,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct MockTransport {
	state: Lock<MockTransportState>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every datagram sent, in order.
	pub fn datagrams(&self) -> Vec<Bytes> {
		self.state.lock().datagrams.clone()
	}

	/// Every unidirectional stream opened, in order.
	pub fn opened(&self) -> Vec<MockStream> {
		self.state.lock().opened.clone()
	}

	/// Fail any further stream opens and datagrams.
	pub fn close(&self) {
		self.state.lock().closed = true;
	}
}

impl Transport for MockTransport {
	type Stream = MockStream;

	fn open_uni(&self) -> BoxFuture<'static, Result<MockStream, WriteError>> {
		let mut state = self.state.lock();
		if state.closed {
			return future::ready(Err(WriteError::ConnectionClosed)).boxed();
		}

		let stream = MockStream::new(state.next_uni);
		state.next_uni += 4;
		state.opened.push(stream.clone());

		future::ready(Ok(stream)).boxed()
	}

	fn send_datagram(&self, data: Bytes) -> Result<(), WriteError> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(WriteError::ConnectionClosed);
		}

		state.datagrams.push(data);
		Ok(())
	}
}
