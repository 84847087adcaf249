use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::sync::watch;
use wt_proto::{ConnectError, ConnectRequest, Datagram, StreamHeader};

use crate::message::Origin;
use crate::stream::{Forward, Pipeline};
use crate::util::OrClose;
use crate::{
	Admission, ConnectionConfig, Dispatcher, Error, Message, MessageKind, PushRegistry, Session, SessionRegistry,
	StreamHandle, Transport,
};

struct Entry<S: StreamHandle> {
	stream: S,
	kind: MessageKind,
	pipeline: Pipeline,

	// Set once the prologue names a registered session.
	session: Option<Session<S>>,
}

/// The WebTransport state of a single QUIC connection.
///
/// The substrate drives this from the task that owns the connection:
/// it reports new streams, stream bytes, datagrams and closes, and gets back any bytes meant for HTTP/3.
pub struct Connection<T: Transport> {
	transport: T,
	config: ConnectionConfig,
	sessions: SessionRegistry<T::Stream>,
	streams: HashMap<u64, Entry<T::Stream>>,

	// The streams that carried a successful CONNECT, each keying a session.
	connects: HashSet<u64>,

	dispatcher: Dispatcher<T>,
	push: PushRegistry<T::Stream>,
	closed: watch::Sender<bool>,
}

impl<T: Transport> Connection<T> {
	pub fn new(transport: T, config: ConnectionConfig, dispatcher: Dispatcher<T>, push: PushRegistry<T::Stream>) -> Self {
		tracing::info!(admission = %config.admission, max_frame_size = config.max_frame_size, "connection opened");

		Self {
			transport,
			config,
			sessions: SessionRegistry::new(),
			streams: HashMap::new(),
			connects: HashSet::new(),
			dispatcher,
			push,
			closed: watch::channel(false).0,
		}
	}

	pub fn sessions(&self) -> &SessionRegistry<T::Stream> {
		&self.sessions
	}

	/// Validate an extended CONNECT request decoded by the HTTP/3 codec.
	///
	/// On success the session is registered under the stream id and the caller should answer `200`.
	/// Otherwise nothing is registered and the caller should answer with [ConnectError::status].
	pub fn accept_connect(&mut self, stream: T::Stream, request: &ConnectRequest) -> Result<Session<T::Stream>, ConnectError> {
		let session_id = stream.id();

		if let Err(err) = request.validate() {
			tracing::warn!(%err, session_id, status = %err.status(), "rejected CONNECT");
			return Err(err);
		}

		let session = Session::new(session_id, request.path.as_str());
		self.sessions.register(session.clone());
		self.connects.insert(session_id);

		tracing::debug!(session_id, path = %request.path, "accepted CONNECT");

		Ok(session)
	}

	/// The peer announced that it will open `stream_id` within a session.
	pub fn announce(&self, session_id: u64, stream_id: u64) -> Result<(), Error> {
		let session = self.sessions.get(session_id).ok_or(Error::UnknownSession(session_id))?;
		session.register_stream(stream_id)
	}

	/// A peer-initiated bidirectional stream, which may be HTTP/3 or WebTransport.
	pub fn accept_bi(&mut self, stream: T::Stream) {
		let pipeline = Pipeline::bi(self.config.max_frame_size);
		self.insert(stream, MessageKind::Bidirectional, pipeline);
	}

	/// A peer-initiated unidirectional stream, which must start with a WebTransport prologue.
	pub fn accept_uni(&mut self, stream: T::Stream) {
		let pipeline = Pipeline::uni(self.config.max_frame_size);
		self.insert(stream, MessageKind::Unidirectional, pipeline);
	}

	fn insert(&mut self, stream: T::Stream, kind: MessageKind, pipeline: Pipeline) {
		tracing::trace!(stream_id = stream.id(), ?kind, "accepted stream");

		let entry = Entry {
			stream: stream.clone(),
			kind,
			pipeline,
			session: None,
		};

		self.streams.insert(stream.id(), entry);
	}

	/// Feed bytes received on a stream.
	///
	/// Returns any bytes that belong to the HTTP/3 codec or should be passed through untouched.
	/// On error the stream has been closed and forgotten.
	pub fn recv(&mut self, stream_id: u64, chunk: Bytes) -> Result<Option<Forward>, Error> {
		let stream = match self.streams.get(&stream_id) {
			Some(entry) => entry.stream.clone(),
			None => return Err(Error::UnknownStream(stream_id)),
		};

		let res = self.process(stream_id, chunk).or_close(&stream);
		if res.is_err() {
			self.stream_closed(stream_id);
		}

		res
	}

	fn process(&mut self, stream_id: u64, chunk: Bytes) -> Result<Option<Forward>, Error> {
		let entry = self.streams.get_mut(&stream_id).ok_or(Error::UnknownStream(stream_id))?;
		let output = entry.pipeline.push(chunk)?;

		if let Some(header) = output.header {
			let session = Self::admit(&self.sessions, self.config.admission, &entry.stream, header)?;
			entry.session = Some(session);
		}

		if output.frames.is_empty() {
			return Ok(output.forward);
		}

		// A header always precedes frames, so the session is set.
		let session = entry.session.as_ref().ok_or(Error::UnknownStream(stream_id))?;
		if !self.sessions.contains(session.id()) {
			return Err(Error::UnknownSession(session.id()));
		}

		for payload in output.frames {
			let msg = Message {
				kind: entry.kind,
				path: Some(session.path().clone()),
				session_id: session.id(),
				stream: Some(entry.stream.clone()),
				payload,
				origin: Origin {
					transport: self.transport.clone(),
					push: self.push.clone(),
					closed: self.closed.subscribe(),
				},
			};

			if let Err(err) = self.dispatcher.submit(msg) {
				tracing::warn!(%err, stream_id, "dispatcher closed, dropping message");
			}
		}

		Ok(output.forward)
	}

	fn admit(
		sessions: &SessionRegistry<T::Stream>,
		admission: Admission,
		stream: &T::Stream,
		header: StreamHeader,
	) -> Result<Session<T::Stream>, Error> {
		let session_id = header.session_id.into_inner();
		let session = sessions.get(session_id).ok_or(Error::UnknownSession(session_id))?;

		if admission == Admission::Announced {
			session.attach_stream(stream.clone())?;
		}

		tracing::debug!(session_id, stream_id = stream.id(), typ = ?header.typ, "admitted stream");

		Ok(session)
	}

	/// Handle an inbound datagram.
	///
	/// A datagram for an unknown session is still dispatched, without a path.
	pub fn recv_datagram(&mut self, data: Bytes) -> Result<(), Error> {
		let datagram = Datagram::decode(data)?;
		let session_id = datagram.session_id()?.into_inner();

		let path = match self.sessions.get(session_id) {
			Some(session) => Some(session.path().clone()),
			None => {
				tracing::debug!(session_id, "datagram for unknown session");
				None
			}
		};

		let msg = Message {
			kind: MessageKind::Datagram,
			path,
			session_id,
			stream: None,
			payload: datagram.payload,
			origin: Origin {
				transport: self.transport.clone(),
				push: self.push.clone(),
				closed: self.closed.subscribe(),
			},
		};

		self.dispatcher.submit(msg)
	}

	/// The substrate observed a stream close, by either side.
	///
	/// Closing a CONNECT stream ends its session and closes every stream that belonged to it.
	/// Queued messages from closed streams are dropped.
	pub fn stream_closed(&mut self, stream_id: u64) {
		if let Some(entry) = self.streams.remove(&stream_id) {
			entry.stream.close();
			if let Some(session) = entry.session {
				session.detach_stream(stream_id);
			}

			tracing::trace!(stream_id, "stream closed");
		}

		if self.connects.remove(&stream_id) {
			self.end_session(stream_id);
		}

		self.dispatcher.purge();
	}

	fn end_session(&mut self, session_id: u64) {
		let children: Vec<u64> = self
			.streams
			.iter()
			.filter(|(_, entry)| entry.session.as_ref().map(Session::id) == Some(session_id))
			.map(|(id, _)| *id)
			.collect();

		for stream_id in children {
			if let Some(entry) = self.streams.remove(&stream_id) {
				tracing::debug!(session_id, stream_id, "closing stream of ended session");
				entry.stream.close();
			}
		}

		self.sessions.remove(session_id);
	}

	/// Close every session and drop any buffered bytes.
	///
	/// Queued messages from this connection are dropped immediately instead of dispatched.
	pub fn close(&mut self) {
		if self.closed.send_replace(true) {
			return;
		}

		self.sessions.close_all();
		self.streams.clear();
		self.connects.clear();

		let dropped = self.dispatcher.purge();
		tracing::info!(dropped, "connection closed");
	}

	pub fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}
}

impl<T: Transport> Drop for Connection<T> {
	fn drop(&mut self) {
		self.close();
	}
}
