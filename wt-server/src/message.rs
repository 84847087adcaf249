use std::{fmt, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::watch;
use wt_proto::coding::{Encode, VarInt};
use wt_proto::{encode_reply, RouteHeader, StreamHeader, StreamType};

use crate::transport::write_detached;
use crate::{Error, PushHandle, PushRegistry, StreamHandle, Transport};

/// How a message arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
	Datagram,
	Unidirectional,
	Bidirectional,
}

/// The connection a message came from, used to reply or push.
pub(crate) struct Origin<T: Transport> {
	pub transport: T,
	pub push: PushRegistry<T::Stream>,
	pub closed: watch::Receiver<bool>,
}

impl<T: Transport> Clone for Origin<T> {
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			push: self.push.clone(),
			closed: self.closed.clone(),
		}
	}
}

/// A single application frame or datagram, handed to a [crate::Handler].
///
/// The payload has exactly one owner; the message moves into the dispatcher and then into the handler.
pub struct Message<T: Transport> {
	pub(crate) kind: MessageKind,
	pub(crate) path: Option<Arc<str>>,
	pub(crate) session_id: u64,
	pub(crate) stream: Option<T::Stream>,
	pub(crate) payload: Bytes,
	pub(crate) origin: Origin<T>,
}

impl<T: Transport> Message<T> {
	pub fn kind(&self) -> MessageKind {
		self.kind
	}

	/// The path of the session's CONNECT request, if the session is known.
	pub fn path(&self) -> Option<&str> {
		self.path.as_deref()
	}

	pub fn session_id(&self) -> u64 {
		self.session_id
	}

	/// The stream the message arrived on, or `None` for a datagram.
	pub fn stream_id(&self) -> Option<u64> {
		self.stream.as_ref().map(|stream| stream.id())
	}

	pub fn payload(&self) -> &Bytes {
		&self.payload
	}

	/// Mutable access, for example to consume the payload with [bytes::Buf].
	pub fn payload_mut(&mut self) -> &mut Bytes {
		&mut self.payload
	}

	pub fn into_payload(self) -> Bytes {
		self.payload
	}

	/// The process-wide push registry.
	pub fn push(&self) -> &PushRegistry<T::Stream> {
		&self.origin.push
	}

	/// True once the originating stream or connection has closed.
	pub fn is_cancelled(&self) -> bool {
		*self.origin.closed.borrow() || self.stream.as_ref().is_some_and(|stream| stream.is_closed())
	}

	/// Reply on the originating stream, or with a datagram if that's how the message arrived.
	///
	/// A unidirectional stream has no way back, so replying to one is an error.
	pub fn reply(&self, text: &str) -> Result<(), Error> {
		match self.kind {
			MessageKind::Datagram => self.send_datagram(text),
			MessageKind::Unidirectional => {
				tracing::warn!(
					session_id = self.session_id,
					stream_id = self.stream_id(),
					"cannot reply to a unidirectional stream"
				);
				Err(Error::ReplyUnidirectional)
			}
			MessageKind::Bidirectional => {
				let stream = self.stream.as_ref().ok_or(Error::Closed)?;

				let header = StreamHeader {
					typ: StreamType::Bi,
					session_id: VarInt::try_from(self.session_id)?,
				};

				let mut buf = BytesMut::with_capacity(header.encode_size() + text.len());
				header.encode(&mut buf);
				buf.put_slice(text.as_bytes());

				write_detached(stream, buf.freeze());
				Ok(())
			}
		}
	}

	/// Send a datagram on the connection, regardless of how the message arrived.
	pub fn send_datagram(&self, text: &str) -> Result<(), Error> {
		let mut buf = BytesMut::with_capacity(1 + text.len());
		encode_reply(text.as_bytes(), &mut buf);

		self.origin.transport.send_datagram(buf.freeze())?;
		Ok(())
	}

	/// Open a unidirectional stream, write the path and payload, then close it.
	pub async fn push_event(&self, path: &str, payload: impl Into<Bytes>) -> Result<(), Error> {
		let payload = payload.into();
		let route = RouteHeader::new(path)?;

		let mut buf = BytesMut::with_capacity(1 + path.len() + payload.len());
		route.encode(&mut buf);
		buf.put_slice(&payload);

		let stream = self.origin.transport.open_uni().await?;
		let res = stream.write(buf.freeze()).await;
		stream.close();

		res?;
		tracing::debug!(%path, stream_id = stream.id(), "pushed event");

		Ok(())
	}

	/// Open a unidirectional stream and write the path, returning a handle for further writes.
	pub async fn open_live_feed(&self, path: &str) -> Result<PushHandle<T::Stream>, Error> {
		let route = RouteHeader::new(path)?;

		let mut buf = BytesMut::with_capacity(1 + path.len());
		route.encode(&mut buf);

		let stream = self.origin.transport.open_uni().await?;
		write_detached(&stream, buf.freeze());

		tracing::debug!(%path, stream_id = stream.id(), "opened live feed");

		Ok(PushHandle::new(stream))
	}

	/// Open a unidirectional stream bound to this session.
	///
	/// If a key is provided, the handle is registered in the push registry under it.
	pub async fn open_session_stream(&self, key: Option<&str>) -> Result<PushHandle<T::Stream>, Error> {
		let header = StreamHeader {
			typ: StreamType::Uni,
			session_id: VarInt::try_from(self.session_id)?,
		};

		let mut buf = BytesMut::with_capacity(header.encode_size());
		header.encode(&mut buf);

		let stream = self.origin.transport.open_uni().await?;
		write_detached(&stream, buf.freeze());

		let handle = PushHandle::new(stream);
		if let Some(key) = key {
			self.origin.push.register(key, handle.clone());
		}

		Ok(handle)
	}
}

impl<T: Transport> fmt::Debug for Message<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Message")
			.field("kind", &self.kind)
			.field("path", &self.path)
			.field("session_id", &self.session_id)
			.field("stream_id", &self.stream_id())
			.field("size", &self.payload.len())
			.finish()
	}
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::mock::{MockStream, MockTransport};

	pub(crate) fn message(
		kind: MessageKind,
		stream: Option<MockStream>,
		payload: &'static [u8],
	) -> (Message<MockTransport>, MockTransport, watch::Sender<bool>) {
		let transport = MockTransport::new();
		let (closed, closed_rx) = watch::channel(false);

		let msg = Message {
			kind,
			path: Some("/chat".into()),
			session_id: 4,
			stream,
			payload: Bytes::from_static(payload),
			origin: Origin {
				transport: transport.clone(),
				push: PushRegistry::new(),
				closed: closed_rx,
			},
		};

		(msg, transport, closed)
	}

	#[tokio::test]
	async fn reply_bidi() {
		let stream = MockStream::new(8);
		let (msg, _, _) = message(MessageKind::Bidirectional, Some(stream.clone()), b"hello");

		assert_eq!(msg.path(), Some("/chat"));
		assert_eq!(msg.stream_id(), Some(8));

		msg.reply("hi").unwrap();
		assert_eq!(stream.written(), Bytes::from_static(b"\x40\x41\x04hi"));
	}

	#[tokio::test]
	async fn reply_uni() {
		let stream = MockStream::new(2);
		let (msg, transport, _) = message(MessageKind::Unidirectional, Some(stream.clone()), b"hello");

		assert_eq!(msg.reply("hi"), Err(Error::ReplyUnidirectional));
		assert!(stream.writes().is_empty());
		assert!(transport.datagrams().is_empty());
	}

	#[tokio::test]
	async fn reply_datagram() {
		let (msg, transport, _) = message(MessageKind::Datagram, None, b"ping");
		assert_eq!(msg.stream_id(), None);

		msg.reply("pong").unwrap();
		assert_eq!(transport.datagrams(), vec![Bytes::from_static(b"\x00pong")]);
	}

	#[tokio::test]
	async fn datagram_from_stream() {
		let (msg, transport, _) = message(MessageKind::Unidirectional, Some(MockStream::new(2)), b"");

		msg.send_datagram("x").unwrap();
		assert_eq!(transport.datagrams(), vec![Bytes::from_static(b"\x00x")]);

		transport.close();
		assert_eq!(
			msg.send_datagram("y"),
			Err(Error::Write(crate::WriteError::ConnectionClosed))
		);
	}

	#[tokio::test]
	async fn push_event() {
		let (msg, transport, _) = message(MessageKind::Datagram, None, b"");

		msg.push_event("/news", "breaking").await.unwrap();

		let opened = transport.opened();
		assert_eq!(opened.len(), 1);
		assert_eq!(opened[0].written(), Bytes::from_static(b"\x05/newsbreaking"));
		assert!(opened[0].is_closed());
	}

	#[tokio::test]
	async fn live_feed() {
		let (msg, transport, _) = message(MessageKind::Bidirectional, Some(MockStream::new(0)), b"");

		let feed = msg.open_live_feed("/gps").await.unwrap();
		feed.send("1");
		feed.send("2");

		let opened = transport.opened();
		assert_eq!(opened[0].writes(), vec![&b"\x04/gps"[..], &b"1"[..], &b"2"[..]]);
		assert!(!feed.is_closed());
	}

	#[tokio::test]
	async fn session_stream() {
		let (msg, transport, _) = message(MessageKind::Bidirectional, Some(MockStream::new(0)), b"");

		let handle = msg.open_session_stream(Some("user-1")).await.unwrap();
		assert_eq!(handle.id(), 3);
		assert!(msg.push().contains("user-1"));

		assert!(msg.push().send_to("user-1", "hey"));
		assert_eq!(transport.opened()[0].written(), Bytes::from_static(b"\x40\x54\x04hey"));
	}

	#[tokio::test]
	async fn route_too_long() {
		let (msg, transport, _) = message(MessageKind::Datagram, None, b"");

		let path = "/".repeat(300);
		assert!(matches!(msg.push_event(&path, "x").await, Err(Error::Encode(_))));
		assert!(transport.opened().is_empty());
	}

	#[tokio::test]
	async fn cancelled() {
		let stream = MockStream::new(8);
		let (msg, _, closed) = message(MessageKind::Bidirectional, Some(stream.clone()), b"");
		assert!(!msg.is_cancelled());

		stream.close();
		assert!(msg.is_cancelled());

		let (msg, _, closed2) = message(MessageKind::Datagram, None, b"");
		closed2.send_replace(true);
		assert!(msg.is_cancelled());
		drop(closed);
	}
}
