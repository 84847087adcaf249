use std::collections::{HashMap, HashSet};
use std::{fmt, mem, sync::Arc};

use crate::util::{Close, Lock};
use crate::{Error, StreamHandle};

struct SessionState<S> {
	// Stream ids the peer announced ahead of opening them.
	announced: HashSet<u64>,

	// Every id in here was announced first.
	active: HashMap<u64, S>,
}

impl<S> Default for SessionState<S> {
	fn default() -> Self {
		Self {
			announced: HashSet::new(),
			active: HashMap::new(),
		}
	}
}

/// A WebTransport session, keyed by the id of its CONNECT stream.
pub struct Session<S: StreamHandle> {
	id: u64,
	path: Arc<str>,
	state: Lock<SessionState<S>>,
}

impl<S: StreamHandle> Session<S> {
	/// The most streams a peer may announce without opening them.
	pub const MAX_ANNOUNCED: usize = 1024;

	pub fn new(id: u64, path: impl Into<Arc<str>>) -> Self {
		Self {
			id,
			path: path.into(),
			state: Default::default(),
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	/// The path of the CONNECT request.
	pub fn path(&self) -> &Arc<str> {
		&self.path
	}

	/// Record that the peer intends to open `stream_id` within this session.
	///
	/// An announcement is only forgotten once its stream closes, so at most [Self::MAX_ANNOUNCED] may be pending.
	pub fn register_stream(&self, stream_id: u64) -> Result<(), Error> {
		let mut state = self.state.lock();
		if state.announced.len() >= Self::MAX_ANNOUNCED && !state.announced.contains(&stream_id) {
			return Err(Error::TooManyAnnouncements(self.id));
		}

		tracing::debug!(session_id = self.id, stream_id, "announced stream");
		state.announced.insert(stream_id);

		Ok(())
	}

	/// Admit a stream that was previously announced.
	///
	/// An unannounced stream is closed and never becomes active.
	/// Attaching the same id twice replaces the earlier handle.
	pub fn attach_stream(&self, stream: S) -> Result<(), Error> {
		let stream_id = stream.id();

		{
			let mut state = self.state.lock();
			if state.announced.contains(&stream_id) {
				state.active.insert(stream_id, stream);
				return Ok(());
			}
		}

		let err = Error::UnannouncedStream(stream_id);
		stream.abort(&err);
		Err(err)
	}

	/// Forget a stream once it closes.
	pub fn detach_stream(&self, stream_id: u64) -> Option<S> {
		let mut state = self.state.lock();
		state.announced.remove(&stream_id);
		state.active.remove(&stream_id)
	}

	pub fn is_announced(&self, stream_id: u64) -> bool {
		self.state.lock().announced.contains(&stream_id)
	}

	pub fn is_active(&self, stream_id: u64) -> bool {
		self.state.lock().active.contains_key(&stream_id)
	}

	pub fn active_len(&self) -> usize {
		self.state.lock().active.len()
	}

	/// Close every active stream and forget all announcements.
	pub fn close(&self) {
		let state = mem::take(&mut *self.state.lock());
		for stream in state.active.into_values() {
			stream.close();
		}
	}
}

impl<S: StreamHandle> Clone for Session<S> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			path: self.path.clone(),
			state: self.state.clone(),
		}
	}
}

impl<S: StreamHandle> fmt::Debug for Session<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("path", &self.path)
			.finish()
	}
}

/// The sessions of a single connection.
///
/// Clones share the same map. Concurrent registrations are last-write-wins.
pub struct SessionRegistry<S: StreamHandle> {
	sessions: Lock<HashMap<u64, Session<S>>>,
}

impl<S: StreamHandle> SessionRegistry<S> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a session, returning any session it replaced.
	pub fn register(&self, session: Session<S>) -> Option<Session<S>> {
		tracing::debug!(session_id = session.id(), path = %session.path(), "registered session");
		self.sessions.lock().insert(session.id(), session)
	}

	pub fn get(&self, session_id: u64) -> Option<Session<S>> {
		self.sessions.lock().get(&session_id).cloned()
	}

	pub fn contains(&self, session_id: u64) -> bool {
		self.sessions.lock().contains_key(&session_id)
	}

	/// Remove and close a session.
	pub fn remove(&self, session_id: u64) -> Option<Session<S>> {
		let session = self.sessions.lock().remove(&session_id)?;
		tracing::debug!(session_id, "removed session");
		session.close();
		Some(session)
	}

	/// Remove and close every session.
	pub fn close_all(&self) {
		// Swap the map out so streams are closed without holding the lock.
		let sessions = mem::take(&mut *self.sessions.lock());
		for session in sessions.into_values() {
			session.close();
		}
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}
}

impl<S: StreamHandle> Default for SessionRegistry<S> {
	fn default() -> Self {
		Self {
			sessions: Default::default(),
		}
	}
}

impl<S: StreamHandle> Clone for SessionRegistry<S> {
	fn clone(&self) -> Self {
		Self {
			sessions: self.sessions.clone(),
		}
	}
}
