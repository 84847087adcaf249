use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::transport::write_detached;
use crate::util::{spawn, Lock};
use crate::StreamHandle;

/// A server-initiated stream kept open for further writes.
pub struct PushHandle<S: StreamHandle> {
	stream: S,
}

impl<S: StreamHandle> PushHandle<S> {
	pub fn new(stream: S) -> Self {
		Self { stream }
	}

	pub fn id(&self) -> u64 {
		self.stream.id()
	}

	/// Write the bytes without waiting; a closed stream drops them with a warning.
	pub fn send(&self, data: impl Into<Bytes>) {
		if self.stream.is_closed() {
			tracing::warn!(stream_id = self.id(), "push stream closed, dropping");
			return;
		}

		write_detached(&self.stream, data.into());
	}

	pub fn close(&self) {
		self.stream.close();
	}

	pub fn is_closed(&self) -> bool {
		self.stream.is_closed()
	}

	pub fn stream(&self) -> &S {
		&self.stream
	}
}

impl<S: StreamHandle> Clone for PushHandle<S> {
	fn clone(&self) -> Self {
		Self {
			stream: self.stream.clone(),
		}
	}
}

impl<S: StreamHandle> fmt::Debug for PushHandle<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PushHandle").field("stream_id", &self.id()).finish()
	}
}

struct PushState<S: StreamHandle> {
	handles: HashMap<String, (u64, PushHandle<S>)>,

	// Bumped on every registration, so a stale close can't remove a newer handle.
	generation: u64,
}

impl<S: StreamHandle> Default for PushState<S> {
	fn default() -> Self {
		Self {
			handles: HashMap::new(),
			generation: 0,
		}
	}
}

/// A process-wide directory of push handles, keyed by an application chosen name.
///
/// Create one and pass clones to each connection.
pub struct PushRegistry<S: StreamHandle> {
	state: Lock<PushState<S>>,
}

impl<S: StreamHandle> PushRegistry<S> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a handle, replacing any previous handle with the same key.
	///
	/// The key is removed automatically once the stream closes.
	pub fn register(&self, key: impl Into<String>, handle: PushHandle<S>) {
		let key = key.into();
		let closed = handle.stream().closed();

		let (generation, total) = {
			let mut state = self.state.lock();
			state.generation += 1;
			let generation = state.generation;
			state.handles.insert(key.clone(), (generation, handle));
			(generation, state.handles.len())
		};

		tracing::debug!(%key, total, "registered push handle");

		let this = self.clone();
		spawn(async move {
			closed.await;
			this.remove_generation(&key, generation);
		});
	}

	fn remove_generation(&self, key: &str, generation: u64) {
		let mut state = self.state.lock();
		if let Some((current, _)) = state.handles.get(key) {
			if *current == generation {
				state.handles.remove(key);
				tracing::debug!(%key, "unregistered push handle");
			}
		}
	}

	pub fn unregister(&self, key: &str) -> Option<PushHandle<S>> {
		let (_, handle) = self.state.lock().handles.remove(key)?;
		tracing::debug!(%key, "unregistered push handle");
		Some(handle)
	}

	pub fn get(&self, key: &str) -> Option<PushHandle<S>> {
		self.state.lock().handles.get(key).map(|(_, handle)| handle.clone())
	}

	/// Send to a single key, returning false with a warning if it's not registered.
	pub fn send_to(&self, key: &str, data: impl Into<Bytes>) -> bool {
		match self.get(key) {
			Some(handle) => {
				handle.send(data);
				true
			}
			None => {
				tracing::warn!(%key, "push key not found");
				false
			}
		}
	}

	/// Send to every registered handle, returning how many there were.
	pub fn broadcast(&self, data: impl Into<Bytes>) -> usize {
		let data = data.into();

		let handles: Vec<_> = self
			.state
			.lock()
			.handles
			.values()
			.map(|(_, handle)| handle.clone())
			.collect();

		for handle in &handles {
			handle.send(data.clone());
		}

		handles.len()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.state.lock().handles.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.state.lock().handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().handles.is_empty()
	}
}

impl<S: StreamHandle> Default for PushRegistry<S> {
	fn default() -> Self {
		Self {
			state: Default::default(),
		}
	}
}

impl<S: StreamHandle> Clone for PushRegistry<S> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::mock::MockStream;

	// Let the auto-unregister tasks run.
	async fn settle() {
		for _ in 0..8 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn send_and_broadcast() {
		let registry = PushRegistry::new();
		let a = MockStream::new(3);
		let b = MockStream::new(7);

		registry.register("a", PushHandle::new(a.clone()));
		registry.register("b", PushHandle::new(b.clone()));
		assert_eq!(registry.len(), 2);

		assert!(registry.send_to("a", "one"));
		assert!(!registry.send_to("missing", "two"));
		assert_eq!(registry.broadcast("all"), 2);

		assert_eq!(a.written(), Bytes::from_static(b"oneall"));
		assert_eq!(b.written(), Bytes::from_static(b"all"));
	}

	#[tokio::test]
	async fn unregister_on_close() {
		let registry = PushRegistry::new();
		let stream = MockStream::new(3);

		registry.register("feed", PushHandle::new(stream.clone()));
		settle().await;
		assert!(registry.contains("feed"));

		stream.close();
		settle().await;
		assert!(!registry.contains("feed"));
		assert_eq!(registry.broadcast("nobody"), 0);
	}

	#[tokio::test]
	async fn replaced_handle_survives_old_close() {
		let registry = PushRegistry::new();
		let old = MockStream::new(3);
		let new = MockStream::new(7);

		registry.register("user", PushHandle::new(old.clone()));
		registry.register("user", PushHandle::new(new.clone()));
		assert_eq!(registry.len(), 1);

		old.close();
		settle().await;

		assert_eq!(registry.get("user").map(|handle| handle.id()), Some(7));
	}

	#[tokio::test]
	async fn send_after_close() {
		let stream = MockStream::new(3);
		let handle = PushHandle::new(stream.clone());

		handle.close();
		assert!(handle.is_closed());
		handle.send("late");
		assert!(stream.writes().is_empty());
	}
}
