use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::util::{spawn, Lock};
use crate::{Error, Message, Transport};

/// Application logic run for every message.
pub trait Handler<T: Transport>: Send + Sync + 'static {
	fn handle(&self, msg: Message<T>) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<T, F, Fut> Handler<T> for F
where
	T: Transport,
	F: Fn(Message<T>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
	fn handle(&self, msg: Message<T>) -> BoxFuture<'static, anyhow::Result<()>> {
		self(msg).boxed()
	}
}

/// The number of workers when not configured.
pub const DEFAULT_WORKERS: usize = 4;

/// A fixed pool of workers that run the [Handler] off the network path.
///
/// Submission never blocks. Messages are run in no particular order, even those from the same stream.
pub struct Dispatcher<T: Transport> {
	queue: async_channel::Sender<Message<T>>,

	// Only used to purge cancelled messages; workers hold their own.
	pending: async_channel::Receiver<Message<T>>,

	workers: Lock<Vec<JoinHandle<()>>>,
}

impl<T: Transport> Dispatcher<T> {
	/// Spawn the workers; this must be called within a tokio runtime.
	pub fn new<H: Handler<T>>(workers: usize, handler: H) -> Self {
		let (queue, rx) = async_channel::unbounded();
		let handler: Arc<dyn Handler<T>> = Arc::new(handler);

		let workers = (0..workers.max(1))
			.map(|worker| spawn(Self::run(worker, rx.clone(), handler.clone())))
			.collect();

		Self {
			queue,
			pending: rx,
			workers: Lock::new(workers),
		}
	}

	/// Queue a message for a worker, taking ownership of it.
	///
	/// Fails only once the dispatcher is shutting down, in which case the message is dropped.
	pub fn submit(&self, msg: Message<T>) -> Result<(), Error> {
		self.queue.try_send(msg).map_err(|_| Error::Closed)
	}

	/// The number of messages waiting for a worker.
	pub fn pending(&self) -> usize {
		self.queue.len()
	}

	/// Drop every queued message whose stream or connection has closed, releasing its payload now.
	///
	/// The remaining messages are queued again, possibly in a different order.
	/// Returns the number of messages dropped.
	pub fn purge(&self) -> usize {
		// A closed queue is being drained by join, which skips cancelled messages itself.
		if self.queue.is_closed() {
			return 0;
		}

		let mut dropped = 0;

		for _ in 0..self.pending.len() {
			let msg = match self.pending.try_recv() {
				Ok(msg) => msg,
				Err(_) => break,
			};

			if msg.is_cancelled() {
				tracing::trace!(?msg, "purged cancelled message");
				dropped += 1;
			} else if let Err(err) = self.queue.try_send(msg) {
				tracing::warn!(msg = ?err.into_inner(), "dispatcher closed, dropping message");
			}
		}

		if dropped > 0 {
			tracing::debug!(dropped, "purged cancelled messages");
		}

		dropped
	}

	/// Stop accepting messages, run everything already queued, then wait for the workers.
	pub async fn join(&self) {
		self.queue.close();

		let workers = std::mem::take(&mut *self.workers.lock());
		for worker in workers {
			if let Err(err) = worker.await {
				tracing::error!(?err, "worker failed");
			}
		}
	}

	async fn run(worker: usize, queue: async_channel::Receiver<Message<T>>, handler: Arc<dyn Handler<T>>) {
		while let Ok(msg) = queue.recv().await {
			if msg.is_cancelled() {
				tracing::debug!(worker, ?msg, "dropping cancelled message");
				continue;
			}

			let kind = msg.kind();
			let session_id = msg.session_id();
			let stream_id = msg.stream_id();

			// The message moves into the handler, so it's dropped on every exit path.
			let res = AssertUnwindSafe(async { handler.handle(msg).await })
				.catch_unwind()
				.await;

			match res {
				Ok(Ok(())) => tracing::trace!(worker, ?kind, session_id, ?stream_id, "handled message"),
				Ok(Err(err)) => tracing::warn!(worker, ?kind, session_id, ?stream_id, ?err, "handler failed"),
				Err(panic) => {
					tracing::error!(worker, ?kind, session_id, ?stream_id, panic = panic_message(panic.as_ref()), "handler panicked")
				}
			}
		}

		tracing::trace!(worker, "worker done");
	}
}

impl<T: Transport> Clone for Dispatcher<T> {
	fn clone(&self) -> Self {
		Self {
			queue: self.queue.clone(),
			pending: self.pending.clone(),
			workers: self.workers.clone(),
		}
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s
	} else {
		"unknown"
	}
}

#[cfg(test)]
mod test {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use bytes::Bytes;

	use super::*;
	use crate::message::test::message;
	use crate::mock::{MockStream, MockTransport};
	use crate::transport::StreamHandle;
	use crate::MessageKind;

	// Tracks how many payloads are still alive.
	struct Tracked(Arc<()>);

	impl AsRef<[u8]> for Tracked {
		fn as_ref(&self) -> &[u8] {
			b"tracked"
		}
	}

	fn tracked(alive: &Arc<()>, stream: Option<MockStream>) -> Message<MockTransport> {
		let kind = match stream {
			Some(_) => MessageKind::Bidirectional,
			None => MessageKind::Datagram,
		};

		let (mut msg, _, _) = message(kind, stream, b"");
		*msg.payload_mut() = Bytes::from_owner(Tracked(alive.clone()));
		msg
	}

	#[tokio::test]
	async fn ownership_balance() {
		let alive = Arc::new(());
		let calls = Arc::new(AtomicUsize::new(0));

		let dispatcher = {
			let calls = calls.clone();
			Dispatcher::new(2, move |msg: Message<MockTransport>| {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move {
					assert_eq!(msg.payload(), &b"tracked"[..]);
					match n % 3 {
						0 => anyhow::Ok(()),
						1 => anyhow::bail!("failed"),
						_ => panic!("boom"),
					}
				}
			})
		};

		for _ in 0..30 {
			dispatcher.submit(tracked(&alive, None)).unwrap();
		}

		assert!(Arc::strong_count(&alive) > 1);

		dispatcher.join().await;

		assert_eq!(calls.load(Ordering::SeqCst), 30);
		assert_eq!(Arc::strong_count(&alive), 1, "leaked a payload");
	}

	#[tokio::test]
	async fn cancelled_before_dispatch() {
		let calls = Arc::new(AtomicUsize::new(0));
		let alive = Arc::new(());

		let dispatcher = {
			let calls = calls.clone();
			Dispatcher::new(1, move |_msg: Message<MockTransport>| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { anyhow::Ok(()) }
			})
		};

		let stream = MockStream::new(8);
		let msg = tracked(&alive, Some(stream.clone()));

		// Closed while still queued.
		stream.close();
		dispatcher.submit(msg).unwrap();
		dispatcher.join().await;

		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(Arc::strong_count(&alive), 1);
	}

	#[tokio::test]
	async fn purge_releases_cancelled() {
		let calls = Arc::new(AtomicUsize::new(0));
		let alive = Arc::new(());

		let dispatcher = {
			let calls = calls.clone();
			Dispatcher::new(1, move |_msg: Message<MockTransport>| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { anyhow::Ok(()) }
			})
		};

		let closing = MockStream::new(4);
		let open = MockStream::new(8);

		// The workers haven't been polled yet, so everything is still queued.
		dispatcher.submit(tracked(&alive, Some(closing.clone()))).unwrap();
		dispatcher.submit(tracked(&alive, Some(closing.clone()))).unwrap();
		dispatcher.submit(tracked(&alive, Some(open.clone()))).unwrap();
		assert_eq!(Arc::strong_count(&alive), 4);

		closing.close();
		assert_eq!(dispatcher.purge(), 2);

		// Released before any worker ran.
		assert_eq!(Arc::strong_count(&alive), 2);
		assert_eq!(dispatcher.pending(), 1);
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		dispatcher.join().await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(Arc::strong_count(&alive), 1);

		// Nothing to do once joined.
		assert_eq!(dispatcher.purge(), 0);
	}

	#[tokio::test]
	async fn submit_after_join() {
		let dispatcher = Dispatcher::new(DEFAULT_WORKERS, |_msg: Message<MockTransport>| async {
			anyhow::Ok(())
		});
		dispatcher.join().await;

		let (msg, _, _) = message(MessageKind::Datagram, None, b"");
		assert_eq!(dispatcher.submit(msg), Err(Error::Closed));
	}
}
