use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

/// Spawn a background task that inherits the current tracing span.
pub fn spawn<F>(f: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tokio::task::spawn(f.in_current_span())
}
