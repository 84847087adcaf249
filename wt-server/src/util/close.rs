use crate::{Error, StreamHandle};

pub(crate) trait Close {
	fn abort(&self, err: &Error);
}

impl<S: StreamHandle> Close for S {
	fn abort(&self, err: &Error) {
		if self.is_closed() {
			return;
		}

		if err.is_violation() {
			tracing::warn!(%err, code = err.to_code(), stream_id = self.id(), "closing stream");
		} else {
			tracing::debug!(%err, code = err.to_code(), stream_id = self.id(), "closing stream");
		}
		self.close();
	}
}

pub(crate) trait OrClose<S: Close, V> {
	fn or_close(self, stream: &S) -> Result<V, Error>;
}

impl<S: Close, V> OrClose<S, V> for Result<V, Error> {
	fn or_close(self, stream: &S) -> Result<V, Error> {
		match self {
			Ok(v) => Ok(v),
			Err(err) => {
				stream.abort(&err);
				Err(err)
			}
		}
	}
}
