use http::{Method, StatusCode};
use thiserror::Error;

/// The `:protocol` pseudo-header value for WebTransport.
pub const PROTOCOL: &str = "webtransport";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
	#[error("unexpected method: {0}")]
	Method(Method),

	#[error("unexpected protocol: {0:?}")]
	Protocol(Option<String>),
}

impl ConnectError {
	/// The status code to answer the request with.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Method(_) => StatusCode::METHOD_NOT_ALLOWED,
			Self::Protocol(_) => StatusCode::BAD_REQUEST,
		}
	}
}

/// The headers of an extended CONNECT request, as decoded by the HTTP/3 codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
	pub method: Method,
	pub protocol: Option<String>,
	pub path: String,
}

impl ConnectRequest {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			method: Method::CONNECT,
			protocol: Some(PROTOCOL.to_string()),
			path: path.into(),
		}
	}

	/// Make sure this is a WebTransport handshake rather than some other request.
	pub fn validate(&self) -> Result<(), ConnectError> {
		if self.method != Method::CONNECT {
			return Err(ConnectError::Method(self.method.clone()));
		}

		if self.protocol.as_deref() != Some(PROTOCOL) {
			return Err(ConnectError::Protocol(self.protocol.clone()));
		}

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn webtransport() {
		assert_eq!(ConnectRequest::new("/chat").validate(), Ok(()));
	}

	#[test]
	fn not_connect() {
		let request = ConnectRequest {
			method: Method::GET,
			..ConnectRequest::new("/chat")
		};

		let err = request.validate().unwrap_err();
		assert_eq!(err, ConnectError::Method(Method::GET));
		assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
	}

	#[test]
	fn wrong_protocol() {
		let request = ConnectRequest {
			protocol: Some("websocket".to_string()),
			..ConnectRequest::new("/chat")
		};
		assert_eq!(request.validate().unwrap_err().status(), StatusCode::BAD_REQUEST);

		let request = ConnectRequest {
			protocol: None,
			..ConnectRequest::new("/chat")
		};
		assert_eq!(request.validate(), Err(ConnectError::Protocol(None)));
	}
}
