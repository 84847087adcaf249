//! WebTransport streams, sessions and message dispatch on top of a QUIC/HTTP-3 substrate.
//!
//! The substrate hands each [Connection] the bytes of every stream and datagram.
//! Raw WebTransport streams are detected from their leading bytes, their prologue parsed,
//! and their length-prefixed frames turned into [Message]s that are run by a [Dispatcher].
//! Everything else is handed back untouched.
mod config;
mod connection;
mod dispatch;
mod error;
mod message;
mod push;
mod session;
mod stream;
mod transport;

pub(crate) mod util;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::*;
pub use connection::*;
pub use dispatch::*;
pub use error::*;
pub use message::*;
pub use push::*;
pub use session::*;
pub use stream::*;
pub use transport::*;

// Re-export the wire layer.
pub use wt_proto as proto;
