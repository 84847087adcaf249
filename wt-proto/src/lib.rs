//! WebTransport wire formats, without any I/O.
//!
//! Everything here operates on buffers and never blocks.
//! A short buffer is reported as [coding::DecodeError::More] and leaves the input untouched,
//! so the caller can append the next network read and try again.
pub mod coding;

mod classify;
mod connect;
mod datagram;
mod frame;
mod header;
mod route;

pub use classify::*;
pub use connect::*;
pub use datagram::*;
pub use frame::*;
pub use header::*;
pub use route::*;

pub use coding::VarInt;
