use futures::future::{BoxFuture, FutureExt};
use wt_server::{Handler, Message, MessageKind, Transport};

/// Acknowledges every message it receives, which is handy for testing clients.
///
/// Bidirectional messages get a reply on their stream and datagrams get a datagram back.
/// Unidirectional messages can't be answered, so they're only logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ack;

impl Ack {
	async fn run<T: Transport>(msg: Message<T>) -> anyhow::Result<()> {
		let content = String::from_utf8_lossy(msg.payload());
		let path = msg.path().unwrap_or_default();

		tracing::debug!(%path, kind = ?msg.kind(), %content, "received message");

		match msg.kind() {
			MessageKind::Bidirectional => msg.reply(&format!("ACK BI: I received the message from {path}: {content}"))?,
			MessageKind::Datagram => {
				msg.send_datagram(&format!("ACK DG: I received the message from {path}: {content}"))?
			}
			MessageKind::Unidirectional => {}
		}

		Ok(())
	}
}

impl<T: Transport> Handler<T> for Ack {
	fn handle(&self, msg: Message<T>) -> BoxFuture<'static, anyhow::Result<()>> {
		Self::run(msg).boxed()
	}
}
