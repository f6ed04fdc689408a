mod actor;
mod messages;
use crate::{events::Output, types::OutputBlob};
use actor::Actor;
use messages::Message;

use bytes::Bytes;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};

/// A `Broadcaster` which can add subscribers, receive output, and broadcast the output to all subscribers.
///
/// This struct is actually an actor handle. The real work is done in the actor spawned by `BroadcasterHandle::spawn`.
/// Output is also retained (up to a bound) so late subscribers get a replay and a failed build can report
/// what the toolchain printed.
#[derive(Clone)]
pub struct BroadcasterHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl BroadcasterHandle {
    pub fn spawn(output_rx: UnboundedReceiver<Output>) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_rx);
        Self { sender }
    }

    /// Subscribe to stdout and stderr, interleaved in arrival order.
    pub fn stream_all(&self, subscriber: UnboundedSender<OutputBlob>) {
        let _ = self.sender.send(Message::StreamAll { subscriber });
    }

    /// The retained output once the producer has hung up.
    pub async fn collect(&self) -> Bytes {
        let (response, rx) = oneshot::channel();
        if self.sender.send(Message::Collect { response }).is_err() {
            return Bytes::new();
        }
        rx.await.unwrap_or_default()
    }

    /// The retained output so far, without waiting for the producer.
    pub async fn snapshot(&self) -> Bytes {
        let (response, rx) = oneshot::channel();
        if self.sender.send(Message::Snapshot { response }).is_err() {
            return Bytes::new();
        }
        rx.await.unwrap_or_default()
    }
}
