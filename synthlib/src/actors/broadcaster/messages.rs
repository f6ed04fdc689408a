use crate::types::OutputBlob;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum Message {
    StreamAll {
        subscriber: mpsc::UnboundedSender<OutputBlob>,
    },
    Collect {
        response: oneshot::Sender<Bytes>,
    },
    Snapshot {
        response: oneshot::Sender<Bytes>,
    },
}
