use super::messages::Message;
use crate::events::Output;
use crate::types::OutputBlob;

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use tokio::select;
use tokio::sync::{mpsc, oneshot};

/// Upper bound on retained output. Oldest blobs are dropped first.
const MAX_RETAINED_BYTES: usize = 64 * 1024;

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<Message>,
    output_rx: mpsc::UnboundedReceiver<Output>,
    output_buffer: VecDeque<OutputBlob>,
    buffered_bytes: usize,
    subscribers: Vec<mpsc::UnboundedSender<OutputBlob>>,
    collectors: Vec<oneshot::Sender<Bytes>>,
    output_pending: bool,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<Message>,
        output_rx: mpsc::UnboundedReceiver<Output>,
    ) {
        let actor = Actor {
            inbox,
            output_rx,
            output_buffer: VecDeque::new(),
            buffered_bytes: 0,
            subscribers: Vec::new(),
            collectors: Vec::new(),
            output_pending: true,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        loop {
            select! {
                Some(msg) = self.inbox.recv() => {
                    use self::Message::*;
                    match msg {
                        StreamAll { subscriber } => self.stream_all(subscriber),
                        Collect { response } => {
                            if self.output_pending {
                                self.collectors.push(response);
                            } else {
                                let _ = response.send(self.retained());
                            }
                        }
                        Snapshot { response } => {
                            let _ = response.send(self.retained());
                        }
                    }
                }
                maybe_output = self.output_rx.recv(), if self.output_pending => {
                    match maybe_output {
                        Some(Output::Stdout(blob)) | Some(Output::Stderr(blob)) => {
                            self.retain(blob.clone());
                            // only retain subscribers who have not dropped
                            self.subscribers.retain(|sub| sub.send(blob.clone()).is_ok());
                        }
                        None => {
                            self.subscribers.clear();
                            self.output_pending = false;
                            let retained = self.retained();
                            for collector in self.collectors.drain(..) {
                                let _ = collector.send(retained.clone());
                            }
                        }
                    }
                }
                else => break,
            }
        }
    }

    fn retain(&mut self, blob: OutputBlob) {
        self.buffered_bytes += blob.len();
        self.output_buffer.push_back(blob);
        while self.buffered_bytes > MAX_RETAINED_BYTES && self.output_buffer.len() > 1 {
            if let Some(dropped) = self.output_buffer.pop_front() {
                self.buffered_bytes -= dropped.len();
            }
        }
    }

    fn retained(&self) -> Bytes {
        let mut log = BytesMut::with_capacity(self.buffered_bytes);
        for blob in &self.output_buffer {
            log.extend_from_slice(blob);
        }
        log.freeze()
    }

    fn stream_all(&mut self, output_tx: mpsc::UnboundedSender<OutputBlob>) {
        for blob in &self.output_buffer {
            if output_tx.send(blob.clone()).is_err() {
                return;
            }
        }
        if self.output_pending {
            self.subscribers.push(output_tx);
        }
    }
}
