use futures::{SinkExt, StreamExt};
use protocol::{Decoded, Request, Response, SynthesisRequest};
use std::net::SocketAddr;
use synthlib::{Artifact, JobCoordinator, JobError, JobRequest, SourceFile};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, info_span, warn, Instrument};

/// Serve one WebSocket connection until the peer goes away.
///
/// Every synthesis request runs in its own task, so a connection can have any number of jobs in
/// flight. Responses go out through a single writer task in whatever order the jobs finish.
pub async fn serve(stream: TcpStream, peer: SocketAddr, coordinator: JobCoordinator) {
    let span = info_span!("connection", %peer);
    async move {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(err) => {
                warn!(error = %err, "websocket handshake failed");
                return;
            }
        };
        info!("client connected");
        let (mut sink, mut stream) = ws.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Response>();
        tokio::spawn(
            async move {
                while let Some(response) = outbound_rx.recv().await {
                    let text = match protocol::encode(&response) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to encode response");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        debug!(error = %err, "dropping response, client is gone");
                        break;
                    }
                }
                let _ = sink.close().await;
            }
            .in_current_span(),
        );

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => route(text.as_bytes(), &outbound_tx, &coordinator),
                Ok(Message::Binary(data)) => route(&data, &outbound_tx, &coordinator),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "client closed connection");
                    break;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "websocket receive error");
                    break;
                }
            }
        }
        info!("client disconnected");
        // jobs still in flight keep their own sender; the writer ends after the last of them
    }
    .instrument(span)
    .await
}

/// Decode one frame and act on it.
fn route(
    frame: &[u8],
    outbound_tx: &mpsc::UnboundedSender<Response>,
    coordinator: &JobCoordinator,
) {
    match protocol::decode(frame) {
        Decoded::Malformed(err) => {
            warn!(error = %err, "unable to parse message");
            let _ = outbound_tx.send(Response::JsonError);
        }
        Decoded::Unrecognized(message_type) => {
            warn!(?message_type, "unrecognized message type");
        }
        Decoded::Request(Request::RequestSynthesis(request)) => {
            let outbound_tx = outbound_tx.clone();
            let coordinator = coordinator.clone();
            tokio::spawn(
                async move {
                    let result = match job_request(request) {
                        Ok(request) => coordinator.synthesize(request).await,
                        Err(err) => Err(err),
                    };
                    let _ = outbound_tx.send(to_response(result));
                }
                .in_current_span(),
            );
        }
    }
}

fn job_request(request: SynthesisRequest) -> Result<JobRequest, JobError> {
    let files = request
        .files
        .into_iter()
        .map(|file| SourceFile::new(file.name, file.body))
        .collect();
    JobRequest::new(request.top_module, files)
}

pub fn to_response(result: Result<Artifact, JobError>) -> Response {
    match result {
        Ok(artifact) => Response::Bitstream {
            bitstream: artifact.to_vec(),
        },
        Err(err) => Response::SynthesisError {
            kind: err.kind().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
            log: err.diagnostics().map(str::to_string),
        },
    }
}
