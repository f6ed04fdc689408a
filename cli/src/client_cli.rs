use futures::{SinkExt, StreamExt};
use protocol::{Request, Response, SourceFile, SynthesisRequest};
use std::{error, fmt, path::PathBuf};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Result<T> = std::result::Result<T, Box<dyn error::Error>>;

/// The server answered, but not with a bitstream.
#[derive(Debug)]
pub struct SynthesisFailed(pub Response);

impl fmt::Display for SynthesisFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Response::SynthesisError { kind, message, .. } => {
                write!(f, "synthesis failed ({}): {}", kind, message)
            }
            Response::JsonError => write!(f, "server could not parse the request"),
            Response::Bitstream { .. } => write!(f, "unexpected bitstream"),
        }
    }
}

impl error::Error for SynthesisFailed {}

pub struct ClientCli {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ClientCli {
    pub async fn connect(server_addr: &str) -> Result<Self> {
        let (inner, _) = tokio_tungstenite::connect_async(server_addr).await?;
        Ok(Self { inner })
    }

    /// Upload `files`, wait for the single response and return the bitstream.
    pub async fn synthesize(&mut self, top_module: &str, files: &[PathBuf]) -> Result<Vec<u8>> {
        let mut sources = Vec::with_capacity(files.len());
        for path in files {
            let name = path
                .file_name()
                .ok_or_else(|| format!("not a file: {}", path.display()))?
                .to_string_lossy()
                .into_owned();
            let body = tokio::fs::read_to_string(path).await?;
            sources.push(SourceFile { name, body });
        }
        let request = Request::RequestSynthesis(SynthesisRequest {
            top_module: top_module.to_string(),
            files: sources,
        });
        self.inner
            .send(Message::Text(protocol::encode(&request)?))
            .await?;

        while let Some(frame) = self.inner.next().await {
            let response: Response = match frame? {
                Message::Text(text) => protocol::decode_response(&text)
                    .map_err(|err| format!("unexpected message from server: {}", err))?,
                Message::Close(_) => break,
                _ => continue,
            };
            return match response {
                Response::Bitstream { bitstream } => Ok(bitstream),
                other => Err(Box::new(SynthesisFailed(other))),
            };
        }
        Err("server closed the connection without responding".into())
    }
}
