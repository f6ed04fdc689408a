//! Wire messages exchanged between the synthesis server and its clients.
//!
//! Every frame is a JSON object with a `type` tag. Inbound frames are decoded into a closed
//! set of [`Request`] variants; anything else is either malformed or of an unknown type, and
//! [`decode`] says which.

use serde::{Deserialize, Serialize};

pub const REQUEST_SYNTHESIS: &str = "request_synthesis";

/// Messages a client may send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "request_synthesis")]
    RequestSynthesis(SynthesisRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub top_module: String,
    pub files: Vec<SourceFile>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub body: String,
}

/// Messages the server sends back. Exactly one per synthesis request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "bitstream")]
    Bitstream { bitstream: Vec<u8> },
    /// The inbound frame could not be decoded.
    #[serde(rename = "JSON_Error")]
    JsonError,
    #[serde(rename = "synthesis_error")]
    SynthesisError {
        kind: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log: Option<String>,
    },
}

/// Outcome of decoding one inbound frame.
#[derive(Debug)]
pub enum Decoded {
    Request(Request),
    /// Valid JSON whose `type` is missing or not one we know. Carries the type, if any.
    Unrecognized(Option<String>),
    Malformed(serde_json::Error),
}

/// Decode one inbound frame.
///
/// A frame that is not JSON, or that names a known `type` but does not have that type's
/// shape, is [`Decoded::Malformed`].
pub fn decode(frame: &[u8]) -> Decoded {
    let value: serde_json::Value = match serde_json::from_slice(frame) {
        Ok(value) => value,
        Err(err) => return Decoded::Malformed(err),
    };
    let message_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);
    if message_type.as_deref() != Some(REQUEST_SYNTHESIS) {
        return Decoded::Unrecognized(message_type);
    }
    match serde_json::from_value(value) {
        Ok(request) => Decoded::Request(request),
        Err(err) => Decoded::Malformed(err),
    }
}

/// Decode a server response. Clients use this; the server never receives responses.
pub fn decode_response(frame: &str) -> serde_json::Result<Response> {
    serde_json::from_str(frame)
}

pub fn encode<T: Serialize>(message: &T) -> serde_json::Result<String> {
    serde_json::to_string(message)
}
