//! Typed parameter shapes for the methods named in [`crate::methods`].
//!
//! Every method this fleet exposes takes exactly one positional argument: a
//! JSON object. [`AsParams`] and [`FromParams`] convert between that
//! convention and a typed Rust struct, so callers and handlers never touch
//! the raw `Vec<Value>` directly.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// A method's params, convertible into the single-element positional array
/// carried on the wire.
pub trait AsParams: Serialize {
    /// Serialize `self` into the one-element `params` array for a [`crate::Request`].
    fn as_params(&self) -> Vec<Value> {
        vec![serde_json::to_value(self).expect("params must be representable as JSON")]
    }
}

/// A method's params, recoverable from the positional array an incoming
/// [`crate::Request`] carried.
pub trait FromParams: DeserializeOwned {
    /// Parse `params[0]` as `Self`.
    ///
    /// Fails if the array is empty or its first element doesn't match the
    /// expected shape; this fleet's methods never take more than one
    /// argument, so later elements (if any) are ignored.
    fn from_params(params: &[Value]) -> Result<Self, serde_json::Error> {
        let first = params.first().cloned().unwrap_or(Value::Null);
        serde_json::from_value(first)
    }
}

impl<T: Serialize> AsParams for T {}
impl<T: DeserializeOwned> FromParams for T {}

/// One chunk of a streaming completion, or the end-of-stream sentinel.
///
/// The literal JSON string `"[DONE]"` terminates a stream; every other value
/// is an opaque chunk the router forwards to the HTTP client without
/// inspecting its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionData {
    /// End of stream.
    Done(DoneMarker),
    /// An opaque chunk, forwarded verbatim.
    Chunk(Value),
}

impl CompletionData {
    /// The end-of-stream sentinel value.
    pub fn done() -> Self {
        CompletionData::Done(DoneMarker)
    }

    /// Returns true if this is the end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        matches!(self, CompletionData::Done(_))
    }
}

/// Marker type that (de)serializes only as the literal string `"[DONE]"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoneMarker;

impl Serialize for DoneMarker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("[DONE]")
    }
}

impl<'de> Deserialize<'de> for DoneMarker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "[DONE]" {
            Ok(DoneMarker)
        } else {
            Err(serde::de::Error::custom("not the [DONE] sentinel"))
        }
    }
}

/// Params for [`crate::methods::RECEIVE_COMPLETION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveCompletionParams {
    /// Id of the agent that produced this chunk.
    pub agent_id: String,
    /// Id of the in-flight request this chunk belongs to.
    pub request_id: String,
    /// The chunk itself, or the end-of-stream sentinel.
    pub data: CompletionData,
}

/// Params for [`crate::methods::UPDATE_MODELS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateModelsParams {
    /// Id of the agent reporting its installed models.
    pub agent_id: String,
    /// The agent's full installed-model set, replacing the prior one.
    pub models: Vec<String>,
}

/// Context attached to an [`ErrorParams`] report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// The in-flight request the error terminates.
    pub request_id: String,
}

/// Params for [`crate::methods::ERROR`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorParams {
    /// Human-readable description of the failure.
    pub error: String,
    /// Id of the agent reporting the failure.
    pub agent_id: String,
    /// Which in-flight request this failure terminates.
    pub context: ErrorContext,
}

/// Params for [`crate::methods::COMPLETION`] and [`crate::methods::CHAT`].
///
/// `body` carries the OpenAI request fields verbatim, as an opaque object:
/// this crate forwards them end-to-end without parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Controller-minted id correlating streamed chunks back to this call.
    pub request_id: String,
    /// The internal (on-disk) model name to run against.
    pub model: String,
    /// The rest of the OpenAI-shaped request body, forwarded unparsed.
    #[serde(flatten)]
    pub body: Value,
}

/// Params for [`crate::methods::START_MODEL`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartModelParams {
    /// Internal (on-disk) model name to load.
    pub model: String,
}

/// Params for [`crate::methods::DOWNLOAD_MODEL`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadModelParams {
    /// Where to fetch the model file from.
    pub model_url: String,
    /// Name to save the downloaded file under in the agent's models directory.
    pub filename: String,
}
