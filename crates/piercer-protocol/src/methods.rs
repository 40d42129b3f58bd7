//! Names of the methods this fleet's peers expose to each other.

/// Called by an agent to forward one chunk (or the `"[DONE]"` sentinel) of a
/// streaming completion back to the controller.
pub const RECEIVE_COMPLETION: &str = "receiveCompletion";
/// Called by an agent after its installed-model set changes.
pub const UPDATE_MODELS: &str = "updateModels";
/// Called by an agent to report an inference failure for a request it owns.
pub const ERROR: &str = "error";

/// Called by the controller to start a streaming text completion.
pub const COMPLETION: &str = "completion";
/// Called by the controller to start a streaming chat completion.
pub const CHAT: &str = "chat";
/// Called by the controller to list the agent's installed model files.
pub const LIST_MODELS: &str = "listModels";
/// Called by the controller to list the agent's currently loaded models.
pub const CURRENT_MODELS: &str = "currentModels";
/// Called by the controller to load a model into a worker ahead of use.
pub const START_MODEL: &str = "startModel";
/// Called by the controller to have the agent fetch a model file.
pub const DOWNLOAD_MODEL: &str = "downloadModel";
/// Called by the controller to query the agent's hardware/worker status.
pub const STATUS: &str = "status";
