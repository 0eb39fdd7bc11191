//! UI state types and event definitions.

/// Current state of the overlay.
///
/// The overlay follows a simple state machine:
/// `Selecting` -> `Response` (streaming) -> `Selecting` (on back) or closed
///             \-> `Error` (on failure) -> `Selecting` (on back)
#[derive(Clone, Debug)]
pub enum UiState {
    /// Adjusting the crop region.
    Selecting,
    /// Displaying a streaming or complete answer.
    Response {
        /// The cumulative answer text.
        text: String,
    },
    /// An error occurred during processing.
    Error(String),
}

/// Events sent from the background analysis task to the UI thread.
pub(crate) enum StreamEvent {
    /// Cumulative answer text so far (not a delta).
    Partial(String),
    /// The request completed with this final answer.
    Done(String),
    /// The request failed.
    Error(String),
}
