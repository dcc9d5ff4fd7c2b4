//! Error types for the compositing core.

use thiserror::Error;

/// Primary error type for the framemix core.
///
/// Construction errors (`FileRead`, `NoUsableStream`) propagate to the
/// caller. Errors raised on worker threads are either logged or captured
/// into the pass future that observed them; they never terminate the
/// process.
#[derive(Error, Debug, Clone)]
pub enum FramemixError {
    /// The media container could not be opened or probed.
    #[error("failed to read media container: {0}")]
    FileRead(String),

    /// The container holds neither an openable video nor audio stream.
    #[error("no usable video or audio stream in container")]
    NoUsableStream,

    /// A decoder for a single stream could not be opened. Recoverable:
    /// the stream is skipped when the other kind opened.
    #[error("failed to open codec: {0}")]
    CodecOpen(String),

    /// A seek on the container failed. Logged by the pump, never thrown
    /// across the pump boundary.
    #[error("seek failed: {0}")]
    SeekFailed(String),

    /// An easing identifier passed to a transform operation is unknown.
    #[error("unknown easing \"{0}\"")]
    InvalidEasing(String),

    /// An image or audio mix pass failed as a whole for one tick.
    #[error("mix stage failed: {0}")]
    MixStageFailed(String),
}

/// A specialized `Result` for framemix operations.
pub type Result<T> = std::result::Result<T, FramemixError>;
