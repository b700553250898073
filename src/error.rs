use thiserror::Error;

/// Failure of one pipeline stage.
///
/// `Input` problems are caught before any frame is generated. `Resource` and
/// `Cancelled` come out of the frame group; `Collaborator` wraps ffmpeg/ffprobe.
#[derive(Debug, Error)]
pub enum WaveError {
    /// Malformed or unusable audio, or an invalid parameter combination.
    #[error("invalid input: {0}")]
    Input(String),

    /// A frame image could not be produced or persisted.
    #[error("resource error: {0}")]
    Resource(String),

    /// An external process failed; carries its diagnostic text.
    #[error("{tool} failed: {message}")]
    Collaborator { tool: &'static str, message: String },

    /// Frame generation stopped before every frame was written.
    #[error("frame generation cancelled")]
    Cancelled,
}

impl WaveError {
    pub fn input(msg: impl Into<String>) -> Self {
        WaveError::Input(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        WaveError::Resource(msg.into())
    }

    pub fn collaborator(tool: &'static str, message: impl Into<String>) -> Self {
        WaveError::Collaborator {
            tool,
            message: message.into(),
        }
    }
}

pub type Result<T, E = WaveError> = std::result::Result<T, E>;
