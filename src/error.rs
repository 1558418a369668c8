use thiserror::Error;

/// Caller-visible failures of the gist agent.
///
/// Malformed model output and out-of-range page selections never show up
/// here: the parsers absorb them and the algorithms fall back.
#[derive(Debug, Error)]
pub enum GistError {
    /// The text source could not supply a title or paragraphs.
    #[error("source unavailable: {locator}: {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// `answer` was called before any document was processed.
    #[error("no document has been processed")]
    NotProcessed,

    /// The inference endpoint call failed outright.
    #[error("inference failed during {stage}: {source}")]
    Inference {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The endpoint answered but produced no usable text.
    #[error("inference returned no text during {stage}")]
    EmptyCompletion { stage: &'static str },

    /// Saving or loading a document snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, GistError>;
