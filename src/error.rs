//! Error taxonomy for the pipeline.
//!
//! Per-item failures (`ItemError`) never carry partial output; they are logged by
//! the sink and, under the strict policy, escalate to `PipelineError::Aborted`.
//! Everything else in `PipelineError` is fatal for the whole run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain image bytes for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or any other failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The response body could not be read to completion.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Failure to turn fetched bytes into a pixel grid.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Neither the bytes nor the declared content type name a supported format.
    #[error("unsupported image format (content type: {})", .content_type.as_deref().unwrap_or("none"))]
    UnsupportedFormat { content_type: Option<String> },
    /// The codec rejected the body.
    #[error(transparent)]
    Codec(#[from] image::ImageError),
    /// The decode task did not run to completion.
    #[error("decode task failed: {0}")]
    Interrupted(String),
}

/// Terminal failure of a single work item. The item produces no output row.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("line {line}: input is not a usable URL ({reason}): {input}")]
    Input {
        line: usize,
        input: String,
        reason: String,
    },
    #[error("unable to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("unable to decode image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
}

impl ItemError {
    /// The offending input, as it appeared in the input file.
    pub fn subject(&self) -> &str {
        match self {
            ItemError::Input { input, .. } => input,
            ItemError::Fetch { url, .. } | ItemError::Decode { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Input { .. } => "input",
            ItemError::Fetch { .. } => "fetch",
            ItemError::Decode { .. } => "decode",
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to read input: {0}")]
    ReadInput(#[source] io::Error),
    #[error("unable to open output file {path}: {source}")]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to write output: {0}")]
    WriteOutput(#[source] io::Error),
    #[error("unable to create HTTP client: {0}")]
    HttpClient(String),
    #[error("run aborted on first failure: {0}")]
    Aborted(#[source] ItemError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
