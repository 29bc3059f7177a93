use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the download/watermark pipeline. Each job catches these
/// at its boundary and turns them into a status message; the run continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("external tool is missing: {tool}")]
    ToolMissing { tool: String },

    #[error("external tool failed: {tool} (code={code:?}) {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Downloaded file not found for {stem}")]
    DownloadedFileMissing { stem: String },

    #[error("multiple downloaded files match {stem}")]
    AmbiguousDownload { stem: String },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("no video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("final file not created")]
    FinalFileMissing,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
