use crate::error::PipelineError;

/// Target container for the watermarked output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp4,
    Webm,
}

impl OutputFormat {
    /// File extension without the dot; doubles as the manifest extension.
    pub fn ext(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
        }
    }
}

/// Outcome of one per-video job, kept in discovery order. The run summary is
/// a fold over these; a failure never aborts the remaining items.
#[derive(Debug)]
pub struct JobOutcome {
    pub index: usize,
    pub link: String,
    pub result: Result<(), PipelineError>,
}

/// Events the worker sends to the UI thread. Delivery is FIFO over an
/// unbounded channel drained once per frame.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job left Pending; the UI uses this to fetch the item's thumbnail.
    ItemStarted {
        index: usize,
        total: usize,
        link: String,
    },
    /// Percent reported by the downloader for the current item (0.0..=1.0).
    /// Feeds the status label only, never the overall progress bar.
    DownloadProgress {
        index: usize,
        total: usize,
        fraction: f32,
    },
    /// A job reached Done or Failed, with its user-facing status line.
    ItemFinished {
        index: usize,
        total: usize,
        ok: bool,
        message: String,
    },
    /// Overall progress after a completed item, 0..=100, non-decreasing.
    Progress(u8),
    /// The run is over; counts are folded from the per-item outcomes.
    Finished { succeeded: usize, failed: usize },
}
