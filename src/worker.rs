use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::downloader::YtDlp;
use crate::error::{PipelineError, Result};
use crate::model::{JobOutcome, OutputFormat, WorkerEvent};
use crate::names;
use crate::progress::overall_percent;
use crate::sanitize::clean_filename;
use crate::watermark::Compositor;

/// Extensions the download step may leave behind for a merged stream.
const RAW_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];

/// The two operations backed by external tools, behind a seam so the worker
/// can be exercised in tests without yt-dlp or ffmpeg installed.
pub trait MediaOps: Send + Sync {
    /// Downloads `link` into `<dest_stem>.<ext>` (the backend picks the
    /// extension), reporting download fractions as they become known.
    fn download(
        &self,
        link: &str,
        dest_stem: &Path,
        on_progress: &mut (dyn FnMut(f32) + Send),
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Composites `watermark` over `video`, writing `out`.
    fn composite(
        &self,
        video: &Path,
        watermark: &Path,
        out: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Production backend: yt-dlp for downloads, ffmpeg for compositing.
#[derive(Debug, Clone)]
pub struct ToolOps {
    ytdlp: YtDlp,
    compositor: Compositor,
}

impl ToolOps {
    pub fn new(ytdlp: YtDlp, compositor: Compositor) -> Self {
        Self { ytdlp, compositor }
    }
}

impl MediaOps for ToolOps {
    async fn download(
        &self,
        link: &str,
        dest_stem: &Path,
        on_progress: &mut (dyn FnMut(f32) + Send),
    ) -> Result<()> {
        self.ytdlp.download(link, dest_stem, on_progress).await
    }

    async fn composite(&self, video: &Path, watermark: &Path, out: &Path) -> Result<()> {
        self.compositor.add_watermark(video, watermark, out).await
    }
}

/// Inputs for one run; fixed once the collector and recorder have finished.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub links: Vec<String>,
    pub output_dir: PathBuf,
    pub watermark: PathBuf,
    pub format: OutputFormat,
    /// Pause between items, softening rate limits.
    pub delay: Duration,
    /// Diagnostic mode: stop after the first item.
    pub debug: bool,
}

/// Runs every job in order: download, locate the file on disk, composite,
/// finalize. Errors are caught at the job boundary and become per-item
/// failure statuses; the run always continues to the next item. Returns the
/// ordered outcome list the summary is folded from.
pub async fn run_jobs<S: MediaOps>(
    ops: S,
    params: RunParams,
    tx: UnboundedSender<WorkerEvent>,
) -> Vec<JobOutcome> {
    let manifest = names::read_manifest(&params.output_dir).unwrap_or_else(|e| {
        log::warn!("Manifest not readable ({e}); falling back to unknown-title names.");
        HashMap::new()
    });

    let total = params.links.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, link) in params.links.iter().enumerate() {
        let index = index + 1;
        if params.debug && index > 1 {
            break;
        }
        let link = link.trim();
        let _ = tx.send(WorkerEvent::ItemStarted {
            index,
            total,
            link: link.to_string(),
        });

        let result = process_one(&ops, &params, &manifest, index, total, link, &tx).await;
        let message = match &result {
            Ok(()) => format!("Video {index}/{total} processed successfully."),
            Err(PipelineError::FinalFileMissing) => {
                format!("Error: final file not created for video {index}/{total}.")
            }
            Err(e) => format!("Error processing video {index}/{total}: {e}"),
        };
        let ok = result.is_ok();
        if ok {
            log::info!("{message}");
        } else {
            log::error!("{message}");
        }
        let _ = tx.send(WorkerEvent::ItemFinished {
            index,
            total,
            ok,
            message,
        });
        outcomes.push(JobOutcome {
            index,
            link: link.to_string(),
            result,
        });

        let _ = tx.send(WorkerEvent::Progress(overall_percent(index, total)));
        tokio::time::sleep(params.delay).await;
    }

    let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let failed = outcomes.len() - succeeded;
    log::info!("Run finished: {succeeded} succeeded, {failed} failed.");
    let _ = tx.send(WorkerEvent::Finished { succeeded, failed });
    outcomes
}

/// One job: Pending → Downloading → Locating → Compositing → Finalizing.
async fn process_one<S: MediaOps>(
    ops: &S,
    params: &RunParams,
    manifest: &HashMap<String, String>,
    index: usize,
    total: usize,
    link: &str,
    tx: &UnboundedSender<WorkerEvent>,
) -> Result<()> {
    // Downloading: the raw stem comes from the link, not the human title, so
    // it never depends on the manifest being present.
    let stem_name = format!("{index}_{}", clean_filename(link));
    let stem = params.output_dir.join(&stem_name);

    let mut on_progress = {
        let tx = tx.clone();
        move |fraction: f32| {
            let _ = tx.send(WorkerEvent::DownloadProgress {
                index,
                total,
                fraction,
            });
        }
    };
    ops.download(link, &stem, &mut on_progress).await?;

    // Locating
    let raw = locate_download(&params.output_dir, &stem_name)?;

    // Compositing
    let final_name = manifest.get(link).cloned().unwrap_or_else(|| {
        format!("{}.{}", names::UNKNOWN_TITLE, params.format.ext())
    });
    let final_path = params.output_dir.join(format!("{index}_{final_name}"));
    ops.composite(&raw, &params.watermark, &final_path).await?;

    // Finalizing: exactly one file survives, the watermarked one on success
    // or the raw download on failure.
    if final_path.exists() {
        std::fs::remove_file(&raw)?;
        Ok(())
    } else {
        Err(PipelineError::FinalFileMissing)
    }
}

/// Finds the file the download step produced: name starts with the stem,
/// extension in the allowed set. Zero matches means the download silently
/// produced nothing; several matches are ambiguous and refused rather than
/// picked by directory order.
fn locate_download(dir: &Path, stem: &str) -> Result<PathBuf> {
    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(stem) {
            continue;
        }
        let path = entry.path();
        let allowed = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RAW_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if allowed {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(PipelineError::DownloadedFileMissing {
            stem: stem.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(PipelineError::AmbiguousDownload {
            stem: stem.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::sync::mpsc::unbounded_channel;

    /// Stub backend: "downloads" by writing `<stem>.mp4`, "composites" by
    /// copying the video, optionally failing for one chosen index.
    struct StubOps {
        fail_composite_for: Option<usize>,
    }

    impl MediaOps for StubOps {
        async fn download(
            &self,
            _link: &str,
            dest_stem: &Path,
            on_progress: &mut (dyn FnMut(f32) + Send),
        ) -> Result<()> {
            on_progress(1.0);
            std::fs::write(format!("{}.mp4", dest_stem.display()), b"raw video")?;
            Ok(())
        }

        async fn composite(&self, video: &Path, _watermark: &Path, out: &Path) -> Result<()> {
            if let Some(fail) = self.fail_composite_for {
                let name = out.file_name().and_then(|s| s.to_str()).unwrap_or("");
                if name.starts_with(&format!("{fail}_")) {
                    return Err(PipelineError::ToolFailed {
                        tool: "ffmpeg".to_string(),
                        code: Some(1),
                        stderr: "boom".to_string(),
                    });
                }
            }
            std::fs::copy(video, out)?;
            Ok(())
        }
    }

    fn params(dir: &Path, links: &[&str]) -> RunParams {
        RunParams {
            links: links.iter().map(|s| s.to_string()).collect(),
            output_dir: dir.to_path_buf(),
            watermark: dir.join("wm.png"),
            format: OutputFormat::Mp4,
            delay: Duration::ZERO,
            debug: false,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn locate_picks_the_single_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1_stem.webm"), b"x").unwrap();
        std::fs::write(dir.path().join("1_stem.description"), b"x").unwrap();
        std::fs::write(dir.path().join("2_other.mp4"), b"x").unwrap();

        let found = locate_download(dir.path(), "1_stem").unwrap();
        assert_eq!(found.file_name().unwrap(), "1_stem.webm");
    }

    #[test]
    fn locate_refuses_zero_or_many_matches() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            locate_download(dir.path(), "1_stem"),
            Err(PipelineError::DownloadedFileMissing { .. })
        ));

        std::fs::write(dir.path().join("1_stem.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("1_stem.mkv"), b"x").unwrap();
        assert!(matches!(
            locate_download(dir.path(), "1_stem"),
            Err(PipelineError::AmbiguousDownload { .. })
        ));
    }

    #[tokio::test]
    async fn a_failing_item_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let links = [
            "https://www.youtube.com/shorts/v1",
            "https://www.youtube.com/shorts/v2",
            "https://www.youtube.com/shorts/v3",
        ];
        let (tx, mut rx) = unbounded_channel();

        let outcomes = run_jobs(
            StubOps { fail_composite_for: Some(2) },
            params(dir.path(), &links),
            tx,
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());

        let events = drain(&mut rx);
        let finished: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::ItemFinished { ok, .. } => Some(*ok),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![true, false, true]);

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![33, 67, 100]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Finished { succeeded: 2, failed: 1 })
        ));

        // The failed item's raw download survives; the others were replaced.
        let raw_2 = format!("2_{}", clean_filename(links[1]));
        assert!(dir.path().join(format!("{raw_2}.mp4")).exists());
    }

    #[tokio::test]
    async fn end_to_end_run_leaves_only_final_files() {
        let dir = tempfile::tempdir().unwrap();
        let links = [
            "https://www.youtube.com/shorts/v1",
            "https://www.youtube.com/shorts/v2",
        ];

        let mut manifest = std::fs::File::create(names::manifest_path(dir.path())).unwrap();
        writeln!(manifest, "{}|A.mp4", links[0]).unwrap();
        writeln!(manifest, "{}|B.mp4", links[1]).unwrap();
        drop(manifest);

        let (tx, mut rx) = unbounded_channel();
        let outcomes = run_jobs(
            StubOps { fail_composite_for: None },
            params(dir.path(), &links),
            tx,
        )
        .await;
        assert!(outcomes.iter().all(|o| o.result.is_ok()));

        let mut files: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, ["1_A.mp4", "2_B.mp4", names::MANIFEST_FILE]);

        let events = drain(&mut rx);
        let ok_count = events
            .iter()
            .filter(|e| matches!(e, WorkerEvent::ItemFinished { ok: true, .. }))
            .count();
        assert_eq!(ok_count, 2);
        let last_progress = events
            .iter()
            .rev()
            .find_map(|e| match e {
                WorkerEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_progress, 100);
    }

    #[tokio::test]
    async fn missing_manifest_falls_back_to_unknown_title() {
        let dir = tempfile::tempdir().unwrap();
        let links = ["https://www.youtube.com/shorts/v9"];

        let (tx, _rx) = unbounded_channel();
        let outcomes = run_jobs(
            StubOps { fail_composite_for: None },
            params(dir.path(), &links),
            tx,
        )
        .await;

        assert!(outcomes[0].result.is_ok());
        assert!(dir.path().join("1_unknown_title.mp4").exists());
    }

    #[tokio::test]
    async fn debug_mode_processes_only_the_first_item() {
        let dir = tempfile::tempdir().unwrap();
        let links = [
            "https://www.youtube.com/shorts/v1",
            "https://www.youtube.com/shorts/v2",
        ];

        let mut p = params(dir.path(), &links);
        p.debug = true;
        let (tx, _rx) = unbounded_channel();
        let outcomes = run_jobs(StubOps { fail_composite_for: None }, p, tx).await;

        assert_eq!(outcomes.len(), 1);
        assert!(dir.path().join("1_unknown_title.mp4").exists());
        let second_stem = format!("2_{}", clean_filename(links[1]));
        assert!(!dir.path().join(format!("{second_stem}.mp4")).exists());
    }
}
