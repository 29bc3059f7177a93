use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};

use crate::error::{PipelineError, Result};
use crate::progress::parse_progress_from_line;

/// Everything yt-dlp does for us: flat channel listings, per-video metadata,
/// and the actual media download with progress streaming.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
}

impl YtDlp {
    /// `override_bin` comes from the config file; otherwise the tool is
    /// resolved from PATH at spawn time.
    pub fn new(override_bin: Option<PathBuf>) -> Self {
        Self {
            bin: override_bin.unwrap_or_else(|| PathBuf::from("yt-dlp")),
        }
    }

    fn command(&self) -> Command {
        background_command(&self.bin)
    }

    /// Flat listing query: metadata only, one JSON object per line, capped at
    /// `cap` entries. Returns the video ids in discovery order, duplicates
    /// included. An empty listing is not an error.
    pub async fn flat_entries(&self, listing_url: &str, cap: usize) -> Result<Vec<String>> {
        let output = self
            .command()
            .args(["--flat-playlist", "--dump-json", "--no-warnings", "--playlist-end"])
            .arg(cap.to_string())
            .arg(listing_url)
            .output()
            .await
            .map_err(|e| spawn_error("yt-dlp", e))?;

        if !output.status.success() {
            return Err(tool_failed("yt-dlp", &output));
        }

        Ok(parse_flat_entries(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Full (non-flat) metadata fetch for one video. Returns the title, or
    /// `None` when the extractor reports none.
    pub async fn video_title(&self, link: &str) -> Result<Option<String>> {
        let output = self
            .command()
            .args(["--dump-json", "--no-playlist", "--no-warnings"])
            .arg(link)
            .output()
            .await
            .map_err(|e| spawn_error("yt-dlp", e))?;

        if !output.status.success() {
            return Err(tool_failed("yt-dlp", &output));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(json.get("title").and_then(|v| v.as_str()).map(str::to_string))
    }

    /// Downloads best available video+audio for `link` into
    /// `<dest_stem>.<ext>`, where yt-dlp picks the extension. Progress lines
    /// are parsed as they arrive and forwarded to `on_progress`.
    pub async fn download(
        &self,
        link: &str,
        dest_stem: &Path,
        mut on_progress: impl FnMut(f32),
    ) -> Result<()> {
        let template = format!("{}.%(ext)s", dest_stem.display());
        let mut child = self
            .command()
            .args(["-f", "bestvideo+bestaudio/best", "--no-playlist", "--no-warnings"])
            .args(["--newline", "--progress-template", "downloaded_bytes:%(progress._percent_str)s"])
            .arg("-o")
            .arg(&template)
            .arg(link)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("yt-dlp", e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::other("yt-dlp stdout not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::other("yt-dlp stderr not captured")))?;

        // Drain stderr on the side so a chatty extractor cannot deadlock the
        // stdout line loop.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            log::debug!("yt-dlp> {line}");
            if let Some(frac) = parse_progress_from_line(&line) {
                on_progress(frac);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(PipelineError::ToolFailed {
                tool: "yt-dlp".to_string(),
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// One JSON object per stdout line; anything without an `id` is skipped.
fn parse_flat_entries(stdout: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(line) {
            if let Some(id) = json.get("id").and_then(|v| v.as_str()) {
                if !id.is_empty() {
                    ids.push(id.to_string());
                }
            }
        }
    }
    ids
}

pub(crate) fn spawn_error(tool: &str, e: std::io::Error) -> PipelineError {
    match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::ToolMissing {
            tool: tool.to_string(),
        },
        _ => PipelineError::Io(e),
    }
}

pub(crate) fn tool_failed(tool: &str, output: &std::process::Output) -> PipelineError {
    PipelineError::ToolFailed {
        tool: tool.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Subprocess builder shared with the compositor.
pub(crate) fn background_command(program: impl AsRef<std::ffi::OsStr>) -> Command {
    let mut cmd = Command::new(program);
    configure_for_background(&mut cmd);
    cmd
}

#[cfg(windows)]
fn configure_for_background(cmd: &mut Command) {
    // Keep console windows from flashing up while tools run.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_entries_keep_order_and_duplicates() {
        let stdout = concat!(
            "{\"id\":\"abc\",\"title\":\"one\"}\n",
            "\n",
            "{\"id\":\"def\"}\n",
            "{\"title\":\"no id\"}\n",
            "not json\n",
            "{\"id\":\"abc\"}\n",
        );
        assert_eq!(parse_flat_entries(stdout), vec!["abc", "def", "abc"]);
    }

    #[test]
    fn empty_listing_parses_to_empty() {
        assert!(parse_flat_entries("").is_empty());
    }
}
