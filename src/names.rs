use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::downloader::YtDlp;
use crate::error::Result;
use crate::model::OutputFormat;
use crate::sanitize::clean_filename;

/// On-disk link→filename mapping, one line per link. Written once before the
/// worker starts, read once by the worker, never updated afterwards.
pub const MANIFEST_FILE: &str = "original_names.txt";

/// Placeholder when the extractor reports no title for a video.
pub const UNKNOWN_TITLE: &str = "unknown_title";

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILE)
}

fn manifest_line(link: &str, title: &str, format: OutputFormat) -> String {
    format!("{link}|{}.{}", clean_filename(title), format.ext())
}

/// Pre-fetches every link's title (a full metadata query per link, network
/// cost accepted) and writes the manifest, overwriting any previous one.
///
/// A single failed metadata fetch aborts the whole recording step; there is
/// no partial-manifest recovery. Diagnostic mode records the first link only.
pub async fn record_names(
    ytdlp: &YtDlp,
    links: &[String],
    output_dir: &Path,
    format: OutputFormat,
    debug: bool,
) -> Result<()> {
    let take = if debug { links.len().min(1) } else { links.len() };
    let mut file = std::fs::File::create(manifest_path(output_dir))?;

    for link in &links[..take] {
        let title = ytdlp
            .video_title(link)
            .await?
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        writeln!(file, "{}", manifest_line(link, &title, format))?;
        log::debug!("Recorded name for {link}: {title}");
    }
    Ok(())
}

/// Parses the manifest back into a link→filename map. Duplicate links keep
/// the last occurrence.
pub fn read_manifest(output_dir: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(manifest_path(output_dir))?;
    Ok(parse_manifest(&raw))
}

fn parse_manifest(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter_map(|line| line.split_once('|'))
        .map(|(link, name)| (link.to_string(), name.trim().to_string()))
        .collect()
}
