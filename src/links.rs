use crate::downloader::YtDlp;
use crate::error::Result;

/// Trailing path segments a pasted channel URL may carry; all of them point
/// at the same channel, so they are stripped before the shorts suffix goes on.
const TAB_SUFFIXES: &[&str] = &[
    "/about",
    "/community",
    "/playlist",
    "/playlists",
    "/streams",
    "/featured",
    "/videos",
];

/// Turns whatever the user pasted into the channel's shorts listing URL.
///
/// Handle URLs (`…/@name/whatever`) are rebuilt from the handle alone;
/// everything else gets known tab suffixes stripped and `/shorts` appended.
pub fn normalize_channel_url(channel_url: &str) -> String {
    if let Some((_, rest)) = channel_url.split_once("/@") {
        let handle = rest.split('/').next().unwrap_or(rest);
        return format!("https://www.youtube.com/@{handle}/shorts");
    }

    let mut url = channel_url.to_string();
    for suffix in TAB_SUFFIXES {
        if let Some((head, _)) = url.split_once(suffix) {
            url = head.to_string();
        }
    }
    url.push_str("/shorts");
    url
}

/// Collects up to `cap` short-form video links from the channel, in
/// discovery order. An empty result is the "no videos found" condition; the
/// caller decides how to present it.
pub async fn collect_short_links(ytdlp: &YtDlp, channel_url: &str, cap: usize) -> Result<Vec<String>> {
    let listing_url = normalize_channel_url(channel_url);
    log::info!("Listing shorts from {listing_url} (cap {cap})");

    let ids = ytdlp.flat_entries(&listing_url, cap).await?;
    if ids.is_empty() {
        log::warn!("No videos found on the channel.");
    }

    Ok(ids
        .into_iter()
        .map(|id| format!("https://www.youtube.com/shorts/{id}"))
        .collect())
}
