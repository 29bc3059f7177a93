use eframe::egui::ColorImage;

/// Extracts the video id from a shorts link
/// (`https://www.youtube.com/shorts/<id>`).
pub fn shorts_video_id(link: &str) -> Option<String> {
    let rest = link.split("/shorts/").nth(1)?;
    let id = rest.split(['?', '&', '/']).next().unwrap_or(rest);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Downloads and decodes the video's thumbnail. Blocking; run it inside
/// `spawn_blocking`. Any network or decode error just means no preview.
pub fn fetch_thumbnail(video_id: &str) -> Option<ColorImage> {
    let url = format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id);
    let resp = reqwest::blocking::get(&url).ok()?.bytes().ok()?;
    let img = image::load_from_memory(&resp).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_shorts_links() {
        assert_eq!(
            shorts_video_id("https://www.youtube.com/shorts/abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            shorts_video_id("https://www.youtube.com/shorts/abc123?feature=share").as_deref(),
            Some("abc123")
        );
        assert_eq!(shorts_video_id("https://www.youtube.com/watch?v=abc"), None);
    }
}
