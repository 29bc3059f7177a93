use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::downloader::{background_command, spawn_error, tool_failed};
use crate::error::{PipelineError, Result};

/// Output frame rate, fixed regardless of the source.
const OUTPUT_FPS: &str = "24";

/// Composites a still image full-frame over a video via ffmpeg, re-encoding
/// with codecs chosen by the output extension.
#[derive(Debug, Clone)]
pub struct Compositor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Compositor {
    pub fn new(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe: ffprobe.unwrap_or_else(|| PathBuf::from("ffprobe")),
        }
    }

    /// Watermarks `video` with `watermark_image` into `out`.
    ///
    /// The image is resized to exactly the video's pixel dimensions (aspect
    /// ratio ignored, Lanczos3 resampling) and overlaid on every frame for
    /// the full duration; the source audio is carried into the output. The
    /// extension check runs before any other work, so an unsupported format
    /// never leaves partial output behind; neither does a failed encode.
    pub async fn add_watermark(
        &self,
        video: &Path,
        watermark_image: &Path,
        out: &Path,
    ) -> Result<()> {
        let (vcodec, acodec) = codecs_for(out)?;

        let (width, height) = self.probe_dimensions(video).await?;
        log::debug!("{} is {width}x{height}", video.display());

        let scratch = scratch_overlay_path(out);
        resize_to(watermark_image, width, height, &scratch)?;

        let encoded = self
            .overlay_encode(video, &scratch, out, vcodec, acodec)
            .await;
        let _ = std::fs::remove_file(&scratch);

        if let Err(e) = encoded {
            // ffmpeg -y can leave a truncated file when it dies mid-encode.
            let _ = std::fs::remove_file(out);
            return Err(e);
        }
        Ok(())
    }

    /// Pixel dimensions of the first video stream.
    async fn probe_dimensions(&self, input: &Path) -> Result<(u32, u32)> {
        let output = background_command(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-select_streams",
                "v:0",
                "-show_streams",
            ])
            .arg(input)
            .output()
            .await
            .map_err(|e| spawn_error("ffprobe", e))?;

        if !output.status.success() {
            return Err(tool_failed("ffprobe", &output));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        parsed
            .streams
            .and_then(|streams| streams.into_iter().next())
            .and_then(|s| match (s.width, s.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Some((w as u32, h as u32)),
                _ => None,
            })
            .ok_or_else(|| PipelineError::NoVideoStream(input.to_path_buf()))
    }

    async fn overlay_encode(
        &self,
        video: &Path,
        overlay: &Path,
        out: &Path,
        vcodec: &str,
        acodec: &str,
    ) -> Result<()> {
        let output = background_command(&self.ffmpeg)
            .args(["-nostdin", "-y"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(overlay)
            .args(["-filter_complex", "[0:v][1:v]overlay=0:0:format=auto[v]"])
            .args(["-map", "[v]", "-map", "0:a?"])
            .args(["-r", OUTPUT_FPS])
            .args(["-c:v", vcodec, "-c:a", acodec])
            .arg(out)
            .output()
            .await
            .map_err(|e| spawn_error("ffmpeg", e))?;

        if !output.status.success() {
            return Err(tool_failed("ffmpeg", &output));
        }
        Ok(())
    }
}

/// Container → (video codec, audio codec). Anything but mp4/webm is an
/// immediate unsupported-format failure.
fn codecs_for(out: &Path) -> Result<(&'static str, &'static str)> {
    match out.extension().and_then(|e| e.to_str()) {
        Some("mp4") => Ok(("libx264", "aac")),
        Some("webm") => Ok(("libvpx", "libvorbis")),
        other => Err(PipelineError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Decodes the watermark, forces RGBA, and stretches it to exactly
/// `width`x`height` with high-quality resampling.
fn resize_to(src: &Path, width: u32, height: u32, dest: &Path) -> Result<()> {
    let img = image::open(src)?;
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);
    resized.to_rgba8().save(dest)?;
    Ok(())
}

/// Per-output scratch path for the resized overlay; overwritten on rerun.
fn scratch_overlay_path(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("overlay");
    std::env::temp_dir().join(format!("shortstamp_{stem}.png"))
}

#[derive(Debug, serde::Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, serde::Deserialize)]
struct FfprobeStream {
    width: Option<i64>,
    height: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_table_matches_container() {
        assert_eq!(codecs_for(Path::new("a/1_x.mp4")).unwrap(), ("libx264", "aac"));
        assert_eq!(codecs_for(Path::new("1_x.webm")).unwrap(), ("libvpx", "libvorbis"));
        assert!(matches!(
            codecs_for(Path::new("1_x.mov")),
            Err(PipelineError::UnsupportedFormat(_))
        ));
        assert!(codecs_for(Path::new("noextension")).is_err());
    }

    #[tokio::test]
    async fn unsupported_format_fails_before_writing_anything() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("1_clip.mov");

        let compositor = Compositor::new(None, None);
        let err = compositor
            .add_watermark(Path::new("missing.mp4"), Path::new("missing.png"), &out)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
        assert!(!out.exists());
    }

    #[test]
    fn resize_ignores_aspect_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wm.png");
        let dest = dir.path().join("wm_resized.png");
        image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 128]))
            .save(&src)
            .unwrap();

        resize_to(&src, 9, 5, &dest).unwrap();

        let resized = image::open(&dest).unwrap().to_rgba8();
        assert_eq!(resized.dimensions(), (9, 5));
    }

    #[test]
    fn ffprobe_json_yields_dimensions() {
        let parsed: FfprobeOutput =
            serde_json::from_str(r#"{"streams":[{"width":1080,"height":1920}]}"#).unwrap();
        let s = parsed.streams.unwrap();
        assert_eq!((s[0].width, s[0].height), (Some(1080), Some(1920)));
    }
}
