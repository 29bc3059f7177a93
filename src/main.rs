//! Main application for the Shorts watermarking downloader GUI.

// Startup configuration (config.toml)
mod config;
// yt-dlp integration: listings, metadata, downloads
mod downloader;
// Pipeline error types
mod error;
// Channel URL normalization and link collection
mod links;
// Shared data types between worker and UI
mod model;
// The original_names.txt manifest
mod names;
// Progress parsing and percentage math
mod progress;
// Filename allow-list filter
mod sanitize;
// Embedded themes (palette + window icon)
mod theme;
// Thumbnail fetching for the current item
mod thumbnail;
// ffmpeg watermark compositing
mod watermark;
// The per-run background worker
mod worker;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use eframe::{egui, App, Frame};
use egui::{ColorImage, TextureOptions};
use once_cell::sync::OnceCell;
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::config::AppConfig;
use crate::downloader::YtDlp;
use crate::model::{OutputFormat, WorkerEvent};
use crate::watermark::Compositor;
use crate::worker::{run_jobs, RunParams, ToolOps};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

fn runtime() -> &'static Arc<Runtime> {
    RUNTIME.get().expect("runtime initialized in main")
}

/// Program entry point: config, theme and runtime first (all three are fatal
/// when broken), then the GUI.
fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cfg = AppConfig::load("config.toml")?;
    let theme = theme::load(&cfg.theme).context("failed to load theme")?;

    let rt = Arc::new(Runtime::new().context("failed to start runtime")?);
    RUNTIME
        .set(rt)
        .map_err(|_| anyhow::anyhow!("runtime initialized twice"))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([540.0, 680.0])
            .with_icon(theme.icon),
        ..Default::default()
    };
    let visuals = theme.visuals;
    eframe::run_native(
        "Shorts Watermarker",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(visuals.clone());
            Box::new(ShortstampApp::new(cfg))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}

/// Application state for the GUI
struct ShortstampApp {
    cfg: AppConfig,
    /// Destination folder for the run
    output_folder: String,
    /// Channel profile URL as pasted by the user
    channel_url: String,
    /// Watermark image path (PNG)
    watermark_path: String,
    /// Selected output container
    format: OutputFormat,

    /// A run is active; the start button is disabled until it finishes
    running: bool,
    /// Overall progress, 0..=100
    progress: u8,
    /// Single-line status under the progress bar
    status: String,
    /// Log pane contents, INFO and above
    log_lines: Vec<String>,
    /// Pending modal message: (title, text)
    modal: Option<(String, String)>,

    /// Event stream from the active worker, polled each frame
    events_rx: Option<UnboundedReceiver<WorkerEvent>>,
    /// Thumbnail of the item currently being processed
    thumbnail: Option<egui::TextureHandle>,
    /// Incoming thumbnail fetch results (video_id, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
    current_video_id: Option<String>,
}

impl ShortstampApp {
    fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            output_folder: String::new(),
            channel_url: String::new(),
            watermark_path: String::new(),
            format: OutputFormat::Webm,
            running: false,
            progress: 0,
            status: String::new(),
            log_lines: Vec::new(),
            modal: None,
            events_rx: None,
            thumbnail: None,
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            current_video_id: None,
        }
    }

    fn log(&mut self, level: &str, message: impl AsRef<str>) {
        self.log_lines.push(format!("{level}: {}", message.as_ref()));
    }

    fn warn_modal(&mut self, title: &str, text: impl Into<String>) {
        self.modal = Some((title.to_string(), text.into()));
    }

    /// Validates the form and, when it passes, runs collection and name
    /// recording synchronously (blocking the UI thread is acceptable for
    /// this interactive, one-run-at-a-time tool) before spawning the worker.
    fn start_run(&mut self) {
        let folder = self.output_folder.trim().to_string();
        let url = self.channel_url.trim().to_string();
        let wm = self.watermark_path.trim().to_string();

        if folder.is_empty() || url.is_empty() || wm.is_empty() {
            self.warn_modal("Input Error", "Please fill in all fields and select files.");
            return;
        }
        if !Path::new(&folder).is_dir() {
            self.warn_modal("Directory Error", "The selected folder is not valid.");
            return;
        }
        if !Path::new(&wm).is_file() {
            self.warn_modal("File Error", "The selected watermark image file is not valid.");
            return;
        }

        let ytdlp = YtDlp::new(self.cfg.ytdlp_bin.clone());

        let links = match runtime().block_on(links::collect_short_links(
            &ytdlp,
            &url,
            self.cfg.listing_cap(),
        )) {
            Ok(links) => links,
            Err(e) => {
                log::error!("Collection failed: {e}");
                self.warn_modal("Error", format!("Failed to list videos: {e}"));
                return;
            }
        };
        if links.is_empty() {
            self.warn_modal("Error", "No videos found.");
            return;
        }
        self.log("INFO", format!("Found {} videos.", links.len()));

        // Name recording has no partial-manifest recovery: one failed
        // metadata fetch aborts the run before any download starts.
        let format = self.format;
        if let Err(e) = runtime().block_on(names::record_names(
            &ytdlp,
            &links,
            Path::new(&folder),
            format,
            self.cfg.debug,
        )) {
            log::error!("Name recording failed: {e}");
            self.warn_modal("Error", format!("Failed to record video titles: {e}"));
            return;
        }
        self.log("INFO", "Recorded original names.");

        let compositor = Compositor::new(self.cfg.ffmpeg_bin.clone(), self.cfg.ffprobe_bin.clone());
        let params = RunParams {
            links,
            output_dir: PathBuf::from(folder),
            watermark: PathBuf::from(wm),
            format,
            delay: Duration::from_secs(self.cfg.count_timer_ongoing),
            debug: self.cfg.debug,
        };

        let (tx, rx) = unbounded_channel();
        self.events_rx = Some(rx);
        self.running = true;
        self.progress = 0;
        self.thumbnail = None;
        self.current_video_id = None;
        self.status = "Starting download…".to_string();

        runtime().spawn(run_jobs(ToolOps::new(ytdlp, compositor), params, tx));
    }

    fn handle_event(&mut self, event: WorkerEvent, ctx: &egui::Context) {
        match event {
            WorkerEvent::ItemStarted { index, total, link } => {
                self.status = format!("Downloading video {index}/{total}…");
                self.thumbnail = None;
                self.current_video_id = thumbnail::shorts_video_id(&link);
                // Fetch the item's thumbnail off-thread; purely cosmetic.
                if let Some(id) = self.current_video_id.clone() {
                    let results = Arc::clone(&self.thumbnail_results);
                    let ctx_c = ctx.clone();
                    runtime().spawn_blocking(move || {
                        if let Some(img) = thumbnail::fetch_thumbnail(&id) {
                            results.lock().unwrap().push((id, img));
                            ctx_c.request_repaint();
                        }
                    });
                }
            }
            WorkerEvent::DownloadProgress { index, total, fraction } => {
                self.status = format!(
                    "Downloading video {index}/{total}: {:.0}%",
                    fraction * 100.0
                );
            }
            WorkerEvent::ItemFinished { ok, message, .. } => {
                self.status = message.clone();
                self.log(if ok { "INFO" } else { "ERROR" }, message);
            }
            WorkerEvent::Progress(pct) => {
                // Guard stays even though emission is already monotonic.
                self.progress = self.progress.max(pct);
            }
            WorkerEvent::Finished { succeeded, failed } => {
                self.running = false;
                self.events_rx = None;
                let summary = format!("Run finished: {succeeded} succeeded, {failed} failed.");
                self.status = summary.clone();
                self.log("INFO", summary);
            }
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for ShortstampApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1. Drain worker events in arrival (FIFO) order.
        let mut events = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            self.handle_event(event, ctx);
        }

        // 2. Handle completed thumbnail fetches.
        {
            let mut pending = self.thumbnail_results.lock().unwrap();
            for (vid, img) in pending.drain(..) {
                if self.current_video_id.as_deref() == Some(vid.as_str()) {
                    self.thumbnail = Some(ctx.load_texture(&vid, img, TextureOptions::default()));
                }
            }
        }

        // 3. Pending validation/collection message as a modal window.
        if let Some((title, text)) = self.modal.clone() {
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(text);
                    if ui.button("OK").clicked() {
                        self.modal = None;
                    }
                });
        }

        // 4. Main panel: form, start button, progress, log pane.
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Shorts Watermarker");

            ui.horizontal(|ui| {
                ui.label("Output folder:");
                ui.text_edit_singleline(&mut self.output_folder);
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new().pick_folder() {
                        self.output_folder = folder.display().to_string();
                    }
                }
            });

            ui.label("YouTube channel URL:");
            ui.text_edit_singleline(&mut self.channel_url);

            ui.horizontal(|ui| {
                ui.label("Watermark (PNG):");
                ui.text_edit_singleline(&mut self.watermark_path);
                if ui.button("Browse…").clicked() {
                    if let Some(file) = FileDialog::new()
                        .add_filter("PNG image", &["png"])
                        .pick_file()
                    {
                        self.watermark_path = file.display().to_string();
                    }
                }
            });

            ui.horizontal(|ui| {
                ui.label("Output format:");
                ui.radio_value(&mut self.format, OutputFormat::Webm, "WebM");
                ui.radio_value(&mut self.format, OutputFormat::Mp4, "MP4");
            });

            ui.add_space(8.0);
            let start = ui.add_enabled(!self.running, egui::Button::new("Start Download"));
            if start.clicked() {
                self.start_run();
            }

            ui.add_space(8.0);
            ui.add(
                egui::ProgressBar::new(self.progress as f32 / 100.0)
                    .text(format!("{}%", self.progress)),
            );
            ui.label(&self.status);

            if let Some(tex) = &self.thumbnail {
                ui.add(egui::Image::new(tex).max_width(160.0));
            }

            ui.separator();
            ui.label("Log:");
            egui::ScrollArea::vertical()
                .auto_shrink([false, true])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in &self.log_lines {
                        ui.label(line);
                    }
                });
        });

        // Request periodic repaint so worker progress shows up promptly.
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
