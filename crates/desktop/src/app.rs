use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use iced::widget::{button, checkbox, column, container, image, row, slider, text, Space};
use iced::{event, keyboard, window, Element, Event, Length, Subscription, Task, Theme};

use senior_watch_core::pipeline::run_summary::{RunSummary, StopReason};
use senior_watch_core::shared::constants::{ESTIMATOR_MODEL_URL_ENV, MAX_SKIP_FRAMES};
use senior_watch_core::shared::session_params::{select_source, InputSource, SessionParams};

use crate::settings::Settings;
use crate::theme::{self, StatusKind};
use crate::workers::detection_worker::{self, DetectionParams, WorkerHandle, WorkerMessage};
use crate::workers::model_cache::ModelCache;

const NO_SOURCE_WARNING: &str = "Please select a video or enable the camera.";

/// How often the UI drains the worker's channels while a run is active.
const POLL_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub enum Message {
    UseCameraToggled(bool),
    SelectVideo,
    VideoSelected(Option<PathBuf>),
    SkipFramesChanged(u8),
    Start,
    Stop,
    Poll,
}

pub struct App {
    settings: Settings,
    video_path: Option<PathBuf>,
    status: Option<(StatusKind, String)>,
    worker: Option<WorkerHandle>,
    preview: Option<image::Handle>,
    model_cache: Arc<ModelCache>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let estimator_url = settings
            .estimator_model_url
            .clone()
            .or_else(|| std::env::var(ESTIMATOR_MODEL_URL_ENV).ok());
        let model_cache = ModelCache::new(settings.detector_model.clone(), estimator_url);
        let video_path = settings.last_video.clone().filter(|p| p.exists());

        (
            Self {
                settings,
                video_path,
                status: None,
                worker: None,
                preview: None,
                model_cache,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::UseCameraToggled(enabled) => {
                self.settings.use_camera = enabled;
                self.settings.save();
            }
            Message::SelectVideo => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select a video")
                            .add_filter("Videos", &["mp4", "avi", "mov"])
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::VideoSelected,
                );
            }
            Message::VideoSelected(Some(path)) => {
                self.settings.last_video = Some(path.clone());
                self.settings.save();
                self.video_path = Some(path);
            }
            Message::VideoSelected(None) => {}
            Message::SkipFramesChanged(value) => {
                self.settings.skip_frames = value as usize;
                self.settings.save();
            }
            Message::Start => self.start(),
            Message::Stop => {
                if let Some(worker) = &self.worker {
                    worker.cancel();
                    self.status = Some((StatusKind::Info, "Stopping…".into()));
                }
            }
            Message::Poll => self.poll_worker(),
        }
        Task::none()
    }

    fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let camera = self
            .settings
            .use_camera
            .then_some(self.settings.camera_device.as_str());
        let Some(source) = select_source(self.video_path.as_deref(), camera) else {
            self.status = Some((StatusKind::Warning, NO_SOURCE_WARNING.into()));
            return;
        };
        let session = match SessionParams::new(source, self.settings.skip_frames) {
            Ok(session) => session,
            Err(e) => {
                self.status = Some((StatusKind::Error, e.to_string()));
                return;
            }
        };

        self.status = Some((StatusKind::Info, starting_status(session.source()).into()));
        self.preview = None;
        self.worker = Some(detection_worker::spawn(DetectionParams {
            session,
            log_file: self.settings.log_file.clone(),
            confidence: self.settings.confidence,
            model_cache: self.model_cache.clone(),
        }));
    }

    fn poll_worker(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };

        if let Some(frame) = worker.frames.try_iter().last() {
            self.preview = Some(image::Handle::from_rgba(frame.width, frame.height, frame.rgba));
        }

        let mut finished = false;
        for message in worker.messages.try_iter() {
            self.status = Some(match message {
                WorkerMessage::DownloadProgress(downloaded, total) => {
                    (StatusKind::Info, download_status(downloaded, total))
                }
                WorkerMessage::Finished(summary) => {
                    finished = true;
                    finished_status(&summary, &self.settings.log_file)
                }
                WorkerMessage::Error(e) => {
                    finished = true;
                    (StatusKind::Error, format!("Error: {e}"))
                }
                WorkerMessage::Cancelled => {
                    finished = true;
                    (StatusKind::Info, "Detection stopped.".into())
                }
            });
        }

        if finished {
            self.worker = None;
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let running = self.worker.is_some();

        let video_label = self
            .video_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "No video selected".into());

        let start_btn = button(text("Start Detection"))
            .on_press_maybe((!running).then_some(Message::Start))
            .style(button::primary)
            .width(Length::Fill);
        let stop_btn = button(text("Stop"))
            .on_press_maybe(running.then_some(Message::Stop))
            .style(button::secondary)
            .width(Length::Fill);

        let status = match &self.status {
            Some((kind, line)) => {
                let kind = *kind;
                text(line.as_str())
                    .size(13)
                    .style(move |theme: &Theme| text::Style {
                        color: Some(theme::status_color(theme, kind)),
                    })
            }
            None => text(""),
        };

        let sidebar = column![
            text("Senior Watch").size(20),
            Space::new().height(8),
            checkbox(self.settings.use_camera)
                .label("Use camera")
                .on_toggle_maybe((!running).then_some(Message::UseCameraToggled)),
            button(text("Select video…"))
                .on_press_maybe((!running).then_some(Message::SelectVideo))
                .style(button::secondary),
            text(video_label).size(12),
            Space::new().height(8),
            text(format!("Skip frames: {}", self.settings.skip_frames)).size(13),
            slider(
                1..=MAX_SKIP_FRAMES as u8,
                self.settings.skip_frames as u8,
                Message::SkipFramesChanged,
            ),
            Space::new().height(8),
            start_btn,
            stop_btn,
            Space::new().height(8),
            status,
        ]
        .spacing(8)
        .padding(16)
        .width(260);

        let live_view: Element<'_, Message> = match &self.preview {
            Some(handle) => image(handle.clone())
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            None => text("Live view appears here once detection starts (press q to stop)")
                .size(13)
                .into(),
        };
        let live_view = container(live_view)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .style(container::rounded_box);

        row![sidebar, live_view]
            .spacing(8)
            .padding(8)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::app_theme()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let keys = event::listen_with(stop_key);
        if self.worker.is_some() {
            Subscription::batch([keys, iced::time::every(POLL_INTERVAL).map(|_| Message::Poll)])
        } else {
            keys
        }
    }
}

/// `q` stops a running detection.
fn stop_key(event: Event, _status: event::Status, _window: window::Id) -> Option<Message> {
    match event {
        Event::Keyboard(keyboard::Event::KeyPressed { key, .. })
            if key.as_ref() == keyboard::Key::Character("q") =>
        {
            Some(Message::Stop)
        }
        _ => None,
    }
}

fn starting_status(source: &InputSource) -> &'static str {
    match source {
        InputSource::File(_) => "Processing video…",
        InputSource::Camera { .. } => "Starting camera…",
    }
}

fn download_status(downloaded: u64, total: u64) -> String {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        format!("Downloading age/gender model… {pct}%")
    } else {
        format!("Downloading age/gender model… {} KB", downloaded / 1024)
    }
}

fn finished_status(summary: &RunSummary, log_file: &Path) -> (StatusKind, String) {
    match summary.stop_reason {
        StopReason::SourceUnavailable => (
            StatusKind::Error,
            "Could not open the video or camera.".into(),
        ),
        StopReason::ReadFailed => (
            StatusKind::Warning,
            format!(
                "Reading stopped after {} frames. CSV log saved in {}",
                summary.frames_read,
                log_file.display()
            ),
        ),
        _ => (
            StatusKind::Success,
            format!(
                "Detection finished. CSV log saved in {} ({} seniors logged)",
                log_file.display(),
                summary.seniors_logged
            ),
        ),
    }
}
