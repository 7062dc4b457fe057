use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use senior_watch_core::annotation::infrastructure::cpu_box_annotator::CpuBoxAnnotator;
use senior_watch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use senior_watch_core::estimation::infrastructure::onnx_age_gender_estimator::OnnxAgeGenderEstimator;
use senior_watch_core::event_log::infrastructure::csv_event_log::CsvEventLog;
use senior_watch_core::pipeline::detect_seniors_use_case::DetectSeniorsUseCase;
use senior_watch_core::pipeline::pipeline_logger::NullPipelineLogger;
use senior_watch_core::pipeline::run_summary::{RunSummary, StopReason};
use senior_watch_core::shared::frame::Frame;
use senior_watch_core::shared::session_params::SessionParams;
use senior_watch_core::video::domain::frame_display::{DisplayControl, FrameDisplay};
use senior_watch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;

use super::model_cache::{ModelCache, WaitError};

/// Frames waiting for the UI. Anything beyond this is dropped, not queued.
const PREVIEW_BACKLOG: usize = 2;

/// Messages sent from the worker thread to the UI.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    DownloadProgress(u64, u64),
    Finished(RunSummary),
    Error(String),
    Cancelled,
}

/// An annotated frame ready for `image::Handle::from_rgba`.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PreviewFrame {
    fn from_frame(frame: &Frame) -> Self {
        let mut rgba = Vec::with_capacity(frame.width() as usize * frame.height() as usize * 4);
        for px in frame.data().chunks_exact(frame.channels() as usize) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        Self {
            width: frame.width(),
            height: frame.height(),
            rgba,
        }
    }
}

/// Parameters for one detection run.
pub struct DetectionParams {
    pub session: SessionParams,
    pub log_file: PathBuf,
    pub confidence: f64,
    pub model_cache: Arc<ModelCache>,
}

/// The UI's end of a running worker.
pub struct WorkerHandle {
    pub messages: Receiver<WorkerMessage>,
    pub frames: Receiver<PreviewFrame>,
    pub cancelled: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Forwards shown frames to the GUI. Stops the run once the GUI has dropped
/// its receiver.
pub struct ChannelDisplay {
    tx: Sender<PreviewFrame>,
}

impl ChannelDisplay {
    pub fn new(tx: Sender<PreviewFrame>) -> Self {
        Self { tx }
    }
}

impl FrameDisplay for ChannelDisplay {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
        match self.tx.try_send(PreviewFrame::from_frame(frame)) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(DisplayControl::Continue),
            Err(TrySendError::Disconnected(_)) => Ok(DisplayControl::Stop),
        }
    }
}

/// Spawn a background detection worker with a fresh cancellation token.
pub fn spawn(params: DetectionParams) -> WorkerHandle {
    let (tx, messages) = crossbeam_channel::unbounded::<WorkerMessage>();
    let (frame_tx, frames) = crossbeam_channel::bounded::<PreviewFrame>(PREVIEW_BACKLOG);
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = cancelled.clone();

    thread::spawn(move || {
        let message = outcome_message(run_detection(&tx, frame_tx, &cancelled_clone, &params));
        let _ = tx.send(message);
    });

    WorkerHandle {
        messages,
        frames,
        cancelled,
    }
}

/// Only a stop requested while waiting for the models, or one the pipeline
/// honoured, counts as a cancel. Every other failure reaches the operator.
fn outcome_message(result: Result<RunSummary, Box<dyn std::error::Error>>) -> WorkerMessage {
    match result {
        Ok(summary) if summary.stop_reason == StopReason::Cancelled => WorkerMessage::Cancelled,
        Ok(summary) => WorkerMessage::Finished(summary),
        Err(e) if e.downcast_ref::<WaitError>() == Some(&WaitError::Cancelled) => {
            WorkerMessage::Cancelled
        }
        Err(e) => WorkerMessage::Error(e.to_string()),
    }
}

fn run_detection(
    tx: &Sender<WorkerMessage>,
    frame_tx: Sender<PreviewFrame>,
    cancelled: &Arc<AtomicBool>,
    params: &DetectionParams,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let tx_dl = tx.clone();
    let models = params.model_cache.wait(
        &|downloaded, total| {
            let _ = tx_dl.send(WorkerMessage::DownloadProgress(downloaded, total));
        },
        cancelled,
    )?;

    let detector = OnnxYoloDetector::from_shared_session(models.detector, params.confidence)?;
    let estimator = OnnxAgeGenderEstimator::from_shared_session(models.estimator)?;

    log::info!(
        "Detection worker: {} every {} frame(s)",
        params.session.source(),
        params.session.skip_interval()
    );
    let mut use_case = DetectSeniorsUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(detector),
        Box::new(estimator),
        Box::new(CpuBoxAnnotator::default()),
        Box::new(ChannelDisplay::new(frame_tx)),
        Box::new(CsvEventLog::new(&params.log_file)),
        Box::new(NullPipelineLogger),
        Some(cancelled.clone()),
    );
    Ok(use_case.execute(&params.session)?)
}
