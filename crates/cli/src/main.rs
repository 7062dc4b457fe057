use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use senior_watch_core::annotation::infrastructure::cpu_box_annotator::CpuBoxAnnotator;
use senior_watch_core::detection::domain::face_detector::FaceDetector;
use senior_watch_core::detection::infrastructure::onnx_yolo_detector::{
    ClassFilter, OnnxYoloDetector, DEFAULT_CONFIDENCE,
};
use senior_watch_core::estimation::domain::attribute_estimator::AttributeEstimator;
use senior_watch_core::estimation::infrastructure::onnx_age_gender_estimator::OnnxAgeGenderEstimator;
use senior_watch_core::event_log::infrastructure::csv_event_log::CsvEventLog;
use senior_watch_core::pipeline::detect_seniors_use_case::DetectSeniorsUseCase;
use senior_watch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use senior_watch_core::shared::constants::{
    DEFAULT_CAMERA_DEVICE, DEFAULT_LOG_FILE, DEFAULT_SKIP_FRAMES, DETECTOR_MODEL_PATH,
    ESTIMATOR_MODEL_NAME, ESTIMATOR_MODEL_URL_ENV, MAX_SKIP_FRAMES, RECORDING_FPS,
};
use senior_watch_core::shared::model_resolver;
use senior_watch_core::shared::session_params::{is_supported_video, select_source, SessionParams};
use senior_watch_core::video::domain::frame_display::FrameDisplay;
use senior_watch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use senior_watch_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use senior_watch_core::video::infrastructure::headless_display::HeadlessDisplay;
use senior_watch_core::video::infrastructure::recording_display::RecordingDisplay;

/// Detect senior citizens in a video or camera stream and log them to CSV.
#[derive(Parser, Debug)]
#[command(name = "senior-watch")]
struct Cli {
    /// Input video file (mp4, avi or mov).
    input: Option<PathBuf>,

    /// Read from a camera. Without a value, uses the platform's default device.
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_CAMERA_DEVICE)]
    camera: Option<String>,

    /// Analyse every Nth frame (1-10); frames in between repeat the last result.
    #[arg(long, default_value_t = DEFAULT_SKIP_FRAMES)]
    skip_frames: usize,

    /// CSV file that senior sightings are appended to.
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// YOLO face detection model (ONNX).
    #[arg(long, default_value = DETECTOR_MODEL_PATH)]
    detector_model: PathBuf,

    /// Where to download the age/gender model from if it is not installed.
    /// Falls back to the SENIOR_WATCH_ESTIMATOR_URL environment variable.
    #[arg(long)]
    estimator_model_url: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Number of class columns in the detector output (1 for face models).
    #[arg(long, default_value_t = 1)]
    num_classes: usize,

    /// Keep only detections of this class (e.g. 0 for person in COCO models).
    #[arg(long)]
    class_id: Option<usize>,

    /// Write annotated frames to this video file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Keep the source resolution instead of resizing to 640x480.
    #[arg(long)]
    native_size: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    if cli.input.is_some() && cli.camera.is_some() {
        log::warn!("Both a file and --camera were given; reading the file");
    }
    let source = select_source(cli.input.as_deref(), cli.camera.as_deref())
        .ok_or("Provide a video file or --camera")?;
    let params = SessionParams::new(source, cli.skip_frames)?;

    let detector = build_detector(&cli)?;
    let estimator = build_estimator(&cli)?;

    let reader = if cli.native_size {
        FfmpegReader::new().with_output_size(None)
    } else {
        FfmpegReader::new()
    };
    let display: Box<dyn FrameDisplay> = match &cli.record {
        Some(path) => Box::new(RecordingDisplay::new(
            Box::new(FfmpegWriter::new()),
            path,
            RECORDING_FPS,
        )),
        None => Box::new(HeadlessDisplay::new()),
    };

    let mut use_case = DetectSeniorsUseCase::new(
        Box::new(reader),
        detector,
        estimator,
        Box::new(CpuBoxAnnotator::default()),
        display,
        Box::new(CsvEventLog::new(&cli.log_file)),
        Box::new(StdoutPipelineLogger::new(30)),
        None,
    );
    let summary = use_case.execute(&params)?;

    println!("{summary}");
    if let Some(path) = &cli.record {
        if summary.frames_read > 0 {
            println!("Annotated video written to {}", path.display());
        }
    }
    println!(
        "Detection finished. CSV log saved in {}",
        cli.log_file.display()
    );
    Ok(())
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    if !cli.detector_model.exists() {
        return Err(format!(
            "Detector model not found: {} (expected a YOLO face model in ONNX format)",
            cli.detector_model.display()
        )
        .into());
    }
    log::info!("Loading detector: {}", cli.detector_model.display());
    let detector = OnnxYoloDetector::new(&cli.detector_model, cli.confidence)?.with_class_filter(
        ClassFilter {
            num_classes: cli.num_classes,
            target_class: cli.class_id,
        },
    );
    Ok(Box::new(detector))
}

fn build_estimator(cli: &Cli) -> Result<Box<dyn AttributeEstimator>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {ESTIMATOR_MODEL_NAME}");
    let url = cli
        .estimator_model_url
        .clone()
        .or_else(|| std::env::var(ESTIMATOR_MODEL_URL_ENV).ok());
    let model_path = model_resolver::resolve(
        ESTIMATOR_MODEL_NAME,
        url.as_deref(),
        Some(Path::new("models")),
        Some(Box::new(download_progress)),
    )?;
    Ok(Box::new(OnnxAgeGenderEstimator::new(&model_path)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match (&cli.input, &cli.camera) {
        (None, None) => return Err("Provide a video file or --camera".into()),
        (Some(input), _) => {
            if !is_supported_video(input) {
                return Err(format!(
                    "Unsupported video format: {} (expected mp4, avi or mov)",
                    input.display()
                )
                .into());
            }
            if !input.exists() {
                return Err(format!("Input file not found: {}", input.display()).into());
            }
        }
        (None, Some(_)) => {}
    }
    if !(1..=MAX_SKIP_FRAMES).contains(&cli.skip_frames) {
        return Err(format!(
            "Skip frames must be between 1 and {MAX_SKIP_FRAMES}, got {}",
            cli.skip_frames
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.num_classes == 0 {
        return Err("Number of classes must be at least 1".into());
    }
    if let Some(class_id) = cli.class_id {
        if class_id >= cli.num_classes {
            return Err(format!(
                "Class id {class_id} is out of range for {} classes",
                cli.num_classes
            )
            .into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading age/gender model... {pct}%");
    } else {
        eprint!("\rDownloading age/gender model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("senior-watch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--camera"]);
        assert_eq!(cli.camera.as_deref(), Some(DEFAULT_CAMERA_DEVICE));
        assert_eq!(cli.skip_frames, 3);
        assert_eq!(cli.log_file, PathBuf::from("data/senior_log.csv"));
        assert_eq!(cli.detector_model, PathBuf::from("models/yolov8n-face.onnx"));
        assert!(!cli.native_size);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_camera_device_value() {
        let cli = parse(&["--camera", "/dev/video2"]);
        assert_eq!(cli.camera.as_deref(), Some("/dev/video2"));
    }

    #[test]
    fn test_missing_source_rejected() {
        let err = validate(&parse(&[])).unwrap_err();
        assert!(err.to_string().contains("--camera"));
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = validate(&parse(&["clip.mkv"])).unwrap_err();
        assert!(err.to_string().contains("Unsupported video format"));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = validate(&parse(&["/nonexistent/clip.mp4"])).unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_skip_frames_range() {
        assert!(validate(&parse(&["--camera", "--skip-frames", "0"])).is_err());
        assert!(validate(&parse(&["--camera", "--skip-frames", "11"])).is_err());
        assert!(validate(&parse(&["--camera", "--skip-frames", "10"])).is_ok());
    }

    #[test]
    fn test_confidence_range() {
        assert!(validate(&parse(&["--camera", "--confidence", "1.5"])).is_err());
    }

    #[test]
    fn test_class_id_must_fit_class_count() {
        assert!(validate(&parse(&["--camera", "--class-id", "0"])).is_ok());
        assert!(validate(&parse(&["--camera", "--class-id", "2", "--num-classes", "2"])).is_err());
        assert!(validate(&parse(&["--camera", "--class-id", "0", "--num-classes", "80"])).is_ok());
    }
}
