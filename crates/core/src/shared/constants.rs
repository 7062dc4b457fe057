/// Estimated ages strictly above this are classified and logged as seniors.
pub const SENIOR_AGE_THRESHOLD: u32 = 60;

pub const DEFAULT_SKIP_FRAMES: usize = 3;
pub const MAX_SKIP_FRAMES: usize = 10;

pub const DEFAULT_LOG_FILE: &str = "data/senior_log.csv";
pub const LOG_HEADER: &str = "Age,Gender,Time";
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Frames are resized to this before detection.
pub const PROCESSING_WIDTH: u32 = 640;
pub const PROCESSING_HEIGHT: u32 = 480;

/// Detector weights, resolved relative to the working directory.
pub const DETECTOR_MODEL_PATH: &str = "models/yolov8n-face.onnx";

pub const ESTIMATOR_MODEL_NAME: &str = "genderage.onnx";

/// Environment variable that may point at a download URL for the estimator model.
pub const ESTIMATOR_MODEL_URL_ENV: &str = "SENIOR_WATCH_ESTIMATOR_URL";

/// Frame rate for recorded output; cameras rarely report a usable one.
pub const RECORDING_FPS: f64 = 30.0;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

#[cfg(target_os = "linux")]
pub const CAMERA_INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "linux")]
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
pub const CAMERA_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
pub const DEFAULT_CAMERA_DEVICE: &str = "0";

#[cfg(target_os = "windows")]
pub const CAMERA_INPUT_FORMAT: &str = "dshow";
#[cfg(target_os = "windows")]
pub const DEFAULT_CAMERA_DEVICE: &str = "video=Integrated Camera";

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const CAMERA_INPUT_FORMAT: &str = "v4l2";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
