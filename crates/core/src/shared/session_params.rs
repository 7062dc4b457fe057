use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{DEFAULT_CAMERA_DEVICE, VIDEO_EXTENSIONS};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionParamsError {
    #[error("skip interval must be >= 1")]
    ZeroSkipInterval,
}

/// Where frames come from for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    /// A capture device, named the way the platform's ffmpeg input
    /// format expects (`/dev/video0`, `0`, `video=...`).
    Camera { device: String },
    File(PathBuf),
}

impl InputSource {
    pub fn default_camera() -> Self {
        InputSource::Camera {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Camera { device } => write!(f, "camera {device}"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parameters fixed for the duration of one processing run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    source: InputSource,
    skip_interval: usize,
}

impl SessionParams {
    pub fn new(source: InputSource, skip_interval: usize) -> Result<Self, SessionParamsError> {
        if skip_interval < 1 {
            return Err(SessionParamsError::ZeroSkipInterval);
        }
        Ok(Self {
            source,
            skip_interval,
        })
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn skip_interval(&self) -> usize {
        self.skip_interval
    }
}

/// Picks the run's source from the operator's choices. A selected file wins
/// over the camera; `None` when neither was chosen.
pub fn select_source(file: Option<&Path>, camera_device: Option<&str>) -> Option<InputSource> {
    match (file, camera_device) {
        (Some(path), _) => Some(InputSource::File(path.to_path_buf())),
        (None, Some(device)) => Some(InputSource::Camera {
            device: device.to_string(),
        }),
        (None, None) => None,
    }
}

/// True if the path has one of the accepted video extensions (case-insensitive).
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
