use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use senior_watch_core::detection::infrastructure::onnx_yolo_detector::DEFAULT_CONFIDENCE;
use senior_watch_core::shared::constants::{
    DEFAULT_CAMERA_DEVICE, DEFAULT_LOG_FILE, DEFAULT_SKIP_FRAMES, DETECTOR_MODEL_PATH,
    MAX_SKIP_FRAMES,
};

/// Operator choices that survive a restart. Missing keys fall back to defaults,
/// so older settings files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub use_camera: bool,
    pub camera_device: String,
    pub skip_frames: usize,
    pub log_file: PathBuf,
    pub detector_model: PathBuf,
    pub estimator_model_url: Option<String>,
    pub confidence: f64,
    pub last_video: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_camera: false,
            camera_device: DEFAULT_CAMERA_DEVICE.to_string(),
            skip_frames: DEFAULT_SKIP_FRAMES,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            detector_model: PathBuf::from(DETECTOR_MODEL_PATH),
            estimator_model_url: None,
            confidence: DEFAULT_CONFIDENCE,
            last_video: None,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("SeniorWatch").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Could not save settings to {}: {e}", path.display());
            }
        }
    }

    fn load_from(path: &Path) -> Self {
        let settings: Settings = fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default();
        settings.sanitized()
    }

    fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pull hand-edited values back into the ranges the controls accept.
    fn sanitized(mut self) -> Self {
        self.skip_frames = self.skip_frames.clamp(1, MAX_SKIP_FRAMES);
        if !(0.0..=1.0).contains(&self.confidence) {
            self.confidence = DEFAULT_CONFIDENCE;
        }
        if self.camera_device.trim().is_empty() {
            self.camera_device = DEFAULT_CAMERA_DEVICE.to_string();
        }
        self
    }
}
