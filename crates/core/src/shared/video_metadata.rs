use std::path::PathBuf;

/// Properties of an opened frame source.
///
/// `total_frames` is 0 when unknown (live cameras, some containers).
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn is_live(&self) -> bool {
        self.source_path.is_none()
    }
}
