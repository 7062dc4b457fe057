use crate::shared::frame::Frame;
use crate::shared::session_params::InputSource;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a video file or a capture device.
///
/// Implementations handle I/O details (codec, container format, device
/// backend) while the pipeline works with the abstract `Frame` and
/// `VideoMetadata` types.
pub trait VideoReader: Send {
    /// Opens the source and returns its metadata.
    fn open(&mut self, source: &InputSource) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
