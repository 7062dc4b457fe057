use crate::estimation::domain::senior_classifier::Classification;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Draws one classified detection onto a frame in place.
///
/// The box is expected to be clamped to the frame already; anything that
/// still falls outside is clipped.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, bbox: &BoundingBox, classification: &Classification);
}
