use crate::shared::frame::Frame;

/// What the loop should do after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    /// The viewer asked to stop (key press, window closed).
    Stop,
}

/// Sink for the frames a run presents to the operator, one call per frame read.
pub trait FrameDisplay: Send {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>>;

    /// Tears down the window or output. Called once when the run ends.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
