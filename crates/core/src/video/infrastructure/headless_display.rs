use crate::shared::frame::Frame;
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};

/// Discards every frame. Used for batch runs where only the CSV log matters.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    shown: usize,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> usize {
        self.shown
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
        self.shown += 1;
        Ok(DisplayControl::Continue)
    }
}
