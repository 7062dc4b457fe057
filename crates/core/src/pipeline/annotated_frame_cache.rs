use crate::shared::frame::Frame;
use crate::shared::session_params::SessionParamsError;

/// Decides which frames get full processing and replays the last annotated
/// frame in between.
///
/// Frame `i` is processed when `i % interval == 0`. Skipped frames are not
/// extrapolated: the viewer sees the last annotated frame unchanged.
pub struct AnnotatedFrameCache {
    interval: usize,
    last: Option<Frame>,
}

impl AnnotatedFrameCache {
    pub fn new(interval: usize) -> Result<Self, SessionParamsError> {
        if interval < 1 {
            return Err(SessionParamsError::ZeroSkipInterval);
        }
        Ok(Self {
            interval,
            last: None,
        })
    }

    pub fn is_due(&self, frame_number: usize) -> bool {
        frame_number % self.interval == 0
    }

    pub fn store(&mut self, annotated: Frame) {
        self.last = Some(annotated);
    }

    /// The cached annotated frame, or `raw` if nothing was processed yet.
    pub fn replay(&self, raw: Frame) -> Frame {
        match &self.last {
            Some(cached) => cached.clone(),
            None => raw,
        }
    }
}
