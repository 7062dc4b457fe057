use std::fmt;

/// Why a run ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    EndOfStream,
    /// The file or camera could not be opened; no frames were read.
    SourceUnavailable,
    /// A frame could not be read or decoded. Not retried.
    ReadFailed,
    Cancelled,
    /// The display asked to stop (`q`, window closed).
    DisplayClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EndOfStream => "end of stream",
            StopReason::SourceUnavailable => "source unavailable",
            StopReason::ReadFailed => "frame read failed",
            StopReason::Cancelled => "cancelled",
            StopReason::DisplayClosed => "display closed",
        };
        f.write_str(text)
    }
}

/// Counters for one run of the detection loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: usize,
    pub frames_processed: usize,
    pub detections: usize,
    pub annotated: usize,
    pub skipped_no_face: usize,
    pub skipped_errors: usize,
    pub seniors_logged: usize,
    pub stop_reason: StopReason,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Frames: {} read, {} analysed ({})",
            self.frames_read, self.frames_processed, self.stop_reason
        )?;
        writeln!(
            f,
            "Faces: {} detected, {} labelled, {} without a readable face, {} estimator errors",
            self.detections, self.annotated, self.skipped_no_face, self.skipped_errors
        )?;
        write!(f, "Seniors logged: {}", self.seniors_logged)
    }
}
