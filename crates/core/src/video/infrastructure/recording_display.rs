use std::path::PathBuf;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};
use crate::video::domain::video_writer::VideoWriter;

/// Writes every shown frame to a video file.
///
/// The writer is opened on the first frame so the output takes the
/// dimensions of whatever the reader produced.
pub struct RecordingDisplay {
    writer: Box<dyn VideoWriter>,
    path: PathBuf,
    fps: f64,
    opened: bool,
}

impl RecordingDisplay {
    pub fn new(writer: Box<dyn VideoWriter>, path: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            writer,
            path: path.into(),
            fps,
            opened: false,
        }
    }
}

impl FrameDisplay for RecordingDisplay {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
        if !self.opened {
            let metadata = VideoMetadata {
                width: frame.width(),
                height: frame.height(),
                fps: self.fps,
                total_frames: 0,
                codec: String::new(),
                source_path: None,
            };
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            self.writer.open(&self.path, &metadata)?;
            self.opened = true;
            log::info!("Recording annotated output to {}", self.path.display());
        }
        self.writer.write(frame)?;
        Ok(DisplayControl::Continue)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.opened {
            self.opened = false;
            self.writer.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        opened_with: Option<(u32, u32)>,
        written: usize,
        closed: usize,
    }

    struct SpyWriter(Arc<Mutex<Calls>>);

    impl VideoWriter for SpyWriter {
        fn open(
            &mut self,
            _path: &Path,
            metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().opened_with = Some((metadata.width, metadata.height));
            Ok(())
        }

        fn write(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().written += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    #[test]
    fn test_opens_lazily_with_frame_size() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let dir = tempfile::tempdir().unwrap();
        let mut display = RecordingDisplay::new(
            Box::new(SpyWriter(calls.clone())),
            dir.path().join("out/annotated.mp4"),
            25.0,
        );
        assert!(calls.lock().unwrap().opened_with.is_none());

        let frame = Frame::new(vec![0; 8 * 6 * 3], 8, 6, 3, 0);
        display.show(&frame).unwrap();
        display.show(&frame).unwrap();
        display.close().unwrap();
        display.close().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.opened_with, Some((8, 6)));
        assert_eq!(calls.written, 2);
        assert_eq!(calls.closed, 1);
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_close_without_frames_is_noop() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut display =
            RecordingDisplay::new(Box::new(SpyWriter(calls.clone())), "unused.mp4", 30.0);
        display.close().unwrap();
        assert_eq!(calls.lock().unwrap().closed, 0);
    }
}
