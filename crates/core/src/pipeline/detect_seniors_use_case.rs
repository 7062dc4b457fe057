use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::face_detector::FaceDetector;
use crate::estimation::domain::attribute_estimator::{AttributeEstimator, EstimationError};
use crate::estimation::domain::senior_classifier::classify;
use crate::event_log::domain::senior_event_log::{EventLogError, SeniorEventLog};
use crate::shared::frame::Frame;
use crate::shared::session_params::{SessionParams, SessionParamsError};
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};
use crate::video::domain::video_reader::VideoReader;

use super::annotated_frame_cache::AnnotatedFrameCache;
use super::pipeline_logger::PipelineLogger;
use super::run_summary::{RunSummary, StopReason};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("face detection failed on frame {frame}: {message}")]
    Detection { frame: usize, message: String },
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error("display failed: {0}")]
    Display(String),
    #[error(transparent)]
    Params(#[from] SessionParamsError),
}

/// Per-frame work on frames the skip policy selects.
struct FrameStages {
    detector: Box<dyn FaceDetector>,
    estimator: Box<dyn AttributeEstimator>,
    annotator: Box<dyn FrameAnnotator>,
    event_log: Box<dyn SeniorEventLog>,
}

impl FrameStages {
    /// Detects, estimates and annotates one frame, logging seniors.
    ///
    /// Crops are always taken from `frame`, never from the annotated copy,
    /// so labels drawn for one face do not leak into the next estimate.
    fn process(
        &mut self,
        frame: &Frame,
        frame_number: usize,
        logger: &mut dyn PipelineLogger,
        summary: &mut RunSummary,
    ) -> Result<Frame, PipelineError> {
        let t = Instant::now();
        let boxes = self
            .detector
            .detect(frame)
            .map_err(|e| PipelineError::Detection {
                frame: frame_number,
                message: e.to_string(),
            })?;
        logger.timing("detect", elapsed_ms(t));
        logger.metric("faces_per_frame", boxes.len() as f64);
        summary.detections += boxes.len();

        let mut output = frame.clone();
        for raw in &boxes {
            let bbox = raw.clamp_to(frame.width(), frame.height());
            let crop = frame.crop(&bbox);

            let t = Instant::now();
            let estimated = self.estimator.estimate(&crop);
            logger.timing("estimate", elapsed_ms(t));

            let estimate = match estimated {
                Ok(estimate) => estimate,
                Err(EstimationError::NoFace) => {
                    log::debug!("Frame {frame_number}: no face in {bbox:?}, skipped");
                    summary.skipped_no_face += 1;
                    continue;
                }
                Err(e) => {
                    log::debug!("Frame {frame_number}: {e}, skipped {bbox:?}");
                    summary.skipped_errors += 1;
                    continue;
                }
            };

            let classification = classify(&estimate);
            let t = Instant::now();
            self.annotator.annotate(&mut output, &bbox, &classification);
            logger.timing("annotate", elapsed_ms(t));
            summary.annotated += 1;

            if classification.senior {
                self.event_log.record(estimate.age, estimate.gender)?;
                summary.seniors_logged += 1;
            }
        }

        Ok(output)
    }
}

/// Runs the senior detection loop over one source.
///
/// Every S-th frame is detected, estimated, annotated and logged; the
/// frames in between show the last annotated frame. The reader and the
/// display are closed before `execute` returns, whatever the outcome.
pub struct DetectSeniorsUseCase {
    reader: Box<dyn VideoReader>,
    display: Box<dyn FrameDisplay>,
    stages: FrameStages,
    logger: Box<dyn PipelineLogger>,
    cancelled: Arc<AtomicBool>,
}

impl DetectSeniorsUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn FaceDetector>,
        estimator: Box<dyn AttributeEstimator>,
        annotator: Box<dyn FrameAnnotator>,
        display: Box<dyn FrameDisplay>,
        event_log: Box<dyn SeniorEventLog>,
        logger: Box<dyn PipelineLogger>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader,
            display,
            stages: FrameStages {
                detector,
                estimator,
                annotator,
                event_log,
            },
            logger,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, params: &SessionParams) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        let metadata = match self.reader.open(params.source()) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Could not open {}: {e}", params.source());
                self.reader.close();
                if let Err(e) = self.display.close() {
                    log::warn!("Failed to close display: {e}");
                }
                summary.stop_reason = StopReason::SourceUnavailable;
                return Ok(summary);
            }
        };
        self.logger.info(&format!(
            "Reading {} ({}x{}, every {} frame(s) analysed)",
            params.source(),
            metadata.width,
            metadata.height,
            params.skip_interval()
        ));

        let outcome = self.run(params.skip_interval(), metadata.total_frames, &mut summary);

        self.reader.close();
        let closed = self
            .display
            .close()
            .map_err(|e| PipelineError::Display(e.to_string()));
        self.logger.summary();

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                if let Err(close_err) = closed {
                    log::warn!("{close_err}");
                }
                return Err(e);
            }
        };
        closed?;

        summary.stop_reason = stop_reason;
        log::info!(
            "Run ended ({stop_reason}) after {} frames, {} seniors logged",
            summary.frames_read,
            summary.seniors_logged
        );
        Ok(summary)
    }

    fn run(
        &mut self,
        skip_interval: usize,
        total_frames: usize,
        summary: &mut RunSummary,
    ) -> Result<StopReason, PipelineError> {
        let mut cache = AnnotatedFrameCache::new(skip_interval)?;
        let mut frames = self.reader.frames();
        let mut frame_number = 0usize;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Ok(StopReason::Cancelled);
            }

            let frame = match frames.next() {
                None => return Ok(StopReason::EndOfStream),
                Some(Err(e)) => {
                    log::warn!("Frame {frame_number} could not be read: {e}");
                    return Ok(StopReason::ReadFailed);
                }
                Some(Ok(frame)) => frame,
            };
            summary.frames_read += 1;

            let shown = if cache.is_due(frame_number) {
                let annotated =
                    self.stages
                        .process(&frame, frame_number, self.logger.as_mut(), summary)?;
                summary.frames_processed += 1;
                cache.store(annotated.clone());
                annotated
            } else {
                cache.replay(frame)
            };

            let t = Instant::now();
            let control = self
                .display
                .show(&shown)
                .map_err(|e| PipelineError::Display(e.to_string()))?;
            self.logger.timing("display", elapsed_ms(t));

            frame_number += 1;
            self.logger.progress(frame_number, total_frames);

            if control == DisplayControl::Stop {
                return Ok(StopReason::DisplayClosed);
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::domain::attribute_estimator::{AttributeEstimate, Gender};
    use crate::estimation::domain::senior_classifier::Classification;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::session_params::InputSource;
    use crate::shared::video_metadata::VideoMetadata;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const W: u32 = 64;
    const H: u32 = 48;

    // --- Stubs ---

    #[derive(Default)]
    struct Observed {
        reader_closed: bool,
        display_closed: bool,
        shown: Vec<Frame>,
        detect_calls: Vec<usize>,
        crops: Vec<Frame>,
        logged: Vec<(u32, Gender)>,
    }

    type SharedObserved = Arc<Mutex<Observed>>;

    struct StubReader {
        items: Vec<Result<Frame, String>>,
        fail_open: bool,
        seen: SharedObserved,
    }

    impl VideoReader for StubReader {
        fn open(
            &mut self,
            _source: &InputSource,
        ) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("no such device".into());
            }
            Ok(VideoMetadata {
                width: W,
                height: H,
                fps: 30.0,
                total_frames: self.items.len(),
                codec: "stub".into(),
                source_path: Some(PathBuf::from("stub.mp4")),
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.items.drain(..).map(|item| {
                item.map_err(|e| -> Box<dyn std::error::Error> { e.into() })
            }))
        }

        fn close(&mut self) {
            self.seen.lock().unwrap().reader_closed = true;
        }
    }

    /// Returns the same boxes on every call, recording which frames it saw.
    struct StubDetector {
        boxes: Vec<BoundingBox>,
        fail: bool,
        seen: SharedObserved,
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            self.seen.lock().unwrap().detect_calls.push(frame.index());
            if self.fail {
                return Err("model exploded".into());
            }
            Ok(self.boxes.clone())
        }
    }

    type EstimateFn = Box<dyn FnMut(usize) -> Result<AttributeEstimate, EstimationError> + Send>;

    /// Answers per call number, recording every crop it receives.
    struct StubEstimator {
        answer: EstimateFn,
        calls: usize,
        seen: SharedObserved,
    }

    impl AttributeEstimator for StubEstimator {
        fn estimate(&mut self, face: &Frame) -> Result<AttributeEstimate, EstimationError> {
            self.seen.lock().unwrap().crops.push(face.clone());
            let result = (self.answer)(self.calls);
            self.calls += 1;
            result
        }
    }

    /// Paints the whole box white so tests can see what was annotated.
    struct FillAnnotator;

    impl FrameAnnotator for FillAnnotator {
        fn annotate(&self, frame: &mut Frame, bbox: &BoundingBox, _c: &Classification) {
            let w = frame.width() as usize;
            let data = frame.data_mut();
            for y in bbox.y1..=bbox.y2 {
                for x in bbox.x1..=bbox.x2 {
                    let i = (y as usize * w + x as usize) * 3;
                    data[i..i + 3].copy_from_slice(&[255, 255, 255]);
                }
            }
        }
    }

    struct StubDisplay {
        stop_after: Option<usize>,
        fail: bool,
        seen: SharedObserved,
    }

    impl FrameDisplay for StubDisplay {
        fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("window gone".into());
            }
            let mut seen = self.seen.lock().unwrap();
            seen.shown.push(frame.clone());
            if self.stop_after == Some(seen.shown.len()) {
                return Ok(DisplayControl::Stop);
            }
            Ok(DisplayControl::Continue)
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.seen.lock().unwrap().display_closed = true;
            Ok(())
        }
    }

    struct MemoryEventLog {
        fail: bool,
        seen: SharedObserved,
    }

    impl SeniorEventLog for MemoryEventLog {
        fn record(&mut self, age: u32, gender: Gender) -> Result<(), EventLogError> {
            if self.fail {
                return Err(EventLogError::Io {
                    path: PathBuf::from("data/senior_log.csv"),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            self.seen.lock().unwrap().logged.push((age, gender));
            Ok(())
        }
    }

    // --- Harness ---

    struct Harness {
        frames: usize,
        read_error_at: Option<usize>,
        fail_open: bool,
        boxes: Vec<BoundingBox>,
        detector_fails: bool,
        answer: EstimateFn,
        stop_after: Option<usize>,
        display_fails: bool,
        log_fails: bool,
        cancelled: Arc<AtomicBool>,
        seen: SharedObserved,
    }

    impl Harness {
        fn new(frames: usize) -> Self {
            Self {
                frames,
                read_error_at: None,
                fail_open: false,
                boxes: vec![BoundingBox::new(10, 10, 30, 30)],
                detector_fails: false,
                answer: age(35),
                stop_after: None,
                display_fails: false,
                log_fails: false,
                cancelled: Arc::new(AtomicBool::new(false)),
                seen: Arc::new(Mutex::new(Observed::default())),
            }
        }

        fn run(self, skip: usize) -> (Result<RunSummary, PipelineError>, SharedObserved) {
            let mut items: Vec<Result<Frame, String>> =
                (0..self.frames).map(|i| Ok(black_frame(i))).collect();
            if let Some(at) = self.read_error_at {
                items.truncate(at);
                items.push(Err("corrupt packet".into()));
                items.push(Ok(black_frame(at + 1)));
            }

            let seen = self.seen;
            let mut use_case = DetectSeniorsUseCase::new(
                Box::new(StubReader {
                    items,
                    fail_open: self.fail_open,
                    seen: seen.clone(),
                }),
                Box::new(StubDetector {
                    boxes: self.boxes,
                    fail: self.detector_fails,
                    seen: seen.clone(),
                }),
                Box::new(StubEstimator {
                    answer: self.answer,
                    calls: 0,
                    seen: seen.clone(),
                }),
                Box::new(FillAnnotator),
                Box::new(StubDisplay {
                    stop_after: self.stop_after,
                    fail: self.display_fails,
                    seen: seen.clone(),
                }),
                Box::new(MemoryEventLog {
                    fail: self.log_fails,
                    seen: seen.clone(),
                }),
                Box::new(NullPipelineLogger),
                Some(self.cancelled),
            );
            let params = SessionParams::new(InputSource::File("clip.mp4".into()), skip).unwrap();
            (use_case.execute(&params), seen)
        }
    }

    fn black_frame(index: usize) -> Frame {
        Frame::new(vec![0; (W * H * 3) as usize], W, H, 3, index)
    }

    fn age(age: u32) -> EstimateFn {
        Box::new(move |_| {
            Ok(AttributeEstimate {
                age,
                gender: Gender::Male,
            })
        })
    }

    fn is_annotated(frame: &Frame) -> bool {
        frame.data().iter().any(|&v| v == 255)
    }

    // --- Skip policy ---

    #[test]
    fn test_every_third_frame_processed_and_others_replayed() {
        let (result, seen) = Harness::new(10).run(3);
        let summary = result.unwrap();
        let seen = seen.lock().unwrap();

        assert_eq!(seen.detect_calls, vec![0, 3, 6, 9]);
        assert_eq!(summary.frames_read, 10);
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);

        // One display call per frame read; skipped frames replay the last
        // annotated frame, including its index
        let shown: Vec<usize> = seen.shown.iter().map(|f| f.index()).collect();
        assert_eq!(shown, vec![0, 0, 0, 3, 3, 3, 6, 6, 6, 9]);
        assert!(seen.shown.iter().all(is_annotated));
    }

    #[test]
    fn test_interval_one_processes_every_frame() {
        let (result, seen) = Harness::new(5).run(1);
        assert_eq!(result.unwrap().frames_processed, 5);
        assert_eq!(seen.lock().unwrap().detect_calls, vec![0, 1, 2, 3, 4]);
    }

    // --- Estimation outcomes ---

    #[test]
    fn test_failing_estimator_leaves_frames_raw() {
        let mut harness = Harness::new(10);
        harness.answer = Box::new(|_| Err(EstimationError::NoFace));
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();
        let seen = seen.lock().unwrap();

        assert_eq!(summary.frames_read, 10);
        assert_eq!(summary.detections, 4);
        assert_eq!(summary.skipped_no_face, 4);
        assert_eq!(summary.annotated, 0);
        assert_eq!(seen.shown.len(), 10);
        assert!(seen.shown.iter().all(|f| !is_annotated(f)));
        assert!(seen.logged.is_empty());
    }

    #[test]
    fn test_inference_error_skips_only_that_detection() {
        let mut harness = Harness::new(1);
        harness.boxes = vec![BoundingBox::new(0, 0, 10, 10), BoundingBox::new(20, 20, 40, 40)];
        harness.answer = Box::new(|call| match call {
            0 => Err(EstimationError::Inference("bad tensor".into())),
            _ => Ok(AttributeEstimate {
                age: 70,
                gender: Gender::Female,
            }),
        });
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        assert_eq!(summary.skipped_errors, 1);
        assert_eq!(summary.annotated, 1);
        assert_eq!(seen.lock().unwrap().logged, vec![(70, Gender::Female)]);
    }

    #[test]
    fn test_seniors_logged_once_per_processed_frame() {
        let mut harness = Harness::new(10);
        harness.answer = age(72);
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        // No tracking: the same senior is logged on each analysed frame
        assert_eq!(summary.seniors_logged, 4);
        assert_eq!(seen.lock().unwrap().logged, vec![(72, Gender::Male); 4]);
    }

    #[test]
    fn test_only_processed_frames_over_sixty_are_logged() {
        let mut harness = Harness::new(10);
        harness.answer = Box::new(|call| {
            Ok(AttributeEstimate {
                age: if call < 2 { 70 } else { 55 },
                gender: Gender::Male,
            })
        });
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.annotated, 4);
        assert_eq!(summary.seniors_logged, 2);
        assert_eq!(
            seen.lock().unwrap().logged,
            vec![(70, Gender::Male), (70, Gender::Male)]
        );
    }

    #[test]
    fn test_age_sixty_is_annotated_but_not_logged() {
        let mut harness = Harness::new(3);
        harness.answer = age(60);
        let (result, seen) = harness.run(1);
        let summary = result.unwrap();

        assert_eq!(summary.annotated, 3);
        assert_eq!(summary.seniors_logged, 0);
        assert!(seen.lock().unwrap().logged.is_empty());
    }

    // --- Geometry ---

    #[test]
    fn test_out_of_frame_box_is_clamped_before_cropping() {
        let mut harness = Harness::new(1);
        harness.boxes = vec![BoundingBox::new(-20, -20, 1000, 1000)];
        let (result, seen) = harness.run(1);
        result.unwrap();

        let seen = seen.lock().unwrap();
        // Clamped to (0, 0, W-1, H-1); crop end is exclusive
        assert_eq!(seen.crops.len(), 1);
        assert_eq!((seen.crops[0].width(), seen.crops[0].height()), (W - 1, H - 1));
        assert!(is_annotated(&seen.shown[0]));
    }

    #[test]
    fn test_crops_come_from_unannotated_frame() {
        let mut harness = Harness::new(1);
        harness.boxes = vec![BoundingBox::new(0, 0, 30, 30), BoundingBox::new(10, 10, 40, 40)];
        let (result, seen) = harness.run(1);
        result.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.crops.len(), 2);
        assert!(seen.crops.iter().all(|c| !is_annotated(c)));
    }

    #[test]
    fn test_no_detections_shows_raw_frame() {
        let mut harness = Harness::new(2);
        harness.boxes = Vec::new();
        let (result, seen) = harness.run(1);
        let summary = result.unwrap();

        assert_eq!(summary.detections, 0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.shown[0], black_frame(0));
    }

    // --- Termination ---

    #[test]
    fn test_unopenable_source_is_not_an_error() {
        let mut harness = Harness::new(5);
        harness.fail_open = true;
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        assert_eq!(summary.stop_reason, StopReason::SourceUnavailable);
        assert_eq!(summary.frames_read, 0);
        let seen = seen.lock().unwrap();
        assert!(seen.shown.is_empty());
        assert!(seen.reader_closed);
        assert!(seen.display_closed);
    }

    #[test]
    fn test_read_failure_stops_without_retry() {
        let mut harness = Harness::new(5);
        harness.read_error_at = Some(2);
        let (result, seen) = harness.run(1);
        let summary = result.unwrap();

        assert_eq!(summary.stop_reason, StopReason::ReadFailed);
        assert_eq!(summary.frames_read, 2);
        assert_eq!(seen.lock().unwrap().shown.len(), 2);
    }

    #[test]
    fn test_cancelled_before_start_reads_nothing() {
        let harness = Harness::new(5);
        harness.cancelled.store(true, Ordering::Relaxed);
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.frames_read, 0);
        let seen = seen.lock().unwrap();
        assert!(seen.reader_closed);
        assert!(seen.display_closed);
    }

    #[test]
    fn test_cancel_from_estimator_stops_after_current_frame() {
        let mut harness = Harness::new(10);
        let token = harness.cancelled.clone();
        harness.answer = Box::new(move |call| {
            if call == 1 {
                token.store(true, Ordering::Relaxed);
            }
            Ok(AttributeEstimate {
                age: 30,
                gender: Gender::Female,
            })
        });
        let (result, seen) = harness.run(1);
        let summary = result.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.frames_read, 2);
        assert_eq!(seen.lock().unwrap().shown.len(), 2);
    }

    #[test]
    fn test_display_stop_ends_run() {
        let mut harness = Harness::new(10);
        harness.stop_after = Some(4);
        let (result, seen) = harness.run(3);
        let summary = result.unwrap();

        assert_eq!(summary.stop_reason, StopReason::DisplayClosed);
        assert_eq!(summary.frames_read, 4);
        assert!(seen.lock().unwrap().reader_closed);
    }

    // --- Fatal errors ---

    #[test]
    fn test_detector_failure_aborts_and_releases_resources() {
        let mut harness = Harness::new(5);
        harness.detector_fails = true;
        let (result, seen) = harness.run(3);

        assert!(matches!(result, Err(PipelineError::Detection { frame: 0, .. })));
        let seen = seen.lock().unwrap();
        assert!(seen.reader_closed);
        assert!(seen.display_closed);
    }

    #[test]
    fn test_event_log_failure_aborts_run() {
        let mut harness = Harness::new(5);
        harness.answer = age(80);
        harness.log_fails = true;
        let (result, seen) = harness.run(1);

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::EventLog(_)));
        assert!(err.to_string().contains("senior_log.csv"));
        assert!(seen.lock().unwrap().reader_closed);
    }

    #[test]
    fn test_display_failure_aborts_run() {
        let mut harness = Harness::new(5);
        harness.display_fails = true;
        let (result, seen) = harness.run(3);

        assert!(matches!(result, Err(PipelineError::Display(_))));
        assert!(seen.lock().unwrap().reader_closed);
    }
}
