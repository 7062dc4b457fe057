use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoFont};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::estimation::domain::senior_classifier::Classification;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::frame_canvas;

const DEFAULT_THICKNESS: u32 = 2;
/// Gap between the label and the box edge.
const LABEL_MARGIN: i32 = 4;

/// Draws a hollow rectangle and a text label in the classification colour.
pub struct CpuBoxAnnotator {
    thickness: u32,
    font: &'static MonoFont<'static>,
}

impl CpuBoxAnnotator {
    pub fn new(thickness: u32, font: &'static MonoFont<'static>) -> Self {
        Self {
            thickness: thickness.max(1),
            font,
        }
    }
}

impl Default for CpuBoxAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_THICKNESS, &FONT_10X20)
    }
}

impl FrameAnnotator for CpuBoxAnnotator {
    fn annotate(&self, frame: &mut Frame, bbox: &BoundingBox, classification: &Classification) {
        draw_outline(frame, bbox, self.thickness as i32, classification.color);

        let (x, y) = label_origin(bbox, frame_canvas::text_height(self.font));
        frame_canvas::draw_text(
            frame,
            x,
            y,
            &classification.label,
            classification.color,
            self.font,
        );
    }
}

/// Top-left of the label: above the box, or just inside it when the box
/// touches the top of the frame.
fn label_origin(bbox: &BoundingBox, text_height: u32) -> (i32, i32) {
    let above = bbox.y1 - LABEL_MARGIN - text_height as i32;
    if above >= 0 {
        (bbox.x1, above)
    } else {
        (bbox.x1 + LABEL_MARGIN, bbox.y1 + LABEL_MARGIN)
    }
}

/// Strokes `bbox` (inclusive corners) `thickness` pixels wide, growing inward.
/// Draws straight into the frame's buffer.
fn draw_outline(frame: &mut Frame, bbox: &BoundingBox, thickness: i32, color: Rgb<u8>) {
    let (width, height) = (frame.width(), frame.height());
    let Some(mut canvas) =
        ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, frame.data_mut())
    else {
        return;
    };
    for inset in 0..thickness {
        let w = bbox.width() + 1 - 2 * inset;
        let h = bbox.height() + 1 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x1 + inset, bbox.y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::domain::senior_classifier::{NON_SENIOR_COLOR, SENIOR_COLOR};

    fn blank(w: u32, h: u32) -> Frame {
        Frame::new(vec![0; (w * h * 3) as usize], w, h, 3, 0)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width() + x) * 3) as usize;
        [frame.data()[i], frame.data()[i + 1], frame.data()[i + 2]]
    }

    fn senior() -> Classification {
        Classification {
            senior: true,
            label: "Senior (Man)".into(),
            color: SENIOR_COLOR,
        }
    }

    #[test]
    fn test_draws_two_pixel_outline() {
        let mut frame = blank(200, 200);
        let bbox = BoundingBox::new(50, 60, 150, 160);
        CpuBoxAnnotator::default().annotate(&mut frame, &bbox, &senior());

        for (x, y) in [(50, 60), (51, 61), (150, 160), (149, 159), (100, 60), (50, 100)] {
            assert_eq!(pixel(&frame, x, y), SENIOR_COLOR.0, "edge pixel ({x}, {y})");
        }
        // Third pixel in is inside the outline
        assert_eq!(pixel(&frame, 52, 100), [0, 0, 0]);
        assert_eq!(pixel(&frame, 100, 100), [0, 0, 0]);
    }

    #[test]
    fn test_label_above_box_in_box_color() {
        let mut frame = blank(300, 200);
        let bbox = BoundingBox::new(40, 100, 140, 180);
        let classification = Classification {
            senior: false,
            label: "Man, 34 yrs".into(),
            color: NON_SENIOR_COLOR,
        };
        CpuBoxAnnotator::default().annotate(&mut frame, &bbox, &classification);

        let text_h = frame_canvas::text_height(&FONT_10X20);
        let top = 100 - LABEL_MARGIN as u32 - text_h;
        let label_pixels = (top..100 - LABEL_MARGIN as u32)
            .flat_map(|y| (40..200).map(move |x| (x, y)))
            .filter(|&(x, y)| pixel(&frame, x, y) == NON_SENIOR_COLOR.0)
            .count();
        assert!(label_pixels > 0);
    }

    #[test]
    fn test_label_moves_inside_when_no_room_above() {
        let bbox = BoundingBox::new(10, 0, 100, 80);
        assert_eq!(
            label_origin(&bbox, 20),
            (10 + LABEL_MARGIN, LABEL_MARGIN)
        );
        let roomy = BoundingBox::new(10, 50, 100, 80);
        assert_eq!(label_origin(&roomy, 20), (10, 50 - LABEL_MARGIN - 20));
    }

    #[test]
    fn test_box_on_frame_edge_is_clipped() {
        let mut frame = blank(64, 48);
        let bbox = BoundingBox::new(0, 0, 63, 47);
        CpuBoxAnnotator::default().annotate(&mut frame, &bbox, &senior());
        assert_eq!(pixel(&frame, 0, 0), SENIOR_COLOR.0);
        assert_eq!(pixel(&frame, 63, 47), SENIOR_COLOR.0);
        assert_eq!(frame.data().len(), 64 * 48 * 3);
    }

    #[test]
    fn test_degenerate_box_does_not_panic() {
        let mut frame = blank(32, 32);
        let bbox = BoundingBox::new(31, 31, 31, 31);
        CpuBoxAnnotator::default().annotate(&mut frame, &bbox, &senior());
        assert_eq!(pixel(&frame, 31, 31), SENIOR_COLOR.0);
    }

    #[test]
    fn test_outline_keeps_pixels_outside_box() {
        let mut frame = Frame::new(vec![7; 40 * 40 * 3], 40, 40, 3, 0);
        let bbox = BoundingBox::new(30, 30, 35, 35);
        CpuBoxAnnotator::new(1, &FONT_10X20).annotate(&mut frame, &bbox, &senior());

        assert_eq!(pixel(&frame, 30, 30), SENIOR_COLOR.0);
        assert_eq!(pixel(&frame, 5, 35), [7, 7, 7]);
        assert_eq!(pixel(&frame, 39, 39), [7, 7, 7]);
    }

    #[test]
    fn test_label_keeps_lowercase() {
        let bbox = BoundingBox::new(10, 40, 200, 90);
        let classify = |label: &str| Classification {
            senior: false,
            label: label.into(),
            color: NON_SENIOR_COLOR,
        };

        let mut lower = blank(240, 100);
        let mut upper = blank(240, 100);
        CpuBoxAnnotator::default().annotate(&mut lower, &bbox, &classify("Man, 34 yrs"));
        CpuBoxAnnotator::default().annotate(&mut upper, &bbox, &classify("MAN, 34 YRS"));

        assert_ne!(lower.data(), upper.data());
    }
}
