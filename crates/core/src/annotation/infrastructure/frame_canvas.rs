use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::{self, Text, TextStyleBuilder},
};
use image::Rgb;

use crate::shared::frame::Frame;

/// `embedded-graphics` target over a packed RGB frame. Pixels outside the
/// frame are dropped.
pub struct FrameCanvas<'a>(&'a mut Frame);

impl<'a> FrameCanvas<'a> {
    pub fn new(frame: &'a mut Frame) -> Self {
        Self(frame)
    }
}

impl Dimensions for FrameCanvas<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.0.width(),
                height: self.0.height(),
            },
        }
    }
}

impl DrawTarget for FrameCanvas<'_> {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.0.width(), self.0.height());
        let channels = self.0.channels() as usize;
        let data = self.0.data_mut();
        for Pixel(point, color) in pixels {
            if point.x >= 0 && (point.x as u32) < width && point.y >= 0 && (point.y as u32) < height
            {
                let i = (point.y as usize * width as usize + point.x as usize) * channels;
                data[i..i + 3].copy_from_slice(&[color.r(), color.g(), color.b()]);
            }
        }

        Ok(())
    }
}

/// Pixel height of one line of `font`.
pub fn text_height(font: &MonoFont<'_>) -> u32 {
    font.character_size.height
}

/// Draws `label` with its top-left corner at `(x, y)`.
pub fn draw_text(
    frame: &mut Frame,
    x: i32,
    y: i32,
    label: &str,
    color: Rgb<u8>,
    font: &MonoFont<'_>,
) {
    let [r, g, b] = color.0;
    let character_style = MonoTextStyle::new(font, Rgb888::new(r, g, b));
    let text_style = TextStyleBuilder::new()
        .alignment(text::Alignment::Left)
        .baseline(text::Baseline::Top)
        .build();

    let mut canvas = FrameCanvas::new(frame);
    match Text::with_text_style(label, Point::new(x, y), character_style, text_style)
        .draw(&mut canvas)
    {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}
