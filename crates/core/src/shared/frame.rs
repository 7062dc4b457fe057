use crate::shared::bounding_box::BoundingBox;

/// One decoded picture from a file or camera: packed RGB24, row-major,
/// tagged with its position in the stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "pixel buffer does not match {width}x{height}x{channels}"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copies the pixels inside `bbox` into a new frame.
    ///
    /// End coordinates are exclusive, so a box with `x1 == x2` yields an
    /// empty crop. Coordinates outside the frame are clipped.
    pub fn crop(&self, bbox: &BoundingBox) -> Frame {
        let fw = self.width as i32;
        let fh = self.height as i32;
        let x1 = bbox.x1.clamp(0, fw);
        let y1 = bbox.y1.clamp(0, fh);
        let x2 = bbox.x2.clamp(x1, fw);
        let y2 = bbox.y2.clamp(y1, fh);

        let cw = (x2 - x1) as usize;
        let ch = (y2 - y1) as usize;
        let channels = self.channels as usize;
        let row_bytes = cw * channels;

        let mut data = Vec::with_capacity(row_bytes * ch);
        for row in y1 as usize..y2 as usize {
            let start = (row * self.width as usize + x1 as usize) * channels;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Frame::new(data, cw as u32, ch as u32, self.channels, self.index)
    }

    /// Channel bytes of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(start..start + channels)
    }
}
