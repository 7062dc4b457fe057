/// An axis-aligned box in frame pixel coordinates.
///
/// Carries no identity: the same face in two frames yields two unrelated
/// boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from detector output, truncating toward zero and
    /// ordering the corners so `x1 <= x2` and `y1 <= y2`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (ax, bx) = (x1 as i32, x2 as i32);
        let (ay, by) = (y1 as i32, y2 as i32);
        Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }

    /// Maps every coordinate into `[0, width-1] x [0, height-1]`.
    ///
    /// A box lying entirely outside the frame collapses onto the nearest
    /// edge with zero width or height.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = (width as i32 - 1).max(0);
        let max_y = (height as i32 - 1).max(0);
        let x1 = self.x1.clamp(0, max_x);
        let y1 = self.y1.clamp(0, max_y);
        Self {
            x1,
            y1,
            x2: self.x2.clamp(x1, max_x),
            y2: self.y2.clamp(y1, max_y),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}
