use super::point::Point;

/// Inclusive rectangle of fabric tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl TileRect {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }

    pub fn tile(x: i32, y: i32) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn width(&self) -> i32 {
        self.xmax - self.xmin + 1
    }
    pub fn height(&self) -> i32 {
        self.ymax - self.ymin + 1
    }

    /// Width plus height in tiles; never below 2.
    pub fn half_perimeter(&self) -> i32 {
        self.width() + self.height()
    }

    pub fn center(&self) -> Point<f32> {
        Point::new(
            0.5 * (self.xmin + self.xmax) as f32,
            0.5 * (self.ymin + self.ymax) as f32,
        )
    }

    pub fn union(&self, other: &TileRect) -> TileRect {
        TileRect {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    pub fn expand(&self, by: i32) -> TileRect {
        TileRect {
            xmin: self.xmin - by,
            ymin: self.ymin - by,
            xmax: self.xmax + by,
            ymax: self.ymax + by,
        }
    }

    pub fn intersects(&self, other: &TileRect) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// Manhattan gap between two rectangles, zero when they touch or overlap.
    pub fn gap(&self, other: &TileRect) -> i32 {
        let dx = (other.xmin - self.xmax).max(self.xmin - other.xmax).max(0);
        let dy = (other.ymin - self.ymax).max(self.ymin - other.ymax).max(0);
        dx + dy
    }
}
