#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Point<f32> {
    pub fn manhattan(&self, other: Point<f32>) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}
