//! Zoom selection rectangle

use serde::{Deserialize, Serialize};

use super::Point;

/// Rectangular region in data space, built from two corner points.
///
/// Corners may be given in any order; the accessors normalise them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub a: Point,
    pub b: Point,
}

impl SelectionRect {
    pub const fn from_corners(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn left(&self) -> f64 {
        self.a.x.min(self.b.x)
    }

    pub fn right(&self) -> f64 {
        self.a.x.max(self.b.x)
    }

    pub fn bottom(&self) -> f64 {
        self.a.y.min(self.b.y)
    }

    pub fn top(&self) -> f64 {
        self.a.y.max(self.b.y)
    }
}

impl std::fmt::Display for SelectionRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.2}..{:.2}] x [{:.2}..{:.2}]",
            self.left(),
            self.right(),
            self.bottom(),
            self.top()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalised() {
        let rect = SelectionRect::from_corners(Point::new(10.0, -1.0), Point::new(2.0, 3.0));
        assert_eq!(rect.left(), 2.0);
        assert_eq!(rect.right(), 10.0);
        assert_eq!(rect.bottom(), -1.0);
        assert_eq!(rect.top(), 3.0);
    }
}
