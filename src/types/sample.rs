//! Core sample types: Sample, Point

use serde::{Deserialize, Serialize};

// ============================================================================
// Sample (parser output)
// ============================================================================

/// One decoded numeric reading from a text line.
///
/// `x` is `None` when the line carried a bare value; the buffer manager then
/// assigns the next implicit sequence index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub y: f64,
    pub x: Option<f64>,
}

impl Sample {
    /// Bare value without an explicit X coordinate.
    pub const fn new(y: f64) -> Self {
        Self { y, x: None }
    }

    /// Value paired with an explicit X coordinate.
    pub const fn with_x(x: f64, y: f64) -> Self {
        Self { y, x: Some(x) }
    }

    pub const fn has_x(&self) -> bool {
        self.x.is_some()
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.x {
            Some(x) => write!(f, "({},{})", x, self.y),
            None => write!(f, "{}", self.y),
        }
    }
}

// ============================================================================
// Point (buffer content)
// ============================================================================

/// A committed data-space point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}
