//! Map positions.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Continuous position on the map, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in tiles
    pub x: f32,
    /// Y coordinate in tiles
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the tile containing this position.
    #[must_use]
    pub fn tile(self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }

    /// Angle in radians from this position towards `other`.
    #[must_use]
    pub fn theta_to(self, other: Self) -> f32 {
        let delta = other.to_vec2() - self.to_vec2();
        delta.y.atan2(delta.x)
    }

    /// Converts to a `glam` vector.
    #[must_use]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Axis-aligned tile rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileRect {
    /// Left tile
    pub x: i32,
    /// Top tile
    pub y: i32,
    /// Width in tiles
    pub w: i32,
    /// Height in tiles
    pub h: i32,
}

impl TileRect {
    /// Checks if a tile lies inside this rectangle.
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.w && y < self.y + self.h
    }
}
