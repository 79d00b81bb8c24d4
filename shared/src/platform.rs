use crate::constants::{ARENA_HEIGHT, ARENA_WIDTH, PLATFORM_HEIGHT, PLATFORM_WIDTH};
use crate::geometry::{Bounds, Rect};

/// A static, solid platform players can stand on. Platforms never move once
/// a match starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Platform { x, y, width, height }
    }

    pub fn bounds(&self) -> Bounds {
        Rect::new(self.x, self.y, self.width, self.height).bounds()
    }
}

/// The fixed four-platform layout every match starts with.
pub fn default_platforms() -> Vec<Platform> {
    vec![
        Platform::new(115.0, ARENA_HEIGHT - 250.0, PLATFORM_WIDTH, PLATFORM_HEIGHT),
        Platform::new(
            ARENA_WIDTH - 610.0,
            ARENA_HEIGHT - 250.0,
            PLATFORM_WIDTH,
            PLATFORM_HEIGHT,
        ),
        Platform::new(115.0, ARENA_HEIGHT - 500.0, PLATFORM_WIDTH, PLATFORM_HEIGHT),
        Platform::new(
            ARENA_WIDTH - 610.0,
            ARENA_HEIGHT - 500.0,
            PLATFORM_WIDTH,
            PLATFORM_HEIGHT,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_four_platforms() {
        assert_eq!(default_platforms().len(), 4);
    }

    #[test]
    fn bounds_match_position_and_size() {
        let p = Platform::new(10.0, 20.0, 500.0, 30.0);
        let b = p.bounds();
        assert_eq!(b.left, 10.0);
        assert_eq!(b.right, 510.0);
        assert_eq!(b.top, 20.0);
        assert_eq!(b.bottom, 50.0);
    }
}
