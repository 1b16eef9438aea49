use serde::{Deserialize, Serialize};

/// Bounding rectangle of a detected area of motion within a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MotionRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region spanning the inclusive pixel bounds `(min_x, min_y)..=(max_x, max_y)`
    pub fn from_bounds(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip the region to a frame of the given size
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }

        let clamped = Self::new(
            self.x,
            self.y,
            self.width.min(frame_width - self.x),
            self.height.min(frame_height - self.y),
        );

        (!clamped.is_empty()).then_some(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_and_bounds() {
        let region = MotionRegion::from_bounds(10, 10, 29, 29);
        assert_eq!(region, MotionRegion::new(10, 10, 20, 20));
        assert_eq!(region.area(), 400);

        let pixel = MotionRegion::from_bounds(3, 4, 3, 4);
        assert_eq!(pixel.area(), 1);
    }

    #[test]
    fn test_clamp_to_frame() {
        let region = MotionRegion::new(50, 40, 30, 30);
        assert_eq!(region.clamp_to(64, 48), Some(MotionRegion::new(50, 40, 14, 8)));
        assert_eq!(region.clamp_to(50, 48), None);
        assert_eq!(MotionRegion::new(0, 0, 0, 5).clamp_to(64, 48), None);
    }
}
