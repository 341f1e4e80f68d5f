//! Screen geometry shared by the device driver and the vision layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Rectangular screen region in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Area {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering the whole screen.
    pub const fn full_screen(screen_width: u32, screen_height: u32) -> Self {
        Self::new(0, 0, screen_width, screen_height)
    }

    /// Clip this region to screen boundaries
    pub fn clip_to(self, screen_width: u32, screen_height: u32) -> Self {
        let x = self.x.min(screen_width.saturating_sub(1));
        let y = self.y.min(screen_height.saturating_sub(1));
        Self {
            x,
            y,
            width: self.width.min(screen_width.saturating_sub(x)),
            height: self.height.min(screen_height.saturating_sub(y)),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Parse region from a template filename: `name-[x,y,width,height].png`
    pub fn parse_from_filename(filename: &str) -> Option<Self> {
        let start = filename.find('[')?;
        let end = filename.find(']')?;
        if end <= start {
            return None;
        }
        let parts: Vec<&str> = filename[start + 1..end].split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.trim().parse().ok()?;
        }
        Some(Self::new(values[0], values[1], values[2], values[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_parse_from_filename() {
        let area = Area::parse_from_filename("img-[300,1682,50,50].png").unwrap();
        assert_eq!(area, Area::new(300, 1682, 50, 50));
        assert!(Area::parse_from_filename("button_start.png").is_none());
        assert!(Area::parse_from_filename("bad-[1,2,3].png").is_none());
    }

    #[test]
    fn test_area_clips_to_screen_bounds() {
        let area = Area::new(1000, 2200, 200, 200).clip_to(1080, 2280);
        assert_eq!(area, Area::new(1000, 2200, 80, 80));
    }

    #[test]
    fn test_area_contains_and_center() {
        let area = Area::new(10, 20, 100, 50);
        assert_eq!(area.center(), Point::new(60, 45));
        assert!(area.contains(Point::new(10, 20)));
        assert!(!area.contains(Point::new(110, 20)));
    }
}
