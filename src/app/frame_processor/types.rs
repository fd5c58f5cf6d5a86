// SPDX-License-Identifier: MPL-2.0

//! Core types for frame analysis results

use imageproc::rect::Rect;

/// An axis-aligned rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Same box shrunk by `amount` on every side, or `None` if nothing is left
    pub fn inset(&self, amount: u32) -> Option<Self> {
        let shrink = amount * 2;
        if self.width <= shrink || self.height <= shrink {
            return None;
        }
        Some(Self::new(
            self.x + amount as i32,
            self.y + amount as i32,
            self.width - shrink,
            self.height - shrink,
        ))
    }

    /// Intersect with a `width` x `height` frame
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right().min(width as i32);
        let bottom = self.bottom().min(height as i32);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self::new(
            left,
            top,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    /// Rectangle for the drawing routines
    pub fn to_rect(&self) -> Rect {
        Rect::at(self.x, self.y).of_size(self.width.max(1), self.height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_and_clamp() {
        let b = BoundingBox::new(-5, 10, 40, 20);
        assert_eq!(b.inset(1), Some(BoundingBox::new(-4, 11, 38, 18)));
        assert_eq!(b.inset(10), None);
        assert_eq!(b.clamp_to(30, 25), Some(BoundingBox::new(0, 10, 30, 15)));
        assert_eq!(b.clamp_to(30, 5), None);
    }
}
