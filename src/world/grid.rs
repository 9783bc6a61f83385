use fixedbitset::FixedBitSet;

/// Boolean occupancy grid owned by a single chunk.
///
/// Coordinates are chunk-local. Anything outside `[0, width) × [0, height)`
/// reads as blocked, so searches that step off the edge of a grid fail safe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    blocked: FixedBitSet,
}

impl Grid {
    /// Create a fully walkable grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            blocked: FixedBitSet::with_capacity(width * height),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// True for blocked cells and for every out-of-bounds coordinate.
    #[inline]
    pub fn blocked(&self, x: i32, y: i32) -> bool {
        match self.index(x, y) {
            Some(idx) => self.blocked.contains(idx),
            None => true,
        }
    }

    #[inline]
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        !self.blocked(x, y)
    }

    /// Mark a cell. Out-of-bounds writes are ignored.
    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        if let Some(idx) = self.index(x, y) {
            self.blocked.set(idx, blocked);
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.count_ones(..)
    }

    pub fn free_count(&self) -> usize {
        self.width * self.height - self.blocked_count()
    }
}
