//! Uniform spatial hash grid
//!
//! Divides the world into square cells and stores items in every cell their
//! footprint touches. Both the collision broad phase and AI perception build
//! their own grid from scratch each time they run.

use crate::util::vec2::Vec2;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 256;

/// Inline capacity of a cell bucket before it spills to the heap
const CELL_INLINE_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

type Bucket<T> = SmallVec<[T; CELL_INLINE_CAPACITY]>;

/// Inclusive rectangle of cell keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: CellKey,
    pub max: CellKey,
}

impl CellRange {
    /// Grow by `rings` cells on every side
    pub fn expand(&self, rings: i32) -> Self {
        Self {
            min: (self.min.0 - rings, self.min.1 - rings),
            max: (self.max.0 + rings, self.max.1 + rings),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = CellKey> {
        let (min, max) = (self.min, self.max);
        (min.0..=max.0).flat_map(move |x| (min.1..=max.1).map(move |y| (x, y)))
    }

    pub fn cell_count(&self) -> usize {
        let w = (self.max.0 - self.min.0 + 1).max(0) as usize;
        let h = (self.max.1 - self.min.1 + 1).max(0) as usize;
        w * h
    }
}

/// Spatial hash grid over copyable items (ids or small snapshots)
#[derive(Debug, Clone)]
pub struct SpatialGrid<T: Copy> {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: HashMap<CellKey, Bucket<T>>,
    item_count: usize,
}

impl<T: Copy> SpatialGrid<T> {
    /// Create a grid; non-positive sizes fall back to 1.0
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            item_count: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Clear all items, keeping cell allocations for reuse
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.item_count = 0;
    }

    /// Convert world position to cell key
    #[inline]
    pub fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Cells touched by the axis-aligned box around a circle
    pub fn circle_range(&self, center: Vec2, radius: f32) -> CellRange {
        let r = Vec2::new(radius.max(0.0), radius.max(0.0));
        CellRange {
            min: self.position_to_cell(center - r),
            max: self.position_to_cell(center + r),
        }
    }

    /// Insert into the single cell containing `position`
    #[inline]
    pub fn insert_point(&mut self, position: Vec2, item: T) {
        let key = self.position_to_cell(position);
        self.cells.entry(key).or_default().push(item);
        self.item_count += 1;
    }

    /// Insert into every cell the circle's bounding box touches
    pub fn insert_circle(&mut self, center: Vec2, radius: f32, item: T) {
        let range = self.circle_range(center, radius);
        for key in range.cells() {
            self.cells.entry(key).or_default().push(item);
        }
        self.item_count += 1;
    }

    /// Items stored in one cell
    pub fn cell(&self, key: CellKey) -> &[T] {
        self.cells
            .get(&key)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    /// Items in every cell of `range`; an item spanning several cells repeats
    pub fn query_range(&self, range: CellRange) -> impl Iterator<Item = &T> {
        range.cells().flat_map(move |key| self.cell(key).iter())
    }

    /// Number of items inserted since the last clear
    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialGridStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialGridStats {
            non_empty_cells,
            total_items: self.item_count,
            max_per_cell,
        }
    }
}

/// Statistics about the spatial grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialGridStats {
    pub non_empty_cells: usize,
    pub total_items: usize,
    pub max_per_cell: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid() {
        let grid: SpatialGrid<u64> = SpatialGrid::new(2.0);
        assert_eq!(grid.cell_size(), 2.0);
        assert!(grid.is_empty());

        let fallback: SpatialGrid<u64> = SpatialGrid::new(0.0);
        assert_eq!(fallback.cell_size(), 1.0);
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let grid: SpatialGrid<u64> = SpatialGrid::new(2.0);
        assert_eq!(grid.position_to_cell(Vec2::new(-0.1, 0.1)), (-1, 0));
        assert_eq!(grid.position_to_cell(Vec2::new(3.9, -2.0)), (1, -1));
    }

    #[test]
    fn test_insert_point_and_query() {
        let mut grid = SpatialGrid::new(2.0);
        grid.insert_point(Vec2::new(1.0, 1.0), 7u64);

        assert_eq!(grid.cell((0, 0)), &[7]);
        let found: Vec<_> = grid
            .query_range(grid.circle_range(Vec2::new(1.0, 1.0), 0.5))
            .copied()
            .collect();
        assert_eq!(found, vec![7]);
    }

    #[test]
    fn test_circle_occupies_every_touched_cell() {
        let mut grid = SpatialGrid::new(1.0);
        // AABB spans x in [0.5, 1.5], y in [0.5, 1.5] → cells (0..=1, 0..=1)
        grid.insert_circle(Vec2::new(1.0, 1.0), 0.5, 1u64);

        for key in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(grid.cell(key), &[1], "missing from {:?}", key);
        }
        assert!(grid.cell((2, 2)).is_empty());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.stats().non_empty_cells, 4);
    }

    #[test]
    fn test_clear() {
        let mut grid = SpatialGrid::new(2.0);
        grid.insert_circle(Vec2::new(1.0, 1.0), 3.0, 1u64);
        grid.clear();

        assert!(grid.is_empty());
        assert_eq!(grid.query_range(grid.circle_range(Vec2::ZERO, 10.0)).count(), 0);
    }

    #[test]
    fn test_cell_range_expand() {
        let range = CellRange { min: (0, 0), max: (0, 0) };
        let expanded = range.expand(1);
        assert_eq!(expanded.cell_count(), 9);
        assert_eq!(expanded.cells().count(), 9);
    }

    #[test]
    fn test_stats() {
        let mut grid = SpatialGrid::new(64.0);
        for id in 0..3u64 {
            grid.insert_point(Vec2::new(10.0, 10.0), id);
        }
        grid.insert_point(Vec2::new(500.0, 500.0), 3);

        let stats = grid.stats();
        assert_eq!(stats.total_items, 4);
        assert_eq!(stats.non_empty_cells, 2);
        assert_eq!(stats.max_per_cell, 3);
    }
}
