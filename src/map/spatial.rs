use crate::geo::GeoBounds;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Spatial hash over feature bounding boxes.
/// Each key is inserted into every cell its bbox overlaps, so queries have
/// no false negatives; callers drop false positives with exact checks.
pub struct FeatureGrid<K> {
    cells: HashMap<(i32, i32), Vec<K>>,
    cell_size: f64,
}

impl<K: Copy + Eq + Hash> FeatureGrid<K> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    pub fn build(items: impl Iterator<Item = (K, GeoBounds)>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (key, bounds) in items {
            grid.insert(key, &bounds);
        }
        grid
    }

    pub fn insert(&mut self, key: K, bounds: &GeoBounds) {
        let min_cell = self.to_cell(bounds.min.lon, bounds.min.lat);
        let max_cell = self.to_cell(bounds.max.lon, bounds.max.lat);
        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                self.cells.entry((x, y)).or_default().push(key);
            }
        }
    }

    /// Candidate keys whose bbox may overlap `bounds`, deduplicated.
    /// Very large query boxes fall back to scanning all cells.
    pub fn query(&self, bounds: &GeoBounds) -> Vec<K> {
        let min_cell = self.to_cell(bounds.min.lon, bounds.min.lat);
        let max_cell = self.to_cell(bounds.max.lon, bounds.max.lat);
        let span = (max_cell.0 - min_cell.0 + 1) as i64 * (max_cell.1 - min_cell.1 + 1) as i64;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut take = |indices: &Vec<K>| {
            for &key in indices {
                if seen.insert(key) {
                    results.push(key);
                }
            }
        };

        if span > self.cells.len() as i64 {
            for (cell, indices) in &self.cells {
                if cell.0 >= min_cell.0 && cell.0 <= max_cell.0 && cell.1 >= min_cell.1 && cell.1 <= max_cell.1 {
                    take(indices);
                }
            }
        } else {
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    if let Some(indices) = self.cells.get(&(x, y)) {
                        take(indices);
                    }
                }
            }
        }

        results
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
