//! Persistent sparse voxel map of observation counts.
//!
//! Every world point is bucketed into a cube of edge `node_size`.  Keys are
//! integer triples `round(position / node_size)`, so two points that land
//! in the same cube always produce the same key, bit for bit.
//!
//! # Example
//!
//! ```rust
//! use wayfind_perception::geometry::Vec3;
//! use wayfind_perception::voxel_grid::{VoxelGrid, VoxelKey};
//!
//! let mut grid = VoxelGrid::new(0.1);
//! grid.insert(Vec3::new(1.02, 0.0, 0.49));
//! grid.insert(Vec3::new(0.98, 0.04, 0.51));
//!
//! let key = VoxelKey::quantize(Vec3::new(1.0, 0.0, 0.5), 0.1);
//! assert_eq!(grid.count(key), 2);
//! assert_eq!(grid.len(), 1);
//! ```

use std::collections::HashMap;

use crate::geometry::Vec3;

// ────────────────────────────────────────────────────────────────────────────
// VoxelKey
// ────────────────────────────────────────────────────────────────────────────

/// Integer-quantized voxel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Quantize a world position: `round(p / node_size)` per axis.
    pub fn quantize(p: Vec3, node_size: f32) -> Self {
        Self::new(
            (p.x / node_size).round() as i32,
            (p.y / node_size).round() as i32,
            (p.z / node_size).round() as i32,
        )
    }

    /// World-space centre of the voxel.
    pub fn centre(self, node_size: f32) -> Vec3 {
        Vec3::new(
            self.x as f32 * node_size,
            self.y as f32 * node_size,
            self.z as f32 * node_size,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VoxelGrid
// ────────────────────────────────────────────────────────────────────────────

/// Mapping [`VoxelKey`] → observation count.
///
/// An absent key has count 0.  A present key with count 0 has been zeroed by
/// the frustum culler and is waiting out its grace period; it is never
/// treated as occupied.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    node_size: f32,
    cells: HashMap<VoxelKey, u32>,
}

impl VoxelGrid {
    pub fn new(node_size: f32) -> Self {
        Self {
            node_size,
            cells: HashMap::new(),
        }
    }

    pub fn node_size(&self) -> f32 {
        self.node_size
    }

    pub fn key_for(&self, p: Vec3) -> VoxelKey {
        VoxelKey::quantize(p, self.node_size)
    }

    pub fn centre_of(&self, key: VoxelKey) -> Vec3 {
        key.centre(self.node_size)
    }

    /// Count one observation of world point `p`; returns the new count.
    pub fn insert(&mut self, p: Vec3) -> u32 {
        let key = self.key_for(p);
        self.insert_key(key)
    }

    /// Count one observation of `key`; returns the new count.
    pub fn insert_key(&mut self, key: VoxelKey) -> u32 {
        let count = self.cells.entry(key).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Observation count of `key` (0 when absent).
    pub fn count(&self, key: VoxelKey) -> u32 {
        self.cells.get(&key).copied().unwrap_or(0)
    }

    pub fn contains_key(&self, key: VoxelKey) -> bool {
        self.cells.contains_key(&key)
    }

    /// Number of stored keys, including zeroed ones.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every stored key with its count.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelKey, u32)> + '_ {
        self.cells.iter().map(|(k, c)| (*k, *c))
    }

    /// World-space centres of voxels with at least one observation.
    pub fn occupied(&self) -> impl Iterator<Item = (Vec3, u32)> + '_ {
        let node_size = self.node_size;
        self.cells
            .iter()
            .filter(|(_, c)| **c >= 1)
            .map(move |(k, c)| (k.centre(node_size), *c))
    }

    pub fn remove(&mut self, key: VoxelKey) -> Option<u32> {
        self.cells.remove(&key)
    }

    /// Reset the count of an existing key to 0 without removing it.
    pub fn zero(&mut self, key: VoxelKey) {
        if let Some(count) = self.cells.get_mut(&key) {
            *count = 0;
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
