//! Free-direction search over an ephemeral local occupancy grid.
//!
//! Each run:
//!
//! 1. **Grid construction** – every voxel inside the vertical band is
//!    rotated into the user's walking frame and marks its cell blocked.
//!    Column index is lateral offset, row index is forward offset; the
//!    user sits at the centre cell.
//! 2. **Inflation** – every blocked cell is grown by a disk of the user's
//!    body radius, so the search can treat the user as a point.  The centre
//!    cell is then cleared and the original obstacle cells re-marked.
//! 3. **Forward-biased best-first search** – nodes are expanded highest row
//!    first.  A node tries its forward cell; if that is blocked it walks a
//!    right chain (forward-right, right, back-right, back) and a left chain
//!    (forward-left, left, back-left, back), each stopping at the first cell
//!    that is not blocked.  A node whose forward cell and both chains are
//!    blocked is a dead end: its cell becomes blocked and its parent is
//!    re-expanded before anything else.
//! 4. **Straight-line validation** – starting at the node with the highest
//!    row and walking up its parent chain, the first node that the centre
//!    can see along a straight grid ray wins.
//!
//! ```text
//!     row ▲
//!         │   · · · ★ · ·        ★ best node
//!         │   · ███████ ·        █ inflated obstacle
//!         │   · ███████ ·        ● user (centre)
//!         │   · · · ● · ·
//!         └──────────────▶ column (lateral)
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::detector::VerticalBand;
use crate::geometry::HorizontalFrame;
use crate::voxel_grid::VoxelGrid;

/// Right chain, tried in order when the forward cell is blocked.
const RIGHT_CHAIN: [(i32, i32); 4] = [(1, 1), (1, 0), (1, -1), (0, -1)];
/// Left chain, tried independently of the right chain.
const LEFT_CHAIN: [(i32, i32); 4] = [(-1, 1), (-1, 0), (-1, -1), (0, -1)];

// ────────────────────────────────────────────────────────────────────────────
// SearchGrid
// ────────────────────────────────────────────────────────────────────────────

/// State of one search-grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Free = 0,
    /// Obstacle, inflated obstacle margin or retired dead end.
    Blocked = 1,
    Visited = 2,
}

/// Square `width × width` occupancy grid addressed by `(column, row)`.
///
/// Out-of-range coordinates read as `None` and writes to them are ignored,
/// so no index computation can step outside the buffer.
#[derive(Debug, Clone)]
pub struct SearchGrid {
    width: usize,
    cells: Vec<Cell>,
}

impl SearchGrid {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            cells: vec![Cell::Free; width * width],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// The user's cell.
    pub fn centre(&self) -> (i32, i32) {
        let c = (self.width / 2) as i32;
        (c, c)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let w = self.width as i32;
        if x < 0 || y < 0 || x >= w || y >= w {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// True when `(x, y)` is inside the grid and not on its outer border.
    pub fn in_interior(&self, x: i32, y: i32) -> bool {
        let w = self.width as i32;
        x > 0 && y > 0 && x < w - 1 && y < w - 1
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Write `cell` at `(x, y)`; returns `false` when out of range.
    pub fn set(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Unvisited and unblocked.
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Some(Cell::Free)
    }

    /// Obstacle or outside the grid.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        matches!(self.get(x, y), None | Some(Cell::Blocked))
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::Free);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CircleOffsets
// ────────────────────────────────────────────────────────────────────────────

/// Cached integer offsets of a disk of radius `radius_cells`.
///
/// Recomputed only when the radius changes.  An invalidated cache is empty
/// until the next [`CircleOffsets::refresh`].
#[derive(Debug, Clone, Default)]
pub struct CircleOffsets {
    radius_cells: Option<f32>,
    offsets: Vec<(i32, i32)>,
}

impl CircleOffsets {
    pub fn for_radius(radius_cells: f32) -> Self {
        let mut offsets = Self::default();
        offsets.refresh(radius_cells);
        offsets
    }

    /// Recompute the disk if `radius_cells` differs from the cached radius.
    pub fn refresh(&mut self, radius_cells: f32) {
        if self.radius_cells == Some(radius_cells) {
            return;
        }
        self.offsets.clear();
        if radius_cells.is_finite() && radius_cells >= 0.0 {
            // Absorb float noise such as 0.3 / 0.1 = 2.9999998.
            let r = radius_cells + 1e-4;
            let reach = r.floor() as i32;
            let r_sq = r * r;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    if (dx * dx + dy * dy) as f32 <= r_sq {
                        self.offsets.push((dx, dy));
                    }
                }
            }
        }
        self.radius_cells = Some(radius_cells);
    }

    pub fn invalidate(&mut self) {
        self.radius_cells = None;
        self.offsets.clear();
    }

    pub fn radius_cells(&self) -> Option<f32> {
        self.radius_cells
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn as_slice(&self) -> &[(i32, i32)] {
        &self.offsets
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Search tree and frontier
// ────────────────────────────────────────────────────────────────────────────

/// Arena record; `parent` indexes the same arena.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    x: i32,
    y: i32,
    parent: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    row: i32,
    seq: u64,
    node: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on row; FIFO among equal rows.
        self.row
            .cmp(&other.row)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Two-tier frontier: backtracked parents always pop before heap entries.
#[derive(Debug, Default)]
struct Frontier {
    heap: BinaryHeap<QueueEntry>,
    backtrack: Vec<usize>,
    seq: u64,
}

impl Frontier {
    fn push(&mut self, node: usize, row: i32) {
        self.heap.push(QueueEntry {
            row,
            seq: self.seq,
            node,
        });
        self.seq += 1;
    }

    fn push_backtrack(&mut self, node: usize) {
        self.backtrack.push(node);
    }

    fn pop(&mut self) -> Option<usize> {
        self.backtrack
            .pop()
            .or_else(|| self.heap.pop().map(|entry| entry.node))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FreeDirectionSearch
// ────────────────────────────────────────────────────────────────────────────

/// Result of one search run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// Recommended heading in degrees, 0 straight ahead, positive to the
    /// right, in `(-180, 180]`.  0 when nothing validated.
    pub heading_deg: f32,
    /// Validated cell as `(lateral, forward)` cells from the user.
    pub target: Option<(i32, i32)>,
    /// Node with the highest row, relative to the user.
    pub best: (i32, i32),
    pub expanded: usize,
    pub backtracks: usize,
    /// False when inflation was skipped because the disk cache was empty.
    pub inflated: bool,
}

impl SearchOutcome {
    pub fn validated(&self) -> bool {
        self.target.is_some()
    }
}

/// Owns the reusable search grid, node arena and disk cache.
#[derive(Debug)]
pub struct FreeDirectionSearch {
    node_size: f32,
    grid: SearchGrid,
    offsets: CircleOffsets,
    nodes: Vec<SearchNode>,
    /// Cells blocked by real voxels, before inflation.
    blocking: Vec<(i32, i32)>,
}

impl FreeDirectionSearch {
    pub fn new(width: usize, node_size: f32, person_radius_cells: f32) -> Self {
        Self {
            node_size,
            grid: SearchGrid::new(width),
            offsets: CircleOffsets::for_radius(person_radius_cells),
            nodes: Vec::new(),
            blocking: Vec::new(),
        }
    }

    pub fn offsets(&self) -> &CircleOffsets {
        &self.offsets
    }

    pub fn invalidate_offsets(&mut self) {
        self.offsets.invalidate();
    }

    pub fn refresh_offsets(&mut self, person_radius_cells: f32) {
        self.offsets.refresh(person_radius_cells);
    }

    /// Search for a free heading around the user described by `frame`.
    ///
    /// The grid and node arena are cleared afterwards; only their
    /// allocations survive between runs.
    pub fn run(&mut self, voxels: &VoxelGrid, frame: &HorizontalFrame, band: VerticalBand) -> SearchOutcome {
        self.build_grid(voxels, frame, band);
        let inflated = self.inflate();
        let mut outcome = self.solve();
        outcome.inflated = inflated;

        self.grid.clear();
        self.nodes.clear();
        self.blocking.clear();
        outcome
    }

    fn build_grid(&mut self, voxels: &VoxelGrid, frame: &HorizontalFrame, band: VerticalBand) {
        self.grid.clear();
        self.blocking.clear();
        let (cx, cy) = self.grid.centre();
        for (centre, _) in voxels.occupied() {
            let offset = frame.project(centre);
            if !band.contains(offset.height) {
                continue;
            }
            let gx = cx + (offset.lateral / self.node_size).round() as i32;
            let gy = cy + (offset.forward / self.node_size).round() as i32;
            if self.grid.in_interior(gx, gy) && self.grid.get(gx, gy) != Some(Cell::Blocked) {
                self.grid.set(gx, gy, Cell::Blocked);
                self.blocking.push((gx, gy));
            }
        }
        trace!(blocking = self.blocking.len(), "search grid built");
    }

    /// Grow obstacles by the body radius; returns `false` when skipped.
    ///
    /// The centre is cleared after the true obstacles are re-marked, so the
    /// user's cell stays free even when a voxel sits on it.
    fn inflate(&mut self) -> bool {
        let inflated = !self.offsets.is_empty();
        if inflated {
            for &(bx, by) in &self.blocking {
                for &(dx, dy) in self.offsets.as_slice() {
                    self.grid.set(bx + dx, by + dy, Cell::Blocked);
                }
            }
        } else {
            debug!("disk offsets not ready; obstacle inflation skipped");
        }
        for &(bx, by) in &self.blocking {
            self.grid.set(bx, by, Cell::Blocked);
        }
        let (cx, cy) = self.grid.centre();
        self.grid.set(cx, cy, Cell::Free);
        inflated
    }

    /// Explore the prepared grid and validate the result.
    fn solve(&mut self) -> SearchOutcome {
        let (best, expanded, backtracks) = self.explore();
        let (cx, cy) = self.grid.centre();
        let best_node = self.nodes[best];
        let target = self.validate(best);
        let heading_deg = match target {
            Some((dx, dy)) => heading_for_offset(dx, dy),
            None => 0.0,
        };
        trace!(expanded, backtracks, ?target, heading_deg, "search finished");
        SearchOutcome {
            heading_deg,
            target,
            best: (best_node.x - cx, best_node.y - cy),
            expanded,
            backtracks,
            inflated: true,
        }
    }

    /// Run the frontier loop; returns (best node, expansions, backtracks).
    fn explore(&mut self) -> (usize, usize, usize) {
        self.nodes.clear();
        let (cx, cy) = self.grid.centre();
        self.grid.set(cx, cy, Cell::Visited);
        self.nodes.push(SearchNode {
            x: cx,
            y: cy,
            parent: None,
        });

        let mut frontier = Frontier::default();
        frontier.push(0, cy);
        let mut best = 0usize;
        let mut expanded = 0usize;
        let mut backtracks = 0usize;

        while let Some(idx) = frontier.pop() {
            let node = self.nodes[idx];
            if node.parent.is_some() && self.grid.get(node.x, node.y) == Some(Cell::Blocked) {
                continue;
            }
            expanded += 1;
            if node.y > self.nodes[best].y {
                best = idx;
            }
            if self.expand(idx, &mut frontier) {
                continue;
            }
            if let Some(parent) = node.parent {
                self.grid.set(node.x, node.y, Cell::Blocked);
                frontier.push_backtrack(parent);
                backtracks += 1;
            }
        }
        (best, expanded, backtracks)
    }

    /// Expand node `idx`; returns `false` on a dead end.
    fn expand(&mut self, idx: usize, frontier: &mut Frontier) -> bool {
        let SearchNode { x, y, .. } = self.nodes[idx];

        if !self.grid.is_blocked(x, y + 1) {
            if self.grid.is_free(x, y + 1) {
                self.enqueue(x, y + 1, idx, frontier);
            }
            return true;
        }

        let mut pushed = false;
        for chain in [RIGHT_CHAIN, LEFT_CHAIN] {
            for (dx, dy) in chain {
                let (nx, ny) = (x + dx, y + dy);
                if self.grid.is_blocked(nx, ny) {
                    continue;
                }
                if self.grid.is_free(nx, ny) {
                    self.enqueue(nx, ny, idx, frontier);
                    pushed = true;
                }
                break;
            }
        }
        pushed
    }

    fn enqueue(&mut self, x: i32, y: i32, parent: usize, frontier: &mut Frontier) {
        self.grid.set(x, y, Cell::Visited);
        self.nodes.push(SearchNode {
            x,
            y,
            parent: Some(parent),
        });
        frontier.push(self.nodes.len() - 1, y);
    }

    /// Walk from `best` towards the root and return the first node (as an
    /// offset from the centre) the user can reach in a straight line.  The
    /// root itself is never a candidate.
    fn validate(&self, best: usize) -> Option<(i32, i32)> {
        let centre = self.grid.centre();
        let mut current = best;
        loop {
            let node = self.nodes[current];
            let parent = node.parent?;
            if line_of_sight(&self.grid, centre, (node.x, node.y)) {
                return Some((node.x - centre.0, node.y - centre.1));
            }
            current = parent;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Free functions
// ────────────────────────────────────────────────────────────────────────────

/// Incremental grid raycast from cell `from` to cell `to`.
///
/// Steps along whichever axis reaches its next cell boundary first.
/// Returns `false` if the ray crosses a blocked cell or `to` itself is
/// blocked or out of range; the start cell is not tested.
pub fn line_of_sight(grid: &SearchGrid, from: (i32, i32), to: (i32, i32)) -> bool {
    match grid.get(to.0, to.1) {
        None | Some(Cell::Blocked) => return false,
        Some(_) => {}
    }
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let (step_x, step_y) = (dx.signum(), dy.signum());
    let (nx, ny) = (dx.abs(), dy.abs());

    let t_delta_x = if nx > 0 { 1.0 / nx as f32 } else { f32::INFINITY };
    let t_delta_y = if ny > 0 { 1.0 / ny as f32 } else { f32::INFINITY };
    let mut t_max_x = t_delta_x * 0.5;
    let mut t_max_y = t_delta_y * 0.5;

    let (mut x, mut y) = from;
    for _ in 0..(nx + ny) {
        if t_max_x <= t_max_y {
            x += step_x;
            t_max_x += t_delta_x;
        } else {
            y += step_y;
            t_max_y += t_delta_y;
        }
        if (x, y) == to {
            return true;
        }
        if grid.is_blocked(x, y) {
            return false;
        }
    }
    (x, y) == to
}

/// Heading for a cell offset `(dx, dy)` = (lateral, forward):
/// `90° − atan2(dy, dx)`, wrapped into `(-180, 180]`.
pub fn heading_for_offset(dx: i32, dy: i32) -> f32 {
    let mut heading = 90.0 - (dy as f32).atan2(dx as f32).to_degrees();
    if heading > 180.0 {
        heading -= 360.0;
    }
    heading
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    fn search(width: usize) -> FreeDirectionSearch {
        FreeDirectionSearch::new(width, 0.1, 3.0)
    }

    fn block_row(s: &mut FreeDirectionSearch, row: i32, except: &[i32]) {
        for x in 0..s.grid.width() as i32 {
            if !except.contains(&x) {
                s.grid.set(x, row, Cell::Blocked);
            }
        }
    }

    // ── Grid and offsets ────────────────────────────────────────────────────

    #[test]
    fn grid_rejects_out_of_range_access() {
        let mut g = SearchGrid::new(5);
        assert_eq!(g.get(-1, 0), None);
        assert_eq!(g.get(5, 2), None);
        assert!(!g.set(2, 5, Cell::Blocked));
        assert!(g.is_blocked(-1, 2));
        assert!(!g.is_free(7, 7));
        assert_eq!(g.centre(), (2, 2));
        assert!(g.in_interior(1, 3));
        assert!(!g.in_interior(0, 2));
        assert!(!g.in_interior(2, 4));
    }

    #[test]
    fn disk_of_radius_three() {
        let disk = CircleOffsets::for_radius(3.0);
        assert_eq!(disk.as_slice().len(), 29);
        assert!(disk.as_slice().contains(&(0, 0)));
        assert!(disk.as_slice().contains(&(3, 0)));
        assert!(disk.as_slice().contains(&(-2, -2)));
        assert!(!disk.as_slice().contains(&(3, 1)));
    }

    #[test]
    fn disk_absorbs_float_noise() {
        let disk = CircleOffsets::for_radius(0.3 / 0.1);
        assert!(disk.as_slice().contains(&(0, 3)));
    }

    #[test]
    fn invalidated_disk_is_empty_until_refreshed() {
        let mut disk = CircleOffsets::for_radius(2.0);
        disk.invalidate();
        assert!(disk.is_empty());
        assert_eq!(disk.radius_cells(), None);
        disk.refresh(2.0);
        assert_eq!(disk.as_slice().len(), 13);
    }

    // ── Raycast and heading ────────────────────────────────────────────────

    #[test]
    fn heading_convention() {
        assert!(heading_for_offset(0, 10).abs() < 1e-4);
        assert!((heading_for_offset(10, 0) - 90.0).abs() < 1e-4);
        assert!((heading_for_offset(-10, 0) + 90.0).abs() < 1e-4);
        assert!((heading_for_offset(5, 5) - 45.0).abs() < 1e-4);
        assert!((heading_for_offset(-1, -1) + 135.0).abs() < 1e-4);
        assert!((heading_for_offset(0, -3) - 180.0).abs() < 1e-4);
    }

    #[test]
    fn line_of_sight_clear_and_blocked() {
        let mut g = SearchGrid::new(11);
        assert!(line_of_sight(&g, (5, 5), (8, 10)));
        g.set(5, 7, Cell::Blocked);
        assert!(!line_of_sight(&g, (5, 5), (5, 9)));
        assert!(line_of_sight(&g, (5, 5), (5, 6)));
        // Visited cells never stop a ray.
        g.set(6, 5, Cell::Visited);
        assert!(line_of_sight(&g, (5, 5), (8, 5)));
    }

    #[test]
    fn line_of_sight_rejects_blocked_or_missing_target() {
        let mut g = SearchGrid::new(11);
        g.set(7, 7, Cell::Blocked);
        assert!(!line_of_sight(&g, (5, 5), (7, 7)));
        assert!(!line_of_sight(&g, (5, 5), (5, 11)));
    }

    #[test]
    fn diagonal_ray_is_conservative_at_corners() {
        let mut g = SearchGrid::new(11);
        // Ray (5,5) → (7,7) passes exactly through cell corners.
        g.set(6, 5, Cell::Blocked);
        assert!(!line_of_sight(&g, (5, 5), (7, 7)));
    }

    // ── Inflation ──────────────────────────────────────────────────────────

    #[test]
    fn inflation_keeps_user_cell_free() {
        let mut s = search(21);
        let mut voxels = VoxelGrid::new(0.1);
        // Obstacles hugging the user, one right on top of them.
        for (x, z) in [(0.0, 0.0), (0.1, 0.0), (0.0, 0.1), (-0.1, -0.1), (0.2, 0.2)] {
            voxels.insert(Vec3::new(x, 1.5, z));
        }
        let frame = HorizontalFrame::new(Vec3::new(0.0, 1.5, 0.0), 0.0);
        s.build_grid(&voxels, &frame, VerticalBand::above_ground(-0.5, 1.45));
        let (cx, cy) = s.grid.centre();
        assert!(s.blocking.contains(&(cx, cy)));
        assert!(s.inflate());
        assert_eq!(s.grid.get(cx, cy), Some(Cell::Free));
    }

    #[test]
    fn inflation_grows_disk_and_keeps_true_obstacles() {
        let mut s = search(21);
        let mut voxels = VoxelGrid::new(0.1);
        voxels.insert(Vec3::new(0.0, 1.5, 0.5));
        let frame = HorizontalFrame::new(Vec3::new(0.0, 1.5, 0.0), 0.0);
        s.build_grid(&voxels, &frame, VerticalBand::above_ground(-0.5, 1.45));
        assert_eq!(s.blocking, vec![(10, 15)]);
        s.inflate();
        assert_eq!(s.grid.get(10, 15), Some(Cell::Blocked));
        assert_eq!(s.grid.get(13, 15), Some(Cell::Blocked));
        assert_eq!(s.grid.get(10, 12), Some(Cell::Blocked));
        assert_eq!(s.grid.get(13, 16), Some(Cell::Free));
        assert_eq!(s.grid.count(Cell::Blocked), 29);
    }

    #[test]
    fn empty_disk_skips_inflation() {
        let mut s = search(21);
        s.invalidate_offsets();
        let mut voxels = VoxelGrid::new(0.1);
        voxels.insert(Vec3::new(0.0, 1.5, 0.5));
        let frame = HorizontalFrame::new(Vec3::new(0.0, 1.5, 0.0), 0.0);
        s.build_grid(&voxels, &frame, VerticalBand::above_ground(-0.5, 1.45));
        assert!(!s.inflate());
        assert_eq!(s.grid.count(Cell::Blocked), 1);
    }

    #[test]
    fn border_and_out_of_band_voxels_are_not_marked() {
        let mut s = search(21);
        let mut voxels = VoxelGrid::new(0.1);
        voxels.insert(Vec3::new(0.0, 1.5, 1.0)); // row 20: outer border
        voxels.insert(Vec3::new(0.0, 1.5, 5.0)); // far outside the grid
        voxels.insert(Vec3::new(0.3, 0.5, 0.3)); // below the floor band
        let frame = HorizontalFrame::new(Vec3::new(0.0, 1.5, 0.0), 0.0);
        s.build_grid(&voxels, &frame, VerticalBand::above_ground(-0.5, 1.45));
        assert!(s.blocking.is_empty());
    }

    // ── Search and validation ──────────────────────────────────────────────

    #[test]
    fn open_grid_heads_straight() {
        let mut s = search(21);
        let outcome = s.solve();
        assert_eq!(outcome.best, (0, 10));
        assert_eq!(outcome.target, Some((0, 10)));
        assert!(outcome.heading_deg.abs() < 1e-4);
        assert_eq!(outcome.backtracks, 0);
    }

    #[test]
    fn zig_zag_only_cell_is_never_recommended() {
        // A wall two rows ahead with a single gap at column 15: the far side
        // is reachable only by stepping sideways first.
        let mut s = search(21);
        block_row(&mut s, 12, &[15]);
        let outcome = s.solve();
        let (cx, cy) = s.grid.centre();

        assert_eq!(outcome.best, (5, 10), "search should reach the far border through the gap");
        let (dx, dy) = outcome.target.expect("a straight-line cell below the wall exists");
        assert!(dy < 2, "target {:?} lies beyond the wall", (dx, dy));
        assert!(line_of_sight(&s.grid, (cx, cy), (cx + dx, cy + dy)));
        assert_eq!((dx, dy), (4, 1));
        assert!((outcome.heading_deg - heading_for_offset(4, 1)).abs() < 1e-4);
    }

    #[test]
    fn every_validated_target_has_line_of_sight() {
        let layouts: [&[(i32, i32)]; 3] = [
            &[(9, 13), (10, 13), (11, 13), (12, 14), (8, 16)],
            &[(10, 11), (11, 12), (12, 13), (9, 12), (8, 13)],
            &[(7, 12), (8, 12), (9, 12), (10, 12), (11, 12), (12, 12), (13, 12), (14, 14)],
        ];
        for cells in layouts {
            let mut s = search(21);
            for &(x, y) in cells {
                s.grid.set(x, y, Cell::Blocked);
            }
            let outcome = s.solve();
            let centre = s.grid.centre();
            match outcome.target {
                Some((dx, dy)) => {
                    assert!(line_of_sight(&s.grid, centre, (centre.0 + dx, centre.1 + dy)))
                }
                None => assert_eq!(outcome.heading_deg, 0.0),
            }
        }
    }

    #[test]
    fn pocket_dead_end_backtracks_to_parent() {
        // A cup around the cell two rows ahead: entering it is a dead end.
        let mut s = search(21);
        for (x, y) in [(9, 13), (10, 13), (11, 13), (9, 12), (11, 12), (9, 11), (11, 11)] {
            s.grid.set(x, y, Cell::Blocked);
        }
        let outcome = s.solve();
        assert!(outcome.backtracks >= 1);
        assert_eq!(s.grid.get(10, 12), Some(Cell::Blocked), "dead end is retired");
        assert!(outcome.best.1 > 3, "search escaped the pocket: {:?}", outcome.best);
        let centre = s.grid.centre();
        if let Some((dx, dy)) = outcome.target {
            assert_ne!((dx, dy), (0, 2));
            assert!(line_of_sight(&s.grid, centre, (centre.0 + dx, centre.1 + dy)));
        }
    }

    #[test]
    fn sealed_user_falls_back_to_straight_ahead() {
        let mut s = search(11);
        for (x, y) in [(4, 6), (5, 6), (6, 6), (4, 5), (6, 5), (4, 4), (5, 4), (6, 4)] {
            s.grid.set(x, y, Cell::Blocked);
        }
        let outcome = s.solve();
        assert_eq!(outcome.target, None);
        assert_eq!(outcome.heading_deg, 0.0);
        assert_eq!(outcome.expanded, 1);
    }

    #[test]
    fn cluster_ahead_turns_away() {
        let mut s = FreeDirectionSearch::new(121, 0.1, 3.0);
        let mut voxels = VoxelGrid::new(0.1);
        for lateral in [-0.2f32, -0.1, 0.0, 0.1, 0.2] {
            voxels.insert(Vec3::new(lateral, 1.5, 1.0));
        }
        let frame = HorizontalFrame::new(Vec3::new(0.0, 1.5, 0.0), 0.0);
        let outcome = s.run(&voxels, &frame, VerticalBand::above_ground(-0.5, 1.45));
        assert!(outcome.inflated);
        assert!(outcome.validated());
        assert!(outcome.heading_deg.abs() > 5.0, "heading {}", outcome.heading_deg);
        // The grid is discarded after the run.
        assert_eq!(s.grid.count(Cell::Free), 121 * 121);
    }

    #[test]
    fn frontier_pops_backtrack_before_heap() {
        let mut f = Frontier::default();
        f.push(1, 50);
        f.push(2, 10);
        f.push_backtrack(3);
        assert_eq!(f.pop(), Some(3));
        assert_eq!(f.pop(), Some(1));
        assert_eq!(f.pop(), Some(2));
        assert_eq!(f.pop(), None);
    }

    #[test]
    fn frontier_is_fifo_within_a_row() {
        let mut f = Frontier::default();
        f.push(7, 4);
        f.push(8, 4);
        f.push(9, 4);
        assert_eq!((f.pop(), f.pop(), f.pop()), (Some(7), Some(8), Some(9)));
    }
}
