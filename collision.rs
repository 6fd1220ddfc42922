//! collision - Spatial-hash neighborhood search and pair resolution
//! Buckets are rebuilt every pass and never outlive a resolve call.

use heapless::Vec;

use crate::config::{SimConfig, MAX_CELL_PARTICLES, MAX_COLLISION_GRID};
use crate::sim_core::ParticleSet;

type Bucket = Vec<u16, MAX_CELL_PARTICLES>;

const EMPTY_BUCKET: Bucket = Vec::new();
const EMPTY_ROW: [Bucket; MAX_COLLISION_GRID] = [EMPTY_BUCKET; MAX_COLLISION_GRID];

/// Pairs closer than this are treated as coincident and skipped.
const MIN_PAIR_DIST_SQ: f32 = 1e-12;

/// Uniform grid over the unit square. Each particle index lands in exactly one bucket;
/// indices beyond a bucket's capacity are dropped for the frame.
pub struct SpatialHash {
    buckets: [[Bucket; MAX_COLLISION_GRID]; MAX_COLLISION_GRID],
    size: usize,
    dropped: usize,
}

impl SpatialHash {
    pub const fn new() -> Self {
        Self {
            buckets: [EMPTY_ROW; MAX_COLLISION_GRID],
            size: 1,
            dropped: 0,
        }
    }

    /// Side count in use, clamped to [1, MAX_COLLISION_GRID].
    pub fn size(&self) -> usize {
        self.size
    }

    /// Indices that did not fit in their bucket during the last rebuild.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn cell_of(&self, x: f32, y: f32) -> (usize, usize) {
        (Self::axis_cell(x, self.size), Self::axis_cell(y, self.size))
    }

    fn axis_cell(p: f32, size: usize) -> usize {
        // Float-to-int casts saturate, so negatives and NaN land in cell 0
        let c = (p * size as f32) as usize;
        c.min(size - 1)
    }

    pub fn bucket(&self, cx: usize, cy: usize) -> &[u16] {
        &self.buckets[cx][cy]
    }

    pub fn rebuild(&mut self, size: usize, x: &[f32], y: &[f32]) {
        self.size = size.clamp(1, MAX_COLLISION_GRID);
        for row in self.buckets.iter_mut().take(self.size) {
            for bucket in row.iter_mut().take(self.size) {
                bucket.clear();
            }
        }
        self.dropped = 0;

        for (i, (&px, &py)) in x.iter().zip(y.iter()).enumerate() {
            let (cx, cy) = self.cell_of(px, py);
            if self.buckets[cx][cy].push(i as u16).is_err() {
                self.dropped += 1;
            }
        }
    }
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlap resolver: position correction plus a damped repulsive impulse per contact.
pub struct Collision {
    grid: SpatialHash,
}

impl Collision {
    pub const fn new() -> Self {
        Self { grid: SpatialHash::new() }
    }

    pub fn grid(&self) -> &SpatialHash {
        &self.grid
    }

    pub fn resolve(&mut self, cfg: &SimConfig, particles: &mut ParticleSet) {
        let count = particles.len();
        if !cfg.collision_enabled || count < 2 {
            return;
        }

        let (x, y, vx, vy) = particles.split_mut();
        self.grid.rebuild(cfg.collision_grid_size as usize, x, y);
        if self.grid.dropped() > 0 {
            log::debug!("collision: {} particles over bucket capacity", self.grid.dropped());
        }

        let size = self.grid.size() as isize;
        let min_dist = cfg.particle_radius * 2.0;
        let min_dist_sq = min_dist * min_dist;
        // COMPAT: position correction then impulse, visual tuning depends on this order
        let impulse_scale = cfg.collision_repulsion * cfg.collision_damping;

        for i in 0..count {
            let (cx, cy) = self.grid.cell_of(x[i], y[i]);
            for ox in -1isize..=1 {
                for oy in -1isize..=1 {
                    let nx = cx as isize + ox;
                    let ny = cy as isize + oy;
                    if nx < 0 || ny < 0 || nx >= size || ny >= size {
                        continue;
                    }
                    for &j in self.grid.bucket(nx as usize, ny as usize) {
                        let j = j as usize;
                        if j <= i {
                            continue;
                        }
                        let dx = x[j] - x[i];
                        let dy = y[j] - y[i];
                        let dsq = dx * dx + dy * dy;
                        if dsq <= MIN_PAIR_DIST_SQ || dsq >= min_dist_sq {
                            continue;
                        }
                        let dist = libm::sqrtf(dsq);
                        let overlap = (min_dist - dist) * 0.5;
                        let nxn = dx / dist;
                        let nyn = dy / dist;

                        x[i] -= nxn * overlap;
                        y[i] -= nyn * overlap;
                        x[j] += nxn * overlap;
                        y[j] += nyn * overlap;

                        let impulse = overlap * impulse_scale;
                        vx[i] -= nxn * impulse;
                        vy[i] -= nyn * impulse;
                        vx[j] += nxn * impulse;
                        vy[j] += nyn * impulse;
                    }
                }
            }
        }
    }
}

impl Default for Collision {
    fn default() -> Self {
        Self::new()
    }
}
