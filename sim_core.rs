//! sim_core - Particle state and the fixed-step update pipeline
//! gravity -> turbulence -> collision -> damping/clamp/integrate -> boundary

use crate::boundary;
use crate::collision::Collision;
use crate::config::{BoundaryShape, SimConfig, MAX_PARTICLES};
use crate::forces;

const TAU: f32 = core::f32::consts::PI * 2.0;
/// Spawn layouts fill this fraction of the containment region.
const SPAWN_FILL: f32 = 0.95;
/// Max jitter of the rectangular spawn grid, as a fraction of one sub-cell.
const SPAWN_JITTER: f32 = 0.2;
const FORCE_EPSILON_SQ: f32 = 1e-8;

/// Parallel fixed-capacity particle arrays with an explicit length.
pub struct ParticleSet {
    x: [f32; MAX_PARTICLES],
    y: [f32; MAX_PARTICLES],
    vx: [f32; MAX_PARTICLES],
    vy: [f32; MAX_PARTICLES],
    len: usize,
}

impl ParticleSet {
    pub const fn new() -> Self {
        Self {
            x: [0.0; MAX_PARTICLES],
            y: [0.0; MAX_PARTICLES],
            vx: [0.0; MAX_PARTICLES],
            vy: [0.0; MAX_PARTICLES],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append a particle. Returns false, leaving the set unchanged, when full.
    pub fn push(&mut self, x: f32, y: f32, vx: f32, vy: f32) -> bool {
        if self.len >= MAX_PARTICLES {
            return false;
        }
        let i = self.len;
        self.x[i] = x;
        self.y[i] = y;
        self.vx[i] = vx;
        self.vy[i] = vy;
        self.len += 1;
        true
    }

    pub fn x(&self) -> &[f32] {
        &self.x[..self.len]
    }

    pub fn y(&self) -> &[f32] {
        &self.y[..self.len]
    }

    pub fn vx(&self) -> &[f32] {
        &self.vx[..self.len]
    }

    pub fn vy(&self) -> &[f32] {
        &self.vy[..self.len]
    }

    /// Mutable views of (x, y, vx, vy), each `len()` long.
    pub fn split_mut(&mut self) -> (&mut [f32], &mut [f32], &mut [f32], &mut [f32]) {
        let n = self.len;
        (&mut self.x[..n], &mut self.y[..n], &mut self.vx[..n], &mut self.vy[..n])
    }
}

impl Default for ParticleSet {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SimCore {
    particles: ParticleSet,
    collision: Collision,
    rng_state: u32,
}

impl SimCore {
    pub fn new() -> Self {
        Self::with_seed(0x1234_5678)
    }

    pub fn with_seed(seed: u32) -> Self {
        Self {
            particles: ParticleSet::new(),
            collision: Collision::new(),
            // xorshift has a fixed point at zero
            rng_state: if seed == 0 { 0x1234_5678 } else { seed },
        }
    }

    // Simple PRNG (xorshift32)
    fn random(&mut self) -> f32 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 17;
        self.rng_state ^= self.rng_state << 5;
        (self.rng_state as f32) / (u32::MAX as f32)
    }

    /// Particle count the configuration asks for, held to capacity.
    fn target_count(cfg: &SimConfig) -> usize {
        (cfg.particle_count as usize).min(MAX_PARTICLES)
    }

    /// Repopulate the whole set for the configured count and boundary shape.
    pub fn init(&mut self, cfg: &SimConfig) {
        let count = Self::target_count(cfg);
        if count < cfg.particle_count as usize {
            log::debug!(
                "sim: particle count {} truncated to capacity {}",
                cfg.particle_count,
                MAX_PARTICLES
            );
        }
        self.particles.clear();
        if count == 0 {
            return;
        }
        match cfg.boundary_shape {
            BoundaryShape::Circular => self.init_rings(cfg, count),
            BoundaryShape::Rectangular => self.init_jittered_grid(count),
        }
    }

    fn init_rings(&mut self, cfg: &SimConfig, count: usize) {
        let rings = libm::ceilf(libm::sqrtf(count as f32)) as usize;
        let per_ring = libm::ceilf(count as f32 / rings as f32);
        let spawn_radius = boundary::radius(cfg) * SPAWN_FILL;

        for ring in 0..rings {
            let placed = self.particles.len();
            if placed >= count {
                break;
            }
            let remaining = count - placed;
            let ring_radius = spawn_radius * ((ring + 1) as f32 / rings as f32);
            let mut ring_count = libm::floorf(per_ring * (ring + 1) as f32 / 2.0) as usize;
            ring_count = ring_count.clamp(1, remaining);
            // Outermost ring takes whatever the growth series left over
            if ring + 1 == rings {
                ring_count = remaining;
            }
            for i in 0..ring_count {
                let angle = (i as f32 / ring_count as f32) * TAU;
                let x = 0.5 + libm::cosf(angle) * ring_radius;
                let y = 0.5 + libm::sinf(angle) * ring_radius;
                self.particles.push(x, y, 0.0, 0.0);
            }
        }
    }

    fn init_jittered_grid(&mut self, count: usize) {
        let side = libm::ceilf(libm::sqrtf(count as f32)) as usize;
        let half = SPAWN_FILL * 0.5;
        let cell = SPAWN_FILL / side as f32;

        'rows: for row in 0..side {
            for col in 0..side {
                if self.particles.len() >= count {
                    break 'rows;
                }
                let jx = (self.random() - 0.5) * SPAWN_JITTER;
                let jy = (self.random() - 0.5) * SPAWN_JITTER;
                let x = 0.5 - half + (col as f32 + 0.5 + jx) * cell;
                let y = 0.5 - half + (row as f32 + 0.5 + jy) * cell;
                self.particles.push(x, y, 0.0, 0.0);
            }
        }
    }

    /// Advance one fixed step. Reinitializes first if the configured count changed.
    pub fn step(&mut self, cfg: &SimConfig, dt: f32, time_sec: f32) {
        if self.particles.len() != Self::target_count(cfg) {
            self.init(cfg);
        }

        {
            let (x, y, vx, vy) = self.particles.split_mut();
            forces::apply_gravity(cfg.gravity_x, cfg.gravity_y, dt, vx, vy);
            forces::apply_turbulence(cfg, x, y, vx, vy, dt, time_sec);
        }

        self.collision.resolve(cfg, &mut self.particles);

        let damping = cfg.velocity_damping;
        let vmax = cfg.max_velocity;
        let vmax2 = vmax * vmax;
        let advance = dt * cfg.time_scale;
        let (x, y, vx, vy) = self.particles.split_mut();
        for i in 0..x.len() {
            vx[i] *= damping;
            vy[i] *= damping;
            let v2 = vx[i] * vx[i] + vy[i] * vy[i];
            if v2 > vmax2 {
                let inv = vmax / libm::sqrtf(v2);
                vx[i] *= inv;
                vy[i] *= inv;
            }
            x[i] += vx[i] * advance;
            y[i] += vy[i] * advance;
            boundary::enforce(cfg, &mut x[i], &mut y[i], &mut vx[i], &mut vy[i]);
        }
    }

    /// Radial impulse toward (attract) or away from (repulse) a point, linear falloff.
    pub fn add_force_at_point(&mut self, px: f32, py: f32, radius: f32, strength: f32, repulse: bool) {
        let r2 = radius * radius;
        let signed = if repulse { -strength } else { strength };
        let (x, y, vx, vy) = self.particles.split_mut();
        for i in 0..x.len() {
            let dx = px - x[i];
            let dy = py - y[i];
            let d2 = dx * dx + dy * dy;
            if d2 > r2 || d2 < FORCE_EPSILON_SQ {
                continue;
            }
            let dist = libm::sqrtf(d2);
            let falloff = 1.0 - dist / radius;
            vx[i] += dx / dist * signed * falloff;
            vy[i] += dy / dist * signed * falloff;
        }
    }

    pub fn count(&self) -> usize {
        self.particles.len()
    }

    pub fn x(&self) -> &[f32] {
        self.particles.x()
    }

    pub fn y(&self) -> &[f32] {
        self.particles.y()
    }

    pub fn vx(&self) -> &[f32] {
        self.particles.vx()
    }

    pub fn vy(&self) -> &[f32] {
        self.particles.vy()
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Direct access for seeding scenes. Keep `particle_count` in the config in sync or the
    /// next step reinitializes.
    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }
}

impl Default for SimCore {
    fn default() -> Self {
        Self::new()
    }
}
