//! forces - Velocity impulse generators
//! Gravity, ambient turbulence, touch attraction/repulsion and motion-sensor gravity.

use crate::config::{ConfigHandle, SimConfig, TouchMode, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::sim_core::SimCore;

/// Uniform gravity impulse: `v += g * dt`.
pub fn apply_gravity(gx: f32, gy: f32, dt: f32, vx: &mut [f32], vy: &mut [f32]) {
    for (vx, vy) in vx.iter_mut().zip(vy.iter_mut()) {
        *vx += gx * dt;
        *vy += gy * dt;
    }
}

fn fract(v: f32) -> f32 {
    v - libm::floorf(v)
}

/// Hash noise in [-1, 1], deterministic for a given input.
pub fn noise2d(x: f32, y: f32) -> f32 {
    let h = libm::sinf(x * 12.9898 + y * 78.233) * 43758.545;
    fract(h) * 2.0 - 1.0
}

/// Time-varying turbulence impulse, skipped entirely when strength is ~0.
pub fn apply_turbulence(
    cfg: &SimConfig,
    x: &[f32],
    y: &[f32],
    vx: &mut [f32],
    vy: &mut [f32],
    dt: f32,
    time_sec: f32,
) {
    let strength = cfg.turb_strength;
    if strength <= 1e-6 {
        return;
    }
    let scale = cfg.turb_scale;
    let z = time_sec * cfg.turb_speed;
    for i in 0..x.len().min(vx.len()) {
        let n1 = noise2d(x[i] * scale + z, y[i] * scale - z);
        let n2 = noise2d(y[i] * scale - z, x[i] * scale + z);
        vx[i] += n1 * strength * dt;
        vy[i] += n2 * strength * dt;
    }
}

/// Raw touch sample from the display backend.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TouchSample {
    pub x: u16,
    pub y: u16,
    pub pressed: bool,
}

/// Touch point in normalized space.
#[derive(Copy, Clone, Debug, Default)]
pub struct TouchForce {
    x: f32,
    y: f32,
    active: bool,
}

impl TouchForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_touch_pixels(&mut self, sample: TouchSample) {
        let sw = SCREEN_WIDTH as f32;
        let sh = SCREEN_HEIGHT as f32;
        self.x = (sample.x as f32 / sw).clamp(0.0, 1.0);
        self.y = (sample.y as f32 / sh).clamp(0.0, 1.0);
        self.active = sample.pressed;
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn apply(&self, cfg: &SimConfig, sim: &mut SimCore) {
        if !self.active {
            return;
        }
        let repulse = cfg.touch_mode == TouchMode::Repulse;
        sim.add_force_at_point(self.x, self.y, cfg.touch_radius, cfg.touch_strength, repulse);
    }
}

/// Calibrated accelerometer sample, in g.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AccelSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Smoothed mapping from accelerometer tilt to gravity.
#[derive(Copy, Clone, Debug, Default)]
pub struct MotionGravity {
    raw: AccelSample,
    smooth_gx: f32,
    smooth_gy: f32,
}

impl MotionGravity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_accel(&mut self, sample: AccelSample) {
        self.raw = sample;
    }

    /// Blend toward the sensor target and take over gravity. No-op while disabled.
    pub fn apply(&mut self, config: &mut ConfigHandle) {
        let cfg = config.get();
        if !cfg.imu_enabled {
            return;
        }
        let alpha = cfg.imu_smoothing;
        let target_gx = -self.raw.x * cfg.imu_sensitivity;
        let target_gy = self.raw.y * cfg.imu_sensitivity;
        self.smooth_gx += (target_gx - self.smooth_gx) * alpha;
        self.smooth_gy += (target_gy - self.smooth_gy) * alpha;
        config.set_motion_gravity(self.smooth_gx, self.smooth_gy);
    }

    pub fn gravity(&self) -> (f32, f32) {
        (self.smooth_gx, self.smooth_gy)
    }
}
