//! boundary - Containment region for the particle field
//! Circle centered at (0.5, 0.5) or the unit square, each with reflect or wrap topology.

use crate::config::{BoundaryMode, BoundaryShape, SimConfig};

pub const CENTER: f32 = 0.5;

/// Containment radius of the circular boundary.
///
/// The scale factor can push `0.5 * scale` past the unit square; the radius is capped at 0.5
/// so every contained point stays in [0,1]x[0,1].
pub fn radius(cfg: &SimConfig) -> f32 {
    (0.5 * cfg.boundary_scale).min(0.5)
}

/// Whether a point lies inside the configured region.
pub fn contains(cfg: &SimConfig, x: f32, y: f32) -> bool {
    match cfg.boundary_shape {
        BoundaryShape::Rectangular => (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y),
        BoundaryShape::Circular => {
            let dx = x - CENTER;
            let dy = y - CENTER;
            let r = radius(cfg);
            // Tolerance for points placed exactly on the rim
            dx * dx + dy * dy <= r * r * (1.0 + 1e-5)
        }
    }
}

/// Bring one particle back inside. A contained particle is left untouched.
#[inline]
pub fn enforce(cfg: &SimConfig, x: &mut f32, y: &mut f32, vx: &mut f32, vy: &mut f32) {
    match cfg.boundary_shape {
        BoundaryShape::Rectangular => {
            enforce_axis(cfg.boundary_mode, cfg.boundary_damping, x, vx);
            enforce_axis(cfg.boundary_mode, cfg.boundary_damping, y, vy);
        }
        BoundaryShape::Circular => enforce_circle(cfg, x, y, vx, vy),
    }
}

fn enforce_axis(mode: BoundaryMode, damping: f32, p: &mut f32, v: &mut f32) {
    if (0.0..=1.0).contains(&*p) {
        return;
    }
    let below = *p < 0.0;
    match mode {
        BoundaryMode::Reflect => {
            *p = if below { 0.0 } else { 1.0 };
            *v = -*v * damping;
        }
        BoundaryMode::Wrap => {
            *p = if below { 1.0 } else { 0.0 };
        }
    }
}

fn enforce_circle(cfg: &SimConfig, x: &mut f32, y: &mut f32, vx: &mut f32, vy: &mut f32) {
    let r = radius(cfg);
    let dx = *x - CENTER;
    let dy = *y - CENTER;
    let d2 = dx * dx + dy * dy;
    if d2 <= r * r {
        return;
    }
    let dist = libm::sqrtf(d2);
    let nx = dx / dist;
    let ny = dy / dist;

    match cfg.boundary_mode {
        BoundaryMode::Wrap => {
            // Mirror through the center onto the far rim, just inside it
            let back = r * 0.999;
            *x = CENTER - nx * back;
            *y = CENTER - ny * back;
        }
        BoundaryMode::Reflect => {
            *x = CENTER + nx * r;
            *y = CENTER + ny * r;
            let dot = *vx * nx + *vy * ny;
            *vx = (*vx - 2.0 * dot * nx) * cfg.boundary_damping;
            *vy = (*vy - 2.0 * dot * ny) * cfg.boundary_damping;
        }
    }
    // Rounding on a full-size rim can land one ulp past the square
    *x = (*x).clamp(0.0, 1.0);
    *y = (*y).clamp(0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(mode: BoundaryMode) -> SimConfig {
        SimConfig {
            boundary_shape: BoundaryShape::Rectangular,
            boundary_mode: mode,
            ..SimConfig::default()
        }
    }

    fn circle(mode: BoundaryMode) -> SimConfig {
        SimConfig {
            boundary_shape: BoundaryShape::Circular,
            boundary_mode: mode,
            boundary_scale: 0.8,
            ..SimConfig::default()
        }
    }

    #[test]
    fn inside_is_untouched() {
        for cfg in [rect(BoundaryMode::Reflect), circle(BoundaryMode::Reflect)] {
            let (mut x, mut y, mut vx, mut vy) = (0.4, 0.6, 0.3, -0.2);
            enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
            assert_eq!((x, y, vx, vy), (0.4, 0.6, 0.3, -0.2));
        }
    }

    #[test]
    fn rect_reflect_clamps_and_bounces() {
        let cfg = rect(BoundaryMode::Reflect);
        let (mut x, mut y, mut vx, mut vy) = (1.2, 0.5, 1.0, 0.1);
        enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
        assert_eq!(x, 1.0);
        assert_eq!(y, 0.5);
        assert_eq!(vx, -0.8);
        assert_eq!(vy, 0.1);
    }

    #[test]
    fn rect_wrap_teleports_keeping_velocity() {
        let cfg = rect(BoundaryMode::Wrap);
        let (mut x, mut y, mut vx, mut vy) = (-0.1, 1.3, -1.0, 1.0);
        enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
        assert_eq!((x, y), (1.0, 0.0));
        assert_eq!((vx, vy), (-1.0, 1.0));
    }

    #[test]
    fn circle_reflect_uses_radial_normal() {
        let cfg = circle(BoundaryMode::Reflect);
        let r = radius(&cfg);
        // Moving straight out along +x
        let (mut x, mut y, mut vx, mut vy) = (0.5 + r + 0.05, 0.5, 1.0, 0.0);
        enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
        assert!(libm::fabsf(x - (0.5 + r)) < 1e-6);
        assert!(libm::fabsf(vx + 0.8) < 1e-6);
        assert!(contains(&cfg, x, y));
    }

    #[test]
    fn circle_wrap_mirrors_through_center() {
        let cfg = circle(BoundaryMode::Wrap);
        let r = radius(&cfg);
        let (mut x, mut y, mut vx, mut vy) = (0.5, 0.5 + r + 0.01, 0.0, 0.5);
        enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
        assert!(y < 0.5);
        assert!(contains(&cfg, x, y));
        assert_eq!(vy, 0.5);
    }

    #[test]
    fn oversized_scale_stays_in_unit_square() {
        let cfg = SimConfig { boundary_scale: 1.2, ..SimConfig::default() };
        assert_eq!(radius(&cfg), 0.5);
        let (mut x, mut y, mut vx, mut vy) = (1.5, 1.5, 1.0, 1.0);
        enforce(&cfg, &mut x, &mut y, &mut vx, &mut vy);
        assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
    }
}
