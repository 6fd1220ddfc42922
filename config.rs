//! config - Tunable simulation parameters and the remote-control registry
//! All capacities are compile-time; every remote write is clamped on the way in.

use crate::grid_modes::GridMode;

/// Hard cap on simulated particles.
pub const MAX_PARTICLES: usize = 300;
/// Hard cap on output cells.
pub const MAX_GRID_CELLS: usize = 512;
/// Max side count of the collision hash grid.
pub const MAX_COLLISION_GRID: usize = 16;
/// Max particle indices held by one collision bucket.
pub const MAX_CELL_PARTICLES: usize = 32;

/// Physical panel size in pixels (round 240x240 panel).
pub const SCREEN_WIDTH: u16 = 240;
pub const SCREEN_HEIGHT: u16 = 240;

/// Simple-command index that requests a full restart.
pub const RESTART_INDEX: u8 = 255;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoundaryShape {
    Circular,
    Rectangular,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Clamp to the wall and bounce with damping.
    Reflect,
    /// Teleport through the boundary center.
    Wrap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TouchMode {
    Attract,
    Repulse,
}

#[derive(Copy, Clone, Debug)]
pub struct SimConfig {
    // Simulation
    pub time_step: f32,
    pub time_scale: f32,
    pub velocity_damping: f32,
    pub max_velocity: f32,
    pub particle_count: u16,
    pub particle_radius: f32,

    // Boundary
    pub boundary_mode: BoundaryMode,
    pub boundary_shape: BoundaryShape,
    pub boundary_scale: f32,
    pub boundary_damping: f32,

    // Gravity
    pub gravity_x: f32,
    pub gravity_y: f32,

    // Collision
    pub collision_enabled: bool,
    pub collision_grid_size: u8,
    pub collision_repulsion: f32,
    pub collision_damping: f32,

    // Turbulence
    pub turb_strength: f32,
    pub turb_scale: f32,
    pub turb_speed: f32,

    // Touch
    pub touch_strength: f32,
    pub touch_radius: f32,
    pub touch_mode: TouchMode,

    // Motion sensor
    pub imu_sensitivity: f32,
    pub imu_smoothing: f32,
    pub imu_enabled: bool,

    // Rendering
    pub grid_mode: GridMode,
    pub max_density: f32,
    pub smooth_rate_in: f32,
    pub smooth_rate_out: f32,
    pub target_cell_count: u16,
    pub grid_gap: u8,
    pub theme: u8,
    pub brightness: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 60.0,
            time_scale: 1.0,
            velocity_damping: 0.995,
            max_velocity: 2.0,
            particle_count: 200,
            particle_radius: 0.01,
            boundary_mode: BoundaryMode::Reflect,
            boundary_shape: BoundaryShape::Circular,
            boundary_scale: 1.03,
            boundary_damping: 0.8,
            gravity_x: 0.0,
            gravity_y: 0.0,
            collision_enabled: true,
            collision_grid_size: 8,
            collision_repulsion: 0.5,
            collision_damping: 0.8,
            // Off by default so the idle scene stays calm
            turb_strength: 0.0,
            turb_scale: 6.0,
            turb_speed: 0.8,
            touch_strength: 0.1,
            touch_radius: 0.6,
            touch_mode: TouchMode::Attract,
            imu_sensitivity: 0.5,
            imu_smoothing: 0.12,
            imu_enabled: false,
            grid_mode: GridMode::Proximity,
            max_density: 16.0,
            smooth_rate_in: 0.15,
            smooth_rate_out: 0.08,
            target_cell_count: 338,
            grid_gap: 0,
            theme: 1,
            brightness: 16,
        }
    }
}

/// Storage type of a parameter, which decides how a raw byte is mapped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    U8,
    U16,
    Float,
    Bool,
}

/// Every field reachable from the control surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamField {
    TimeScale,
    VelocityDamping,
    MaxVelocity,
    ParticleCount,
    ParticleRadius,
    BoundaryMode,
    BoundaryShape,
    BoundaryScale,
    BoundaryDamping,
    GravityX,
    GravityY,
    CollisionEnabled,
    CollisionGridSize,
    CollisionRepulsion,
    CollisionDamping,
    TurbStrength,
    TurbScale,
    TurbSpeed,
    TouchStrength,
    TouchRadius,
    TouchMode,
    ImuSensitivity,
    ImuSmoothing,
    ImuEnabled,
    GridMode,
    MaxDensity,
    SmoothRateIn,
    SmoothRateOut,
    TargetCellCount,
    GridGap,
    Theme,
    Brightness,
}

#[derive(Copy, Clone, Debug)]
pub struct ParamDef {
    pub index: u8,
    pub name: &'static str,
    pub group: &'static str,
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub field: ParamField,
    /// Changing this field invalidates the grid layout.
    pub layout: bool,
}

impl ParamDef {
    const fn new(
        index: u8,
        name: &'static str,
        group: &'static str,
        kind: ParamKind,
        min: f32,
        max: f32,
        step: f32,
        field: ParamField,
    ) -> Self {
        Self { index, name, group, kind, min, max, step, field, layout: false }
    }

    const fn layout(mut self) -> Self {
        self.layout = true;
        self
    }

    /// Map a raw control byte into this parameter's range.
    pub fn map_raw(&self, raw: u8) -> f32 {
        match self.kind {
            ParamKind::Float | ParamKind::U16 => {
                self.min + (raw as f32 / 255.0) * (self.max - self.min)
            }
            ParamKind::U8 => (raw as f32).clamp(self.min, self.max),
            ParamKind::Bool => {
                if raw > 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

use ParamField as F;
use ParamKind as K;

pub static PARAM_REGISTRY: [ParamDef; 32] = [
    ParamDef::new(50, "Time Scale", "Simulation", K::Float, 0.1, 8.0, 0.01, F::TimeScale),
    ParamDef::new(51, "Velocity Damping", "Simulation", K::Float, 0.8, 1.0, 0.001, F::VelocityDamping),
    ParamDef::new(52, "Max Velocity", "Simulation", K::Float, 0.1, 8.0, 0.1, F::MaxVelocity),
    ParamDef::new(53, "Particle Count", "Simulation", K::U16, 50.0, 500.0, 1.0, F::ParticleCount),
    ParamDef::new(54, "Particle Radius", "Simulation", K::Float, 0.002, 0.05, 0.001, F::ParticleRadius),
    ParamDef::new(70, "Boundary Mode", "Boundary", K::U8, 0.0, 1.0, 1.0, F::BoundaryMode),
    ParamDef::new(71, "Boundary Shape", "Boundary", K::U8, 0.0, 1.0, 1.0, F::BoundaryShape).layout(),
    ParamDef::new(72, "Boundary Scale", "Boundary", K::Float, 0.6, 1.2, 0.01, F::BoundaryScale).layout(),
    ParamDef::new(73, "Boundary Damping", "Boundary", K::Float, 0.0, 1.0, 0.01, F::BoundaryDamping),
    ParamDef::new(80, "Gravity X", "Gravity", K::Float, -2.0, 2.0, 0.01, F::GravityX),
    ParamDef::new(81, "Gravity Y", "Gravity", K::Float, -2.0, 2.0, 0.01, F::GravityY),
    ParamDef::new(90, "Collision Enabled", "Collision", K::Bool, 0.0, 1.0, 1.0, F::CollisionEnabled),
    ParamDef::new(91, "Collision Grid Size", "Collision", K::U8, 4.0, 16.0, 1.0, F::CollisionGridSize),
    ParamDef::new(92, "Collision Repulsion", "Collision", K::Float, 0.0, 2.0, 0.01, F::CollisionRepulsion),
    ParamDef::new(93, "Collision Damping", "Collision", K::Float, 0.0, 1.0, 0.01, F::CollisionDamping),
    ParamDef::new(100, "Turbulence Strength", "Turbulence", K::Float, 0.0, 2.0, 0.01, F::TurbStrength),
    ParamDef::new(101, "Turbulence Scale", "Turbulence", K::Float, 0.5, 20.0, 0.1, F::TurbScale),
    ParamDef::new(102, "Turbulence Speed", "Turbulence", K::Float, 0.0, 4.0, 0.01, F::TurbSpeed),
    ParamDef::new(120, "Touch Strength", "Touch", K::Float, 0.0, 0.2, 0.001, F::TouchStrength),
    ParamDef::new(121, "Touch Radius", "Touch", K::Float, 0.01, 1.2, 0.005, F::TouchRadius),
    ParamDef::new(122, "Touch Mode", "Touch", K::U8, 0.0, 1.0, 1.0, F::TouchMode),
    ParamDef::new(130, "IMU Sensitivity", "IMU", K::Float, 0.0, 2.0, 0.01, F::ImuSensitivity),
    ParamDef::new(131, "IMU Smoothing", "IMU", K::Float, 0.0, 1.0, 0.01, F::ImuSmoothing),
    ParamDef::new(132, "IMU Enabled", "IMU", K::Bool, 0.0, 1.0, 1.0, F::ImuEnabled),
    ParamDef::new(140, "Grid Mode", "Rendering", K::U8, 0.0, 8.0, 1.0, F::GridMode),
    ParamDef::new(141, "Max Density", "Rendering", K::Float, 0.1, 64.0, 0.01, F::MaxDensity),
    ParamDef::new(142, "Smooth In", "Rendering", K::Float, 0.0, 1.0, 0.01, F::SmoothRateIn),
    ParamDef::new(143, "Smooth Out", "Rendering", K::Float, 0.0, 1.0, 0.01, F::SmoothRateOut),
    ParamDef::new(144, "Target Cell Count", "Rendering", K::U16, 32.0, 512.0, 1.0, F::TargetCellCount).layout(),
    ParamDef::new(145, "Grid Gap", "Rendering", K::U8, 0.0, 8.0, 1.0, F::GridGap).layout(),
    ParamDef::new(146, "Theme", "Rendering", K::U8, 0.0, 10.0, 1.0, F::Theme),
    ParamDef::new(147, "Brightness", "Rendering", K::U8, 0.0, 255.0, 1.0, F::Brightness),
];

/// Look up a registry entry by its wire index.
pub fn find_param(index: u8) -> Option<&'static ParamDef> {
    PARAM_REGISTRY.iter().find(|def| def.index == index)
}

impl SimConfig {
    /// Current value of a field as a float.
    pub fn get(&self, field: ParamField) -> f32 {
        match field {
            F::TimeScale => self.time_scale,
            F::VelocityDamping => self.velocity_damping,
            F::MaxVelocity => self.max_velocity,
            F::ParticleCount => self.particle_count as f32,
            F::ParticleRadius => self.particle_radius,
            F::BoundaryMode => (self.boundary_mode == BoundaryMode::Wrap) as u8 as f32,
            F::BoundaryShape => (self.boundary_shape == BoundaryShape::Rectangular) as u8 as f32,
            F::BoundaryScale => self.boundary_scale,
            F::BoundaryDamping => self.boundary_damping,
            F::GravityX => self.gravity_x,
            F::GravityY => self.gravity_y,
            F::CollisionEnabled => self.collision_enabled as u8 as f32,
            F::CollisionGridSize => self.collision_grid_size as f32,
            F::CollisionRepulsion => self.collision_repulsion,
            F::CollisionDamping => self.collision_damping,
            F::TurbStrength => self.turb_strength,
            F::TurbScale => self.turb_scale,
            F::TurbSpeed => self.turb_speed,
            F::TouchStrength => self.touch_strength,
            F::TouchRadius => self.touch_radius,
            F::TouchMode => (self.touch_mode == TouchMode::Repulse) as u8 as f32,
            F::ImuSensitivity => self.imu_sensitivity,
            F::ImuSmoothing => self.imu_smoothing,
            F::ImuEnabled => self.imu_enabled as u8 as f32,
            F::GridMode => self.grid_mode.index() as f32,
            F::MaxDensity => self.max_density,
            F::SmoothRateIn => self.smooth_rate_in,
            F::SmoothRateOut => self.smooth_rate_out,
            F::TargetCellCount => self.target_cell_count as f32,
            F::GridGap => self.grid_gap as f32,
            F::Theme => self.theme as f32,
            F::Brightness => self.brightness as f32,
        }
    }

    /// Store an already-clamped value. Integer fields truncate.
    fn store(&mut self, field: ParamField, value: f32) {
        let flag = value >= 0.5;
        match field {
            F::TimeScale => self.time_scale = value,
            F::VelocityDamping => self.velocity_damping = value,
            F::MaxVelocity => self.max_velocity = value,
            F::ParticleCount => self.particle_count = value as u16,
            F::ParticleRadius => self.particle_radius = value,
            F::BoundaryMode => {
                self.boundary_mode = if flag { BoundaryMode::Wrap } else { BoundaryMode::Reflect }
            }
            F::BoundaryShape => {
                self.boundary_shape =
                    if flag { BoundaryShape::Rectangular } else { BoundaryShape::Circular }
            }
            F::BoundaryScale => self.boundary_scale = value,
            F::BoundaryDamping => self.boundary_damping = value,
            F::GravityX => self.gravity_x = value,
            F::GravityY => self.gravity_y = value,
            F::CollisionEnabled => self.collision_enabled = flag,
            F::CollisionGridSize => self.collision_grid_size = value as u8,
            F::CollisionRepulsion => self.collision_repulsion = value,
            F::CollisionDamping => self.collision_damping = value,
            F::TurbStrength => self.turb_strength = value,
            F::TurbScale => self.turb_scale = value,
            F::TurbSpeed => self.turb_speed = value,
            F::TouchStrength => self.touch_strength = value,
            F::TouchRadius => self.touch_radius = value,
            F::TouchMode => {
                self.touch_mode = if flag { TouchMode::Repulse } else { TouchMode::Attract }
            }
            F::ImuSensitivity => self.imu_sensitivity = value,
            F::ImuSmoothing => self.imu_smoothing = value,
            F::ImuEnabled => self.imu_enabled = flag,
            F::GridMode => self.grid_mode = GridMode::from_index(value as u8),
            F::MaxDensity => self.max_density = value,
            F::SmoothRateIn => self.smooth_rate_in = value,
            F::SmoothRateOut => self.smooth_rate_out = value,
            F::TargetCellCount => self.target_cell_count = value as u16,
            F::GridGap => self.grid_gap = value as u8,
            F::Theme => self.theme = value as u8,
            F::Brightness => self.brightness = value as u8,
        }
    }
}

/// Single-writer owner of the live configuration.
///
/// Only the control protocol and the motion-gravity path write through here; every other
/// component borrows the `SimConfig` read-only for the duration of a call.
pub struct ConfigHandle {
    config: SimConfig,
    geometry_dirty: bool,
    restart: bool,
}

impl ConfigHandle {
    pub fn new(config: SimConfig) -> Self {
        // Fresh handles start dirty so the first tick builds the geometry
        Self { config, geometry_dirty: true, restart: false }
    }

    pub fn get(&self) -> &SimConfig {
        &self.config
    }

    /// Clamp `value` to the parameter's range and store it.
    pub fn set(&mut self, def: &ParamDef, value: f32) {
        self.config.store(def.field, def.clamp(value));
        if def.layout {
            self.geometry_dirty = true;
        }
    }

    /// Gravity written by the motion sensor path, still held to the gravity range.
    pub fn set_motion_gravity(&mut self, gx: f32, gy: f32) {
        self.config.gravity_x = gx.clamp(-2.0, 2.0);
        self.config.gravity_y = gy.clamp(-2.0, 2.0);
    }

    pub fn mark_geometry_dirty(&mut self) {
        self.geometry_dirty = true;
    }

    pub fn request_restart(&mut self) {
        self.restart = true;
    }

    pub fn consume_geometry_dirty(&mut self) -> bool {
        core::mem::take(&mut self.geometry_dirty)
    }

    pub fn consume_restart(&mut self) -> bool {
        core::mem::take(&mut self.restart)
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}
