//! context - Simulation context owned by the main loop
//! Ties config, forces, SimCore, geometry, sampling and the scheduler together.

use crate::config::{ConfigHandle, SimConfig, MAX_GRID_CELLS};
use crate::forces::{AccelSample, MotionGravity, TouchForce, TouchSample};
use crate::geometry::GridGeometry;
use crate::grid_modes::GridModes;
use crate::protocol::{self, Command, ProtocolError};
use crate::scheduler::{Scheduler, Tick};
use crate::sim_core::SimCore;

const STATS_WINDOW_US: u64 = 1_000_000;

/// Quantized grid handed to the render backend.
#[derive(Copy, Clone, Debug)]
pub struct GridFrame<'a> {
    pub values: &'a [u8],
    pub cols: u8,
    pub rows: u8,
    pub gap: u8,
    pub theme: u8,
    pub brightness: u8,
}

/// Render backend seam: color mapping and pixel output live behind this.
pub trait GridSink {
    fn present(&mut self, frame: &GridFrame<'_>);
}

/// Sink that drops every frame.
pub struct NullSink;

impl GridSink for NullSink {
    fn present(&mut self, _frame: &GridFrame<'_>) {}
}

/// Per-second step and render counts.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameStats {
    window_start_us: Option<u64>,
    steps: u32,
    renders: u32,
    pub last_sim_fps: u32,
    pub last_render_fps: u32,
}

impl FrameStats {
    fn record(&mut self, now_us: u64, tick: &Tick, cells: usize) {
        let start = *self.window_start_us.get_or_insert(now_us);
        self.steps += tick.sim_steps as u32;
        self.renders += tick.render as u32;
        let elapsed = now_us.saturating_sub(start);
        if elapsed >= STATS_WINDOW_US {
            // Scale to a per-second rate in case the window overran
            self.last_sim_fps = (self.steps as u64 * STATS_WINDOW_US / elapsed) as u32;
            self.last_render_fps = (self.renders as u64 * STATS_WINDOW_US / elapsed) as u32;
            log::info!(
                "perf: sim {} fps, render {} fps, {} cells",
                self.last_sim_fps,
                self.last_render_fps,
                cells
            );
            self.window_start_us = Some(now_us);
            self.steps = 0;
            self.renders = 0;
        }
    }
}

pub struct Simulation {
    config: ConfigHandle,
    sim: SimCore,
    touch: TouchForce,
    motion: MotionGravity,
    geometry: GridGeometry,
    modes: GridModes,
    scheduler: Scheduler,
    cells: [u8; MAX_GRID_CELLS],
    cell_count: usize,
    sim_time: f32,
    stats: FrameStats,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let mut sim = SimCore::new();
        sim.init(&config);
        Self {
            config: ConfigHandle::new(config),
            sim,
            touch: TouchForce::new(),
            motion: MotionGravity::new(),
            geometry: GridGeometry::new(),
            modes: GridModes::new(),
            scheduler: Scheduler::new(),
            cells: [0; MAX_GRID_CELLS],
            cell_count: 0,
            sim_time: 0.0,
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        self.config.get()
    }

    /// Write access for the control surface.
    pub fn config_handle(&mut self) -> &mut ConfigHandle {
        &mut self.config
    }

    pub fn sim(&self) -> &SimCore {
        &self.sim
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Seconds of simulated time since the last restart.
    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    /// Last rendered grid.
    pub fn frame(&self) -> GridFrame<'_> {
        let cfg = self.config.get();
        GridFrame {
            values: &self.cells[..self.cell_count],
            cols: self.geometry.cols(),
            rows: self.geometry.rows(),
            gap: cfg.grid_gap,
            theme: cfg.theme,
            brightness: cfg.brightness,
        }
    }

    /// Decode and apply a control datagram; takes effect on the next iteration.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Command, ProtocolError> {
        protocol::handle_datagram(datagram, &mut self.config)
    }

    fn restart(&mut self) {
        log::info!("sim: restart");
        self.sim.init(self.config.get());
        self.modes.reset();
        self.scheduler.reset();
        self.sim_time = 0.0;
        self.config.mark_geometry_dirty();
    }

    /// One pass of the main loop. `touch`/`accel` are fresh samples, if any were polled.
    pub fn run_iteration(
        &mut self,
        now_us: u64,
        touch: Option<TouchSample>,
        accel: Option<AccelSample>,
        sink: &mut dyn GridSink,
    ) -> Tick {
        if self.config.consume_restart() {
            self.restart();
        }
        if self.config.consume_geometry_dirty() {
            self.geometry.rebuild(self.config.get());
        }
        if let Some(sample) = touch {
            self.touch.set_touch_pixels(sample);
        }
        if let Some(sample) = accel {
            self.motion.set_accel(sample);
        }

        let tick = self.scheduler.tick(now_us);
        if tick.dropped_us > 0 {
            log::debug!("scheduler: dropped {} us of backlog", tick.dropped_us);
        }
        for _ in 0..tick.sim_steps {
            self.touch.apply(self.config.get(), &mut self.sim);
            self.motion.apply(&mut self.config);
            let cfg = self.config.get();
            self.sim.step(cfg, cfg.time_step, self.sim_time);
            self.sim_time += cfg.time_step;
        }

        if tick.render {
            self.cell_count =
                self.modes
                    .compute(self.config.get(), &self.sim, &self.geometry, &mut self.cells);
            sink.present(&self.frame());
        }
        self.stats.record(now_us, &tick, self.cell_count);
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_simple;
    use crate::scheduler::STEP_US;

    struct Capture {
        frames: usize,
        cols: u8,
        rows: u8,
        len: usize,
    }

    impl GridSink for Capture {
        fn present(&mut self, frame: &GridFrame<'_>) {
            self.frames += 1;
            self.cols = frame.cols;
            self.rows = frame.rows;
            self.len = frame.values.len();
        }
    }

    fn capture() -> Capture {
        Capture { frames: 0, cols: 0, rows: 0, len: 0 }
    }

    #[test]
    fn first_iteration_builds_geometry_and_renders() {
        let mut sim = Simulation::new(SimConfig::default());
        let mut sink = capture();
        sim.run_iteration(0, None, None, &mut sink);
        assert_eq!(sink.frames, 1);
        assert_eq!((sink.cols, sink.rows), (19, 18));
        assert_eq!(sink.len, 342);
    }

    #[test]
    fn layout_change_rebuilds_on_next_iteration() {
        let mut sim = Simulation::new(SimConfig::default());
        let mut sink = capture();
        sim.run_iteration(0, None, None, &mut sink);
        // Target cell count sits at index 144, raw 0 maps to its minimum of 32
        sim.handle_datagram(&encode_simple(144, 0)).unwrap();
        sim.run_iteration(STEP_US, None, None, &mut sink);
        assert_eq!(sim.geometry().cell_count(), 36);
        assert_eq!(sink.len, 36);
    }

    #[test]
    fn restart_rewinds_sim_time() {
        let mut sim = Simulation::new(SimConfig::default());
        let mut sink = NullSink;
        for frame in 0..10u64 {
            sim.run_iteration(frame * STEP_US, None, None, &mut sink);
        }
        assert!(sim.sim_time() > 0.0);
        sim.handle_datagram(&protocol::encode_restart()).unwrap();
        sim.run_iteration(11 * STEP_US, None, None, &mut sink);
        assert_eq!(sim.sim_time(), 0.0);
    }

    #[test]
    fn motion_gravity_takes_over_when_enabled() {
        let cfg = SimConfig { imu_enabled: true, imu_smoothing: 1.0, ..SimConfig::default() };
        let mut sim = Simulation::new(cfg);
        let mut sink = NullSink;
        let accel = AccelSample { x: 1.0, y: 0.0, z: 0.0 };
        sim.run_iteration(0, None, Some(accel), &mut sink);
        sim.run_iteration(STEP_US, None, None, &mut sink);
        assert!(sim.config().gravity_x < 0.0);
    }
}
