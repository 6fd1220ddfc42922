//! scheduler - Fixed-step simulation cadence with a decoupled render cadence
//! Time is fed in as microseconds from a free-running clock.

/// One fixed simulation step at 60 Hz.
pub const STEP_US: u64 = 1_000_000 / 60;
/// Render cadence, independent of how many steps ran.
pub const RENDER_INTERVAL_US: u64 = 1_000_000 / 60;
/// Largest wall-clock delta accepted per iteration; a longer stall is forgotten.
pub const MAX_DELTA_US: u64 = 100_000;
/// Spiral-of-death guard.
pub const MAX_STEPS_PER_TICK: u8 = 4;

/// What the loop should do this iteration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    pub sim_steps: u8,
    pub render: bool,
    /// Backlog discarded because the step cap was hit.
    pub dropped_us: u64,
}

pub struct Scheduler {
    step_us: u64,
    render_interval_us: u64,
    last_us: Option<u64>,
    last_render_us: Option<u64>,
    accumulator_us: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self::with_intervals(STEP_US, RENDER_INTERVAL_US)
    }

    pub const fn with_intervals(step_us: u64, render_interval_us: u64) -> Self {
        Self {
            step_us: if step_us == 0 { 1 } else { step_us },
            render_interval_us,
            last_us: None,
            last_render_us: None,
            accumulator_us: 0,
        }
    }

    pub fn step_us(&self) -> u64 {
        self.step_us
    }

    /// Time owed to the simulation, always below `MAX_STEPS_PER_TICK` steps after a tick.
    pub fn accumulator_us(&self) -> u64 {
        self.accumulator_us
    }

    /// Forget accumulated time, e.g. after a restart.
    pub fn reset(&mut self) {
        self.last_us = None;
        self.last_render_us = None;
        self.accumulator_us = 0;
    }

    pub fn tick(&mut self, now_us: u64) -> Tick {
        // Clock going backwards counts as no elapsed time
        let delta = match self.last_us {
            Some(last) => now_us.saturating_sub(last).min(MAX_DELTA_US),
            None => 0,
        };
        self.last_us = Some(now_us);
        self.accumulator_us += delta;

        let mut tick = Tick::default();
        while self.accumulator_us >= self.step_us && tick.sim_steps < MAX_STEPS_PER_TICK {
            self.accumulator_us -= self.step_us;
            tick.sim_steps += 1;
        }
        if tick.sim_steps == MAX_STEPS_PER_TICK && self.accumulator_us >= self.step_us {
            let kept = self.accumulator_us % self.step_us;
            tick.dropped_us = self.accumulator_us - kept;
            self.accumulator_us = kept;
        }

        let due = match self.last_render_us {
            Some(last) => now_us.saturating_sub(last) >= self.render_interval_us,
            None => true,
        };
        if due {
            self.last_render_us = Some(now_us);
            tick.render = true;
        }
        tick
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_renders_without_stepping() {
        let mut s = Scheduler::new();
        let t = s.tick(5_000_000);
        assert_eq!(t.sim_steps, 0);
        assert!(t.render);
    }

    #[test]
    fn steady_frames_step_once() {
        let mut s = Scheduler::new();
        s.tick(0);
        let mut steps = 0u32;
        for frame in 1..=60u64 {
            steps += s.tick(frame * STEP_US).sim_steps as u32;
        }
        assert_eq!(steps, 60);
        assert_eq!(s.accumulator_us(), 0);
    }

    #[test]
    fn burst_is_capped_and_backlog_dropped() {
        let mut s = Scheduler::new();
        s.tick(0);
        let t = s.tick(10 * STEP_US);
        assert_eq!(t.sim_steps, MAX_STEPS_PER_TICK);
        assert!(t.dropped_us > 0);
        assert!(s.accumulator_us() < MAX_STEPS_PER_TICK as u64 * STEP_US);
        assert!(s.accumulator_us() < STEP_US);
    }

    #[test]
    fn long_stall_is_clamped() {
        let mut s = Scheduler::new();
        s.tick(0);
        let t = s.tick(30_000_000);
        assert_eq!(t.sim_steps, MAX_STEPS_PER_TICK);
        // Only MAX_DELTA_US was ever credited
        assert_eq!(t.dropped_us + s.accumulator_us() + 4 * STEP_US, MAX_DELTA_US);
    }

    #[test]
    fn render_cadence_is_independent_of_steps() {
        let mut s = Scheduler::with_intervals(STEP_US, 4 * STEP_US);
        s.tick(0);
        let mut renders = 0;
        let mut steps = 0u32;
        for frame in 1..=8u64 {
            let t = s.tick(frame * STEP_US);
            steps += t.sim_steps as u32;
            renders += t.render as u32;
        }
        assert_eq!(steps, 8);
        assert_eq!(renders, 2);
    }

    #[test]
    fn backwards_clock_is_ignored() {
        let mut s = Scheduler::new();
        s.tick(1_000_000);
        let t = s.tick(10);
        assert_eq!(t.sim_steps, 0);
    }
}
