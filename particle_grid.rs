//! particle_grid - Particle field simulation rendered onto a low-resolution cell grid
//! No heap allocation, no_std compatible

#![no_std]

pub mod boundary;
pub mod collision;
pub mod config;
pub mod context;
pub mod forces;
pub mod geometry;
pub mod grid_modes;
pub mod palette;
pub mod payload;
pub mod protocol;
pub mod scheduler;
pub mod sim_core;

pub use config::{ConfigHandle, SimConfig};
pub use context::{GridFrame, GridSink, Simulation};
pub use forces::{AccelSample, TouchSample};
pub use grid_modes::GridMode;
pub use payload::{DisplayHeader, PayloadError};
pub use protocol::{Command, ProtocolError};
