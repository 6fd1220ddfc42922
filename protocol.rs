//! protocol - Remote-control datagrams
//! 2-byte `[index, raw]` and 5-byte `[index, f32 LE]` commands against the parameter registry.

use thiserror::Error;

use crate::config::{find_param, ConfigHandle, ParamKind, RESTART_INDEX};

pub const SIMPLE_LEN: usize = 2;
pub const TYPED_LEN: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    /// Raw byte, mapped through the registry range.
    Simple { index: u8, raw: u8 },
    /// Float applied directly, still clamped.
    Typed { index: u8, value: f32 },
    Restart,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("datagram of {0} bytes is not a command")]
    BadLength(usize),
    #[error("unknown parameter index {0}")]
    UnknownIndex(u8),
    #[error("parameter {0} does not take typed values")]
    NotTyped(u8),
    #[error("non-finite value for parameter {0}")]
    NonFinite(u8),
}

/// Validate a datagram against the registry without touching any state.
pub fn decode(datagram: &[u8]) -> Result<Command, ProtocolError> {
    match *datagram {
        [RESTART_INDEX, _] => Ok(Command::Restart),
        [index, raw] => {
            find_param(index).ok_or(ProtocolError::UnknownIndex(index))?;
            Ok(Command::Simple { index, raw })
        }
        [index, b0, b1, b2, b3] => {
            let def = find_param(index).ok_or(ProtocolError::UnknownIndex(index))?;
            if def.kind != ParamKind::Float {
                return Err(ProtocolError::NotTyped(index));
            }
            let value = f32::from_le_bytes([b0, b1, b2, b3]);
            if !value.is_finite() {
                return Err(ProtocolError::NonFinite(index));
            }
            Ok(Command::Typed { index, value })
        }
        _ => Err(ProtocolError::BadLength(datagram.len())),
    }
}

/// Store a decoded command.
pub fn apply(command: Command, config: &mut ConfigHandle) -> Result<(), ProtocolError> {
    match command {
        Command::Restart => {
            log::info!("protocol: restart requested");
            config.request_restart();
        }
        Command::Simple { index, raw } => {
            let def = find_param(index).ok_or(ProtocolError::UnknownIndex(index))?;
            let value = def.map_raw(raw);
            log::debug!("protocol: {} <- {} (raw {})", def.name, value, raw);
            config.set(def, value);
        }
        Command::Typed { index, value } => {
            let def = find_param(index).ok_or(ProtocolError::UnknownIndex(index))?;
            log::debug!("protocol: {} <- {}", def.name, value);
            config.set(def, value);
        }
    }
    Ok(())
}

/// Decode and apply one datagram. Malformed packets are dropped with a warning.
pub fn handle_datagram(datagram: &[u8], config: &mut ConfigHandle) -> Result<Command, ProtocolError> {
    let result = decode(datagram).and_then(|cmd| apply(cmd, config).map(|()| cmd));
    if let Err(err) = &result {
        log::warn!("protocol: dropped datagram: {}", err);
    }
    result
}

pub fn encode_simple(index: u8, raw: u8) -> [u8; SIMPLE_LEN] {
    [index, raw]
}

pub fn encode_typed(index: u8, value: f32) -> [u8; TYPED_LEN] {
    let b = value.to_le_bytes();
    [index, b[0], b[1], b[2], b[3]]
}

pub fn encode_restart() -> [u8; SIMPLE_LEN] {
    [RESTART_INDEX, 0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_modes::GridMode;

    #[test]
    fn simple_command_sets_grid_mode() {
        let mut cfg = ConfigHandle::default();
        handle_datagram(&[140, 3], &mut cfg).unwrap();
        assert_eq!(cfg.get().grid_mode, GridMode::Density);
    }

    #[test]
    fn typed_command_sets_exact_float() {
        let mut cfg = ConfigHandle::default();
        handle_datagram(&encode_typed(80, 1.5), &mut cfg).unwrap();
        assert_eq!(cfg.get().gravity_x, 1.5);
    }

    #[test]
    fn typed_values_are_clamped() {
        let mut cfg = ConfigHandle::default();
        handle_datagram(&encode_typed(81, -40.0), &mut cfg).unwrap();
        assert_eq!(cfg.get().gravity_y, -2.0);
    }

    #[test]
    fn simple_float_maps_over_range() {
        let mut cfg = ConfigHandle::default();
        handle_datagram(&encode_simple(73, 255), &mut cfg).unwrap();
        assert_eq!(cfg.get().boundary_damping, 1.0);
        handle_datagram(&encode_simple(73, 0), &mut cfg).unwrap();
        assert_eq!(cfg.get().boundary_damping, 0.0);
    }

    #[test]
    fn malformed_datagrams_change_nothing() {
        let mut cfg = ConfigHandle::default();
        let before = *cfg.get();
        assert_eq!(decode(&[]), Err(ProtocolError::BadLength(0)));
        assert_eq!(decode(&[140, 1, 2]), Err(ProtocolError::BadLength(3)));
        assert!(handle_datagram(&[7, 10], &mut cfg).is_err());
        assert!(handle_datagram(&encode_typed(140, 2.0), &mut cfg).is_err());
        assert!(handle_datagram(&encode_typed(80, f32::NAN), &mut cfg).is_err());
        let after = cfg.get();
        assert_eq!(after.grid_mode, before.grid_mode);
        assert_eq!(after.gravity_x, before.gravity_x);
        assert!(!cfg.consume_restart());
    }

    #[test]
    fn restart_and_layout_flags() {
        let mut cfg = ConfigHandle::default();
        cfg.consume_geometry_dirty();
        assert_eq!(handle_datagram(&encode_restart(), &mut cfg), Ok(Command::Restart));
        assert!(cfg.consume_restart());

        handle_datagram(&[51, 10], &mut cfg).unwrap();
        assert!(!cfg.consume_geometry_dirty());
        handle_datagram(&[145, 4], &mut cfg).unwrap();
        assert!(cfg.consume_geometry_dirty());
        assert_eq!(cfg.get().grid_gap, 4);
    }
}
