//! Command frame construction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::{CmdIdx, DiscreteCommand, PidCache, DEFAULT_CRUISE_SPEED, REPEATED_CMD_RANGE};
use crate::error::{CommandError, Result};
use crate::messages::{ControlInput, GcsCommand};
use crate::protocol::wire::{WireReader, WireRecord};
use crate::protocol::{encode, func_code};
use crate::types::{now_millis, GeoPoint};

/// Meters per degree of longitude in the local equirectangular frame.
pub const METERS_PER_DEG_LON: f64 = 111_320.0;

/// Meters per degree of latitude.
pub const METERS_PER_DEG_LAT: f64 = 110_574.0;

/// Position of `point` relative to `origin` in meters (east, north, up).
///
/// Equirectangular approximation, good for short-range local missions only.
pub fn to_local(origin: &GeoPoint, point: &GeoPoint) -> (f64, f64, f64) {
    (
        (point.lon - origin.lon) * METERS_PER_DEG_LON,
        (point.lat - origin.lat) * METERS_PER_DEG_LAT,
        point.alt - origin.alt,
    )
}

/// A planner position target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub cruise_speed: f64,
    pub enable: bool,
    pub cmd_idx: i32,
}

impl PositionTarget {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, cruise_speed: f64) -> Self {
        self.cruise_speed = cruise_speed;
        self
    }
}

impl Default for PositionTarget {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            cruise_speed: DEFAULT_CRUISE_SPEED,
            enable: true,
            cmd_idx: 0,
        }
    }
}

/// Frames making up one indexed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSequence {
    pub cmd_idx: i32,
    /// Frame carrying the requested index.
    pub active: Vec<u8>,
    /// Index-zero frame closing a repeated sequence; `None` for
    /// out-of-range indices, which are sent once.
    pub reset: Option<Vec<u8>>,
}

impl IndexedSequence {
    pub fn is_repeated(&self) -> bool {
        self.reset.is_some()
    }
}

/// Builds outbound command frames.
///
/// Owns the [`PidCache`]; every control-input frame carries the full cached
/// gain set.
#[derive(Debug)]
pub struct CommandEncoder {
    pid: Arc<PidCache>,
    gcs_seq: AtomicU32,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(PidCache::default()))
    }

    pub fn with_cache(pid: Arc<PidCache>) -> Self {
        Self {
            pid,
            gcs_seq: AtomicU32::new(0),
        }
    }

    pub fn pid_cache(&self) -> &Arc<PidCache> {
        &self.pid
    }

    fn control_frame(&self, input: &ControlInput) -> Result<Vec<u8>> {
        encode(func_code::CONTROL_INPUT, &input.to_bytes())
    }

    /// Control-input frame with the cached gains and the given index.
    pub fn control_input(&self, cmd_idx: i32) -> Result<Vec<u8>> {
        self.control_frame(&ControlInput::new(self.pid.get(), cmd_idx))
    }

    pub fn discrete(&self, command: DiscreteCommand) -> Result<Vec<u8>> {
        debug!(?command, "encoding discrete command");
        self.control_input(command.cmd_idx().as_i32())
    }

    /// Frames for `cmd_idx`. Indices in 1..=25 are repeated then reset.
    pub fn indexed(&self, cmd_idx: i32) -> Result<IndexedSequence> {
        // One snapshot so active and reset frames carry identical gains.
        let gains = self.pid.get();
        let active = self.control_frame(&ControlInput::new(gains, cmd_idx))?;
        let reset = if REPEATED_CMD_RANGE.contains(&cmd_idx) {
            Some(self.control_frame(&ControlInput::new(gains, CmdIdx::None.as_i32()))?)
        } else {
            None
        };
        Ok(IndexedSequence {
            cmd_idx,
            active,
            reset,
        })
    }

    /// Mission command with a neutral index.
    pub fn mission(&self, mission: i32, value: f32) -> Result<Vec<u8>> {
        let input = ControlInput::new(self.pid.get(), CmdIdx::None.as_i32()).with_mission(mission, value);
        self.control_frame(&input)
    }

    /// Merge gains into the cache and encode the full set with neutral
    /// index and mission fields.
    pub fn set_parameters<'a, I>(&self, values: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let gains = self.pid.update(values)?;
        self.control_frame(&ControlInput::new(gains, CmdIdx::None.as_i32()))
    }

    fn next_seq(&self) -> u32 {
        self.gcs_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Single planner position target.
    pub fn gcs_command(&self, target: PositionTarget) -> Result<Vec<u8>> {
        let command = GcsCommand {
            seq_id: self.next_seq(),
            timestamp_ms: now_millis() as u32,
            x: target.x,
            y: target.y,
            z: target.z,
            cruise_speed: target.cruise_speed,
            enable: u8::from(target.enable),
            cmd_idx: target.cmd_idx,
        };
        encode(func_code::GCS_COMMAND, &command.to_bytes())
    }

    /// Waypoint upload: one entry per waypoint, positions relative to the
    /// first waypoint, sequence id equal to the waypoint index.
    pub fn waypoints(&self, points: &[GeoPoint], cruise_speed: f64) -> Result<Vec<u8>> {
        let Some(origin) = points.first() else {
            return Err(CommandError::EmptyWaypoints.into());
        };

        let timestamp_ms = now_millis() as u32;
        let commands: Vec<GcsCommand> = points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let (x, y, z) = to_local(origin, point);
                GcsCommand {
                    seq_id: i as u32,
                    timestamp_ms,
                    x,
                    y,
                    z,
                    cruise_speed,
                    enable: 1,
                    cmd_idx: 0,
                }
            })
            .collect();

        debug!(count = commands.len(), "encoding waypoint upload");
        encode(func_code::GCS_COMMAND, &GcsCommand::encode_all(&commands))
    }

    /// Frame a caller-built payload.
    ///
    /// A bare 4-byte command index for the control-input code is expanded
    /// into a full control-input payload.
    pub fn raw(&self, code: u8, payload: &[u8]) -> Result<Vec<u8>> {
        if code == func_code::CONTROL_INPUT && payload.len() == i32::WIDTH {
            let cmd_idx: i32 = WireReader::new(payload).read();
            return self.control_input(cmd_idx);
        }
        encode(code, payload)
    }
}
