//! Planning module exchange: telemetry in (0x71), commands out (0x70).

use serde::Serialize;

use crate::error::DecodeError;
use crate::protocol::wire::{decode_fixed, wire_record, WireReader, WireRecord};

wire_record! {
    pub struct PlanningHeader {
        pub seq_id: u32,
        pub timestamp: u32,
        pub pos_x: f64,
        pub pos_y: f64,
        pub pos_z: f64,
        pub velocity: f64,
        pub update_flags: u8,
        pub status: u8,
        pub global_path_count: u16,
        pub local_traj_count: u16,
        pub obstacle_count: u16,
    }
}

wire_record! {
    pub struct PathPoint {
        pub x: f64,
        pub y: f64,
        pub z: f64,
    }
}

wire_record! {
    pub struct Vec3 {
        pub x: f64,
        pub y: f64,
        pub z: f64,
    }
}

wire_record! {
    /// Obstacle box tracked by the planner.
    pub struct Object3d {
        pub center: Vec3,
        pub size: Vec3,
        pub velocity: Vec3,
    }
}

wire_record! {
    /// Position target sent to the planner (0x70).
    pub struct GcsCommand {
        pub seq_id: u32,
        pub timestamp_ms: u32,
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub cruise_speed: f64,
        pub enable: u8,
        pub cmd_idx: i32,
    }
}

/// Planner state with its embedded path and obstacle arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PlanningTelemetry {
    pub header: PlanningHeader,
    pub global_path: Vec<PathPoint>,
    pub local_trajectory: Vec<PathPoint>,
    pub obstacles: Vec<Object3d>,
}

impl PlanningTelemetry {
    /// Total payload length implied by a header.
    pub fn expected_len(header: &PlanningHeader) -> usize {
        PlanningHeader::WIDTH
            + usize::from(header.global_path_count) * PathPoint::WIDTH
            + usize::from(header.local_traj_count) * PathPoint::WIDTH
            + usize::from(header.obstacle_count) * Object3d::WIDTH
    }

    /// Two-phase decode. The payload must match the declared counts exactly.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < PlanningHeader::WIDTH {
            return Err(DecodeError::Incomplete {
                expected: PlanningHeader::WIDTH,
                actual: payload.len(),
            });
        }

        let mut reader = WireReader::new(payload);
        let header: PlanningHeader = reader.read();
        let expected = Self::expected_len(&header);
        if payload.len() != expected {
            return Err(DecodeError::Incomplete {
                expected,
                actual: payload.len(),
            });
        }

        let global_path = read_array(&mut reader, header.global_path_count);
        let local_trajectory = read_array(&mut reader, header.local_traj_count);
        let obstacles = read_array(&mut reader, header.obstacle_count);

        Ok(Self {
            header,
            global_path,
            local_trajectory,
            obstacles,
        })
    }

    /// Encode with header counts taken from the arrays.
    pub fn encode(&self) -> Vec<u8> {
        let mut header = self.header;
        header.global_path_count = self.global_path.len() as u16;
        header.local_traj_count = self.local_trajectory.len() as u16;
        header.obstacle_count = self.obstacles.len() as u16;

        let mut out = Vec::with_capacity(Self::expected_len(&header));
        header.write_to(&mut out);
        self.global_path.iter().for_each(|p| p.write_to(&mut out));
        self.local_trajectory.iter().for_each(|p| p.write_to(&mut out));
        self.obstacles.iter().for_each(|o| o.write_to(&mut out));
        out
    }
}

// Bounds were checked against the declared counts before this is called.
fn read_array<T: WireRecord>(reader: &mut WireReader<'_>, count: u16) -> Vec<T> {
    (0..count).map(|_| reader.read()).collect()
}

impl GcsCommand {
    /// Decode back-to-back commands; the payload must be a whole number of entries.
    pub fn decode_all(payload: &[u8]) -> Result<Vec<Self>, DecodeError> {
        let rem = payload.len() % Self::WIDTH;
        if rem != 0 {
            return Err(DecodeError::Incomplete {
                expected: payload.len() - rem + Self::WIDTH,
                actual: payload.len(),
            });
        }
        Ok(payload
            .chunks_exact(Self::WIDTH)
            .map(|chunk| decode_fixed::<Self>(chunk).0)
            .collect())
    }

    pub fn encode_all(commands: &[Self]) -> Vec<u8> {
        let mut out = Vec::with_capacity(commands.len() * Self::WIDTH);
        for command in commands {
            command.write_to(&mut out);
        }
        out
    }
}
