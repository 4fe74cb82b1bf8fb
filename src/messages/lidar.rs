//! Perception module outputs (0x50..=0x53).

use serde::Serialize;

use crate::error::DecodeError;
use crate::protocol::message::DecodeWarning;
use crate::protocol::wire::{decode_fixed, wire_record, WireReader, WireRecord};

/// Upper bound on obstacles carried by one array message.
pub const MAX_OBSTACLES: usize = 50;

/// Capacity of the status error message field.
pub const STATUS_MESSAGE_LEN: usize = 256;

wire_record! {
    /// One clustered obstacle in ENU coordinates relative to takeoff.
    pub struct ObstacleInfo {
        pub position_x: f32,
        pub position_y: f32,
        pub position_z: f32,
        pub size_x: f32,
        pub size_y: f32,
        pub size_z: f32,
        pub height_min: f32,
        pub height_max: f32,
        pub distance: f32,
        /// Radians, 0 = east, counter-clockwise positive.
        pub azimuth: f32,
        pub confidence: f32,
        pub point_count: i32,
        pub density: f32,
    }
}

wire_record! {
    pub struct ObstacleArrayHeader {
        pub obstacle_count: i32,
        pub timestamp_sec: f64,
        pub timestamp_us: u64,
        pub frame_id: i32,
        pub input_point_count: i32,
        pub filtered_point_count: i32,
    }
}

wire_record! {
    /// Pipeline timing statistics (0x52).
    pub struct LidarPerformance {
        pub processing_time_ms: f32,
        pub frame_rate: f32,
        pub voxel_filter_time_ms: f32,
        pub ground_segment_time_ms: f32,
        pub clustering_time_ms: f32,
        pub motion_comp_time_ms: f32,
        pub coord_transform_time_ms: f32,
        pub input_points: i32,
        pub filtered_points: i32,
        pub filter_ratio: f32,
        pub obstacle_count: i32,
        pub frame_id: i32,
        pub timestamp_sec: f64,
    }
}

wire_record! {
    pub struct LidarStatusHeader {
        pub is_running: bool,
        pub lidar_connected: bool,
        pub imu_data_valid: bool,
        pub motion_comp_active: bool,
        pub error_code: i32,
        pub total_frames: i32,
        pub total_obstacles: i32,
        pub avg_processing_time_ms: f32,
    }
}

/// Obstacle array (0x50): header followed by `obstacle_count` records.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ObstacleArray {
    pub header: ObstacleArrayHeader,
    pub obstacles: Vec<ObstacleInfo>,
}

impl ObstacleArray {
    /// Two-phase decode: header, then the declared records.
    ///
    /// Counts above [`MAX_OBSTACLES`] are clamped with a warning. Bytes after
    /// the last declared record are ignored, since some firmware always
    /// sends the full fixed-capacity array.
    pub fn decode(payload: &[u8]) -> Result<(Self, Vec<DecodeWarning>), DecodeError> {
        let header_len = ObstacleArrayHeader::WIDTH;
        if payload.len() < header_len {
            return Err(DecodeError::Incomplete {
                expected: header_len,
                actual: payload.len(),
            });
        }

        let mut reader = WireReader::new(payload);
        let header: ObstacleArrayHeader = reader.read();
        let declared = usize::try_from(header.obstacle_count).map_err(|_| DecodeError::InvalidField {
            field: "obstacle_count",
            reason: format!("negative count {}", header.obstacle_count),
        })?;

        let mut warnings = Vec::new();
        let count = declared.min(MAX_OBSTACLES);
        if count < declared {
            warnings.push(DecodeWarning::CountClamped {
                field: "obstacle_count",
                declared,
                used: count,
            });
        }

        let expected = header_len + count * ObstacleInfo::WIDTH;
        if payload.len() < expected {
            return Err(DecodeError::Incomplete {
                expected,
                actual: payload.len(),
            });
        }

        let obstacles = payload[header_len..expected]
            .chunks_exact(ObstacleInfo::WIDTH)
            .map(|chunk| decode_fixed::<ObstacleInfo>(chunk).0)
            .collect();

        Ok((Self { header, obstacles }, warnings))
    }

    /// Encode with the header count taken from the record list.
    pub fn encode(&self) -> Vec<u8> {
        let mut header = self.header;
        header.obstacle_count = self.obstacles.len() as i32;

        let mut out = Vec::with_capacity(ObstacleArrayHeader::WIDTH + self.obstacles.len() * ObstacleInfo::WIDTH);
        header.write_to(&mut out);
        for obstacle in &self.obstacles {
            obstacle.write_to(&mut out);
        }
        out
    }

    /// Closest obstacle by reported distance.
    pub fn nearest(&self) -> Option<&ObstacleInfo> {
        self.obstacles
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// System status (0x53): fixed header plus an optional error message.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LidarStatus {
    #[serde(flatten)]
    pub header: LidarStatusHeader,
    pub error_message: String,
}

impl LidarStatus {
    /// Decode the header (zero-filled if short) and whatever message bytes
    /// follow, cut at the first NUL.
    pub fn decode(payload: &[u8]) -> (Self, Option<DecodeWarning>) {
        let (header, warning) = decode_fixed::<LidarStatusHeader>(payload);
        let tail = payload.get(LidarStatusHeader::WIDTH..).unwrap_or_default();
        let tail = &tail[..tail.len().min(STATUS_MESSAGE_LEN)];
        let text = tail.split(|&b| b == 0).next().unwrap_or_default();

        let status = Self {
            header,
            error_message: String::from_utf8_lossy(text).trim().to_string(),
        };
        (status, warning)
    }

    /// Encode with the message padded to its fixed 256-byte field.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        let text = self.error_message.as_bytes();
        let n = text.len().min(STATUS_MESSAGE_LEN - 1);
        out.extend_from_slice(&text[..n]);
        out.resize(LidarStatusHeader::WIDTH + STATUS_MESSAGE_LEN, 0);
        out
    }

    pub fn is_healthy(&self) -> bool {
        self.header.is_running && self.header.lidar_connected && self.header.error_code == 0
    }
}
