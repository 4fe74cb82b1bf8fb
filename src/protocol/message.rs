//! Decoded messages.

use serde::Serialize;

use crate::messages::{
    AvoidanceFlags, ControlInput, ControlLoop, EscTelemetry, FlightStates, GcsCommand, GncBus,
    GuidanceLine, LidarPerformance, LidarStatus, ObstacleArray, ObstacleInfo, ParameterEcho,
    PlanningTelemetry, PwmOutputs, RemoteControl,
};
use crate::types::PortRole;

/// Function code values.
pub mod func_code {
    pub const CONTROL_INPUT: u8 = 0x40;
    pub const PWM: u8 = 0x41;
    pub const STATES: u8 = 0x42;
    pub const CONTROL_LOOP: u8 = 0x43;
    pub const GNC_BUS: u8 = 0x44;
    pub const AVOIDANCE_FLAG: u8 = 0x45;
    pub const REMOTE_CONTROL: u8 = 0x46;
    pub const GUIDANCE_LINE: u8 = 0x47;
    pub const PATH_LINE: u8 = 0x48;
    pub const PARAMETER: u8 = 0x49;
    pub const ESC: u8 = 0x4B;
    pub const LIDAR_OBSTACLES: u8 = 0x50;
    pub const LIDAR_OBSTACLE_INFO: u8 = 0x51;
    pub const LIDAR_PERFORMANCE: u8 = 0x52;
    pub const LIDAR_STATUS: u8 = 0x53;
    pub const GCS_COMMAND: u8 = 0x70;
    pub const PLANNING_TELEMETRY: u8 = 0x71;
}

/// Message family, one per function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ControlInput,
    Pwm,
    States,
    ControlLoop,
    GncBus,
    AvoidanceFlag,
    RemoteControl,
    GuidanceLine,
    PathLine,
    Parameter,
    Esc,
    LidarObstacles,
    LidarObstacleInfo,
    LidarPerformance,
    LidarStatus,
    GcsCommand,
    PlanningTelemetry,
    Unknown,
}

/// Non-fatal findings attached to a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// Payload shorter than the fixed layout; missing fields read as zero.
    ShortPayload { expected: usize, actual: usize },
    /// Delivered despite a checksum mismatch.
    ChecksumMismatch { computed: u8, received: u8 },
    /// Delivered despite wrong trailer bytes.
    BadTrailer { trailer: [u8; 2] },
    /// Declared element count above the supported maximum.
    CountClamped {
        field: &'static str,
        declared: usize,
        used: usize,
    },
    /// No codec registered for this function code.
    UnknownFunctionCode { code: u8 },
}

/// Typed payload of a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    ControlInput(ControlInput),
    Pwm(PwmOutputs),
    States(FlightStates),
    ControlLoop(ControlLoop),
    GncBus(Box<GncBus>),
    AvoidanceFlag(AvoidanceFlags),
    RemoteControl(RemoteControl),
    GuidanceLine(GuidanceLine),
    PathLine(GuidanceLine),
    Parameter(ParameterEcho),
    Esc(EscTelemetry),
    LidarObstacles(ObstacleArray),
    LidarObstacleInfo(ObstacleInfo),
    LidarPerformance(LidarPerformance),
    LidarStatus(LidarStatus),
    GcsCommand(Vec<GcsCommand>),
    PlanningTelemetry(PlanningTelemetry),
    /// A variable-length payload that does not hold what its header declares.
    Incomplete { expected: usize, actual: usize },
    /// A payload whose header fields are unusable.
    Invalid { reason: String },
    Unknown { hex_preview: String, length: usize },
}

impl Payload {
    pub fn is_decoded(&self) -> bool {
        !matches!(
            self,
            Payload::Incomplete { .. } | Payload::Invalid { .. } | Payload::Unknown { .. }
        )
    }
}

/// One decoded NCLink message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub func_code: u8,
    pub kind: MessageKind,
    pub role: PortRole,
    /// Arrival time, milliseconds since the Unix epoch.
    pub received_at_ms: u64,
    pub checksum_valid: bool,
    pub payload: Payload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DecodeWarning>,
}

impl Message {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn states(&self) -> Option<&FlightStates> {
        match &self.payload {
            Payload::States(s) => Some(s),
            _ => None,
        }
    }

    pub fn planning(&self) -> Option<&PlanningTelemetry> {
        match &self.payload {
            Payload::PlanningTelemetry(p) => Some(p),
            _ => None,
        }
    }
}
