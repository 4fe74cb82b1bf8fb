//! Payload layouts, one per function-code family.
//!
//! Fixed layouts are declared with `wire_record!` and decode best-effort;
//! the variable-length ones (obstacle arrays, planning telemetry, command
//! batches) carry their own two-phase decoders.

mod control;
mod gnc;
mod lidar;
mod planning;
mod telemetry;

pub use control::{ControlInput, PidGains};
pub use gnc::{
    AircraftValue, CommandValue, FutabaOptions, GncBus, GuidanceLine, HomeValue, HoverValue,
    MixValue, ParamLimits, SourceValue, TokenMode, TrimValue, VarValue,
};
pub use lidar::{
    LidarPerformance, LidarStatus, LidarStatusHeader, ObstacleArray, ObstacleArrayHeader,
    ObstacleInfo, MAX_OBSTACLES, STATUS_MESSAGE_LEN,
};
pub use planning::{GcsCommand, Object3d, PathPoint, PlanningHeader, PlanningTelemetry, Vec3};
pub use telemetry::{
    AilInLoop, AilOutLoop, AvoidanceFlags, ColInLoop, ColOutLoop, ControlLoop, EleInLoop,
    EleOutLoop, EscTelemetry, FlightStates, ParameterEcho, PwmOutputs, RemoteControl, RudInLoop,
    RudOutLoop,
};
