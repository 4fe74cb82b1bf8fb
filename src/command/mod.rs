//! Outbound commands.
//!
//! [`CommandEncoder`] builds frames; [`CommandDispatcher`] sends them through
//! a [`Transport`](crate::transport::Transport), including the
//! repeat-then-reset pattern for indexed commands.

mod dispatch;
mod encoder;
mod pid;

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use dispatch::CommandDispatcher;
pub use encoder::{
    to_local, CommandEncoder, IndexedSequence, PositionTarget, METERS_PER_DEG_LAT,
    METERS_PER_DEG_LON,
};
pub use pid::PidCache;

use crate::error::{Error, Result};

/// Indices that get the repeat-then-reset treatment.
pub const REPEATED_CMD_RANGE: RangeInclusive<i32> = 1..=25;

/// Default cruise speed for position targets (m/s).
pub const DEFAULT_CRUISE_SPEED: f64 = 10.0;

/// Discrete flight-control actions selected by command index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CmdIdx {
    None = 0,
    ExternalControl = 1,
    MixedControl = 2,
    ProgramControl = 3,
    Climb = 4,
    Cruise = 5,
    Descent = 6,
    DisableAltHold = 7,
    HeadingHold = 8,
    LeftCircle = 9,
    RightCircle = 10,
    HeadingLock = 11,
    EngineStart = 12,
    EngineStop = 13,
    AutoTakeoff = 14,
    AutoLand = 15,
    Hover = 16,
    ReturnToHome = 17,
    PreControl = 18,
    GroundSpeed = 19,
    AirSpeed = 20,
    TakeoffPrep = 21,
    ManualTakeoff = 22,
    ManualLand = 23,
    PlanOn = 24,
    PlanOff = 25,
}

impl CmdIdx {
    const ALL: [CmdIdx; 26] = [
        Self::None,
        Self::ExternalControl,
        Self::MixedControl,
        Self::ProgramControl,
        Self::Climb,
        Self::Cruise,
        Self::Descent,
        Self::DisableAltHold,
        Self::HeadingHold,
        Self::LeftCircle,
        Self::RightCircle,
        Self::HeadingLock,
        Self::EngineStart,
        Self::EngineStop,
        Self::AutoTakeoff,
        Self::AutoLand,
        Self::Hover,
        Self::ReturnToHome,
        Self::PreControl,
        Self::GroundSpeed,
        Self::AirSpeed,
        Self::TakeoffPrep,
        Self::ManualTakeoff,
        Self::ManualLand,
        Self::PlanOn,
        Self::PlanOff,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        usize::try_from(value).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for CmdIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.as_i32())
    }
}

/// Fire-and-forget commands: one frame, one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteCommand {
    Takeoff,
    Land,
    Hover,
    ReturnToHome,
    /// LiDAR obstacle avoidance on or off.
    Avoidance(bool),
}

impl DiscreteCommand {
    pub fn cmd_idx(self) -> CmdIdx {
        match self {
            Self::Takeoff => CmdIdx::AutoTakeoff,
            Self::Land => CmdIdx::AutoLand,
            Self::Hover => CmdIdx::Hover,
            Self::ReturnToHome => CmdIdx::ReturnToHome,
            Self::Avoidance(true) => CmdIdx::PlanOn,
            Self::Avoidance(false) => CmdIdx::PlanOff,
        }
    }
}

impl FromStr for DiscreteCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "takeoff" => Ok(Self::Takeoff),
            "land" => Ok(Self::Land),
            "hover" => Ok(Self::Hover),
            "return-home" | "rth" | "rtl" => Ok(Self::ReturnToHome),
            "avoidance-on" | "lidar-on" => Ok(Self::Avoidance(true)),
            "avoidance-off" | "lidar-off" => Ok(Self::Avoidance(false)),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Command transmission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Sends of the active index before the reset frame.
    #[serde(default = "default_repeat_count")]
    pub repeat_count: usize,

    /// Delay between repeated sends.
    #[serde(default = "default_repeat_interval", with = "humantime_serde")]
    pub repeat_interval: Duration,

    /// Cruise speed used when a target does not set one.
    #[serde(default = "default_cruise_speed")]
    pub cruise_speed: f64,
}

fn default_repeat_count() -> usize {
    6
}
fn default_repeat_interval() -> Duration {
    Duration::from_millis(100)
}
fn default_cruise_speed() -> f64 {
    DEFAULT_CRUISE_SPEED
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            repeat_count: default_repeat_count(),
            repeat_interval: default_repeat_interval(),
            cruise_speed: default_cruise_speed(),
        }
    }
}

impl CommandConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repeat_count == 0 {
            return Err(Error::InvalidConfig("command.repeat_count must be at least 1".into()));
        }
        if !(self.cruise_speed.is_finite() && self.cruise_speed > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "command.cruise_speed must be positive, got {}",
                self.cruise_speed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_idx_values() {
        assert_eq!(CmdIdx::AutoTakeoff.as_i32(), 14);
        assert_eq!(CmdIdx::PlanOff.as_i32(), 25);
        for (i, cmd) in CmdIdx::ALL.iter().enumerate() {
            assert_eq!(cmd.as_i32() as usize, i);
        }
        assert_eq!(CmdIdx::from_i32(17), Some(CmdIdx::ReturnToHome));
        assert_eq!(CmdIdx::from_i32(26), None);
        assert_eq!(CmdIdx::from_i32(-1), None);
    }

    #[test]
    fn test_discrete_mapping() {
        assert_eq!(DiscreteCommand::Takeoff.cmd_idx(), CmdIdx::AutoTakeoff);
        assert_eq!(DiscreteCommand::Avoidance(false).cmd_idx(), CmdIdx::PlanOff);
        assert_eq!("rth".parse::<DiscreteCommand>(), Ok(DiscreteCommand::ReturnToHome));
        assert!("barrel-roll".parse::<DiscreteCommand>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = CommandConfig::default();
        assert_eq!(config.repeat_count, 6);
        assert_eq!(config.repeat_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());

        let config = CommandConfig {
            repeat_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
