//! Core types used throughout the engine.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Well-known NCLink UDP ports.
pub mod ports {
    /// Flight controller command/response port.
    pub const COMMAND: u16 = 18504;
    /// Flight controller telemetry port.
    pub const TELEMETRY: u16 = 18506;
    /// Perception module output.
    pub const LIDAR: u16 = 18507;
    /// Planning module input (GCS commands, waypoints).
    pub const PLANNING_SEND: u16 = 18510;
    /// Planning module telemetry.
    pub const PLANNING_RECV: u16 = 18511;
    /// Bench telemetry port used by test rigs.
    pub const TELEMETRY_TEST: u16 = 30509;
}

/// Logical category of a listening port.
///
/// Used only to annotate messages; it never changes frame syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRole {
    CommandResponse,
    Telemetry,
    Lidar,
    Planning,
}

impl PortRole {
    /// Infer the role from a well-known port number.
    pub fn infer(port: u16) -> Self {
        match port {
            ports::TELEMETRY | ports::TELEMETRY_TEST => Self::Telemetry,
            ports::LIDAR => Self::Lidar,
            ports::PLANNING_RECV => Self::Planning,
            _ => Self::CommandResponse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandResponse => "command_response",
            Self::Telemetry => "telemetry",
            Self::Lidar => "lidar",
            Self::Planning => "planning",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "command_response" | "command" | "cmd" => Ok(Self::CommandResponse),
            "telemetry" | "tlm" => Ok(Self::Telemetry),
            "lidar" => Ok(Self::Lidar),
            "planning" | "plan" => Ok(Self::Planning),
            other => Err(format!("unknown port role: {other}")),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A geodetic waypoint in degrees and meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }
}

impl FromStr for GeoPoint {
    type Err = String;

    /// Parse `lat,lon,alt`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [lat, lon, alt] = parts.as_slice() else {
            return Err(format!("expected lat,lon,alt, got '{s}'"));
        };
        let parse = |v: &str| v.parse::<f64>().map_err(|e| format!("{v}: {e}"));
        Ok(Self::new(parse(lat)?, parse(lon)?, parse(alt)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_inference() {
        assert_eq!(PortRole::infer(30509), PortRole::Telemetry);
        assert_eq!(PortRole::infer(18506), PortRole::Telemetry);
        assert_eq!(PortRole::infer(18507), PortRole::Lidar);
        assert_eq!(PortRole::infer(18511), PortRole::Planning);
        assert_eq!(PortRole::infer(18504), PortRole::CommandResponse);
        assert_eq!(PortRole::infer(4000), PortRole::CommandResponse);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("lidar".parse::<PortRole>().unwrap(), PortRole::Lidar);
        assert_eq!(
            "command-response".parse::<PortRole>().unwrap(),
            PortRole::CommandResponse
        );
        assert!("radar".parse::<PortRole>().is_err());
    }

    #[test]
    fn test_geo_point_parse() {
        let p: GeoPoint = "31.23, 121.47, 50".parse().unwrap();
        assert_eq!(p, GeoPoint::new(31.23, 121.47, 50.0));
        assert!("31.23,121.47".parse::<GeoPoint>().is_err());
    }
}
