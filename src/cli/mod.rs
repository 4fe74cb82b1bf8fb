//! Command-line interface for the NCLink engine.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::command::DiscreteCommand;
use crate::transport::PortConfig;
use crate::types::{GeoPoint, PortRole};

/// NCLink ground-station link
#[derive(Parser, Debug)]
#[command(
    name = "nclink",
    author,
    version,
    about = "NCLink ground-station protocol engine",
    long_about = r#"
Listens for NCLink telemetry, LiDAR and planner frames on several UDP ports,
decodes them, and sends flight commands back to the vehicle.

QUICK START:
  Listen:   nclink listen --port 30509:telemetry --port 18507:lidar
  Command:  nclink send --target 192.168.1.10 takeoff
  Decode:   nclink decode FFFC490004010000004FA1A2
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen and print decoded messages until Ctrl-C
    Listen(ListenArgs),

    /// Send one command to the vehicle
    Send(SendArgs),

    /// Decode a hex byte string
    Decode(DecodeArgs),

    /// Show example configuration
    Config(ConfigArgs),
}

/// Listen command arguments
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Listen port as PORT or PORT:ROLE (can be specified multiple times)
    #[arg(short, long, value_parser = parse_port_config)]
    pub port: Vec<PortConfig>,

    /// Print messages as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Send command arguments
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Target as HOST or HOST:PORT
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    #[command(subcommand)]
    pub action: SendAction,
}

/// Command to send
#[derive(Subcommand, Debug, Clone)]
pub enum SendAction {
    /// Automatic takeoff
    Takeoff,
    /// Automatic landing
    Land,
    /// Hold position
    Hover,
    /// Return to home
    ReturnHome,
    /// LiDAR obstacle avoidance
    Avoidance {
        state: Toggle,
    },
    /// Indexed command (1-25 repeat and reset, others once)
    CmdIdx {
        index: i32,
    },
    /// Mission command with a value
    Mission {
        id: i32,
        value: f32,
    },
    /// Push PID gains as NAME=VALUE
    SetPid {
        #[arg(required = true, value_parser = parse_gain)]
        gains: Vec<(String, f32)>,
    },
    /// Position target in local meters
    #[command(allow_negative_numbers = true)]
    Goto {
        x: f64,
        y: f64,
        z: f64,
        /// Cruise speed in m/s
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Upload waypoints given as LAT,LON,ALT
    Waypoints {
        #[arg(required = true, allow_hyphen_values = true)]
        points: Vec<GeoPoint>,
        /// Cruise speed in m/s
        #[arg(long)]
        speed: Option<f64>,
    },
}

impl SendAction {
    /// Single-frame flight command, if this is one.
    pub fn discrete(&self) -> Option<DiscreteCommand> {
        match self {
            Self::Takeoff => Some(DiscreteCommand::Takeoff),
            Self::Land => Some(DiscreteCommand::Land),
            Self::Hover => Some(DiscreteCommand::Hover),
            Self::ReturnHome => Some(DiscreteCommand::ReturnToHome),
            Self::Avoidance { state } => Some(DiscreteCommand::Avoidance(*state == Toggle::On)),
            _ => None,
        }
    }
}

/// On/off switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Decode command arguments
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; whitespace between groups is ignored
    #[arg(required = true)]
    pub hex: Vec<String>,

    /// Port role to tag messages with
    #[arg(long, default_value = "telemetry")]
    pub role: PortRole,

    /// Print messages as JSON
    #[arg(long)]
    pub json: bool,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Parse `PORT` or `PORT:ROLE`.
pub fn parse_port_config(s: &str) -> Result<PortConfig, String> {
    let (port, role) = match s.split_once(':') {
        Some((port, role)) => (port, Some(role.parse::<PortRole>()?)),
        None => (s, None),
    };
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid port '{port}': {e}"))?;
    Ok(PortConfig { port, role })
}

/// Parse `NAME=VALUE`.
pub fn parse_gain(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

/// Split `HOST[:PORT]`.
pub fn parse_target(s: &str) -> Result<(String, Option<u16>), String> {
    match s.rsplit_once(':') {
        // Bare IPv6 literals contain colons but no port.
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|e| format!("invalid target port '{port}': {e}"))?;
            Ok((host.to_string(), Some(port)))
        }
        _ => Ok((s.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_decode_example() {
        use clap::CommandFactory;

        use crate::protocol::{MessageKind, Payload, ProtocolConfig, StreamFramer};

        let help = Cli::command().get_long_about().map(ToString::to_string).unwrap();
        let example = help
            .lines()
            .find_map(|line| line.trim().strip_prefix("Decode:"))
            .and_then(|cmd| cmd.split_whitespace().last())
            .unwrap();

        let bytes = hex::decode(example).unwrap();
        let messages = StreamFramer::new(PortRole::Telemetry, ProtocolConfig::default()).feed(&bytes);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].checksum_valid);
        assert_eq!(messages[0].kind, MessageKind::Parameter);
        assert!(matches!(messages[0].payload, Payload::Parameter(ref p) if p.timestamp == 1));
    }

    #[test]
    fn test_parse_port_config() {
        let p = parse_port_config("18507").unwrap();
        assert_eq!(p.effective_role(), PortRole::Lidar);

        let p = parse_port_config("9000:planning").unwrap();
        assert_eq!(p.role, Some(PortRole::Planning));

        assert!(parse_port_config("70000").is_err());
        assert!(parse_port_config("9000:sonar").is_err());
    }

    #[test]
    fn test_gain_and_target() {
        assert_eq!(parse_gain("fKaPHI=0.7").unwrap(), ("fKaPHI".to_string(), 0.7));
        assert!(parse_gain("KaPHI").is_err());

        assert_eq!(parse_target("10.0.0.1:19000").unwrap(), ("10.0.0.1".into(), Some(19000)));
        assert_eq!(parse_target("uav.local").unwrap(), ("uav.local".into(), None));
        assert_eq!(parse_target("::1").unwrap(), ("::1".into(), None));
    }

    #[test]
    fn test_parse_send_commands() {
        let cli = Cli::try_parse_from(["nclink", "send", "--target", "10.0.0.5", "goto", "-5", "2", "10"]).unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.target.as_deref(), Some("10.0.0.5"));
        assert!(matches!(args.action, SendAction::Goto { x, .. } if x == -5.0));

        let cli = Cli::try_parse_from(["nclink", "send", "avoidance", "on"]).unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.action.discrete(), Some(DiscreteCommand::Avoidance(true)));
    }
}
