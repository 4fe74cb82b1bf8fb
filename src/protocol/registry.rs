//! Function code to codec table.
//!
//! Adding a message type means adding a [`MessageKind`] variant, a
//! [`Payload`] variant and one entry in `CODECS`.

use tracing::{debug, warn};

use super::message::{func_code, DecodeWarning, MessageKind, Payload};
use super::FuncCode;
use super::wire::{decode_fixed, WireRecord};
use crate::error::{DecodeError, ProtocolError};
use crate::messages::{GcsCommand, GncBus, LidarStatus, ObstacleArray, PlanningTelemetry};

/// Bytes of an unknown payload kept for diagnostics.
pub const HEX_PREVIEW_LEN: usize = 16;

type DecodeFn = fn(&[u8]) -> Result<Decoded, DecodeError>;

/// A registered payload codec.
pub struct Codec {
    pub code: u8,
    pub kind: MessageKind,
    pub name: &'static str,
    decode: DecodeFn,
}

impl Codec {
    pub fn decode(&self, payload: &[u8]) -> Result<Decoded, DecodeError> {
        (self.decode)(payload)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("code", &format_args!("{:#04x}", self.code))
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// A payload with the warnings raised while decoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub payload: Payload,
    pub warnings: Vec<DecodeWarning>,
}

fn fixed<T: WireRecord>(payload: &[u8], wrap: fn(T) -> Payload) -> Result<Decoded, DecodeError> {
    let (record, warning) = decode_fixed::<T>(payload);
    Ok(Decoded {
        payload: wrap(record),
        warnings: warning.into_iter().collect(),
    })
}

static CODECS: &[Codec] = &[
    Codec {
        code: func_code::CONTROL_INPUT,
        kind: MessageKind::ControlInput,
        name: "control_input",
        decode: |p| fixed(p, Payload::ControlInput),
    },
    Codec {
        code: func_code::PWM,
        kind: MessageKind::Pwm,
        name: "pwm",
        decode: |p| fixed(p, Payload::Pwm),
    },
    Codec {
        code: func_code::STATES,
        kind: MessageKind::States,
        name: "states",
        decode: |p| fixed(p, Payload::States),
    },
    Codec {
        code: func_code::CONTROL_LOOP,
        kind: MessageKind::ControlLoop,
        name: "control_loop",
        decode: |p| fixed(p, Payload::ControlLoop),
    },
    Codec {
        code: func_code::GNC_BUS,
        kind: MessageKind::GncBus,
        name: "gnc_bus",
        decode: |p| fixed(p, |bus: GncBus| Payload::GncBus(Box::new(bus))),
    },
    Codec {
        code: func_code::AVOIDANCE_FLAG,
        kind: MessageKind::AvoidanceFlag,
        name: "avoidance_flag",
        decode: |p| fixed(p, Payload::AvoidanceFlag),
    },
    Codec {
        code: func_code::REMOTE_CONTROL,
        kind: MessageKind::RemoteControl,
        name: "remote_control",
        decode: |p| fixed(p, Payload::RemoteControl),
    },
    Codec {
        code: func_code::GUIDANCE_LINE,
        kind: MessageKind::GuidanceLine,
        name: "guidance_line",
        decode: |p| fixed(p, Payload::GuidanceLine),
    },
    Codec {
        code: func_code::PATH_LINE,
        kind: MessageKind::PathLine,
        name: "path_line",
        decode: |p| fixed(p, Payload::PathLine),
    },
    Codec {
        code: func_code::PARAMETER,
        kind: MessageKind::Parameter,
        name: "parameter",
        decode: |p| fixed(p, Payload::Parameter),
    },
    Codec {
        code: func_code::ESC,
        kind: MessageKind::Esc,
        name: "esc",
        decode: |p| fixed(p, Payload::Esc),
    },
    Codec {
        code: func_code::LIDAR_OBSTACLES,
        kind: MessageKind::LidarObstacles,
        name: "lidar_obstacles",
        decode: |p| {
            let (array, warnings) = ObstacleArray::decode(p)?;
            Ok(Decoded {
                payload: Payload::LidarObstacles(array),
                warnings,
            })
        },
    },
    Codec {
        code: func_code::LIDAR_OBSTACLE_INFO,
        kind: MessageKind::LidarObstacleInfo,
        name: "lidar_obstacle_info",
        decode: |p| fixed(p, Payload::LidarObstacleInfo),
    },
    Codec {
        code: func_code::LIDAR_PERFORMANCE,
        kind: MessageKind::LidarPerformance,
        name: "lidar_performance",
        decode: |p| fixed(p, Payload::LidarPerformance),
    },
    Codec {
        code: func_code::LIDAR_STATUS,
        kind: MessageKind::LidarStatus,
        name: "lidar_status",
        decode: |p| {
            let (status, warning) = LidarStatus::decode(p);
            Ok(Decoded {
                payload: Payload::LidarStatus(status),
                warnings: warning.into_iter().collect(),
            })
        },
    },
    Codec {
        code: func_code::GCS_COMMAND,
        kind: MessageKind::GcsCommand,
        name: "gcs_command",
        decode: |p| {
            Ok(Decoded {
                payload: Payload::GcsCommand(GcsCommand::decode_all(p)?),
                warnings: Vec::new(),
            })
        },
    },
    Codec {
        code: func_code::PLANNING_TELEMETRY,
        kind: MessageKind::PlanningTelemetry,
        name: "planning_telemetry",
        decode: |p| {
            Ok(Decoded {
                payload: Payload::PlanningTelemetry(PlanningTelemetry::decode(p)?),
                warnings: Vec::new(),
            })
        },
    },
];

/// All registered codecs.
pub fn codecs() -> &'static [Codec] {
    CODECS
}

/// Find the codec for a function code.
pub fn lookup(code: u8) -> Option<&'static Codec> {
    CODECS.iter().find(|c| c.code == code)
}

impl MessageKind {
    pub fn from_func_code(code: u8) -> Self {
        lookup(code).map_or(MessageKind::Unknown, |c| c.kind)
    }

    pub fn func_code(self) -> Option<u8> {
        CODECS.iter().find(|c| c.kind == self).map(|c| c.code)
    }

    pub fn name(self) -> &'static str {
        CODECS
            .iter()
            .find(|c| c.kind == self)
            .map_or("unknown", |c| c.name)
    }
}

/// Lowercase hex of the first [`HEX_PREVIEW_LEN`] payload bytes.
pub fn hex_preview(payload: &[u8]) -> String {
    hex::encode(&payload[..payload.len().min(HEX_PREVIEW_LEN)])
}

/// Decode a payload without ever failing.
///
/// Unknown codes become [`Payload::Unknown`]; codec failures become
/// [`Payload::Incomplete`] or [`Payload::Invalid`].
pub fn decode(code: u8, payload: &[u8]) -> (MessageKind, Decoded) {
    let Some(codec) = lookup(code) else {
        warn!(func = %FuncCode(code), len = payload.len(), "unknown function code");
        return (
            MessageKind::Unknown,
            Decoded {
                payload: Payload::Unknown {
                    hex_preview: hex_preview(payload),
                    length: payload.len(),
                },
                warnings: vec![DecodeWarning::UnknownFunctionCode { code }],
            },
        );
    };

    let decoded = match codec.decode(payload) {
        Ok(decoded) => decoded,
        Err(DecodeError::Incomplete { expected, actual }) => {
            warn!(codec = codec.name, expected, actual, "variable-length payload incomplete");
            Decoded {
                payload: Payload::Incomplete { expected, actual },
                warnings: Vec::new(),
            }
        }
        Err(e @ DecodeError::InvalidField { .. }) => {
            warn!(codec = codec.name, error = %e, "payload rejected");
            Decoded {
                payload: Payload::Invalid {
                    reason: e.to_string(),
                },
                warnings: Vec::new(),
            }
        }
    };

    for warning in &decoded.warnings {
        if let DecodeWarning::ShortPayload { expected, actual } = warning {
            warn!(codec = codec.name, expected, actual, "short payload zero-filled");
        } else {
            debug!(codec = codec.name, ?warning, "decode warning");
        }
    }

    (codec.kind, decoded)
}

/// Encode a typed payload into its function code and payload bytes.
pub fn encode(payload: &Payload) -> Result<(u8, Vec<u8>), ProtocolError> {
    use func_code as fc;

    let encoded = match payload {
        Payload::ControlInput(v) => (fc::CONTROL_INPUT, v.to_bytes()),
        Payload::Pwm(v) => (fc::PWM, v.to_bytes()),
        Payload::States(v) => (fc::STATES, v.to_bytes()),
        Payload::ControlLoop(v) => (fc::CONTROL_LOOP, v.to_bytes()),
        Payload::GncBus(v) => (fc::GNC_BUS, v.to_bytes()),
        Payload::AvoidanceFlag(v) => (fc::AVOIDANCE_FLAG, v.to_bytes()),
        Payload::RemoteControl(v) => (fc::REMOTE_CONTROL, v.to_bytes()),
        Payload::GuidanceLine(v) => (fc::GUIDANCE_LINE, v.to_bytes()),
        Payload::PathLine(v) => (fc::PATH_LINE, v.to_bytes()),
        Payload::Parameter(v) => (fc::PARAMETER, v.to_bytes()),
        Payload::Esc(v) => (fc::ESC, v.to_bytes()),
        Payload::LidarObstacles(v) => (fc::LIDAR_OBSTACLES, v.encode()),
        Payload::LidarObstacleInfo(v) => (fc::LIDAR_OBSTACLE_INFO, v.to_bytes()),
        Payload::LidarPerformance(v) => (fc::LIDAR_PERFORMANCE, v.to_bytes()),
        Payload::LidarStatus(v) => (fc::LIDAR_STATUS, v.encode()),
        Payload::GcsCommand(v) => (fc::GCS_COMMAND, GcsCommand::encode_all(v)),
        Payload::PlanningTelemetry(v) => (fc::PLANNING_TELEMETRY, v.encode()),
        Payload::Incomplete { .. } => return Err(ProtocolError::NotEncodable("incomplete")),
        Payload::Invalid { .. } => return Err(ProtocolError::NotEncodable("invalid")),
        Payload::Unknown { .. } => return Err(ProtocolError::NotEncodable("unknown")),
    };
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{FlightStates, ParameterEcho};
    use std::collections::HashSet;

    #[test]
    fn test_table_codes_unique() {
        let codes: HashSet<u8> = codecs().iter().map(|c| c.code).collect();
        assert_eq!(codes.len(), codecs().len());
        let kinds: HashSet<MessageKind> = codecs().iter().map(|c| c.kind).collect();
        assert_eq!(kinds.len(), codecs().len());
    }

    #[test]
    fn test_kind_code_mapping() {
        assert_eq!(MessageKind::from_func_code(0x42), MessageKind::States);
        assert_eq!(MessageKind::States.func_code(), Some(0x42));
        assert_eq!(MessageKind::from_func_code(0x99), MessageKind::Unknown);
        assert_eq!(MessageKind::Unknown.func_code(), None);
        assert_eq!(MessageKind::PlanningTelemetry.name(), "planning_telemetry");
    }

    #[test]
    fn test_unknown_code() {
        let payload: Vec<u8> = (0u8..40).collect();
        let (kind, decoded) = decode(0x99, &payload);
        assert_eq!(kind, MessageKind::Unknown);
        assert_eq!(
            decoded.payload,
            Payload::Unknown {
                hex_preview: "000102030405060708090a0b0c0d0e0f".into(),
                length: 40,
            }
        );
        assert_eq!(
            decoded.warnings,
            vec![DecodeWarning::UnknownFunctionCode { code: 0x99 }]
        );
    }

    #[test]
    fn test_short_fixed_payload_delivers() {
        let (kind, decoded) = decode(func_code::STATES, &[0u8; 20]);
        assert_eq!(kind, MessageKind::States);
        assert!(matches!(decoded.payload, Payload::States(_)));
        assert_eq!(
            decoded.warnings,
            vec![DecodeWarning::ShortPayload {
                expected: 56,
                actual: 20
            }]
        );
    }

    #[test]
    fn test_incomplete_planning_payload() {
        let (kind, decoded) = decode(func_code::PLANNING_TELEMETRY, &[0u8; 10]);
        assert_eq!(kind, MessageKind::PlanningTelemetry);
        assert_eq!(
            decoded.payload,
            Payload::Incomplete {
                expected: 48,
                actual: 10
            }
        );
    }

    #[test]
    fn test_encode_then_decode_through_table() {
        let states = FlightStates {
            lat: 30.0,
            psi: 1.5,
            ..Default::default()
        };
        let (code, bytes) = encode(&Payload::States(states)).unwrap();
        let (_, decoded) = decode(code, &bytes);
        assert_eq!(decoded.payload, Payload::States(states));

        let (code, _) = encode(&Payload::Parameter(ParameterEcho { timestamp: 5 })).unwrap();
        assert_eq!(code, func_code::PARAMETER);
    }

    #[test]
    fn test_unknown_not_encodable() {
        let payload = Payload::Unknown {
            hex_preview: String::new(),
            length: 0,
        };
        assert!(encode(&payload).is_err());
    }
}
