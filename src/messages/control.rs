//! Flight controller input structure (0x40).

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::protocol::wire::{wire_record, WireReader, WireRecord};

/// Strip the optional `f` type prefix used by some parameter sources.
fn canonical(name: &str) -> &str {
    match name.strip_prefix('f') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

macro_rules! gains {
    ($( $field:ident = $wire:literal : $default:expr ),* $(,)?) => {
        /// The control gains carried by every control-input frame.
        ///
        /// Defaults are the flight-tested values.
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        pub struct PidGains {
            $( #[serde(rename = $wire)] pub $field: f32, )*
        }

        impl Default for PidGains {
            fn default() -> Self {
                Self { $( $field: $default, )* }
            }
        }

        impl PidGains {
            /// Wire names in encoding order.
            pub const NAMES: &'static [&'static str] = &[$( $wire ),*];

            pub fn get(&self, name: &str) -> Option<f32> {
                match canonical(name) {
                    $( $wire => Some(self.$field), )*
                    _ => None,
                }
            }

            /// Set a gain by name; returns false for unknown names.
            pub fn set(&mut self, name: &str, value: f32) -> bool {
                match canonical(name) {
                    $( $wire => { self.$field = value; true } )*
                    _ => false,
                }
            }

            pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> {
                [$( ($wire, self.$field) ),*].into_iter()
            }
        }

        impl WireRecord for PidGains {
            const WIDTH: usize = <f32 as WireRecord>::WIDTH * Self::NAMES.len();

            fn read_from(r: &mut WireReader<'_>) -> Self {
                Self { $( $field: r.read(), )* }
            }

            fn write_to<B: BufMut>(&self, out: &mut B) {
                $( self.$field.write_to(out); )*
            }
        }
    };
}

gains! {
    ka_phi = "KaPHI": 0.5,
    ka_p = "KaP": 0.2,
    ka_y = "KaY": 0.143,
    ia_y = "IaY": 0.005,
    ka_vy = "KaVy": 2.0,
    ia_vy = "IaVy": 0.4,
    ka_ay = "KaAy": 0.28,
    ke_theta = "KeTHETA": 0.5,
    ke_q = "KeQ": 0.2,
    ke_x = "KeX": 0.201,
    ie_x = "IeX": 0.01,
    ke_vx = "KeVx": 2.0,
    ie_vx = "IeVx": 0.4,
    ke_ax = "KeAx": 0.55,
    kr_r = "KrR": 0.2,
    ir_r = "IrR": 0.01,
    kr_ay = "KrAy": 0.1,
    kr_psi = "KrPSI": 1.0,
    kc_h = "KcH": 0.36,
    ic_h = "IcH": 0.015,
    kc_hdot = "KcHdot": 0.5,
    ic_hdot = "IcHdot": 0.05,
    kc_az = "KcAz": 0.15,
    ig_rpm = "IgRPM": 0.0,
    kg_rpm = "KgRPM": 0.01,
    scale_factor = "Scale_factor": 1.0,
}

wire_record! {
    /// Control input frame body: full gain set plus the command fields.
    pub struct ControlInput {
        pub gains: PidGains,
        pub cmd_idx: i32,
        pub cmd_mission: i32,
        pub cmd_mission_val: f32,
    }
}

impl ControlInput {
    pub fn new(gains: PidGains, cmd_idx: i32) -> Self {
        Self {
            gains,
            cmd_idx,
            cmd_mission: 0,
            cmd_mission_val: 0.0,
        }
    }

    pub fn with_mission(mut self, mission: i32, value: f32) -> Self {
        self.cmd_mission = mission;
        self.cmd_mission_val = value;
        self
    }
}
