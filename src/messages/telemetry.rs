//! Flight controller telemetry layouts.

use crate::protocol::wire::wire_record;

wire_record! {
    /// Navigation state (0x42).
    pub struct FlightStates {
        pub lat: f64,
        pub lon: f64,
        pub height: f32,
        pub vx_gs: f32,
        pub vy_gs: f32,
        pub vz_gs: f32,
        pub p: f32,
        pub q: f32,
        pub r: f32,
        pub phi: f32,
        pub theta: f32,
        pub psi: f32,
    }
}

wire_record! {
    /// Servo/motor outputs (0x41).
    pub struct PwmOutputs {
        pub channels: [f64; 8],
    }
}

wire_record! {
    /// Aileron outer loop.
    pub struct AilOutLoop {
        pub dy_delta: f32,
        pub vy_dy2vy: f32,
        pub vy_var: f32,
        pub vy_delta: f32,
        pub vy_p: f32,
        pub vy_int: f32,
        pub vy_d: f32,
        pub ail_ffc: f32,
    }
}

wire_record! {
    /// Aileron inner loop.
    pub struct AilInLoop {
        pub ail_trim: f32,
        pub phi_trim: f32,
        pub phi_var: f32,
        pub delta_phi: f32,
        pub phi_p: f32,
        pub phi_d: f32,
        pub ail_fbc: f32,
        pub ail_law_out: f32,
    }
}

wire_record! {
    /// Elevator outer loop.
    pub struct EleOutLoop {
        pub dx_delta: f32,
        pub vx_dx2vx: f32,
        pub vx_var: f32,
        pub vx_delta: f32,
        pub vx_p: f32,
        pub vx_int: f32,
        pub vx_d: f32,
        pub ele_ffc: f32,
    }
}

wire_record! {
    /// Elevator inner loop.
    pub struct EleInLoop {
        pub theta_trim: f32,
        pub ele_trim: f32,
        pub theta_var: f32,
        pub delta_theta: f32,
        pub theta_p: f32,
        pub theta_d: f32,
        pub ele_fbc: f32,
        pub ele_law_out: f32,
    }
}

wire_record! {
    /// Rudder outer loop.
    pub struct RudOutLoop {
        pub psi_dy: f32,
        pub psi_delta: f32,
        pub r_dpsi2r: f32,
    }
}

wire_record! {
    /// Rudder inner loop.
    pub struct RudInLoop {
        pub rud_trim: f32,
        pub r_var: f32,
        pub dr_delta: f32,
        pub r_p: f32,
        pub r_int: f32,
        pub rud_fbc: f32,
        pub rud_law_out: f32,
    }
}

wire_record! {
    /// Collective outer loop.
    pub struct ColOutLoop {
        pub h_delta: f32,
        pub hdot_dh2vz: f32,
        pub hdot_var: f32,
        pub hdot_delta: f32,
        pub hdot_p: f32,
        pub hdot_int: f32,
        pub hdot_d: f32,
        pub col_fbc: f32,
    }
}

wire_record! {
    /// Collective inner loop.
    pub struct ColInLoop {
        pub col_vx: f32,
        pub col_law: f32,
        pub col_law_out: f32,
    }
}

wire_record! {
    /// Control-loop internals (0x43), 53 floats.
    pub struct ControlLoop {
        pub ail_out: AilOutLoop,
        pub ail_in: AilInLoop,
        pub ele_out: EleOutLoop,
        pub ele_in: EleInLoop,
        pub rud_out: RudOutLoop,
        pub rud_in: RudInLoop,
        pub col_out: ColOutLoop,
        pub col_in: ColInLoop,
    }
}

wire_record! {
    /// Obstacle avoidance switches (0x45).
    pub struct AvoidanceFlags {
        pub laser_radar_enabled: u8,
        pub avoidance_flag: u8,
        pub guide_flag: u8,
    }
}

wire_record! {
    /// Futaba remote-control sticks (0x46).
    ///
    /// Stick values range 0..=2000.
    pub struct RemoteControl {
        pub roll: u16,
        pub pitch: u16,
        pub yaw: u16,
        pub collective: u16,
        pub switch: i8,
        pub failsafe: i8,
    }
}

wire_record! {
    /// Electronic speed controller telemetry (0x4B).
    pub struct EscTelemetry {
        pub error_counts: [u32; 6],
        pub rpm: [i32; 6],
        pub power_percent: [u8; 6],
    }
}

wire_record! {
    /// Parameter echo (0x49).
    pub struct ParameterEcho {
        pub timestamp: i32,
    }
}

impl EscTelemetry {
    /// Controllers reporting a non-zero error count.
    pub fn faulted(&self) -> impl Iterator<Item = usize> + '_ {
        self.error_counts
            .iter()
            .enumerate()
            .filter_map(|(i, count)| (*count > 0).then_some(i))
    }
}

impl RemoteControl {
    pub fn failsafe_active(&self) -> bool {
        self.failsafe != 0
    }
}
