//! Guidance, navigation and control bus (0x44) and guidance line
//! structures (0x47, 0x48).

use crate::protocol::wire::wire_record;

wire_record! {
    pub struct TokenMode {
        pub on_sky: i8,
        pub ctrl_mode: i8,
        pub pre_cmd: i8,
        pub rud_state: i8,
        pub ail_state: i8,
        pub ele_state: i8,
        pub col_state: i8,
        pub nav_guid: i8,
        pub cmd_guid: i8,
        pub mode_guid: i8,
        pub step_guid: i8,
        pub mode_nav: i8,
        pub token_nav: i8,
        pub step_nav: i8,
        pub mode_vert: i8,
        pub token_vert: i8,
        pub step_vert: i8,
    }
}

wire_record! {
    /// Remote-control optimisation values.
    pub struct FutabaOptions {
        pub ele_opt: f32,
        pub ail_opt: f32,
        pub rud_opt: f32,
        pub col_opt: f32,
        pub r_opt: f32,
        pub vx_opt: f32,
        pub vy_opt: f32,
        pub coldt_opt: f32,
        pub col0_opt: f32,
        pub ftb_switch: i8,
    }
}

wire_record! {
    pub struct SourceValue {
        pub ac_src_cmd_v: i8,
        pub src_v_fus: i8,
    }
}

wire_record! {
    pub struct MixValue {
        pub col_mix: f32,
        pub phi_mix: f32,
        pub vx_mix: f32,
        pub dx_mix: f32,
        pub theta_mix: f32,
        pub vy_mix: f32,
        pub dy_mix: f32,
        pub psi_mix: f32,
        pub hdot_mix: f32,
        pub height_mix: f32,
    }
}

wire_record! {
    /// Commanded values consumed by the inner loops.
    pub struct CommandValue {
        pub phi_cmd: f32,
        pub hdot_cmd: f32,
        pub r_cmd: f32,
        pub psi_cmd: f32,
        pub vx_cmd: f32,
        pub vy_cmd: f32,
        pub height_cmd: f32,
    }
}

wire_record! {
    pub struct VarValue {
        pub psi_var: f32,
        pub height_var: f32,
        pub dx_var: f32,
        pub dy_var: f32,
    }
}

wire_record! {
    pub struct TrimValue {
        pub vx_trim: f32,
        pub col_trim: f32,
        pub col_autotrim: f32,
    }
}

wire_record! {
    pub struct ParamLimits {
        pub vx_lmt: f32,
        pub vy_lmt: f32,
        pub r_lmt: f32,
        pub hdot_ilmt: f32,
        pub hdot_up_lmt: f32,
        pub hdot_down_lmt: f32,
        pub r_flyturn: f32,
        pub r_unit: f32,
        pub hdot_unit: f32,
        pub vx_unit: f32,
        pub vy_unit: f32,
    }
}

wire_record! {
    pub struct AircraftValue {
        pub ac_dy: f32,
        pub ac_dx: f32,
        pub ac_dpsi: f32,
        pub ac_dl: f32,
    }
}

wire_record! {
    pub struct HoverValue {
        pub lon_hov: f64,
        pub lat_hov: f64,
        pub is_hovering: i8,
    }
}

wire_record! {
    pub struct HomeValue {
        pub lon_home: f64,
        pub lat_home: f64,
    }
}

wire_record! {
    /// GNC bus status (0x44).
    pub struct GncBus {
        pub token_mode: TokenMode,
        pub futaba: FutabaOptions,
        pub source: SourceValue,
        pub mix: MixValue,
        pub command: CommandValue,
        pub var: VarValue,
        pub trim: TrimValue,
        pub limits: ParamLimits,
        pub aircraft: AircraftValue,
        pub hover: HoverValue,
        pub home: HomeValue,
    }
}

wire_record! {
    /// Guidance line segment, packed with no alignment padding.
    ///
    /// The same layout is used for the aim-to-AB line (0x47) and the active
    /// AB segment (0x48).
    pub struct GuidanceLine {
        pub lon: f64,
        pub lat: f64,
        pub psi: f32,
        pub alt: f32,
        pub len: f32,
        pub rad: f32,
        pub vx_to_next_dot: f32,
        pub next_num: i8,
        pub next_dot: i8,
        pub type_dot: u8,
        pub clockwise_wp: u8,
        pub r_wp: f32,
        pub type_wp: u8,
        pub num_type_wp: u8,
        pub dl_wp: f32,
        pub vx_type: u8,
        pub ttc_fault_mode: u8,
        pub delta_y_ctrl: u8,
        pub turn_type: u8,
        pub inv_type: u8,
        pub type_line: u8,
    }
}

impl GncBus {
    pub fn is_airborne(&self) -> bool {
        self.token_mode.on_sky != 0
    }

    pub fn is_hovering(&self) -> bool {
        self.hover.is_hovering != 0
    }
}
