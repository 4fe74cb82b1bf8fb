//! # NCLink
//!
//! Ground-control-station side of the NCLink protocol: framing, payload
//! codecs, command encoding and a multi-port UDP transport.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Application (MessageHandler)                    │
//! ├────────────────────────────────┬────────────────────────────────┤
//! │   Message Codec Registry       │   Command Dispatcher           │
//! │   (func code → payload)        │   (repeat / reset, routing)    │
//! ├────────────────────────────────┼────────────────────────────────┤
//! │   Stream Framer (per port)     │   Command Encoder + PID cache  │
//! ├────────────────────────────────┴────────────────────────────────┤
//! │                 Frame Codec (sync, XOR, trailer)                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        Multi-Port UDP Transport (one socket per role)           │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // Default gain tables
#![allow(clippy::cast_possible_truncation)]  // Timestamps are sent mod 2^32
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::similar_names)]             // lat/lon, x/y/z fields
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::future_not_send)]
#![allow(clippy::struct_excessive_bools)]    // Wire records with flag bytes
#![allow(clippy::match_same_arms)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod config;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::command::{CommandDispatcher, CommandEncoder, DiscreteCommand, PidCache};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{Message, MessageKind, Payload, StreamFramer};
    pub use crate::transport::{MessageHandler, TargetConfig, Transport, TransportConfig, UdpTransport};
    pub use crate::types::*;
}
