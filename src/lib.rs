//! # sigcan
//!
//! Vehicle-signal to CAN bus transmission library.
//!
//! sigcan packs bit-addressed vehicle signal values (speed, gear, steering
//! angle, ...) into shared CAN identifiers, renders the canonical ASCII
//! CAN-frame text (`<id>#<hexdata>`, as used by candump/cansend), and drives a
//! background transmission loop that parses the text back into binary frames
//! and writes them to a SocketCAN raw socket, negotiating classic vs. CAN FD
//! transmission per frame.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sigcan::prelude::*;
//!
//! let config = SenderConfig::from_file("/etc/steering_wheel.json")?;
//! let mut sender = CanSender::from_config(config);
//! sender.start("can0");
//!
//! // Telemetry updates from the upstream client:
//! sender.update_value("VehicleSpeed", 72);
//! sender.update_value("SteeringWheelAngle", -15);
//!
//! sender.shutdown().await;
//! ```
//!
//! ## Wire format
//!
//! The text exchanged between the encoder and the transmission loop is
//! bit-compatible with the standard SocketCAN tooling convention:
//!
//! | Form                        | Meaning                          |
//! |-----------------------------|----------------------------------|
//! | `123#DEADBEEF`              | classic frame, 11-bit ID         |
//! | `1F334455#1122334455667788` | extended frame, 29-bit ID        |
//! | `123#R4`                    | remote request, DLC 4            |
//! | `213##311`                  | CAN FD frame, flags 0x3          |
//!
//! Optional `.` separators between byte pairs are accepted on parse.

pub mod codec;
pub mod core;
pub mod sender;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{
        dlc::{dlc_to_len, len_to_dlc},
        encoder::CanIdRegistry,
        frame::{parse_frame, FrameMtu, WireFrame},
    };
    pub use crate::core::{
        config::{SenderConfig, SignalDescriptor, ValueType},
        error::{Result, SenderError},
    };
    pub use crate::sender::{queue::TransmitQueue, CanSender};
}

// Re-export core types at crate root for convenience
pub use crate::core::config::{SenderConfig, SignalDescriptor, ValueType};
pub use crate::core::error::{Result, SenderError};
pub use crate::sender::queue::TransmitQueue;
pub use crate::sender::CanSender;
