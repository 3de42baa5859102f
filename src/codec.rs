//! CAN frame codec: DLC tables, the ASCII frame grammar and the bit-level
//! signal encoder.

pub mod dlc;
pub mod encoder;
pub mod frame;

pub use dlc::{dlc_to_len, len_to_dlc};
pub use encoder::CanIdRegistry;
pub use frame::{parse_frame, FrameMtu, WireFrame};
