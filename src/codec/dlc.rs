//! CAN DLC to real data length conversion tables.
//!
//! CAN FD encodes payload lengths above 8 bytes non-linearly; only
//! {0..8, 12, 16, 20, 24, 32, 48, 64} are representable on the wire.

/// DLC code (0..15) to payload length in bytes.
const DLC2LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Payload length (0..=64) to DLC code.
#[rustfmt::skip]
const LEN2DLC: [u8; 65] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8,             // 0 - 8
    9, 9, 9, 9,                             // 9 - 12
    10, 10, 10, 10,                         // 13 - 16
    11, 11, 11, 11,                         // 17 - 20
    12, 12, 12, 12,                         // 21 - 24
    13, 13, 13, 13, 13, 13, 13, 13,         // 25 - 32
    14, 14, 14, 14, 14, 14, 14, 14,         // 33 - 40
    14, 14, 14, 14, 14, 14, 14, 14,         // 41 - 48
    15, 15, 15, 15, 15, 15, 15, 15,         // 49 - 56
    15, 15, 15, 15, 15, 15, 15, 15,         // 57 - 64
];

/// Payload length for a DLC code. The input is masked to its low 4 bits
/// first; callers may pass unsanitized values.
pub fn dlc_to_len(dlc: u8) -> u8 {
    DLC2LEN[usize::from(dlc & 0x0F)]
}

/// DLC code for a payload length. Lengths above 64 saturate to the maximum
/// code (0xF).
pub fn len_to_dlc(len: u8) -> u8 {
    if len > 64 {
        return 0xF;
    }
    LEN2DLC[usize::from(len)]
}

/// Round a payload length up to the next wire-representable length.
pub fn canonical_len(len: u8) -> u8 {
    dlc_to_len(len_to_dlc(len))
}
