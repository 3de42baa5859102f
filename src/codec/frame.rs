//! ASCII CAN frame grammar and the binary frame record.
//!
//! The text syntax is the candump/cansend convention:
//!
//! - `<can_id>#{R{dlc}|data}` for classic CAN 2.0 frames
//! - `<can_id>##<flags>{data}` for CAN FD frames
//!
//! `<can_id>` has 3 (SFF) or 8 (EFF) hex chars, `{data}` 0..8 (0..64 for FD)
//! hex byte pairs, optionally separated by `.`.

/// Extended frame format flag, set in the parsed identifier.
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request flag.
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// Error frame flag.
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

/// Mask of the 29 identifier bits.
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// Maximum classic CAN DLC.
pub const CAN_MAX_DLC: u8 = 8;
/// Maximum classic CAN payload in bytes.
pub const CAN_MAX_DLEN: usize = 8;
/// Maximum CAN FD payload in bytes.
pub const CANFD_MAX_DLEN: usize = 64;

const CANID_DELIM: u8 = b'#';
const DATA_SEPARATOR: u8 = b'.';

/// Convert a hex character to its 4-bit value. Accepts `0-9`, `A-F`, `a-f`.
pub fn ascii_to_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Convert a 4-bit value to its lowercase hex character.
pub fn nibble_to_ascii(n: u8) -> u8 {
    match n & 0x0F {
        v @ 0..=9 => b'0' + v,
        v => b'a' + (v - 10),
    }
}

/// Transmission unit required for a parsed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMtu {
    /// Classic frame envelope (16 bytes on the raw socket).
    Classic,
    /// CAN FD frame envelope (72 bytes on the raw socket).
    Fd,
}

/// Binary CAN frame as written to the raw socket.
///
/// `can_id` carries the identifier bits plus the EFF/RTR/ERR flags;
/// `flags` is the CAN FD flags byte (BRS/ESI), zero for classic frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFrame {
    pub can_id: u32,
    pub len: u8,
    pub flags: u8,
    pub data: [u8; CANFD_MAX_DLEN],
}

impl WireFrame {
    fn zeroed() -> Self {
        Self {
            can_id: 0,
            len: 0,
            flags: 0,
            data: [0; CANFD_MAX_DLEN],
        }
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(CANFD_MAX_DLEN)]
    }

    /// Identifier without flag bits.
    pub fn raw_id(&self) -> u32 {
        self.can_id & CAN_EFF_MASK
    }

    pub fn is_extended(&self) -> bool {
        self.can_id & CAN_EFF_FLAG != 0
    }

    pub fn is_rtr(&self) -> bool {
        self.can_id & CAN_RTR_FLAG != 0
    }
}

/// Parse the ASCII frame text into a binary frame and the transmission unit
/// it requires. Returns `None` for anything outside the grammar; there is no
/// partial result.
pub fn parse_frame(text: &str) -> Option<(WireFrame, FrameMtu)> {
    let cs = text.as_bytes();
    let mut frame = WireFrame::zeroed();

    if cs.len() < 4 {
        return None;
    }

    // 3 hex digits (standard) or 8 hex digits (extended) before the '#'.
    let mut idx;
    if cs[3] == CANID_DELIM {
        idx = 4;
        for (i, &c) in cs[..3].iter().enumerate() {
            let nibble = ascii_to_nibble(c)?;
            frame.can_id |= u32::from(nibble) << ((2 - i) * 4);
        }
    } else if cs.get(8) == Some(&CANID_DELIM) {
        idx = 9;
        for (i, &c) in cs[..8].iter().enumerate() {
            let nibble = ascii_to_nibble(c)?;
            frame.can_id |= u32::from(nibble) << ((7 - i) * 4);
        }
        // 8 digits but no error frame: it is an extended frame.
        if frame.can_id & CAN_ERR_FLAG == 0 {
            frame.can_id |= CAN_EFF_FLAG;
        }
    } else {
        return None;
    }

    if matches!(cs.get(idx), Some(b'R') | Some(b'r')) {
        frame.can_id |= CAN_RTR_FLAG;

        // Optional DLC digit for CAN 2.0B frames; out-of-range or non-hex
        // trailing characters are ignored, not rejected.
        if let Some(&c) = cs.get(idx + 1) {
            if let Some(dlc) = ascii_to_nibble(c).filter(|&d| d <= CAN_MAX_DLC) {
                frame.len = dlc;
            }
        }
        return Some((frame, FrameMtu::Classic));
    }

    let mut maxdlen = CAN_MAX_DLEN;
    let mut mtu = FrameMtu::Classic;

    // CAN FD frame escape: '##' followed by the flags nibble.
    if cs.get(idx) == Some(&CANID_DELIM) {
        frame.flags = ascii_to_nibble(*cs.get(idx + 1)?)?;
        maxdlen = CANFD_MAX_DLEN;
        mtu = FrameMtu::Fd;
        idx += 2;
    }

    let mut dlen = 0;
    for i in 0..maxdlen {
        // Skip one optional separator before each byte pair.
        if cs.get(idx) == Some(&DATA_SEPARATOR) {
            idx += 1;
        }
        if idx >= cs.len() {
            break;
        }
        let hi = ascii_to_nibble(*cs.get(idx)?)?;
        let lo = ascii_to_nibble(*cs.get(idx + 1)?)?;
        idx += 2;
        frame.data[i] = (hi << 4) | lo;
        dlen += 1;
    }
    frame.len = dlen;

    Some((frame, mtu))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_codec_roundtrip() {
        for c in b"0123456789abcdefABCDEF" {
            let n = ascii_to_nibble(*c).unwrap();
            assert_eq!(nibble_to_ascii(n), c.to_ascii_lowercase());
        }
        assert_eq!(ascii_to_nibble(b'g'), None);
        assert_eq!(ascii_to_nibble(b'#'), None);
        assert_eq!(ascii_to_nibble(b' '), None);
    }

    #[test]
    fn test_parse_classic_frame() {
        let (frame, mtu) = parse_frame("123#DEADBEEF").unwrap();
        assert_eq!(mtu, FrameMtu::Classic);
        assert_eq!(frame.can_id, 0x123);
        assert!(!frame.is_extended());
        assert_eq!(frame.len, 4);
        assert_eq!(frame.payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_parse_empty_payload() {
        let (frame, mtu) = parse_frame("5AA#").unwrap();
        assert_eq!(mtu, FrameMtu::Classic);
        assert_eq!(frame.can_id, 0x5AA);
        assert_eq!(frame.len, 0);
    }

    #[test]
    fn test_parse_extended_frame() {
        let (frame, mtu) = parse_frame("1F334455#1122334455667788").unwrap();
        assert_eq!(mtu, FrameMtu::Classic);
        assert!(frame.is_extended());
        assert_eq!(frame.raw_id(), 0x1F334455);
        assert_eq!(frame.len, 8);
        assert_eq!(
            frame.payload(),
            &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
    }

    #[test]
    fn test_parse_rtr_frames() {
        let (frame, mtu) = parse_frame("123#R").unwrap();
        assert_eq!(mtu, FrameMtu::Classic);
        assert!(frame.is_rtr());
        assert_eq!(frame.len, 0);

        let (frame, _) = parse_frame("123#R4").unwrap();
        assert!(frame.is_rtr());
        assert_eq!(frame.len, 4);

        // Out-of-range DLC digit is ignored, not an error.
        let (frame, _) = parse_frame("123#R9").unwrap();
        assert_eq!(frame.len, 0);
    }

    #[test]
    fn test_parse_fd_frame() {
        let (frame, mtu) = parse_frame("213##311").unwrap();
        assert_eq!(mtu, FrameMtu::Fd);
        assert_eq!(frame.can_id, 0x213);
        assert_eq!(frame.flags, 0x3);
        assert_eq!(frame.len, 1);
        assert_eq!(frame.payload(), &[0x11]);
    }

    #[test]
    fn test_parse_dot_separators() {
        let (frame, _) = parse_frame("5A1#11.2233.44556677.88").unwrap();
        assert_eq!(frame.len, 8);
        assert_eq!(
            frame.payload(),
            &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
    }

    #[test]
    fn test_reject_malformed_input() {
        // Too short.
        assert!(parse_frame("12#").is_none());
        // Delimiter in neither position.
        assert!(parse_frame("12345#00").is_none());
        // Bad hex in the identifier.
        assert!(parse_frame("12G#00").is_none());
        assert!(parse_frame("1F33445G#00").is_none());
        // Bad hex in the payload.
        assert!(parse_frame("123#DEADBEEG").is_none());
        // Odd trailing nibble.
        assert!(parse_frame("123#DEA").is_none());
        // FD escape without a flags digit.
        assert!(parse_frame("213##").is_none());
        assert!(parse_frame("213##G11").is_none());
    }

    #[test]
    fn test_error_frame_id_is_not_extended() {
        // ERR flag set in an 8-digit identifier suppresses the EFF flag.
        let (frame, _) = parse_frame("20000001#00").unwrap();
        assert!(!frame.is_extended());
        assert_eq!(frame.can_id & CAN_ERR_FLAG, CAN_ERR_FLAG);
    }

    #[test]
    fn test_classic_payload_capped_at_8_bytes() {
        // Nine byte pairs on a classic frame: the ninth is ignored.
        let (frame, mtu) = parse_frame("123#112233445566778899").unwrap();
        assert_eq!(mtu, FrameMtu::Classic);
        assert_eq!(frame.len, 8);
    }
}
