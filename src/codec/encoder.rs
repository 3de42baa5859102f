//! Bit-level signal packing into shared CAN frame payloads.
//!
//! Several signals can live inside the same CAN identifier. The registry
//! keeps one 64-bit payload accumulator per identifier; encoding a signal
//! clears its bit span in the accumulator, ORs the new value in and renders
//! the whole payload back to the ASCII frame text.

use std::collections::BTreeMap;

use crate::core::config::{SignalDescriptor, MAX_PAYLOAD_HEX};
use crate::core::error::{Result, SenderError};

/// Per-CAN-ID payload accumulators.
///
/// Accumulators are created lazily (zero-filled) the first time an
/// identifier is encoded.
#[derive(Debug, Default)]
pub struct CanIdRegistry {
    payloads: BTreeMap<String, u64>,
}

impl CanIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current accumulator for an identifier, if any signal on it has been
    /// encoded.
    pub fn payload(&self, can_id: &str) -> Option<u64> {
        self.payloads.get(can_id).copied()
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Merge a signal's current value into its identifier's payload and
    /// render the frame text (`<can_id>#<hex>`, lowercase, zero-padded to
    /// exactly `dlc * 2` characters).
    pub fn encode_signal(&mut self, signal: &SignalDescriptor) -> Result<String> {
        let hex_width = usize::from(signal.dlc) * 2;
        if hex_width > MAX_PAYLOAD_HEX {
            return Err(SenderError::encode(format!(
                "signal {}: DLC {} exceeds the {}-byte text payload limit",
                signal.name,
                signal.dlc,
                MAX_PAYLOAD_HEX / 2
            )));
        }

        let frame_bits = u32::from(signal.dlc) * 8;
        let bit_size = u32::from(signal.bit_size);
        let bit_pos = u32::from(signal.bit_pos);
        if bit_size == 0 || bit_pos + bit_size > frame_bits {
            return Err(SenderError::encode(format!(
                "signal {}: bit span {}+{} does not fit a {}-bit frame",
                signal.name, signal.bit_pos, signal.bit_size, frame_bits
            )));
        }

        let mask = if bit_size >= 64 {
            u64::MAX
        } else {
            (1u64 << bit_size) - 1
        };
        // Bit position counts from the most-significant end of the payload.
        let shift = frame_bits - bit_size - bit_pos;

        let acc = self.payloads.entry(signal.can_id.clone()).or_insert(0);
        *acc = (*acc & !(mask << shift)) | ((u64::from(signal.current_value()) & mask) << shift);

        let payload_mask = if frame_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << frame_bits) - 1
        };
        Ok(format!(
            "{}#{:0width$x}",
            signal.can_id,
            *acc & payload_mask,
            width = hex_width
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{SenderConfig, ValueType};

    fn signal(name: &str, can_id: &str, bit_pos: u8, bit_size: u8, dlc: u8) -> SignalDescriptor {
        let map = format!(
            r#"{{"PROPERTYS": [{{"PROPERTY": "{}", "TYPE": "uint32_t", "CANID": "{}",
                "BIT_POSITION": "{}", "BIT_SIZE": "{}", "DLC": "{}"}}]}}"#,
            name, can_id, bit_pos, bit_size, dlc
        );
        SenderConfig::from_json(&map, None).unwrap().signals.remove(0)
    }

    #[test]
    fn test_encode_single_signal() {
        let mut registry = CanIdRegistry::new();
        let mut speed = signal("VehicleSpeed", "048", 8, 16, 4);
        speed.store_update(0xABCD);

        let text = registry.encode_signal(&speed).unwrap();
        assert_eq!(text, "048#00abcd00");
    }

    #[test]
    fn test_signals_sharing_a_can_id_compose() {
        let mut registry = CanIdRegistry::new();
        let mut speed = signal("VehicleSpeed", "048", 8, 16, 4);
        let mut turn = signal("TurnSignalStatus", "048", 0, 8, 4);

        speed.store_update(0x1234);
        assert_eq!(registry.encode_signal(&speed).unwrap(), "048#00123400");

        // Second signal lands in the same payload without disturbing the
        // first one's bits.
        turn.store_update(0xEE);
        assert_eq!(registry.encode_signal(&turn).unwrap(), "048#ee123400");

        // Updating the first again clears only its own span.
        speed.store_update(0x00FF);
        assert_eq!(registry.encode_signal(&speed).unwrap(), "048#ee00ff00");

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_separate_can_ids_get_separate_payloads() {
        let mut registry = CanIdRegistry::new();
        let mut a = signal("A", "100", 0, 8, 1);
        let mut b = signal("B", "200", 0, 8, 1);

        a.store_update(0x11);
        b.store_update(0x22);
        assert_eq!(registry.encode_signal(&a).unwrap(), "100#11");
        assert_eq!(registry.encode_signal(&b).unwrap(), "200#22");
        assert_eq!(registry.payload("100"), Some(0x11));
        assert_eq!(registry.payload("200"), Some(0x22));
    }

    #[test]
    fn test_render_width_is_exact() {
        let mut registry = CanIdRegistry::new();
        let mut sig = signal("S", "7ff", 56, 8, 8);
        sig.store_update(0x5);

        // Eight-byte frame renders all sixteen hex chars even for a tiny value.
        assert_eq!(registry.encode_signal(&sig).unwrap(), "7ff#0000000000000005");
    }

    #[test]
    fn test_full_width_signal() {
        let mut registry = CanIdRegistry::new();
        let mut sig = signal("Wide", "123", 0, 64, 8);
        sig.store_update(-1);

        // The 32-bit value cell caps what a 64-bit span can carry.
        assert_eq!(registry.encode_signal(&sig).unwrap(), "123#00000000ffffffff");
    }

    #[test]
    fn test_reencode_is_idempotent() {
        let mut registry = CanIdRegistry::new();
        let mut sig = signal("S", "048", 8, 16, 4);
        sig.store_update(0xBEEF);

        let first = registry.encode_signal(&sig).unwrap();
        let second = registry.encode_signal(&sig).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_oversized_dlc_is_an_encode_error() {
        let mut registry = CanIdRegistry::new();
        let mut sig = signal("S", "048", 0, 8, 4);
        sig.dlc = 9;
        assert!(matches!(
            registry.encode_signal(&sig),
            Err(SenderError::Encode(_))
        ));
    }

    #[test]
    fn test_bad_bit_span_is_an_encode_error() {
        let mut registry = CanIdRegistry::new();
        let mut sig = signal("S", "048", 0, 8, 4);
        sig.bit_pos = 30;
        assert!(matches!(
            registry.encode_signal(&sig),
            Err(SenderError::Encode(_))
        ));
    }

    // Keeps the registry honest about what ValueType contributes here: the
    // encoder only sees the stored cell, already truncated by store_update.
    #[test]
    fn test_truncation_happens_before_encoding() {
        let mut registry = CanIdRegistry::new();
        let map = r#"{"PROPERTYS": [{"PROPERTY": "Narrow", "TYPE": "uint8_t",
            "CANID": "048", "BIT_POSITION": "0", "BIT_SIZE": "16", "DLC": "2"}]}"#;
        let mut sig = SenderConfig::from_json(map, None).unwrap().signals.remove(0);
        assert_eq!(sig.value_type, ValueType::UInt8);

        sig.store_update(0x1234);
        assert_eq!(registry.encode_signal(&sig).unwrap(), "048#0034");
    }
}
