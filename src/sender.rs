//! Signal update pipeline and transmission task management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec::encoder::CanIdRegistry;
use crate::core::config::{SenderConfig, SignalDescriptor};

pub mod queue;
#[cfg(target_os = "linux")]
pub mod transmit;

pub use queue::TransmitQueue;

/// Vehicle-signal sender: applies named value updates to the signal table,
/// re-encodes the owning frame and queues it for transmission.
///
/// The transmission loop runs as a separate task started by [`start`];
/// updates work without it, the queue just grows.
///
/// [`start`]: CanSender::start
pub struct CanSender {
    signals: Vec<SignalDescriptor>,
    registry: CanIdRegistry,
    queue: Arc<TransmitQueue>,
    running: Arc<AtomicBool>,
    transmit_handle: Option<JoinHandle<()>>,
}

impl CanSender {
    /// Build a sender from a loaded configuration.
    pub fn from_config(config: SenderConfig) -> Self {
        Self {
            signals: config.signals,
            registry: CanIdRegistry::new(),
            queue: Arc::new(TransmitQueue::new()),
            running: Arc::new(AtomicBool::new(false)),
            transmit_handle: None,
        }
    }

    /// Shared handle to the pending-frame queue.
    pub fn queue(&self) -> Arc<TransmitQueue> {
        Arc::clone(&self.queue)
    }

    /// Configured signal table.
    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Apply a named value update.
    ///
    /// Unknown names and unchanged values are ignored. Returns `true` when
    /// a frame was queued.
    pub fn update_value(&mut self, name: &str, value: i32) -> bool {
        let Some(signal) = self.signals.iter_mut().find(|s| s.name == name) else {
            debug!(name, "ignoring update for unknown signal");
            return false;
        };
        if !signal.store_update(value) {
            return false;
        }
        match self.registry.encode_signal(signal) {
            Ok(text) => {
                debug!(name, text = %text, "signal update queued");
                self.queue.push(text);
                true
            }
            Err(e) => {
                // Descriptors are validated at load time, so this only
                // fires for hand-built signals.
                warn!(name, error = %e, "cannot encode signal update");
                false
            }
        }
    }

    /// Spawn the transmission loop on the given interface.
    #[cfg(target_os = "linux")]
    pub fn start(&mut self, interface: &str) {
        if self.transmit_handle.is_some() {
            warn!("transmission loop already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        self.transmit_handle = Some(tokio::spawn(transmit::run(
            interface.to_string(),
            Arc::clone(&self.queue),
            Arc::clone(&self.running),
        )));
    }

    /// Signal the transmission loop to stop and wait for it to finish.
    pub async fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.transmit_handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHEEL_MAP: &str = r#"{
        "PROPERTYS": [
            {"PROPERTY": "VehicleSpeed", "TYPE": "uint16_t", "CANID": "048",
             "BIT_POSITION": "8", "BIT_SIZE": "16", "DLC": "4"},
            {"PROPERTY": "TurnSignalStatus", "TYPE": "uint8_t", "CANID": "048",
             "BIT_POSITION": "0", "BIT_SIZE": "8", "DLC": "4"}
        ]
    }"#;

    fn sender() -> CanSender {
        CanSender::from_config(SenderConfig::from_json(WHEEL_MAP, None).unwrap())
    }

    #[test]
    fn test_update_queues_encoded_frame() {
        let mut sender = sender();
        assert!(sender.update_value("VehicleSpeed", 0x1234));

        let queue = sender.queue();
        assert_eq!(queue.pop().as_deref(), Some("048#00123400"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unchanged_value_is_not_requeued() {
        let mut sender = sender();
        assert!(sender.update_value("VehicleSpeed", 60));
        assert!(!sender.update_value("VehicleSpeed", 60));
        assert_eq!(sender.queue().len(), 1);
    }

    #[test]
    fn test_unknown_signal_is_ignored() {
        let mut sender = sender();
        assert!(!sender.update_value("NoSuchSignal", 1));
        assert!(sender.queue().is_empty());
    }

    #[test]
    fn test_updates_compose_into_shared_frame() {
        let mut sender = sender();
        sender.update_value("VehicleSpeed", 0x1234);
        sender.update_value("TurnSignalStatus", 0xEE);

        let queue = sender.queue();
        assert_eq!(queue.pop().as_deref(), Some("048#00123400"));
        assert_eq!(queue.pop().as_deref(), Some("048#ee123400"));
    }

    #[test]
    fn test_extended_id_update_survives_queue() {
        use crate::codec::frame::parse_frame;

        // An 8-char CAN-ID at the maximum permitted DLC must come back out
        // of the queue untruncated and parseable.
        let map = r#"{"PROPERTYS": [
            {"PROPERTY": "OdometerValue", "TYPE": "uint32_t", "CANID": "1F334455",
             "BIT_POSITION": "8", "BIT_SIZE": "32", "DLC": "5"}
        ]}"#;
        let mut sender = CanSender::from_config(SenderConfig::from_json(map, None).unwrap());
        assert!(sender.update_value("OdometerValue", 0x00ADBEEF));

        let text = sender.queue().pop().unwrap();
        assert_eq!(text, "1F334455#0000adbeef");

        let (frame, _) = parse_frame(&text).unwrap();
        assert!(frame.is_extended());
        assert_eq!(frame.raw_id(), 0x1F334455);
        assert_eq!(frame.payload(), &[0x00, 0x00, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_truncated_update_uses_declared_width() {
        let mut sender = sender();
        // uint8_t signal: 0x1FF truncates to 0xFF.
        assert!(sender.update_value("TurnSignalStatus", 0x1FF));
        assert_eq!(sender.queue().pop().as_deref(), Some("048#ff000000"));
        // Same truncated value again: no new frame.
        assert!(!sender.update_value("TurnSignalStatus", 0x2FF));
    }
}
