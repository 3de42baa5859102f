//! Transmission loop: drains queued frame texts onto a SocketCAN raw socket.
//!
//! The loop waits for the interface to appear, opens a classic CAN socket
//! and upgrades it to CAN FD on demand when an FD frame text is queued and
//! the interface MTU allows it. Write failures are logged and the frame is
//! dropped; the loop keeps running until the shutdown flag clears.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socketcan::frame::FdFlags;
use socketcan::{
    CanFdFrame, CanFdSocket, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket,
    SocketOptions, StandardId,
};
use tracing::{debug, error, info, warn};

use crate::codec::dlc::canonical_len;
use crate::codec::frame::{parse_frame, FrameMtu, WireFrame, CAN_ERR_FLAG};
use crate::sender::queue::TransmitQueue;

/// Poll period while the queue is empty.
const IDLE_POLL: Duration = Duration::from_millis(150);

/// Back-off while the interface is absent. Pending frames are stale by the
/// time it returns, so the queue is flushed on every miss.
const INTERFACE_RETRY: Duration = Duration::from_secs(2);

/// Link-layer MTU an interface reports when CAN FD frames are enabled.
const CANFD_MTU: u32 = 72;

const FORMAT_HINT: &str = "wrong CAN frame format, expected \
    <can_id>#{R{dlc}|data} or <can_id>##<flags>{data} \
    (<can_id>: 3 or 8 hex chars, {data}: hex byte pairs, \
    <flags>: one hex char)";

/// Whether the network interface exists.
fn interface_present(interface: &str) -> bool {
    Path::new("/sys/class/net").join(interface).exists()
}

/// Link-layer MTU of the interface, if readable.
fn interface_mtu(interface: &str) -> Option<u32> {
    let path = Path::new("/sys/class/net").join(interface).join("mtu");
    let text = std::fs::read_to_string(path).ok()?;
    text.trim().parse().ok()
}

// ============================================================================
// Socket handling
// ============================================================================

/// The open raw socket, classic until the first FD frame forces an upgrade.
enum BusSocket {
    Classic(CanSocket),
    Fd(CanFdSocket),
}

impl BusSocket {
    fn open_classic(interface: &str) -> std::io::Result<Self> {
        let socket = CanSocket::open(interface)?;
        configure(&socket)?;
        Ok(Self::Classic(socket))
    }

    /// Switch to an FD-capable socket. Requires the interface MTU to report
    /// FD support; a classic-only interface keeps the current socket.
    fn upgrade_to_fd(&mut self, interface: &str) -> bool {
        if matches!(self, Self::Fd(_)) {
            return true;
        }
        match interface_mtu(interface) {
            Some(CANFD_MTU) => {}
            Some(mtu) => {
                warn!(interface, mtu, "interface does not support CAN FD");
                return false;
            }
            None => {
                warn!(interface, "cannot read interface MTU");
                return false;
            }
        }
        match CanFdSocket::open(interface) {
            Ok(socket) => {
                if let Err(e) = configure(&socket) {
                    warn!(interface, error = %e, "failed to configure FD socket");
                    return false;
                }
                info!(interface, "switched to CAN FD socket");
                *self = Self::Fd(socket);
                true
            }
            Err(e) => {
                warn!(interface, error = %e, "failed to open CAN FD socket");
                false
            }
        }
    }

    fn write_classic(&self, frame: &CanFrame) -> std::io::Result<()> {
        match self {
            Self::Classic(socket) => socket.write_frame(frame),
            Self::Fd(socket) => socket.write_frame(frame),
        }
    }

    fn write_fd(&self, frame: &CanFdFrame) -> std::io::Result<()> {
        match self {
            // Callers upgrade before writing FD frames.
            Self::Classic(_) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "FD frame on a classic socket",
            )),
            Self::Fd(socket) => socket.write_frame(frame),
        }
    }
}

/// This is a send-only socket: drop every incoming frame at the filter.
fn configure<S: Socket + SocketOptions>(socket: &S) -> std::io::Result<()> {
    socket.set_filter_drop_all()?;
    socket.set_nonblocking(false)?;
    Ok(())
}

fn make_id(frame: &WireFrame) -> Option<Id> {
    if frame.is_extended() {
        ExtendedId::new(frame.raw_id()).map(Id::from)
    } else {
        u16::try_from(frame.raw_id())
            .ok()
            .and_then(StandardId::new)
            .map(Id::from)
    }
}

/// Build and write one parsed frame. `Ok(false)` means the frame was
/// dropped without touching the socket.
fn send_frame(
    socket: &mut BusSocket,
    interface: &str,
    frame: &WireFrame,
    mtu: FrameMtu,
) -> std::io::Result<bool> {
    if frame.can_id & CAN_ERR_FLAG != 0 {
        warn!("refusing to send error frame: {:08x}", frame.can_id);
        return Ok(false);
    }
    let Some(id) = make_id(frame) else {
        warn!("CAN identifier out of range: {:x}", frame.raw_id());
        return Ok(false);
    };

    match mtu {
        FrameMtu::Fd => {
            if !socket.upgrade_to_fd(interface) {
                return Ok(false);
            }
            // FD payload lengths must land on a wire-representable size;
            // the spare bytes in the buffer are already zero.
            let len = usize::from(canonical_len(frame.len));
            let flags = FdFlags::from_bits_truncate(frame.flags);
            if flags.bits() != frame.flags {
                debug!(
                    flags = frame.flags,
                    "dropping FD flag bits without a kernel counterpart"
                );
            }
            let Some(fd_frame) = CanFdFrame::with_flags(id, &frame.data[..len], flags) else {
                warn!(len, "cannot build CAN FD frame");
                return Ok(false);
            };
            socket.write_fd(&fd_frame)?;
        }
        FrameMtu::Classic => {
            let built = if frame.is_rtr() {
                CanFrame::new_remote(id, usize::from(frame.len))
            } else {
                CanFrame::new(id, frame.payload())
            };
            let Some(can_frame) = built else {
                warn!(len = frame.len, "cannot build CAN frame");
                return Ok(false);
            };
            socket.write_classic(&can_frame)?;
        }
    }
    Ok(true)
}

// ============================================================================
// The loop
// ============================================================================

/// Run the transmission loop until `running` clears.
///
/// Fatal only when the socket cannot be opened at all; everything after
/// that point logs and keeps going.
pub(crate) async fn run(interface: String, queue: Arc<TransmitQueue>, running: Arc<AtomicBool>) {
    // The interface may come up after us. Frames queued while it is down
    // are discarded rather than burst out later.
    while !interface_present(&interface) {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        warn!(interface = %interface, "CAN interface not present, retrying");
        queue.clear();
        tokio::time::sleep(INTERFACE_RETRY).await;
    }

    let mut socket = match BusSocket::open_classic(&interface) {
        Ok(socket) => socket,
        Err(e) => {
            error!(interface = %interface, error = %e, "failed to open CAN socket");
            return;
        }
    };
    info!(interface = %interface, "transmission loop started");

    while running.load(Ordering::SeqCst) {
        let Some(text) = queue.pop() else {
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        };

        let Some((frame, mtu)) = parse_frame(&text) else {
            warn!(text = %text, "{}", FORMAT_HINT);
            continue;
        };

        match send_frame(&mut socket, &interface, &frame, mtu) {
            Ok(true) => debug!(text = %text, "frame sent"),
            Ok(false) => {}
            Err(e) => warn!(text = %text, error = %e, "CAN write failed"),
        }
    }

    info!(interface = %interface, "transmission loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_probe_on_missing_device() {
        assert!(!interface_present("no-such-interface-0"));
        assert_eq!(interface_mtu("no-such-interface-0"), None);
    }

    #[test]
    fn test_make_id_ranges() {
        let (standard, _) = parse_frame("7ff#00").unwrap();
        assert!(make_id(&standard).is_some());

        let (extended, _) = parse_frame("1fffffff#00").unwrap();
        assert!(make_id(&extended).is_some());

        // 3-hex-digit identifiers above 0x7FF do not fit the standard range.
        let (too_big, _) = parse_frame("fff#00").unwrap();
        assert!(make_id(&too_big).is_none());
    }
}
