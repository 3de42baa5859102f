//! Mutex-guarded FIFO of pending frame texts.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::core::config::MAX_FRAME_TEXT;

/// Longest frame text accepted into the queue; longer entries are truncated
/// on push. Descriptor validation guarantees rendered frames fit.
pub const MAX_ENTRY_LEN: usize = MAX_FRAME_TEXT;

/// FIFO of ASCII frame texts shared between value updaters and the
/// transmission loop. All operations are non-blocking.
#[derive(Debug, Default)]
pub struct TransmitQueue {
    entries: Mutex<VecDeque<String>>,
}

impl TransmitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // A poisoned lock only means a panic elsewhere; the queue data is
        // still a valid VecDeque.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a frame text, truncating it to [`MAX_ENTRY_LEN`] bytes.
    pub fn push(&self, mut text: String) {
        if text.len() > MAX_ENTRY_LEN {
            let mut cut = MAX_ENTRY_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        self.lock().push_back(text);
    }

    /// Take the oldest entry, or `None` when the queue is empty.
    pub fn pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    /// Drop every pending entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
