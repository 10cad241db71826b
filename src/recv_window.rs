//! Receive-side reorder-buffer state machine.
//!
//! [`RecvWindow`] implements the receiver half of the selective-repeat
//! window:
//!
//! - DATA packets inside `[base, base + window)` mod 256 are buffered, even
//!   when they arrive out of order.
//! - Duplicates of a still-buffered sequence are reported so the caller can
//!   re-send the ACK that was evidently lost.
//! - Sequences behind the window were already delivered; the caller re-ACKs
//!   them without buffering, otherwise a lost ACK after the window moved on
//!   would leave the sender retransmitting forever.
//! - Draining yields the contiguous run of payloads starting at `base`, in
//!   sequence order, advancing `base` past each one.
//!
//! This module only manages state; all socket I/O and file output is the
//! caller's responsibility.

use std::collections::HashMap;

use crate::window::{in_window, MAX_WINDOW};

/// Classification of an inbound DATA sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Inside the window and not yet buffered: accept the payload.
    Accept,
    /// Inside the window but already buffered: re-ACK, discard payload.
    Duplicate,
    /// Behind (or otherwise outside) the window: already delivered, re-ACK
    /// without buffering.
    AlreadyDelivered,
}

/// Receive-side window state for one receiver session.
#[derive(Debug)]
pub struct RecvWindow {
    /// Next sequence number to be written to output (left window edge).
    base: u8,
    /// Maximum number of out-of-order packets buffered at once.
    window_size: u8,
    /// Out-of-order payloads keyed by sequence number.
    buffered: HashMap<u8, Vec<u8>>,
}

impl RecvWindow {
    /// Create a new [`RecvWindow`] expecting sequence 0 first.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is 0 or exceeds
    /// [`MAX_WINDOW`](crate::window::MAX_WINDOW).
    pub fn new(window_size: u8) -> Self {
        assert!(
            (1..=MAX_WINDOW).contains(&window_size),
            "window_size must be in 1..={MAX_WINDOW}"
        );
        Self {
            base: 0,
            window_size,
            buffered: HashMap::with_capacity(window_size as usize),
        }
    }

    /// Next sequence number the output stream is waiting for.
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Number of out-of-order payloads currently buffered.
    pub fn buffered_count(&self) -> usize {
        self.buffered.len()
    }

    /// Classify an inbound DATA sequence number.
    pub fn admit(&self, seq: u8) -> Admission {
        if in_window(seq, self.base, self.window_size) {
            if self.buffered.contains_key(&seq) {
                Admission::Duplicate
            } else {
                Admission::Accept
            }
        } else {
            Admission::AlreadyDelivered
        }
    }

    /// Buffer an admitted payload.
    ///
    /// Call only after [`admit`](Self::admit) returned [`Admission::Accept`];
    /// buffering anything else is a logic error.
    pub fn buffer(&mut self, seq: u8, payload: Vec<u8>) {
        debug_assert_eq!(self.admit(seq), Admission::Accept);
        self.buffered.insert(seq, payload);
    }

    /// Remove and return the contiguous run of payloads starting at `base`,
    /// in sequence order, advancing `base` past each one.
    ///
    /// Returns an empty `Vec` when the packet at `base` has not arrived yet.
    pub fn drain_in_order(&mut self) -> Vec<Vec<u8>> {
        let mut run = Vec::new();
        while let Some(payload) = self.buffered.remove(&self.base) {
            run.push(payload);
            self.base = self.base.wrapping_add(1);
        }
        run
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
