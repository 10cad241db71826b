//! Send-side sliding-window state machine.
//!
//! [`SendWindow`] tracks the in-flight DATA packets of one sender session.
//! Unlike Go-Back-N, acknowledgements are **selective**: each ACK names one
//! sequence number, removes exactly that entry, and the left window edge
//! advances only across contiguously acknowledged sequences.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets may be in flight at once.
//! - A packet stays in `outstanding` (with its retransmission timer handle)
//!   until the matching ACK arrives.
//! - `base` advances through the mod-256 space while consecutive sequence
//!   numbers are absent from `outstanding`, stopping at `next`.
//! - Sequence numbers are u8 and wrap modulo 256; the window is capped at
//!   [`MAX_WINDOW`](crate::window::MAX_WINDOW) so wrap-around comparisons
//!   stay unambiguous.
//!
//! This module only manages state; all socket I/O and timer arming is the
//! caller's responsibility.
//!
//! # Sequence-number layout
//!
//! ```text
//!     base               next
//!      │                  │
//!  ────┼──────────────────┼──────────────────▶ seq space (mod 256)
//!      │ <── in flight ──▶│ <── sendable ───▶
//! ```

use std::collections::HashMap;

use crate::packet::Packet;
use crate::timer::TimerId;
use crate::window::{in_window, MAX_WINDOW};

// ---------------------------------------------------------------------------
// OutstandingEntry
// ---------------------------------------------------------------------------

/// A single in-flight packet occupying one slot in the retransmit window.
#[derive(Debug)]
pub struct OutstandingEntry {
    /// The packet on the wire (kept for retransmission).
    pub packet: Packet,
    /// Handle of the pending retransmission timer.
    pub timer: TimerId,
    /// Total number of times this packet has been transmitted (1 = first send).
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Send-side window state for one sender session.
#[derive(Debug)]
pub struct SendWindow {
    /// Oldest unacknowledged sequence number (left window edge).
    base: u8,
    /// Sequence number to use for the next new packet.
    next: u8,
    /// Maximum number of packets in flight simultaneously.
    window_size: u8,
    /// In-flight packets keyed by sequence number.
    outstanding: HashMap<u8, OutstandingEntry>,
}

impl SendWindow {
    /// Create a new [`SendWindow`] starting at sequence 0.
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
            next: 0,
            window_size,
            outstanding: HashMap::with_capacity(window_size as usize),
        }
    }

    /// Left window edge.
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Sequence number the next new packet will carry.
    pub fn next_seq(&self) -> u8 {
        self.next
    }

    /// `true` when there is room for at least one more in-flight packet.
    pub fn can_send(&self) -> bool {
        self.next.wrapping_sub(self.base) < self.window_size
    }

    /// Number of packets currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    /// `true` when every transmitted packet has been acknowledged.
    pub fn is_drained(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Place a just-transmitted packet into the window with its timer handle
    /// and advance `next`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is already full.  Check
    /// [`can_send`](Self::can_send) before calling.
    pub fn record_sent(&mut self, packet: Packet, timer: TimerId) {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.in_flight(),
            self.window_size
        );
        debug_assert_eq!(packet.seq, self.next, "packet seq must equal next");
        self.outstanding.insert(
            packet.seq,
            OutstandingEntry {
                packet,
                timer,
                tx_count: 1,
            },
        );
        self.next = self.next.wrapping_add(1);
    }

    /// Process a selective ACK for `seq`.
    ///
    /// Removes the entry, advances `base` across contiguously acknowledged
    /// sequences, and returns the timer handle the caller must cancel.
    /// Returns `None` for a duplicate or out-of-window ACK.
    pub fn on_ack(&mut self, seq: u8) -> Option<TimerId> {
        if !in_window(seq, self.base, self.window_size) {
            return None;
        }
        let entry = self.outstanding.remove(&seq)?;

        if seq == self.base {
            while self.base != self.next && !self.outstanding.contains_key(&self.base) {
                self.base = self.base.wrapping_add(1);
            }
        }
        Some(entry.timer)
    }

    /// Look up an in-flight packet for retransmission, bumping its
    /// transmission count.
    ///
    /// Returns `None` when the packet was acknowledged in the meantime (the
    /// benign cancel/fire race — the caller just drops the retransmission).
    pub fn retransmit(&mut self, seq: u8) -> Option<(Packet, u32)> {
        let entry = self.outstanding.get_mut(&seq)?;
        entry.tx_count += 1;
        Some((entry.packet.clone(), entry.tx_count))
    }

    /// Replace the timer handle for `seq` after the retransmission callback
    /// re-armed itself with a fresh timer.
    pub fn rearm(&mut self, seq: u8, timer: TimerId) {
        if let Some(entry) = self.outstanding.get_mut(&seq) {
            entry.timer = timer;
        }
    }

    /// Timer handles of every in-flight packet; used on session teardown to
    /// cancel all pending retransmissions.
    pub fn timers(&self) -> Vec<TimerId> {
        self.outstanding.values().map(|e| e.timer).collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketKind;

    fn data_pkt(seq: u8) -> Packet {
        Packet::new(seq, PacketKind::Data, vec![seq; 4])
    }

    /// Fill the window with `n` packets using dummy timer ids.
    fn fill(w: &mut SendWindow, n: usize) {
        for i in 0..n {
            let pkt = data_pkt(w.next_seq());
            w.record_sent(pkt, TimerId(i as u64));
        }
    }

    #[test]
    fn initial_state() {
        let w = SendWindow::new(4);
        assert_eq!(w.base(), 0);
        assert_eq!(w.next_seq(), 0);
        assert!(w.can_send());
        assert!(w.is_drained());
    }

    #[test]
    fn window_full_blocks_send() {
        let mut w = SendWindow::new(2);
        fill(&mut w, 2);
        assert!(!w.can_send());
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn ack_of_base_advances_window() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 1);
        let timer = w.on_ack(0);
        assert_eq!(timer, Some(TimerId(0)));
        assert_eq!(w.base(), 1);
        assert!(w.is_drained());
    }

    #[test]
    fn out_of_order_acks_advance_base_across_gap() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 3); // seq 0, 1, 2 in flight

        // ACK 1 and 2 first: base must stay at 0.
        assert!(w.on_ack(1).is_some());
        assert!(w.on_ack(2).is_some());
        assert_eq!(w.base(), 0);
        assert_eq!(w.in_flight(), 1);

        // ACK of base jumps across the already-acknowledged run.
        assert!(w.on_ack(0).is_some());
        assert_eq!(w.base(), 3);
        assert!(w.is_drained());
    }

    #[test]
    fn duplicate_ack_returns_none() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 1);
        assert!(w.on_ack(0).is_some());
        assert!(w.on_ack(0).is_none());
    }

    #[test]
    fn ack_outside_window_ignored() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 2);
        assert!(w.on_ack(200).is_none());
        assert_eq!(w.base(), 0);
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn base_advance_stops_at_next() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 2);
        assert!(w.on_ack(0).is_some());
        assert!(w.on_ack(1).is_some());
        // base caught up with next; an empty outstanding map must not let it run away.
        assert_eq!(w.base(), 2);
        assert_eq!(w.next_seq(), 2);
    }

    #[test]
    fn retransmit_bumps_tx_count_until_acked() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 1);

        let (pkt, count) = w.retransmit(0).expect("in flight");
        assert_eq!(pkt.seq, 0);
        assert_eq!(count, 2);
        let (_, count) = w.retransmit(0).unwrap();
        assert_eq!(count, 3);

        assert!(w.on_ack(0).is_some());
        // Acked packet is gone; the racing timer callback gets None.
        assert!(w.retransmit(0).is_none());
    }

    #[test]
    fn rearm_replaces_timer_handle() {
        let mut w = SendWindow::new(4);
        fill(&mut w, 1);
        w.rearm(0, TimerId(99));
        assert_eq!(w.on_ack(0), Some(TimerId(99)));
    }

    #[test]
    fn seq_wraps_past_255() {
        let mut w = SendWindow::new(4);
        // Drive the window to base = next = 254.
        for _ in 0..254 {
            fill(&mut w, 1);
            let seq = w.next_seq().wrapping_sub(1);
            w.on_ack(seq).unwrap();
        }
        assert_eq!(w.base(), 254);

        fill(&mut w, 4); // seq 254, 255, 0, 1
        assert!(!w.can_send());

        assert!(w.on_ack(254).is_some());
        assert!(w.on_ack(255).is_some());
        assert!(w.on_ack(0).is_some());
        assert!(w.on_ack(1).is_some());
        assert_eq!(w.base(), 2);
        assert!(w.is_drained());
    }

    #[test]
    #[should_panic]
    fn zero_window_rejected() {
        SendWindow::new(0);
    }

    #[test]
    #[should_panic]
    fn oversized_window_rejected() {
        SendWindow::new(129);
    }
}
