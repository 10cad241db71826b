//! Reliable file transfer over UDP with selective-repeat ARQ.
//!
//! A server hosts a directory of files on a well-known UDP port; clients
//! request a file by path and receive it as a stream of checksummed,
//! individually-acknowledged DATA packets paced by a sliding window.
//! Sequence numbers are a single wrapping byte, so the window is capped at
//! half the sequence space to keep old and new packets distinguishable.
//!
//! ```text
//!   client                    host (:port)              sender session
//!     │                          │                       (ephemeral)
//!     │── GET path ─────────────▶│                           │
//!     │                          │── spawn ─────────────────▶│
//!     │◀───────────────────────────────────────── META ──────│
//!     │── ACK ───────────────────────────────────────────────▶
//!     │◀──────────────────────────────── DATA (windowed) ────│
//!     │── ACK per packet ────────────────────────────────────▶
//!     │◀───────────────────────────────────────── END ───────│
//! ```
//!
//! Reliability is asymmetric by design: handshake steps are fail-fast
//! (bounded waits, few retries), while in-window DATA delivery is persistent
//! (per-packet retransmission timers bounded only by a generous budget).
//! The receiver never retransmits anything — withholding an ACK *is* its
//! retransmission request.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod loss;
pub mod metadata;
pub mod packet;
pub mod recv_window;
pub mod send_window;
pub mod server;
pub mod socket;
pub mod timer;
pub mod window;
