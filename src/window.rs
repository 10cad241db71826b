//! Sequence-number window arithmetic shared by both session roles.
//!
//! Sequence numbers are 8-bit and wrap modulo 256.  With the window capped
//! at [`MAX_WINDOW`] = 128 (half the sequence space), the wrapping distance
//! `(seq - base) mod 256` unambiguously distinguishes "inside the window"
//! from "behind it": anything already delivered lands in `[128, 256)` and is
//! never admitted again.
//!
//! All comparisons use explicit wrapping arithmetic — never signed compares.

/// Upper bound on the configured window size (sender in-flight limit and
/// receiver reorder-buffer limit alike).
pub const MAX_WINDOW: u8 = 128;

/// `true` when `seq` lies within `[base, base + window_size)` mod 256.
#[inline]
pub fn in_window(seq: u8, base: u8, window_size: u8) -> bool {
    seq.wrapping_sub(base) < window_size
}
