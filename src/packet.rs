//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed or truncated input.
//! - Computing and verifying the payload CRC32.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Sequence    |     Kind      |         Payload Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Payload Length (cont.)       |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       Checksum (cont.)        |           Payload ...         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 10 bytes.
//! seq(1) + kind(1) + payload_len(4) + checksum(4)
//!
//! The checksum covers the **payload only** and is verified separately from
//! structural decoding: a frame can decode cleanly and still be corrupt (see
//! [`Packet::is_corrupted`]).  Corrupt packets are dropped without an ACK so
//! the sender's retransmission timer recovers them.

use std::net::SocketAddr;

use crc::Crc;

/// Maximum UDP payload on a standard 1500-byte Ethernet MTU:
/// 1500 − 20 (IP header) − 8 (UDP header).
pub const UDP_MAX_PAYLOAD: usize = 1472;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 10;

/// Maximum payload bytes a single packet may carry.
pub const MAX_DATA: usize = UDP_MAX_PAYLOAD - HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_KIND: usize = 1;
const OFF_PAYLOAD_LEN: usize = 2;
const OFF_CHECKSUM: usize = 6;

/// CRC-32 (reflected polynomial 0xEDB88320, init 0xFFFFFFFF, final
/// complement) — the common "CRC-32" everyone means by default.
const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Compute the protocol checksum over a payload.
pub fn checksum(payload: &[u8]) -> u32 {
    CRC32.checksum(payload)
}

// ---------------------------------------------------------------------------
// PacketKind
// ---------------------------------------------------------------------------

/// Discriminates how a packet's payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// Unrecognised tag byte; never sent deliberately.
    Unknown = 0,
    /// Client → rendezvous port: request a file by path.
    Get = 1,
    /// Sender → receiver: one chunk of file content.
    Data = 2,
    /// Positive acknowledgement of the sequence number in the header.
    Ack = 3,
    /// Negative acknowledgement; payload carries a reason (e.g. file missing).
    Nack = 4,
    /// Transfer finished successfully; no payload.
    End = 5,
    /// Handshake metadata: filename, extension, size, packet count.
    Meta = 6,
}

impl From<u8> for PacketKind {
    fn from(tag: u8) -> Self {
        match tag {
            1 => PacketKind::Get,
            2 => PacketKind::Data,
            3 => PacketKind::Ack,
            4 => PacketKind::Nack,
            5 => PacketKind::End,
            6 => PacketKind::Meta,
            _ => PacketKind::Unknown,
        }
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PacketKind::Unknown => "UNKNOWN",
            PacketKind::Get => "GET",
            PacketKind::Data => "DATA",
            PacketKind::Ack => "ACK",
            PacketKind::Nack => "NACK",
            PacketKind::End => "END",
            PacketKind::Meta => "META",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A complete protocol datagram: header fields + payload bytes.
///
/// `source` is attached on receipt (never serialised) so replies can be
/// routed to the exact peer endpoint the packet came from — sessions move to
/// a dedicated per-client address after first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number; wraps modulo 256.
    pub seq: u8,
    /// Payload interpretation tag.
    pub kind: PacketKind,
    /// CRC32 over `payload` only.
    ///
    /// Filled in by [`Packet::new`]; verified by [`Packet::is_corrupted`].
    pub checksum: u32,
    /// Payload bytes, at most [`MAX_DATA`].
    pub payload: Vec<u8>,
    /// Transport-level origin, attached on receipt.
    pub source: Option<SocketAddr>,
}

impl Packet {
    /// Build a packet with its checksum computed from `payload`.
    pub fn new(seq: u8, kind: PacketKind, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_DATA, "payload exceeds MAX_DATA");
        let checksum = checksum(&payload);
        Self {
            seq,
            kind,
            checksum,
            payload,
            source: None,
        }
    }

    /// Build a payload-free control packet (ACK, NACK, END).
    pub fn control(seq: u8, kind: PacketKind) -> Self {
        Self::new(seq, kind, Vec::new())
    }

    /// `true` when the stored checksum disagrees with the payload.
    ///
    /// Independent of [`Packet::decode`] succeeding structurally: a frame can
    /// parse cleanly and still have been damaged in transit.
    pub fn is_corrupted(&self) -> bool {
        self.checksum != checksum(&self.payload)
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ] = self.seq;
        buf[OFF_KIND] = self.kind as u8;
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 4]
            .copy_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw byte slice, attaching `source`.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`], or
    /// - the `payload_len` field claims more bytes than the buffer holds.
    ///
    /// The checksum is **not** verified here — call [`Packet::is_corrupted`].
    pub fn decode(buf: &[u8], source: SocketAddr) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::TruncatedHeader);
        }

        let seq = buf[OFF_SEQ];
        let kind = PacketKind::from(buf[OFF_KIND]);
        let payload_len = u32::from_be_bytes(
            buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 4].try_into().unwrap(),
        ) as usize;
        let checksum = u32::from_be_bytes(buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].try_into().unwrap());

        if buf.len() < HEADER_LEN + payload_len {
            return Err(PacketError::TruncatedPayload);
        }

        Ok(Packet {
            seq,
            kind,
            checksum,
            payload: buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
            source: Some(source),
        })
    }
}

// ---------------------------------------------------------------------------
// PacketError
// ---------------------------------------------------------------------------

/// Errors that can arise when parsing a raw datagram (malformed frames).
#[derive(Debug, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    TruncatedHeader,
    /// `payload_len` field claims more bytes than the buffer holds.
    TruncatedPayload,
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::TruncatedHeader => write!(f, "buffer too short to contain a header"),
            PacketError::TruncatedPayload => {
                write!(f, "payload_len field claims more bytes than received")
            }
        }
    }
}

impl std::error::Error for PacketError {}
