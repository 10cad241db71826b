//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O.
//!
//! Malformed datagrams (frames that fail structural decoding) are absorbed
//! here: logged and treated as if nothing arrived, never surfaced to session
//! logic.  Checksum verification is **not** done here — a structurally valid
//! but corrupt packet is handed up so the session can drop it un-ACKed.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError, UDP_MAX_PAYLOAD};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    Io(std::io::Error),
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "socket I/O error: {e}"),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<std::io::Error> for SocketError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared between a session's
/// main loop and its retransmission callbacks via `Arc`.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port — this is how each
    /// sender session gets its own per-client endpoint.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `packet` and send it as a single UDP datagram to `dest`.
    ///
    /// Returns the number of bytes put on the wire.
    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<usize, SocketError> {
        let bytes = packet.encode();
        let sent = self.inner.send_to(&bytes, dest).await?;
        Ok(sent)
    }

    /// Non-blocking variant of [`send_to`](Self::send_to) for contexts that
    /// cannot await (retransmission timer callbacks).
    ///
    /// A would-block condition returns `Ok(0)` — the caller treats it as
    /// "try later", which for a retransmission simply means the next timer
    /// firing covers it.
    pub fn try_send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<usize, SocketError> {
        let bytes = packet.encode();
        match self.inner.try_send_to(&bytes, dest) {
            Ok(sent) => Ok(sent),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Receive the next structurally valid packet, blocking until one arrives.
    ///
    /// Malformed frames are logged and skipped; the caller never sees them.
    /// Wrap in `tokio::time::timeout` to bound the wait.
    pub async fn receive(&self) -> Result<Packet, SocketError> {
        let mut buf = vec![0u8; UDP_MAX_PAYLOAD];
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf).await?;
            match Packet::decode(&buf[..n], addr) {
                Ok(pkt) => return Ok(pkt),
                Err(e @ PacketError::TruncatedHeader) | Err(e @ PacketError::TruncatedPayload) => {
                    log::warn!("dropping malformed frame from {addr} ({n} bytes): {e}");
                }
            }
        }
    }

    /// Attempt one non-blocking read.
    ///
    /// Returns `Ok(None)` when no datagram is queued or the queued frame was
    /// malformed; `Ok(Some(_))` for a structurally valid packet.
    pub fn try_receive(&self) -> Result<Option<Packet>, SocketError> {
        let mut buf = vec![0u8; UDP_MAX_PAYLOAD];
        match self.inner.try_recv_from(&mut buf) {
            Ok((n, addr)) => match Packet::decode(&buf[..n], addr) {
                Ok(pkt) => Ok(Some(pkt)),
                Err(e) => {
                    log::warn!("dropping malformed frame from {addr} ({n} bytes): {e}");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Block up to `timeout` for the socket to become readable.
    ///
    /// Used to bound handshake steps that must stay synchronous.
    pub async fn wait_readable(&self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.inner.readable()).await,
            Ok(Ok(()))
        )
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketKind;

    async fn ephemeral() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind failed")
    }

    #[tokio::test]
    async fn send_and_receive_roundtrip() {
        let a = ephemeral().await;
        let b = ephemeral().await;

        let pkt = Packet::new(9, PacketKind::Data, b"payload".to_vec());
        let sent = a.send_to(&pkt, b.local_addr).await.unwrap();
        assert_eq!(sent, pkt.encode().len());

        let got = b.receive().await.unwrap();
        assert_eq!(got.seq, 9);
        assert_eq!(got.payload, b"payload");
        assert_eq!(got.source, Some(a.local_addr));
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let a = ephemeral().await;
        let b = ephemeral().await;

        // Raw garbage shorter than a header, then a valid packet.
        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&[1, 2, 3], b.local_addr).await.unwrap();
        a.send_to(&Packet::control(1, PacketKind::Ack), b.local_addr)
            .await
            .unwrap();

        let got = b.receive().await.unwrap();
        assert_eq!(got.kind, PacketKind::Ack);
        assert_eq!(got.seq, 1);
    }

    #[tokio::test]
    async fn try_receive_on_empty_socket_returns_none() {
        let sock = ephemeral().await;
        assert!(sock.try_receive().unwrap().is_none());
    }

    #[tokio::test]
    async fn wait_readable_times_out_on_silence() {
        let sock = ephemeral().await;
        assert!(!sock.wait_readable(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn wait_readable_sees_queued_datagram() {
        let a = ephemeral().await;
        let b = ephemeral().await;
        a.send_to(&Packet::control(0, PacketKind::Get), b.local_addr)
            .await
            .unwrap();
        assert!(b.wait_readable(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn corrupt_but_well_formed_packet_is_delivered() {
        // Corruption is the session's business, not the socket's.
        let a = ephemeral().await;
        let b = ephemeral().await;

        let mut bytes = Packet::new(5, PacketKind::Data, b"abcd".to_vec()).encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&bytes, b.local_addr).await.unwrap();
        drop(a);

        let got = b.receive().await.unwrap();
        assert!(got.is_corrupted());
    }
}
