//! Receiver session: requests a file and reassembles it (client role).
//!
//! # State machine
//!
//! ```text
//!  REQUESTING ──▶ HANDSHAKE ──▶ RECEIVING ──▶ COMPLETE
//!       │             │             │
//!       └─────────────┴─────────────┴──▶ FAILED
//! ```
//!
//! The receiver is the passive side of reliability: it never retransmits
//! DATA, it only decides — per inbound packet — whether to acknowledge.
//! Silence is its signal to the sender: a corrupt or (simulated-)lost packet
//! is simply never ACKed, and the sender's timer recovers it.
//!
//! The initial GET is the one receiver-side retry loop, and it is fail-fast:
//! a few bounded attempts, then give up.  Once DATA flows, the only fatal
//! receiver-side condition is total silence for longer than the configured
//! budget.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::{timeout, Instant};

use crate::config::Config;
use crate::error::SessionError;
use crate::loss::LossPolicy;
use crate::metadata::TransferMetadata;
use crate::packet::{Packet, PacketKind};
use crate::recv_window::{Admission, RecvWindow};
use crate::socket::Socket;

// ---------------------------------------------------------------------------
// ReceiverState
// ---------------------------------------------------------------------------

/// Lifecycle of one receiver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Sending GET and waiting (bounded, retried) for the server's reply.
    Requesting,
    /// META received; acknowledging it.
    Handshake,
    /// Accepting DATA, acknowledging, writing in-order chunks out.
    Receiving,
    /// END received; the file on disk is complete.
    Complete,
    /// Terminal failure.
    Failed,
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// TransferReport
// ---------------------------------------------------------------------------

/// Summary of a completed transfer.
#[derive(Debug)]
pub struct TransferReport {
    /// Metadata the sender announced during the handshake.
    pub metadata: TransferMetadata,
    /// Where the reassembled file was written.
    pub output_path: PathBuf,
    /// Bytes written to `output_path`.
    pub bytes_written: u64,
    /// Distinct DATA packets delivered (duplicates not counted).
    pub packets_delivered: u64,
}

// ---------------------------------------------------------------------------
// ReceiverSession
// ---------------------------------------------------------------------------

/// Fetches one file from a server and writes it to a local directory.
pub struct ReceiverSession {
    socket: Socket,
    /// Well-known server endpoint the GET goes to.
    server: SocketAddr,
    config: Config,
    state: ReceiverState,
    loss: LossPolicy,
}

impl ReceiverSession {
    /// Bind an ephemeral local endpoint for a session against `server`.
    pub async fn new(server: SocketAddr, config: Config) -> Result<Self, SessionError> {
        let socket = Socket::bind("0.0.0.0:0".parse().unwrap()).await?;
        let loss = if config.loss_rate > 0.0 {
            LossPolicy::new(config.loss_rate)
        } else {
            LossPolicy::disabled()
        };
        Ok(Self {
            socket,
            server,
            config,
            state: ReceiverState::Requesting,
            loss,
        })
    }

    /// Replace the loss policy (tests use a seeded one for reproducibility).
    pub fn set_loss(&mut self, loss: LossPolicy) {
        self.loss = loss;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Request `remote_path` from the server and write the reassembled file
    /// into `output_dir`, named from the sender's metadata.
    pub async fn fetch(
        &mut self,
        remote_path: &str,
        output_dir: &Path,
    ) -> Result<TransferReport, SessionError> {
        let result = self.run(remote_path, output_dir).await;
        if let Err(ref e) = result {
            self.state = ReceiverState::Failed;
            log::error!("receiver session failed: {e}");
        }
        result
    }

    async fn run(
        &mut self,
        remote_path: &str,
        output_dir: &Path,
    ) -> Result<TransferReport, SessionError> {
        let (meta, peer) = self.request(remote_path).await?;

        self.state = ReceiverState::Handshake;
        log::info!(
            "incoming: {} ({} bytes, {} packets) from {peer}",
            meta.output_name(),
            meta.file_size,
            meta.total_packets
        );
        self.socket
            .send_to(&Packet::control(0, PacketKind::Ack), peer)
            .await?;

        self.state = ReceiverState::Receiving;
        let output_path = output_dir.join(meta.output_name());
        let report = self.receive_data(peer, meta, output_path).await?;

        self.state = ReceiverState::Complete;
        log::info!(
            "transfer complete: {} ({} bytes, {} packets)",
            report.output_path.display(),
            report.bytes_written,
            report.packets_delivered
        );
        Ok(report)
    }

    /// Send GET (with bounded retries) and wait for META or NACK.
    async fn request(
        &mut self,
        remote_path: &str,
    ) -> Result<(TransferMetadata, SocketAddr), SessionError> {
        let get = Packet::new(0, PacketKind::Get, remote_path.as_bytes().to_vec());

        for attempt in 1..=self.config.request_retries {
            log::debug!(
                "→ GET {remote_path} (attempt {attempt}/{})",
                self.config.request_retries
            );
            self.socket.send_to(&get, self.server).await?;

            // The reply arrives from the session's fresh ephemeral endpoint,
            // not the well-known port, so no source filter here.
            let deadline = Instant::now() + self.config.handshake_timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let pkt = match timeout(remaining, self.socket.receive()).await {
                    Ok(Ok(pkt)) => pkt,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => break, // attempt timed out; resend GET
                };
                if pkt.is_corrupted() {
                    log::warn!("corrupt {} during handshake; dropped", pkt.kind);
                    continue;
                }
                match pkt.kind {
                    PacketKind::Meta => {
                        let meta = TransferMetadata::decode(&pkt.payload)?;
                        let peer = pkt.source.ok_or(SessionError::HandshakeTimeout)?;
                        return Ok((meta, peer));
                    }
                    PacketKind::Nack => {
                        let reason = String::from_utf8_lossy(&pkt.payload).into_owned();
                        return Err(SessionError::Rejected(reason));
                    }
                    other => log::debug!("ignoring {other} during handshake"),
                }
            }
        }
        Err(SessionError::HandshakeTimeout)
    }

    /// The DATA acceptance loop, RECEIVING until END (or a fatal condition).
    async fn receive_data(
        &mut self,
        peer: SocketAddr,
        meta: TransferMetadata,
        output_path: PathBuf,
    ) -> Result<TransferReport, SessionError> {
        let mut window = RecvWindow::new(self.config.window_size);
        let mut file = File::create(&output_path).await?;
        let mut bytes_written: u64 = 0;
        let mut packets_delivered: u64 = 0;

        loop {
            let pkt = match timeout(self.config.receive_timeout, self.socket.receive()).await {
                Ok(Ok(pkt)) => pkt,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(SessionError::TransferTimeout),
            };

            if pkt.source != Some(peer) {
                log::debug!("ignoring packet from unexpected source {:?}", pkt.source);
                continue;
            }
            if pkt.is_corrupted() {
                // Dropped without an ACK; the sender's timer resends it.
                log::warn!("corrupt {} seq={} dropped", pkt.kind, pkt.seq);
                continue;
            }

            match pkt.kind {
                PacketKind::Data => {
                    match window.admit(pkt.seq) {
                        Admission::Accept => {
                            if self.loss.should_drop() {
                                log::debug!("simulating loss of DATA seq={}", pkt.seq);
                                continue;
                            }
                            window.buffer(pkt.seq, pkt.payload);
                            for chunk in window.drain_in_order() {
                                bytes_written += chunk.len() as u64;
                                packets_delivered += 1;
                                file.write_all(&chunk).await?;
                            }
                            log::debug!(
                                "← DATA seq={} ({packets_delivered}/{} delivered)",
                                pkt.seq,
                                meta.total_packets
                            );
                        }
                        Admission::Duplicate | Admission::AlreadyDelivered => {
                            // The earlier ACK was lost; repeat it so the
                            // sender's window can advance.
                            log::debug!("duplicate DATA seq={}; re-acknowledging", pkt.seq);
                        }
                    }
                    self.socket
                        .send_to(&Packet::control(pkt.seq, PacketKind::Ack), peer)
                        .await?;
                }
                PacketKind::End => {
                    file.flush().await?;
                    return Ok(TransferReport {
                        metadata: meta,
                        output_path,
                        bytes_written,
                        packets_delivered,
                    });
                }
                PacketKind::Nack => {
                    let reason = String::from_utf8_lossy(&pkt.payload).into_owned();
                    return Err(SessionError::Rejected(reason));
                }
                other => log::debug!("ignoring {other} mid-transfer"),
            }
        }
    }
}
