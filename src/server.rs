//! Sender session: streams one file to one client (server role).
//!
//! # State machine
//!
//! ```text
//!  SEND_METADATA ──▶ AWAIT_METADATA_ACK ──▶ STREAMING ──▶ DRAINING ──▶ DONE
//!        │                   │                  │             │
//!        └───────────────────┴──────────────────┴─────────────┴──▶ FAILED
//! ```
//!
//! The handshake fails fast (one META, one bounded ACK wait, no retry);
//! in-window DATA delivery is persistent: every in-flight packet carries its
//! own retransmission timer that re-sends and re-arms itself until the ACK
//! arrives or the packet's retransmission budget runs out.
//!
//! # Concurrency
//!
//! A retransmission callback can fire concurrently with the main loop
//! processing an ACK, so every mutation of the window state goes through one
//! session-scoped `Mutex<SendWindow>`.  A cancelled timer whose callback is
//! mid-flight completes once; retransmitting an already-acknowledged packet
//! is a harmless duplicate for the receiver.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::SessionError;
use crate::metadata::TransferMetadata;
use crate::packet::{Packet, PacketKind};
use crate::send_window::SendWindow;
use crate::socket::Socket;
use crate::timer::{SchedulerStopped, TimerId, TimerScheduler};

// ---------------------------------------------------------------------------
// SenderState
// ---------------------------------------------------------------------------

/// Lifecycle of one sender session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Opening the requested file and building the META packet.
    SendMetadata,
    /// META sent; waiting (bounded) for the client's ACK.
    AwaitMetadataAck,
    /// Window-paced DATA transmission; file not yet exhausted.
    Streaming,
    /// File exhausted; waiting for the remaining in-flight ACKs.
    Draining,
    /// Everything acknowledged; END sent.
    Done,
    /// Terminal failure; the session is dead.
    Failed,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Retransmission context
// ---------------------------------------------------------------------------

/// Everything a retransmission callback needs, cloneable into the closure.
#[derive(Clone)]
struct RetransmitCtx {
    socket: Arc<Socket>,
    scheduler: Arc<TimerScheduler>,
    window: Arc<Mutex<SendWindow>>,
    peer: SocketAddr,
    interval: Duration,
    max_retransmits: u32,
    /// Written by a callback when a packet exhausts its budget; the main
    /// loop notices and fails the session.
    abandoned: Arc<Mutex<Option<u8>>>,
}

/// Arm a fresh retransmission timer for `seq`.
fn arm(ctx: &RetransmitCtx, seq: u8) -> Result<TimerId, SchedulerStopped> {
    let again = ctx.clone();
    ctx.scheduler
        .schedule(ctx.interval, move || retransmit_tick(again, seq))
}

/// One firing of a retransmission timer: re-send, then re-arm.
fn retransmit_tick(ctx: RetransmitCtx, seq: u8) {
    let mut win = ctx.window.lock().unwrap();
    let Some((pkt, tx_count)) = win.retransmit(seq) else {
        // ACKed between the timer firing and us taking the lock; the benign
        // cancel/fire race the protocol tolerates.
        return;
    };
    if tx_count > ctx.max_retransmits {
        drop(win);
        log::error!(
            "seq={seq} still unacknowledged after {} transmissions; giving up",
            tx_count - 1
        );
        *ctx.abandoned.lock().unwrap() = Some(seq);
        return;
    }

    log::debug!("timeout seq={seq} → retransmitting (attempt {tx_count})");
    if let Err(e) = ctx.socket.try_send_to(&pkt, ctx.peer) {
        // The next firing covers it; persistent failures hit the budget.
        log::warn!("retransmit of seq={seq} failed: {e}");
    }
    match arm(&ctx, seq) {
        Ok(id) => win.rearm(seq, id),
        Err(SchedulerStopped) => {} // session tearing down
    }
}

// ---------------------------------------------------------------------------
// SenderSession
// ---------------------------------------------------------------------------

/// One per accepted client, bound to its own ephemeral UDP endpoint.
pub struct SenderSession {
    socket: Arc<Socket>,
    scheduler: Arc<TimerScheduler>,
    window: Arc<Mutex<SendWindow>>,
    peer: SocketAddr,
    config: Config,
    state: SenderState,
    abandoned: Arc<Mutex<Option<u8>>>,
}

impl SenderSession {
    /// Bind an ephemeral local endpoint for a session addressed to `peer`.
    ///
    /// `config` is assumed validated (the CLI / host does this once at
    /// startup); the window constructor still asserts its own range.
    pub async fn new(peer: SocketAddr, config: Config) -> Result<Self, SessionError> {
        let socket = Arc::new(Socket::bind("0.0.0.0:0".parse().unwrap()).await?);
        log::info!("sender session for {peer} bound to {}", socket.local_addr);
        Ok(Self {
            socket,
            scheduler: TimerScheduler::new(),
            window: Arc::new(Mutex::new(SendWindow::new(config.window_size))),
            peer,
            config,
            state: SenderState::SendMetadata,
            abandoned: Arc::new(Mutex::new(None)),
        })
    }

    /// Local endpoint this session answers from.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Serve `path` to the peer: metadata handshake, windowed DATA stream,
    /// final END.  Consumes the session's usefulness either way; the timers
    /// and scheduler are torn down before returning.
    pub async fn serve(&mut self, path: &Path) -> Result<(), SessionError> {
        let result = self.run(path).await;
        if let Err(ref e) = result {
            self.state = SenderState::Failed;
            log::error!("sender session for {} failed: {e}", self.peer);
        }
        self.shutdown();
        result
    }

    async fn run(&mut self, path: &Path) -> Result<(), SessionError> {
        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) => {
                // Tell the client explicitly rather than letting it time out.
                let reason = format!("file unavailable: {}", path.display());
                let nack = Packet::new(0, PacketKind::Nack, reason.into_bytes());
                self.socket.send_to(&nack, self.peer).await?;
                return Err(SessionError::FileUnavailable(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };

        let file_size = file.metadata().await?.len();
        let meta =
            TransferMetadata::for_file(&path.to_string_lossy(), file_size, self.config.chunk_size);
        log::info!(
            "serving {} ({} bytes, {} packets) to {}",
            meta.output_name(),
            file_size,
            meta.total_packets,
            self.peer
        );

        self.socket
            .send_to(&Packet::new(0, PacketKind::Meta, meta.encode()), self.peer)
            .await?;

        // One bounded wait, no retry: handshake steps fail fast, only
        // in-window delivery is persistent.
        self.state = SenderState::AwaitMetadataAck;
        match timeout(self.config.handshake_timeout, self.socket.receive()).await {
            Ok(Ok(pkt)) if pkt.kind == PacketKind::Ack && !pkt.is_corrupted() => {
                log::debug!("metadata acknowledged by {}", self.peer);
            }
            Ok(Err(e)) => return Err(e.into()),
            _ => return Err(SessionError::HandshakeTimeout),
        }

        self.state = SenderState::Streaming;
        self.stream(&mut file).await?;

        self.state = SenderState::Done;
        self.socket
            .send_to(&Packet::control(0, PacketKind::End), self.peer)
            .await?;
        log::info!("transfer to {} complete", self.peer);
        Ok(())
    }

    /// The windowed streaming loop (DRAINING folds into the same loop once
    /// the file is exhausted).
    async fn stream(&mut self, file: &mut File) -> Result<(), SessionError> {
        let ctx = RetransmitCtx {
            socket: Arc::clone(&self.socket),
            scheduler: Arc::clone(&self.scheduler),
            window: Arc::clone(&self.window),
            peer: self.peer,
            interval: self.config.retransmit_interval,
            max_retransmits: self.config.max_retransmits,
            abandoned: Arc::clone(&self.abandoned),
        };
        let mut eof = false;

        loop {
            // Admit new packets while the window has room and data remains.
            while !eof && self.window.lock().unwrap().can_send() {
                let chunk = read_chunk(file, self.config.chunk_size).await?;
                if chunk.is_empty() {
                    eof = true;
                    break;
                }
                let seq = self.window.lock().unwrap().next_seq();
                let pkt = Packet::new(seq, PacketKind::Data, chunk);
                let timer = arm(&ctx, seq)?;
                self.window.lock().unwrap().record_sent(pkt.clone(), timer);
                self.socket.send_to(&pkt, self.peer).await?;
                log::debug!(
                    "→ DATA seq={seq} len={} in_flight={}",
                    pkt.payload.len(),
                    self.window.lock().unwrap().in_flight()
                );
            }

            if eof {
                let drained = self.window.lock().unwrap().is_drained();
                if drained {
                    return Ok(());
                }
                if self.state != SenderState::Draining {
                    self.state = SenderState::Draining;
                    log::debug!(
                        "file exhausted; draining {} in-flight packet(s)",
                        self.window.lock().unwrap().in_flight()
                    );
                }
            }

            // Wait (bounded) for the first reply, then drain everything
            // queued, so window advancement reflects all ACKs received so
            // far before new packets are admitted.
            match timeout(self.config.retransmit_interval, self.socket.receive()).await {
                Ok(Ok(pkt)) => self.process_reply(pkt),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {} // silence; the retransmission timers are on it
            }
            while let Some(pkt) = self.socket.try_receive()? {
                self.process_reply(pkt);
            }

            if let Some(seq) = *self.abandoned.lock().unwrap() {
                return Err(SessionError::RetransmitLimit(seq));
            }
        }
    }

    /// Handle one inbound ACK/NACK from the receiver.
    fn process_reply(&self, pkt: Packet) {
        if pkt.source != Some(self.peer) {
            log::debug!("ignoring packet from unexpected source {:?}", pkt.source);
            return;
        }
        if pkt.is_corrupted() {
            // Dropped unacknowledged; the relevant timer will resend.
            log::warn!("corrupt reply dropped (seq={})", pkt.seq);
            return;
        }
        match pkt.kind {
            PacketKind::Ack => {
                let timer = self.window.lock().unwrap().on_ack(pkt.seq);
                match timer {
                    Some(id) => {
                        self.scheduler.cancel(id);
                        log::debug!(
                            "← ACK seq={} base={}",
                            pkt.seq,
                            self.window.lock().unwrap().base()
                        );
                    }
                    None => log::debug!("duplicate/out-of-window ACK seq={}", pkt.seq),
                }
            }
            PacketKind::Nack => {
                // Receiver flagged a problem with this packet: resend now,
                // leaving the existing timer in place.
                if let Some((p, _)) = self.window.lock().unwrap().retransmit(pkt.seq) {
                    log::debug!("← NACK seq={} → immediate resend", pkt.seq);
                    if let Err(e) = self.socket.try_send_to(&p, self.peer) {
                        log::warn!("resend after NACK failed: {e}");
                    }
                }
            }
            other => log::debug!("ignoring {other} packet from receiver"),
        }
    }

    /// Cancel every pending retransmission, then stop the scheduler.
    fn shutdown(&self) {
        let timers = self.window.lock().unwrap().timers();
        for id in timers {
            self.scheduler.cancel(id);
        }
        self.scheduler.stop();
    }
}

/// Read up to `chunk_size` bytes, short only at end of file.
async fn read_chunk(file: &mut File, chunk_size: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
