//! Session-level error taxonomy.
//!
//! Transport-layer noise (malformed frames, failed checksums) never reaches
//! this type — it is absorbed at the socket and session receive paths.  A
//! [`SessionError`] is fatal to exactly one session; nothing here should
//! take down a host or a neighbouring transfer.

use crate::metadata::MetadataError;
use crate::socket::SocketError;
use crate::timer::SchedulerStopped;

/// Fatal conditions that end one transfer session.
#[derive(Debug)]
pub enum SessionError {
    /// No valid META/ACK arrived within the bounded handshake wait.
    HandshakeTimeout,
    /// The requested file is missing or unreadable on the sender side.
    FileUnavailable(String),
    /// The peer signalled failure with a NACK; payload is its reason.
    Rejected(String),
    /// Receiver saw no traffic for longer than the silence budget.
    TransferTimeout,
    /// A packet exhausted its retransmission budget without being ACKed.
    RetransmitLimit(u8),
    /// Timer armed after scheduler shutdown; indicates broken teardown order.
    Scheduler(SchedulerStopped),
    /// Persistent socket failure.
    Socket(SocketError),
    /// Local file I/O failure (reading the source, writing the output).
    Io(std::io::Error),
    /// META payload arrived intact but does not parse.
    Metadata(MetadataError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::HandshakeTimeout => write!(f, "handshake timed out"),
            SessionError::FileUnavailable(path) => write!(f, "file unavailable: {path}"),
            SessionError::Rejected(reason) => write!(f, "rejected by peer: {reason}"),
            SessionError::TransferTimeout => write!(f, "transfer timed out waiting for packets"),
            SessionError::RetransmitLimit(seq) => {
                write!(f, "packet seq={seq} exhausted its retransmission budget")
            }
            SessionError::Scheduler(e) => write!(f, "{e}"),
            SessionError::Socket(e) => write!(f, "{e}"),
            SessionError::Io(e) => write!(f, "file I/O error: {e}"),
            SessionError::Metadata(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SchedulerStopped> for SessionError {
    fn from(e: SchedulerStopped) -> Self {
        Self::Scheduler(e)
    }
}

impl From<SocketError> for SessionError {
    fn from(e: SocketError) -> Self {
        Self::Socket(e)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MetadataError> for SessionError {
    fn from(e: MetadataError) -> Self {
        Self::Metadata(e)
    }
}
