//! Session host: the well-known endpoint that accepts transfer requests.
//!
//! The host owns only the rendezvous socket.  Every valid GET spawns an
//! independent [`SenderSession`](crate::server::SenderSession) on its own
//! ephemeral port, so concurrent clients never share transfer state and a
//! failed session never disturbs its neighbours.  The requested path is
//! resolved relative to the host's root directory.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::SessionError;
use crate::packet::PacketKind;
use crate::server::SenderSession;
use crate::socket::Socket;

/// Listens for GET packets and hands each one to a fresh sender session.
pub struct SessionHost {
    socket: Socket,
    root: PathBuf,
    config: Config,
}

impl SessionHost {
    /// Bind the rendezvous socket on `listen` and serve files under `root`.
    pub async fn bind(
        listen: SocketAddr,
        root: PathBuf,
        config: Config,
    ) -> Result<Self, SessionError> {
        let socket = Socket::bind(listen).await?;
        log::info!(
            "host listening on {} (root: {})",
            socket.local_addr,
            root.display()
        );
        Ok(Self {
            socket,
            root,
            config,
        })
    }

    /// Address the host is actually bound to (useful when `listen` used
    /// port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Accept requests forever.  Per-session failures are logged, never
    /// fatal to the host; only a rendezvous socket failure returns.
    pub async fn run(&self) -> Result<(), SessionError> {
        loop {
            let pkt = self.socket.receive().await?;
            let Some(peer) = pkt.source else { continue };

            if pkt.is_corrupted() {
                log::warn!("corrupt {} from {peer} dropped", pkt.kind);
                continue;
            }
            if pkt.kind != PacketKind::Get {
                log::debug!("ignoring {} from {peer} on the rendezvous port", pkt.kind);
                continue;
            }

            let requested = String::from_utf8_lossy(&pkt.payload).into_owned();
            log::info!("GET {requested} from {peer}");
            let path = self.root.join(&requested);
            let config = self.config.clone();

            tokio::spawn(async move {
                match SenderSession::new(peer, config).await {
                    Ok(mut session) => {
                        // serve() reports the failure to the client and logs
                        // it; nothing more for the host to do.
                        let _ = session.serve(&path).await;
                    }
                    Err(e) => log::error!("could not start session for {peer}: {e}"),
                }
            });
        }
    }
}
