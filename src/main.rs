//! `chroma` — reliable UDP file transfer.
//!
//! Two subcommands: `serve` hosts a directory, `fetch` downloads one file.
//! Logging goes through `env_logger`; set `RUST_LOG=debug` to watch the
//! per-packet window/ACK traffic.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use chroma_transfer::client::ReceiverSession;
use chroma_transfer::config::Config;
use chroma_transfer::host::SessionHost;

#[derive(Parser)]
#[command(name = "chroma", about = "Reliable file transfer over UDP", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host a directory of files for download.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:9000")]
        listen: SocketAddr,
        /// Directory requested paths are resolved under.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Download one file from a server.
    Fetch {
        /// Server address (host:port).
        server: SocketAddr,
        /// Path of the file on the server, relative to its root.
        path: String,
        /// Directory the received file is written into.
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// Simulated inbound loss probability, for exercising retransmission.
        #[arg(long, default_value_t = 0.0)]
        loss_rate: f64,
        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Protocol knobs shared by both roles.
#[derive(Args)]
struct Tuning {
    /// Sliding-window size in packets (1..=128).
    #[arg(long, default_value_t = 5)]
    window: u8,
    /// File bytes per DATA packet.
    #[arg(long, default_value_t = 1000)]
    chunk: usize,
    /// Retransmission interval in milliseconds.
    #[arg(long, default_value_t = 200)]
    retransmit_ms: u64,
}

fn build_config(tuning: &Tuning, loss_rate: f64) -> Config {
    Config {
        window_size: tuning.window,
        chunk_size: tuning.chunk,
        retransmit_interval: Duration::from_millis(tuning.retransmit_ms),
        loss_rate,
        ..Config::default()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Serve {
            listen,
            root,
            tuning,
        } => {
            let config = build_config(&tuning, 0.0);
            config.validate()?;
            let host = SessionHost::bind(listen, root, config).await?;
            host.run().await?;
            Ok(())
        }
        Command::Fetch {
            server,
            path,
            output,
            loss_rate,
            tuning,
        } => {
            let config = build_config(&tuning, loss_rate);
            config.validate()?;
            let mut session = ReceiverSession::new(server, config).await?;
            let report = session.fetch(&path, &output).await?;
            println!(
                "received {} ({} bytes, {} packets)",
                report.output_path.display(),
                report.bytes_written,
                report.packets_delivered
            );
            Ok(())
        }
    }
}
