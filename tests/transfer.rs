//! Loopback end-to-end transfers: a real host, a real client, real UDP.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UdpSocket;

use chroma_transfer::client::{ReceiverSession, TransferReport};
use chroma_transfer::config::Config;
use chroma_transfer::error::SessionError;
use chroma_transfer::host::SessionHost;
use chroma_transfer::loss::LossPolicy;
use chroma_transfer::packet::{Packet, PacketKind};

/// A throwaway directory under the system temp dir, unique per test.
fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("chroma-it-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Timeouts tightened so failure-path tests finish quickly.
fn fast_config() -> Config {
    Config {
        retransmit_interval: Duration::from_millis(50),
        handshake_timeout: Duration::from_millis(300),
        receive_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// Spin up a host serving `root` and run one fetch against it.
async fn fetch_from_host(
    root: PathBuf,
    output: PathBuf,
    remote_path: &str,
    config: Config,
    loss: Option<LossPolicy>,
) -> Result<TransferReport, SessionError> {
    let host = SessionHost::bind("127.0.0.1:0".parse().unwrap(), root, config.clone())
        .await
        .unwrap();
    let server = host.local_addr();
    tokio::spawn(async move { host.run().await });

    let mut session = ReceiverSession::new(server, config).await.unwrap();
    if let Some(loss) = loss {
        session.set_loss(loss);
    }
    session.fetch(remote_path, &output).await
}

#[tokio::test]
async fn transfers_small_file_intact() {
    let root = scratch_dir("small-root");
    let output = scratch_dir("small-out");
    let body = b"hello over an unreliable wire".to_vec();
    tokio::fs::write(root.join("greeting.txt"), &body)
        .await
        .unwrap();

    let report = fetch_from_host(root, output.clone(), "greeting.txt", fast_config(), None)
        .await
        .unwrap();

    assert_eq!(report.bytes_written, body.len() as u64);
    assert_eq!(report.packets_delivered, 1);
    let got = tokio::fs::read(output.join("greeting.txt")).await.unwrap();
    assert_eq!(got, body);
}

#[tokio::test]
async fn survives_ten_percent_simulated_loss() {
    // 10 full chunks, window 5, every dropped packet recovered by
    // retransmission; the file must come out byte-identical.
    let root = scratch_dir("loss-root");
    let output = scratch_dir("loss-out");
    let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(root.join("payload.bin"), &body)
        .await
        .unwrap();

    let report = fetch_from_host(
        root,
        output.clone(),
        "payload.bin",
        fast_config(),
        Some(LossPolicy::with_seed(0.1, 1234)),
    )
    .await
    .unwrap();

    assert_eq!(report.bytes_written, 10_000);
    assert_eq!(report.packets_delivered, 10);
    assert_eq!(report.metadata.total_packets, 10);
    let got = tokio::fs::read(output.join("payload.bin")).await.unwrap();
    assert_eq!(got, body);
}

#[tokio::test]
async fn sequence_numbers_wrap_across_long_transfers() {
    // 300 packets of 100 bytes: the one-byte sequence number wraps once.
    let root = scratch_dir("wrap-root");
    let output = scratch_dir("wrap-out");
    let body: Vec<u8> = (0..30_000u32).map(|i| (i / 100) as u8).collect();
    tokio::fs::write(root.join("long.bin"), &body).await.unwrap();

    let config = Config {
        chunk_size: 100,
        window_size: 8,
        ..fast_config()
    };
    let report = fetch_from_host(root, output.clone(), "long.bin", config, None)
        .await
        .unwrap();

    assert_eq!(report.packets_delivered, 300);
    let got = tokio::fs::read(output.join("long.bin")).await.unwrap();
    assert_eq!(got, body);
}

#[tokio::test]
async fn empty_file_transfers_as_zero_packets() {
    let root = scratch_dir("empty-root");
    let output = scratch_dir("empty-out");
    tokio::fs::write(root.join("nothing.dat"), b"").await.unwrap();

    let report = fetch_from_host(root, output.clone(), "nothing.dat", fast_config(), None)
        .await
        .unwrap();

    assert_eq!(report.bytes_written, 0);
    assert_eq!(report.packets_delivered, 0);
    assert!(tokio::fs::read(output.join("nothing.dat"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn missing_file_is_rejected_with_reason() {
    let root = scratch_dir("missing-root");
    let output = scratch_dir("missing-out");

    let err = fetch_from_host(root, output, "no-such-file.txt", fast_config(), None)
        .await
        .unwrap_err();

    match err {
        SessionError::Rejected(reason) => assert!(reason.contains("unavailable")),
        other => panic!("expected Rejected, got {other}"),
    }
}

#[tokio::test]
async fn silent_server_times_out_the_request() {
    // A bound socket that never answers: the GET retries, then gives up.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server = silent.local_addr().unwrap();

    let config = Config {
        handshake_timeout: Duration::from_millis(100),
        request_retries: 2,
        ..fast_config()
    };
    let mut session = ReceiverSession::new(server, config).await.unwrap();
    let err = session
        .fetch("anything.txt", &scratch_dir("silent-out"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::HandshakeTimeout));
}

#[tokio::test]
async fn corrupt_metadata_is_never_trusted() {
    // A fake server answers the GET with a META whose payload was flipped
    // after checksumming; the client must drop it and time out rather than
    // act on bad metadata.
    let fake = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server = fake.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        let (_, from) = fake.recv_from(&mut buf).await.unwrap();
        let meta = b"evil.bin\0bin\010000\010\0".to_vec();
        let mut bytes = Packet::new(0, PacketKind::Meta, meta).encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fake.send_to(&bytes, from).await.unwrap();
    });

    let config = Config {
        handshake_timeout: Duration::from_millis(150),
        request_retries: 1,
        ..fast_config()
    };
    let mut session = ReceiverSession::new(server, config).await.unwrap();
    let err = session
        .fetch("anything.txt", &scratch_dir("corrupt-out"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::HandshakeTimeout));
}

#[tokio::test]
async fn concurrent_fetches_do_not_interfere() {
    let root = scratch_dir("multi-root");
    let out_a = scratch_dir("multi-out-a");
    let out_b = scratch_dir("multi-out-b");
    let body_a: Vec<u8> = (0..5_000u32).map(|i| (i % 13) as u8).collect();
    let body_b: Vec<u8> = (0..7_000u32).map(|i| (i % 17) as u8).collect();
    tokio::fs::write(root.join("a.bin"), &body_a).await.unwrap();
    tokio::fs::write(root.join("b.bin"), &body_b).await.unwrap();

    let config = fast_config();
    let host = SessionHost::bind("127.0.0.1:0".parse().unwrap(), root, config.clone())
        .await
        .unwrap();
    let server = host.local_addr();
    tokio::spawn(async move { host.run().await });

    let cfg_a = config.clone();
    let out_a2 = out_a.clone();
    let fetch_a = tokio::spawn(async move {
        let mut s = ReceiverSession::new(server, cfg_a).await.unwrap();
        s.fetch("a.bin", &out_a2).await
    });
    let out_b2 = out_b.clone();
    let fetch_b = tokio::spawn(async move {
        let mut s = ReceiverSession::new(server, config).await.unwrap();
        s.fetch("b.bin", &out_b2).await
    });

    fetch_a.await.unwrap().unwrap();
    fetch_b.await.unwrap().unwrap();

    assert_eq!(tokio::fs::read(out_a.join("a.bin")).await.unwrap(), body_a);
    assert_eq!(tokio::fs::read(out_b.join("b.bin")).await.unwrap(), body_b);
}
