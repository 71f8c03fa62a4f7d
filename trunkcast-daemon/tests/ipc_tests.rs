use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use trunkcast_broadcaster::BroadcastHub;
use trunkcast_daemon::{Daemon, IpcServer, SpectrumCapture};
use trunkcast_model::{CallStore, FftPacket, MemoryCallStore};
use trunkcast_spectrum::{Recording, RecordingMetadata, RecordingStore, Snapshot, SpectrumReplayer};
use trunkcast_status::StatusChannelListener;

fn recording(id: &str) -> Recording {
    let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    Recording {
        id: id.to_string(),
        metadata: RecordingMetadata {
            source_index: 0,
            center_frequency: 851_000_000,
            sample_rate: 2_400_000,
            fft_size: 1,
            min_frequency: 849_800_000,
            max_frequency: 852_200_000,
            duration_ms: 60_000,
        },
        snapshots: (0..3)
            .map(|i| Snapshot {
                timestamp: start + chrono::Duration::seconds(i * 30),
                offset_ms: i as u64 * 30_000,
                magnitudes: vec![-90.0],
            })
            .collect(),
    }
}

async fn start_server(dir: &TempDir) -> std::path::PathBuf {
    start_server_with_capture(dir).await.0
}

async fn start_server_with_capture(dir: &TempDir) -> (std::path::PathBuf, Arc<SpectrumCapture>) {
    let store = RecordingStore::new(dir.path().join("spectrum"));
    store.save(&recording("downtown")).unwrap();

    let capture = Arc::new(SpectrumCapture::new(store.clone()));
    let (replayer, _events) = SpectrumReplayer::new(store, 0);
    let (status, _status_events) = StatusChannelListener::new();
    let calls: Arc<dyn CallStore> = Arc::new(MemoryCallStore::new());
    let daemon = Arc::new(
        Daemon::new(replayer, BroadcastHub::new(8), status, calls)
            .with_capture(Arc::clone(&capture)),
    );

    let socket_path = dir.path().join("trunkcast.sock");
    let mut server = IpcServer::new(&socket_path, daemon).unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (socket_path, capture)
}

async fn send(socket_path: &Path, command: &str) -> String {
    let mut stream = UnixStream::connect(socket_path).await.unwrap();
    stream.write_all(command.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_status_reports_idle_daemon() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(&dir).await;

    let response = send(&socket, "status\n").await;
    assert!(response.ends_with('\n'));
    let status: serde_json::Value = serde_json::from_str(response.trim()).unwrap();
    assert_eq!(status["replay"]["state"], "idle");
    assert_eq!(status["viewers"], 0);
    assert_eq!(status["activeCalls"], 0);
    assert_eq!(status["statusChannelConnected"], false);
}

#[tokio::test]
async fn test_replay_lifecycle_over_socket() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(&dir).await;

    let listing: serde_json::Value =
        serde_json::from_str(send(&socket, "recordings").await.trim()).unwrap();
    assert_eq!(listing[0]["id"], "downtown");
    assert_eq!(listing[0]["snapshots"], 3);

    assert_eq!(send(&socket, "replay downtown loop").await, "Replaying downtown\n");
    let status: serde_json::Value =
        serde_json::from_str(send(&socket, "status").await.trim()).unwrap();
    assert_eq!(status["replay"]["state"], "replaying");
    assert_eq!(status["replay"]["recordingId"], "downtown");

    assert_eq!(send(&socket, "pause").await, "Replay paused\n");
    assert_eq!(send(&socket, "pause").await, "Nothing to pause\n");
    assert_eq!(send(&socket, "resume").await, "Replay resumed\n");
    assert_eq!(send(&socket, "stop").await, "Replay stopped\n");
    assert_eq!(send(&socket, "resume").await, "Nothing to resume\n");
}

#[tokio::test]
async fn test_errors_are_reported_inline() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(&dir).await;

    assert!(send(&socket, "replay nowhere").await.starts_with("Error: "));
    assert!(send(&socket, "replay ../etc/passwd").await.starts_with("Error: "));
    assert!(send(&socket, "toggle").await.starts_with("Error: Unknown command"));

    // The server keeps serving after errors
    assert_eq!(send(&socket, "clients").await, "[]\n");
}

#[tokio::test]
async fn test_record_then_stop_saves_capture() {
    let dir = TempDir::new().unwrap();
    let (socket, capture) = start_server_with_capture(&dir).await;

    assert_eq!(send(&socket, "record stop").await, "Nothing recorded\n");
    assert_eq!(send(&socket, "record evening 100").await, "Recording evening\n");
    assert!(send(&socket, "record other").await.starts_with("Error: Already recording"));

    let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    for i in 0..2 {
        capture.push(&FftPacket {
            source_index: 0,
            center_frequency: 851_000_000,
            sample_rate: 2_400_000,
            timestamp: start + chrono::Duration::milliseconds(i * 100),
            fft_size: 1,
            min_frequency: 849_800_000,
            max_frequency: 852_200_000,
            magnitudes: vec![-85.0],
        });
    }

    let status: serde_json::Value =
        serde_json::from_str(send(&socket, "status").await.trim()).unwrap();
    assert_eq!(status["capture"]["recordingId"], "evening");
    assert_eq!(status["capture"]["snapshots"], 2);

    assert_eq!(
        send(&socket, "record stop").await,
        "Saved evening (2 snapshots)\n"
    );
    let listing: serde_json::Value =
        serde_json::from_str(send(&socket, "recordings").await.trim()).unwrap();
    let ids: Vec<_> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["downtown", "evening"]);
}
