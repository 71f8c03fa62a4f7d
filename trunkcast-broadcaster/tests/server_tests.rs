use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use trunkcast_broadcaster::{decode_binary_frame, BroadcastHub, HubServer};
use trunkcast_model::AudioPacket;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (HubServer, SocketAddr) {
    let server = HubServer::new("127.0.0.1:0".parse().unwrap(), BroadcastHub::new(16));
    server.start().await.unwrap();
    let addr = server.local_addr().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    client
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("no frame within 5s")
        .expect("socket ended")
        .unwrap()
}

/// Poll until `check` holds, for hub state changed by another task
async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_greeting_arrives_as_text() {
    let (server, addr) = start().await;
    let mut client = connect(addr).await;

    let greeting = next_message(&mut client).await;
    assert!(greeting.is_text());
    let json: serde_json::Value = serde_json::from_str(greeting.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "connected");

    let client_id = json["clientId"].as_str().unwrap().to_string();
    let info = server.hub().subscriber_info();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].client_id.to_string(), client_id);
}

#[tokio::test]
async fn test_socket_subscription_filters_audio() {
    let (server, addr) = start().await;
    let hub = server.hub().clone();
    let mut client = connect(addr).await;
    next_message(&mut client).await;

    client
        .send(Message::text(r#"{"type":"enableAudio","enabled":true}"#))
        .await
        .unwrap();
    client
        .send(Message::text(r#"{"type":"subscribe","talkgroups":[42]}"#))
        .await
        .unwrap();
    eventually(|| {
        hub.subscriber_info()
            .first()
            .is_some_and(|info| info.audio_enabled && info.talkgroups == vec![42])
    })
    .await;

    hub.broadcast_audio(&AudioPacket::new(7, vec![1, 1])).unwrap();
    hub.broadcast_audio(&AudioPacket::new(42, vec![2, 2])).unwrap();

    let frame = next_message(&mut client).await;
    assert!(frame.is_binary());
    let data = frame.into_data();
    let (header, payload) = decode_binary_frame(&data).unwrap();
    assert_eq!(header["type"], "audio");
    assert_eq!(header["talkgroupId"], 42);
    assert_eq!(payload, &[2, 0, 2, 0]);
}

#[tokio::test]
async fn test_close_removes_viewer() {
    let (server, addr) = start().await;
    let hub = server.hub().clone();
    let mut client = connect(addr).await;
    next_message(&mut client).await;
    assert_eq!(hub.connection_count(), 1);

    client.close(None).await.unwrap();
    eventually(|| hub.connection_count() == 0).await;
}

#[tokio::test]
async fn test_stop_closes_open_viewers() {
    let (server, addr) = start().await;
    let hub = server.hub().clone();
    let mut client = connect(addr).await;
    next_message(&mut client).await;

    server.stop().await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "viewer socket stayed open after stop");
    eventually(|| hub.connection_count() == 0).await;

    // Frames broadcast after stop reach nobody
    let stats = hub.broadcast_audio(&AudioPacket::new(42, vec![0])).unwrap();
    assert_eq!(stats.delivered, 0);
}
