use std::net::SocketAddr;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use trunkcast_status::{server, StatusChannelListener, StatusEvent};

const CALL_START: &str = r#"{"type":"call_start","call":{"id":"0_77_1700000000",
    "talkgroup":77,"freq":851012500,"startTime":1700000000}}"#;

async fn start() -> (SocketAddr, mpsc::UnboundedReceiver<StatusEvent>) {
    let (listener, events) = StatusChannelListener::new();
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    tokio::spawn(server::serve_listener(tcp, listener));
    (addr, events)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<StatusEvent>) -> StatusEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no status event within 5s")
        .expect("event stream closed")
}

#[tokio::test]
async fn test_second_producer_is_refused() {
    let (addr, mut events) = start().await;
    let url = format!("ws://{addr}/");

    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert_eq!(next_event(&mut events).await, StatusEvent::Connected);

    match tokio_tungstenite::connect_async(url.as_str()).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status().as_u16(), 409),
        Err(e) => panic!("expected HTTP 409, got {e}"),
        Ok(_) => panic!("second producer was accepted"),
    }

    // The slot frees up once the first producer leaves
    first.close(None).await.unwrap();
    assert_eq!(next_event(&mut events).await, StatusEvent::Disconnected);
    let (_second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert_eq!(next_event(&mut events).await, StatusEvent::Connected);
}

#[tokio::test]
async fn test_binary_frames_carry_utf8_messages() {
    let (addr, mut events) = start().await;
    let (mut producer, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, StatusEvent::Connected);

    // Invalid UTF-8 is dropped without closing the connection
    producer
        .send(Message::binary(vec![0xff, 0xfe, 0x00]))
        .await
        .unwrap();
    producer
        .send(Message::binary(CALL_START.as_bytes().to_vec()))
        .await
        .unwrap();

    match next_event(&mut events).await {
        StatusEvent::CallStart(call) => {
            assert_eq!(call.talkgroup_id, 77);
            assert_eq!(call.frequency, 851_012_500);
        }
        other => panic!("expected callStart, got {other:?}"),
    }

    producer
        .send(Message::text(r#"{"type":"rates","rates":[{"id":0,"decoderate":38.5}]}"#))
        .await
        .unwrap();
    match next_event(&mut events).await {
        StatusEvent::Rates(rates) => assert_eq!(rates[0].decoderate, 38.5),
        other => panic!("expected rates, got {other:?}"),
    }
}
