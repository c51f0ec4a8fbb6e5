//! End-to-end tests: `EntryDispatcher` + `WsConnector` against a local
//! tokio-tungstenite server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use chainsink_core::{
    decode_batch, DispatcherConfig, EntryDispatcher, EntryHandler, SessionState, SinkError,
    StateChangeEntry,
};
use chainsink_ws::WsConnector;

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Accepts WebSocket clients, counts handshakes and forwards text frames.
async fn spawn_server() -> (String, Arc<AtomicU32>, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/stream", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::unbounded_channel();

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        let _ = tx.send(text.to_string());
                    }
                }
            });
        }
    });

    (url, accepted, rx)
}

fn dispatcher(url: &str) -> EntryDispatcher {
    EntryDispatcher::builder(DispatcherConfig::websocket(url))
        .connector(Box::new(WsConnector::new()))
        .build()
        .unwrap()
}

fn batch(from: u64, len: u64) -> Vec<StateChangeEntry> {
    (from..from + len)
        .map(|h| StateChangeEntry::upsert(h, vec![0xab, h as u8]))
        .collect()
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("server channel closed")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dials_once_and_streams_each_batch_as_one_text_frame() {
    let (url, accepted, mut rx) = spawn_server().await;
    let mut d = dispatcher(&url);

    let first = batch(1, 3);
    let second = batch(4, 2);
    d.handle_entry_batch(&first).await.unwrap();
    d.handle_entry_batch(&second).await.unwrap();

    assert_eq!(decode_batch(next_message(&mut rx).await.as_bytes()).unwrap(), first);
    assert_eq!(decode_batch(next_message(&mut rx).await.as_bytes()).unwrap(), second);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(d.session_state(), Some(SessionState::Connected));
}

#[tokio::test]
async fn dial_failure_leaves_no_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("ws://{addr}/stream");

    let mut d = dispatcher(&url);
    let err = d.handle_entry_batch(&batch(1, 1)).await.unwrap_err();
    assert!(matches!(err, SinkError::Connect { .. }));
    assert_eq!(err.target(), Some(url.as_str()));
    assert_eq!(d.session_state(), Some(SessionState::NoSession));
}

#[tokio::test]
async fn below_watermark_does_not_dial() {
    let (url, accepted, mut rx) = spawn_server().await;
    let mut d = EntryDispatcher::builder(DispatcherConfig::websocket(&url).with_min_block_height(50))
        .connector(Box::new(WsConnector::new()))
        .build()
        .unwrap();

    d.handle_entry_batch(&batch(40, 20)).await.unwrap();
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
    assert_eq!(d.session_state(), Some(SessionState::NoSession));

    let kept = batch(50, 1);
    d.handle_entry_batch(&kept).await.unwrap();
    assert_eq!(decode_batch(next_message(&mut rx).await.as_bytes()).unwrap(), kept);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}
