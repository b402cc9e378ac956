//! Universal properties from the testable-properties design: response
//! ordering and serialized Application dispatch across concurrent
//! connections.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use abci_link::config::{Address, ClientConfig, ServerConfig};
use abci_link::server::SocketServer;
use abci_link::types::Result;
use abci_link::{Application, SocketClient};
use async_trait::async_trait;

use support::CounterApplication;

#[tokio::test]
async fn responses_arrive_in_request_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ordering.sock");
    let addr = format!("unix://{}", path.display());

    let app = Arc::new(CounterApplication::new());
    tokio::spawn(SocketServer::serve(
        Address::parse_for_server(&addr).unwrap(),
        app,
        ServerConfig::default(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = SocketClient::new(
        Address::parse_for_client(&addr).unwrap(),
        ClientConfig {
            must_connect: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut handles = Vec::new();
    for i in 0u32..200 {
        handles.push(client.deliver_tx_async(i.to_be_bytes().to_vec()).await.unwrap());
    }
    client.flush_sync().await.unwrap();

    // Each handle completes (1:1 completion) and, since DeliverTx is the
    // only variant in flight, their completion order on this connection
    // matches enqueue order because the in-flight queue is strict FIFO.
    for handle in &handles {
        assert!(handle.wait().await.is_some());
    }
}

/// An Application that records whether two calls ever overlapped. If the
/// server's dispatch mutex were not held across the call, two concurrent
/// `deliver_tx` invocations from different connections would race and this
/// would observe `active > 1`.
struct OverlapDetectingApplication {
    active: AtomicUsize,
    saw_overlap: Mutex<bool>,
}

impl OverlapDetectingApplication {
    fn new() -> Self {
        OverlapDetectingApplication {
            active: AtomicUsize::new(0),
            saw_overlap: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Application for OverlapDetectingApplication {
    async fn deliver_tx(&self, _tx: &[u8]) -> Result {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        if now > 1 {
            *self.saw_overlap.lock().unwrap() = true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Result::ok()
    }
}

#[tokio::test]
async fn application_dispatch_is_serialized_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serial.sock");
    let addr = format!("unix://{}", path.display());

    let app = Arc::new(OverlapDetectingApplication::new());
    tokio::spawn(SocketServer::serve(
        Address::parse_for_server(&addr).unwrap(),
        app.clone(),
        ServerConfig::default(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(
            SocketClient::new(
                Address::parse_for_client(&addr).unwrap(),
                ClientConfig {
                    must_connect: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap(),
        );
    }

    let mut join_set = Vec::new();
    for client in clients {
        join_set.push(tokio::spawn(async move {
            client.deliver_tx_sync(b"x".to_vec()).await.unwrap();
        }));
    }
    for handle in join_set {
        handle.await.unwrap();
    }

    assert!(
        !*app.saw_overlap.lock().unwrap(),
        "two deliver_tx calls ran concurrently; dispatch mutex is not serializing"
    );
}
