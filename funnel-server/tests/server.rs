//! # Server Integration Tests
//!
//! Purpose: Exercise the TCP fan-in path end to end with the workspace's
//! blocking client.
//!
//! ## Design Principles
//!
//! 1. **End-to-End**: Drive the real listener over loopback TCP.
//! 2. **Isolated Server**: Bind an ephemeral port per test.
//! 3. **No Sleeps For Ordering**: Assertions wait on acknowledgements and
//!    channel receives, not timers.
//! 4. **Deterministic Shutdown**: Every test fires the stop signal it owns.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use funnel_client::FunnelClient;
use funnel_common::{ACK, FunnelError, Message};
use funnel_server::{Config, Metrics, Server, ServerHandle, server};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    messages_rx: mpsc::Receiver<Message>,
    metrics: Arc<Metrics>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        self.handle.shutdown();
        self.task.await.unwrap();
    }
}

async fn spawn_server(queue_capacity: usize) -> TestServer {
    let config = Config {
        addr: "127.0.0.1:0".to_string(),
        queue_capacity,
        read_buffer: 2048,
    };
    let (server, handle, messages_rx) = Server::with_config(config);
    let metrics = server.metrics();

    let listener = server::bind_listener("127.0.0.1:0").expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener address");
    let task = tokio::spawn(server.run(listener));

    TestServer {
        addr,
        handle,
        messages_rx,
        metrics,
        task,
    }
}

async fn recv(messages_rx: &mut mpsc::Receiver<Message>) -> Message {
    timeout(RECV_TIMEOUT, messages_rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("sink closed unexpectedly")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forwards_payload_and_acknowledges() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    let (ack, origin) = tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        let origin = client.local_addr().unwrap();
        let ack = client.send_acked(b"hello").unwrap();
        (ack, origin)
    })
    .await
    .unwrap();

    assert_eq!(ack, ACK);

    let msg = recv(&mut srv.messages_rx).await;
    assert_eq!(msg.payload.as_ref(), b"hello");
    assert_eq!(msg.origin, origin.to_string());

    let snapshot = srv.metrics.snapshot();
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.messages_total, 1);
    assert_eq!(snapshot.payload_bytes_total, 5);

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attributes_messages_to_their_origin() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    let a = tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        let origin = client.local_addr().unwrap();
        assert_eq!(client.send_acked(b"one").unwrap(), ACK);
        origin
    });
    let b = tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        let origin = client.local_addr().unwrap();
        assert_eq!(client.send_acked(b"two").unwrap(), ACK);
        origin
    });
    let origin_a = a.await.unwrap();
    let origin_b = b.await.unwrap();

    // Arrival order across connections is unspecified; attribution is not.
    let first = recv(&mut srv.messages_rx).await;
    let second = recv(&mut srv.messages_rx).await;
    assert_ne!(first.payload, second.payload);
    for msg in [first, second] {
        match msg.payload.as_ref() {
            b"one" => assert_eq!(msg.origin, origin_a.to_string()),
            b"two" => assert_eq!(msg.origin, origin_b.to_string()),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_disconnect_produces_no_message() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    tokio::task::spawn_blocking(move || {
        let client = FunnelClient::connect(addr).unwrap();
        client.close().unwrap();
    })
    .await
    .unwrap();

    let nothing = timeout(Duration::from_millis(300), srv.messages_rx.recv()).await;
    assert!(nothing.is_err(), "no message should reach the sink");

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn acks_follow_reads_in_order_per_connection() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        for payload in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            assert_eq!(client.send_acked(payload).unwrap(), ACK);
        }
    })
    .await
    .unwrap();

    for expected in [&b"first"[..], &b"second"[..], &b"third"[..]] {
        let msg = recv(&mut srv.messages_rx).await;
        assert_eq!(msg.payload.as_ref(), expected);
    }

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_sink_stalls_producer() {
    let mut srv = spawn_server(2).await;
    let addr = srv.addr;

    let client = tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        // Both enqueues succeed immediately, so both are acknowledged.
        assert_eq!(client.send_acked(b"one").unwrap(), ACK);
        assert_eq!(client.send_acked(b"two").unwrap(), ACK);

        // The sink is full: the reader suspends before acknowledging.
        client.send(b"three").unwrap();
        client
            .set_ack_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let err = client.read_ack().unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
        client
    })
    .await
    .unwrap();

    // Freeing one slot lets the reader finish the enqueue and acknowledge.
    let msg = recv(&mut srv.messages_rx).await;
    assert_eq!(msg.payload.as_ref(), b"one");

    let ack = tokio::task::spawn_blocking(move || {
        let mut client = client;
        client.set_ack_timeout(Some(RECV_TIMEOUT)).unwrap();
        client.read_ack().unwrap()
    })
    .await
    .unwrap();
    assert_eq!(ack, ACK);

    let msg = recv(&mut srv.messages_rx).await;
    assert_eq!(msg.payload.as_ref(), b"two");
    let msg = recv(&mut srv.messages_rx).await;
    assert_eq!(msg.payload.as_ref(), b"three");

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_loss_stays_isolated() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    tokio::task::spawn_blocking(move || {
        let mut survivor = FunnelClient::connect(addr).unwrap();
        assert_eq!(survivor.send_acked(b"before").unwrap(), ACK);

        let mut doomed = FunnelClient::connect(addr).unwrap();
        assert_eq!(doomed.send_acked(b"doomed").unwrap(), ACK);
        doomed.close().unwrap();

        // The surviving connection keeps working after the other dies.
        assert_eq!(survivor.send_acked(b"after").unwrap(), ACK);
    })
    .await
    .unwrap();

    let mut payloads = Vec::new();
    for _ in 0..3 {
        payloads.push(recv(&mut srv.messages_rx).await.payload);
    }
    assert!(payloads.iter().any(|p| p.as_ref() == b"doomed"));
    let before = payloads.iter().position(|p| p.as_ref() == b"before");
    let after = payloads.iter().position(|p| p.as_ref() == b"after");
    assert!(before.unwrap() < after.unwrap(), "per-connection order holds");

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejects_second_bind_on_same_address() {
    let srv = spawn_server(10).await;

    let (second, _handle, _messages_rx) = Server::new(srv.addr.to_string());
    let err = second.start().await.unwrap_err();
    assert!(matches!(err, FunnelError::Bind { .. }));
    assert!(err.is_fatal());

    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_sink_after_draining() {
    let mut srv = spawn_server(10).await;
    let addr = srv.addr;

    tokio::task::spawn_blocking(move || {
        let mut client = FunnelClient::connect(addr).unwrap();
        assert_eq!(client.send_acked(b"pending").unwrap(), ACK);
        client.close().unwrap();
    })
    .await
    .unwrap();

    srv.handle.shutdown();
    srv.task.await.unwrap();

    // Pending messages drain, then the closed sink reports end-of-stream.
    let msg = recv(&mut srv.messages_rx).await;
    assert_eq!(msg.payload.as_ref(), b"pending");
    let end = timeout(RECV_TIMEOUT, srv.messages_rx.recv())
        .await
        .expect("sink should close promptly");
    assert!(end.is_none());
}
