//! 明文 TCP 传输的端到端行为：回显、并发发送、关闭与对端断开。

mod support;

use std::{sync::Arc, time::Duration};

use kitten_socket::{
    ByteTransport, ConnectOptions, ErrorCategory, ErrorKind, SocketTransport, WritePolicy,
};
use support::{
    Collector, init_tracing, spawn_echo_server, spawn_hangup_server, spawn_reset_server,
    unused_port,
};

#[tokio::test(flavor = "multi_thread")]
async fn echoed_bytes_arrive_through_the_handler() {
    init_tracing();
    let port = spawn_echo_server().await;
    let collector = Collector::new();

    let transport =
        SocketTransport::connect("localhost", port, ConnectOptions::new(), collector.clone())
            .await
            .expect("建立明文连接");
    assert!(!transport.is_tls());
    assert_eq!(transport.tls_backend(), None);
    assert!(transport.peer().is_loopback());
    assert_eq!(transport.peer().to_string(), format!("127.0.0.1:{port}"));

    transport.send(&[1, 2, 3]).await.expect("发送三个字节");
    let collected = collector.wait_for_bytes(3).await;
    assert_eq!(collected.data, vec![1, 2, 3]);
    assert!(collected.errors.is_empty());
    assert!(transport.is_connected());

    transport.close().await.expect("关闭连接");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sends_are_never_interleaved() {
    init_tracing();
    let port = spawn_echo_server().await;
    let collector = Collector::new();
    let transport = Arc::new(
        SocketTransport::connect("127.0.0.1", port, ConnectOptions::new(), collector.clone())
            .await
            .expect("建立明文连接"),
    );

    const MESSAGE: usize = 64 * 1024;
    const SENDERS: u8 = 8;
    let mut tasks = Vec::new();
    for marker in 0..SENDERS {
        let transport = Arc::clone(&transport);
        tasks.push(tokio::spawn(async move {
            transport
                .send(&vec![marker; MESSAGE])
                .await
                .expect("并发发送");
        }));
    }
    for task in tasks {
        task.await.expect("发送任务完成");
    }

    let collected = collector
        .wait_for_bytes(MESSAGE * usize::from(SENDERS))
        .await;
    let mut markers: Vec<u8> = collected
        .data
        .chunks(MESSAGE)
        .map(|chunk| {
            assert!(
                chunk.iter().all(|byte| *byte == chunk[0]),
                "同一次发送的字节必须连续到达"
            );
            chunk[0]
        })
        .collect();
    markers.sort_unstable();
    assert_eq!(markers, (0..SENDERS).collect::<Vec<_>>());

    transport.close().await.expect("关闭连接");
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_idempotent_and_blocks_later_sends() {
    init_tracing();
    let port = spawn_echo_server().await;
    let collector = Collector::new();
    let options = ConnectOptions::new().with_write_policy(WritePolicy::SinglePass);
    let transport = SocketTransport::connect("127.0.0.1", port, options, collector.clone())
        .await
        .expect("建立明文连接");

    transport.close().await.expect("第一次关闭");
    transport.close().await.expect("重复关闭同样成功");
    assert!(!transport.is_connected());

    let error = transport.send(b"late").await.expect_err("关闭后发送必须失败");
    assert_eq!(error.kind(), ErrorKind::Closed);
    assert_eq!(error.code(), "kitten.socket.closed");

    // 关闭由本端发起，读任务被中止而不是收到断开通知。
    assert!(collector.snapshot().errors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn peer_disconnect_delivers_empty_read_then_error() {
    init_tracing();
    let port = spawn_hangup_server().await;
    let collector = Collector::new();
    let transport =
        SocketTransport::connect("127.0.0.1", port, ConnectOptions::new(), collector.clone())
            .await
            .expect("建立明文连接");

    let collected = collector.wait_for_error().await;
    assert_eq!(collected.reads, vec![0]);
    assert_eq!(collected.errors, vec![ErrorKind::DisconnectedByPeer]);

    let mut connected = transport.is_connected();
    for _ in 0..100 {
        if !connected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        connected = transport.is_connected();
    }
    assert!(!connected, "读循环退出后连接不再存活");
    transport.close().await.expect("关闭已断开的连接");
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_reset_stops_the_read_loop_with_read_failed() {
    init_tracing();
    let port = spawn_reset_server().await;
    let collector = Collector::new();
    let transport =
        SocketTransport::connect("127.0.0.1", port, ConnectOptions::new(), collector.clone())
            .await
            .expect("建立明文连接");

    let collected = collector.wait_for_error().await;
    assert_eq!(collected.errors, vec![ErrorKind::ReadFailed]);
    assert!(collected.reads.is_empty(), "读失败不伴随任何读回调");

    // 读循环已经终止：之后既没有新的读回调，也没有新的错误回调。
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = collector.snapshot();
    assert!(settled.reads.is_empty());
    assert_eq!(settled.errors, vec![ErrorKind::ReadFailed]);
    assert!(!transport.is_connected());
    transport.close().await.expect("关闭已重置的连接");
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_is_reported_as_connect_failure() {
    init_tracing();
    let port = unused_port().await;
    let error = SocketTransport::connect("127.0.0.1", port, ConnectOptions::new(), Collector::new())
        .await
        .err()
        .expect("无人监听的端口必须连接失败");
    assert_eq!(error.kind(), ErrorKind::ConnectFailed);
    assert!(matches!(error.category(), ErrorCategory::Retryable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_is_usable_through_the_trait_object() {
    init_tracing();
    let port = spawn_echo_server().await;
    let collector = Collector::new();
    let transport: Box<dyn ByteTransport> = Box::new(
        SocketTransport::connect("127.0.0.1", port, ConnectOptions::new(), collector.clone())
            .await
            .expect("建立明文连接"),
    );

    transport.send(b"ping").await.expect("经由 trait 发送");
    assert_eq!(collector.wait_for_bytes(4).await.data, b"ping");
    transport.close().await.expect("经由 trait 关闭");
    assert!(!transport.is_connected());
}
