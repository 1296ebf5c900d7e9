//! End-to-end tests over TCP: request cycles, body retrieval, shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use ajp_connector::EchoHandler;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

use common::{ForwardRequestBuilder, RunningConnector};

async fn start() -> RunningConnector {
    common::start_connector(common::test_config(), EchoHandler::new()).await
}

#[tokio::test]
async fn test_cping_cpong() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();

    // some web servers pad the probe to two bytes
    stream.write_all(&[0x12, 0x34, 0x00, 0x02, 0x0A, 0x00]).await.unwrap();
    let mut pong = [0u8; 5];
    tokio::io::AsyncReadExt::read_exact(&mut stream, &mut pong).await.unwrap();
    assert_eq!(pong, common::CPONG);

    common::cping(&mut stream).await;
    connector.stop().await;
}

#[tokio::test]
async fn test_get_request_is_echoed() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();

    let request = ForwardRequestBuilder::get("/app/index.jsp")
        .query("lang=en")
        .header("cookie", "theme=dark; JSESSIONID=abc123")
        .build();
    stream.write_all(&request).await.unwrap();

    let response = common::read_response(&mut stream, &[]).await;
    assert_eq!(response.status, 200);
    assert!(response.body_requests.is_empty());
    let text = response.body_text();
    assert!(text.starts_with("GET /app/index.jsp?lang=en HTTP/1.1\n"), "{text}");
    assert!(text.contains("cookie: theme=dark; JSESSIONID=abc123\n"), "{text}");
    assert!(text.contains("session: abc123\n"), "{text}");

    connector.stop().await;
}

#[tokio::test]
async fn test_large_body_is_requested_in_chunks() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();

    let body: Vec<u8> = (0..20_000u32).map(|i| b'a' + (i % 26) as u8).collect();
    let request = ForwardRequestBuilder::post("/upload")
        .header("content-type", "application/octet-stream")
        .header("content-length", "20000")
        .build();
    stream.write_all(&request).await.unwrap();
    stream.write_all(&common::body_packet(&body[..8000])).await.unwrap();

    let response = common::read_response(&mut stream, &body[8000..]).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_requests, vec![8186, 3814]);
    assert!(response.body.ends_with(&body));

    connector.stop().await;
}

#[tokio::test]
async fn test_body_without_length_ends_on_empty_packet() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();

    let request = ForwardRequestBuilder::post("/stream")
        .header("transfer-encoding", "chunked")
        .build();
    stream.write_all(&request).await.unwrap();

    let response = common::read_response(&mut stream, b"chunked payload").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_requests, vec![8186, 8186]);
    assert!(response.body_text().ends_with("\nchunked payload"));

    connector.stop().await;
}

#[tokio::test]
async fn test_connection_is_reused_across_cycles() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();

    for i in 0..5 {
        let uri = format!("/page/{i}");
        stream
            .write_all(&ForwardRequestBuilder::get(&uri).build())
            .await
            .unwrap();
        let response = common::read_response(&mut stream, &[]).await;
        assert!(response.body_text().starts_with(&format!("GET {uri} HTTP/1.1")));
        common::cping(&mut stream).await;
    }
    assert_eq!(connector.registry.len(), 1);

    drop(stream);
    let registry = connector.registry.clone();
    assert!(common::eventually(Duration::from_secs(2), || registry.is_empty()).await);
    connector.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_connections() {
    let connector = start().await;
    let mut stream = TcpStream::connect(connector.addr).await.unwrap();
    common::cping(&mut stream).await;

    connector.stop().await;
    assert!(common::is_closed(&mut stream, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_restart_keeps_listening_socket() {
    let connector = start().await;
    let mut before = TcpStream::connect(connector.addr).await.unwrap();
    common::cping(&mut before).await;

    assert!(connector.restart.request_restart());
    assert!(common::is_closed(&mut before, Duration::from_secs(2)).await);
    let restarts = connector.restarts.clone();
    assert!(common::eventually(Duration::from_secs(2), || restarts.load(Ordering::SeqCst) == 1).await);

    let mut after = TcpStream::connect(connector.addr).await.unwrap();
    common::cping(&mut after).await;
    connector.stop().await;
}
