//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use ajp_connector::config::ConnectorConfig;
use ajp_connector::net::Listener;
use ajp_connector::watchdog::{ListenerRegistry, RestartHandle};
use ajp_connector::{Connector, ConnectorError, RequestHandler, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const CPING: [u8; 5] = [0x12, 0x34, 0x00, 0x01, 0x0A];
pub const CPONG: [u8; 5] = [0x41, 0x42, 0x00, 0x01, 0x09];

/// A connector running on an ephemeral port.
pub struct RunningConnector {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub registry: ListenerRegistry,
    pub restart: RestartHandle,
    pub restarts: Arc<AtomicU64>,
    pub task: JoinHandle<Result<(), ConnectorError>>,
}

impl RunningConnector {
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("connector did not stop");
        result.unwrap().unwrap();
    }
}

/// Config bound to `127.0.0.1:0` with the idle timeout disabled.
pub fn test_config() -> ConnectorConfig {
    let mut config = ConnectorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.ajp.idle_read_timeout_ms = 0;
    config.watchdog.enabled = false;
    config
}

pub async fn start_connector<H: RequestHandler>(config: ConnectorConfig, handler: H) -> RunningConnector {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let connector = Connector::new(config, handler);
    let registry = connector.registry();
    let restart = connector.restart_handle();
    let restarts = connector.restart_counter();
    let task = tokio::spawn(connector.run(listener, shutdown.clone()));
    RunningConnector {
        addr,
        shutdown,
        registry,
        restart,
        restarts,
        task,
    }
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x12, 0x34];
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Builder for Forward Request packets as a web server would send them.
pub struct ForwardRequestBuilder {
    method: u8,
    uri: String,
    headers: Vec<(String, String)>,
    query: Option<String>,
}

impl ForwardRequestBuilder {
    pub fn get(uri: &str) -> Self {
        Self {
            method: 2,
            uri: uri.to_string(),
            headers: Vec::new(),
            query: None,
        }
    }

    pub fn post(uri: &str) -> Self {
        Self {
            method: 4,
            ..Self::get(uri)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, query: &str) -> Self {
        self.query = Some(query.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut p = vec![0x02, self.method];
        put_string(&mut p, "HTTP/1.1");
        put_string(&mut p, &self.uri);
        put_string(&mut p, "192.0.2.10");
        put_string(&mut p, "client.example");
        put_string(&mut p, "www.example.com");
        p.extend_from_slice(&443u16.to_be_bytes());
        p.push(1);
        p.extend_from_slice(&(self.headers.len() as u16).to_be_bytes());
        for (name, value) in &self.headers {
            put_string(&mut p, name);
            put_string(&mut p, value);
        }
        if let Some(query) = &self.query {
            p.push(0x05);
            put_string(&mut p, query);
        }
        p.push(0xFF);
        frame(&p)
    }
}

/// One body packet carrying `data`; empty data is the end-of-body marker.
pub fn body_packet(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return frame(&[]);
    }
    let mut payload = (data.len() as u16).to_be_bytes().to_vec();
    payload.extend_from_slice(data);
    frame(&payload)
}

/// A container frame received by the web-server side.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerPacket {
    SendHeaders { status: u16 },
    SendBodyChunk(Vec<u8>),
    EndResponse { reuse: bool },
    GetBodyChunk(u16),
    Other(Vec<u8>),
}

pub async fn read_packet(stream: &mut TcpStream) -> std::io::Result<ContainerPacket> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    assert_eq!(&header[..2], b"AB", "container frames start with AB");
    let mut payload = vec![0u8; usize::from(u16::from_be_bytes([header[2], header[3]]))];
    stream.read_exact(&mut payload).await?;

    Ok(match payload[0] {
        0x04 => ContainerPacket::SendHeaders {
            status: u16::from_be_bytes([payload[1], payload[2]]),
        },
        0x03 => {
            let len = usize::from(u16::from_be_bytes([payload[1], payload[2]]));
            ContainerPacket::SendBodyChunk(payload[3..3 + len].to_vec())
        }
        0x05 => ContainerPacket::EndResponse {
            reuse: payload[1] == 1,
        },
        0x06 => ContainerPacket::GetBodyChunk(u16::from_be_bytes([payload[1], payload[2]])),
        _ => ContainerPacket::Other(payload),
    })
}

/// Response collected up to END_RESPONSE.
#[derive(Debug, Default)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub body_requests: Vec<u16>,
}

impl Response {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Read until END_RESPONSE, answering GET_BODY_CHUNK from `body`.
pub async fn read_response(stream: &mut TcpStream, mut body: &[u8]) -> Response {
    let mut response = Response::default();
    loop {
        match read_packet(stream).await.unwrap() {
            ContainerPacket::SendHeaders { status } => response.status = status,
            ContainerPacket::SendBodyChunk(chunk) => response.body.extend_from_slice(&chunk),
            ContainerPacket::EndResponse { reuse } => {
                assert!(reuse);
                return response;
            }
            ContainerPacket::GetBodyChunk(requested) => {
                response.body_requests.push(requested);
                let take = body.len().min(usize::from(requested));
                stream.write_all(&body_packet(&body[..take])).await.unwrap();
                body = &body[take..];
            }
            ContainerPacket::Other(payload) => panic!("unexpected container packet {payload:?}"),
        }
    }
}

pub async fn cping(stream: &mut TcpStream) {
    stream.write_all(&CPING).await.unwrap();
    let mut pong = [0u8; 5];
    stream.read_exact(&mut pong).await.unwrap();
    assert_eq!(pong, CPONG);
}

/// Whether the peer has closed `stream` (EOF or reset) within `within`.
pub async fn is_closed(stream: &mut TcpStream, within: Duration) -> bool {
    let mut buf = [0u8; 64];
    match tokio::time::timeout(within, stream.read(&mut buf)).await {
        Ok(Ok(0)) | Ok(Err(_)) => true,
        Ok(Ok(_)) | Err(_) => false,
    }
}

/// Poll `condition` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
