//! Load testing for the connector.

use std::time::{Duration, Instant};

use ajp_connector::EchoHandler;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

use common::ForwardRequestBuilder;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    let connector = common::start_connector(common::test_config(), EchoHandler::new()).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task_id in 0..concurrency {
        let addr = connector.addr;
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut latencies = Vec::with_capacity(requests_per_task);
            for i in 0..requests_per_task {
                let body = format!("task {task_id} request {i}");
                let request = ForwardRequestBuilder::post("/load")
                    .header("content-length", &body.len().to_string())
                    .build();

                let req_start = Instant::now();
                stream.write_all(&request).await.unwrap();
                stream.write_all(&common::body_packet(body.as_bytes())).await.unwrap();
                let response = common::read_response(&mut stream, &[]).await;
                latencies.push(req_start.elapsed());

                assert_eq!(response.status, 200);
                assert!(response.body_text().ends_with(&body));
            }
            latencies
        }));
    }

    let mut latencies = Vec::with_capacity(total_requests);
    for task in tasks {
        latencies.extend(task.await.unwrap());
    }
    let elapsed = start.elapsed();
    latencies.sort();

    assert_eq!(latencies.len(), total_requests);
    let p99 = latencies[latencies.len() * 99 / 100 - 1];
    println!(
        "{} requests in {:?} ({:.0} req/s), p99 {:?}",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64(),
        p99
    );

    let registry = connector.registry.clone();
    assert!(common::eventually(Duration::from_secs(2), || registry.is_empty()).await);
    connector.stop().await;
}
