mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONNECTION;
use http::{Method, StatusCode};
use micro_nio::client::{ClientConnection, JobQueue};
use micro_nio::config::EngineConfig;
use micro_nio::connection::ExchangeService;
use micro_nio::exchange::{AsyncExchange, Job, JobEntity, JobState, expectation_failed};
use micro_nio::handler::UriHandlerRegistry;
use micro_nio::protocol::RequestHeader;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

use common::{RawClient, connect, init_tracing, pattern_handler, serve};

fn gate(header: &RequestHeader, exchange: AsyncExchange) {
    if header.uri().path().starts_with("/deny") {
        exchange.submit_response(expectation_failed("not today")).unwrap();
    } else {
        exchange.accept().unwrap();
    }
}

fn gated_service() -> Arc<ExchangeService> {
    let mut registry = UriHandlerRegistry::new();
    registry.register("*", pattern_handler());
    Arc::new(ExchangeService::builder(registry).expectation_gate(gate).build())
}

fn upload(pattern: &str) -> Job {
    Job::builder(pattern, 4).method(Method::POST).entity(JobEntity::ContentLength).expect_continue(true).build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepted_expectation_gets_100_continue() {
    init_tracing();
    let (stream, _server) = serve(&gated_service());
    let mut client = RawClient::new(stream);

    client.send(b"POST /echo HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n").await;
    let (head, _) = client.response_to(Method::POST).await;
    assert_eq!(head.status(), StatusCode::CONTINUE);

    client.send(b"hello").await;
    let (head, entity) = client.response_to(Method::POST).await;
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(&entity[..], b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_expectation_closes_without_reading_the_entity() {
    init_tracing();
    let (stream, server) = serve(&gated_service());
    let mut client = RawClient::new(stream);

    client.send(b"POST /deny HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n").await;
    let (head, entity) = client.response_to(Method::POST).await;
    assert_eq!(head.status(), StatusCode::EXPECTATION_FAILED);
    assert_eq!(head.headers()[CONNECTION], "close");
    assert_eq!(&entity[..], b"not today");
    assert!(client.is_closed().await);
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_jobs_through_the_gate() {
    init_tracing();
    let service = gated_service();
    let accepted = upload("fine");
    let denied = upload("deny");
    let queue: JobQueue = [accepted.clone(), denied.clone(), Job::new("never", 1)].into_iter().collect();

    let (mut client, _server) = connect(&service, EngineConfig::default());
    assert_eq!(client.run(&queue).await.unwrap(), 2);

    assert_eq!(
        accepted.state(),
        JobState::Succeeded { status: StatusCode::OK, body: Some(Bytes::from(accepted.expected())) }
    );
    assert!(matches!(denied.state(), JobState::Succeeded { status: StatusCode::EXPECTATION_FAILED, .. }));
    assert_eq!(queue.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_server_gets_the_entity_after_the_timeout() {
    init_tracing();
    let (client_stream, mut server_stream) = duplex(64 * 1024);

    let server = tokio::spawn(async move {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        // header plus the 4 byte entity
        while !received.windows(4).any(|window| window == b"\r\n\r\n") || !received.ends_with(b"ssss") {
            let n = server_stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "client closed early");
            received.extend_from_slice(&buf[..n]);
        }
        server_stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await.unwrap();
        String::from_utf8(received).unwrap()
    });

    let config = EngineConfig::builder().expect_continue_timeout(Duration::from_millis(100)).build().unwrap();
    let (reader, writer) = split(client_stream);
    let mut client = ClientConnection::new(reader, writer, config);
    let job = Job::builder("s", 4).method(Method::POST).entity(JobEntity::ContentLength).expect_continue(true).build();

    assert!(client.execute(&job).await.unwrap());
    assert_eq!(job.state(), JobState::Succeeded { status: StatusCode::OK, body: Some(Bytes::from_static(b"ok")) });

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /sx4 HTTP/1.1\r\n"));
    assert!(request.contains("expect: 100-continue\r\n"));
}
