mod common;

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use micro_nio::client::{EntityConsumer, JobQueue};
use micro_nio::config::EngineConfig;
use micro_nio::connection::ExchangeService;
use micro_nio::exchange::{AsyncExchange, Job, JobState};
use micro_nio::handler::{HandlerError, UriHandlerRegistry, make_exchange_handler, make_handler};
use micro_nio::protocol::body::{EntityReader, ReqBody, RespBody};

use common::{RawClient, connect, init_tracing, pattern_handler, serve};

fn small_watermarks() -> EngineConfig {
    EngineConfig::builder().high_watermark(1024).low_watermark(256).build().unwrap()
}

/// Reads the request entity 100 bytes at a time, pausing between reads.
fn slow_reader(request: Request<ReqBody>) -> Result<Response<String>, HandlerError> {
    let mut body = request.into_body();
    let mut buf = [0u8; 100];
    let mut total = 0;
    loop {
        match body.read(&mut buf)? {
            0 => break,
            n => total += n,
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(Response::new(format!("{total} {}", body.suspensions())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_handler_suspends_reading_the_request() {
    init_tracing();
    let mut registry = UriHandlerRegistry::new();
    registry.register("/slow", make_handler(slow_reader));
    let service = Arc::new(ExchangeService::builder(registry).config(small_watermarks()).build());

    let (stream, _server) = serve(&service);
    let mut client = RawClient::new(stream);

    let mut request = b"POST /slow HTTP/1.1\r\nContent-Length: 10000\r\n\r\n".to_vec();
    request.extend_from_slice(&[b'z'; 10000]);
    client.send(&request).await;

    let (head, entity) = client.response_to(Method::POST).await;
    assert_eq!(head.status(), StatusCode::OK);
    let report = String::from_utf8(entity.to_vec()).unwrap();
    let (total, suspensions) = report.split_once(' ').unwrap();
    assert_eq!(total, "10000");
    assert!(suspensions.parse::<u64>().unwrap() > 0, "reading was never suspended: {report}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_response_waits_for_the_connection() {
    init_tracing();
    let mut registry = UriHandlerRegistry::new();
    registry.register(
        "/stream",
        make_exchange_handler(|_request: Request<ReqBody>, exchange: AsyncExchange| -> Result<(), HandlerError> {
            let (body, mut writer) = RespBody::channel(None);
            exchange.submit_response(Response::new(body))?;
            for line in 0..1000 {
                writeln!(writer, "line {line:04}")?;
            }
            writer.finish();
            Ok(())
        }),
    );
    let service = Arc::new(ExchangeService::builder(registry).build());

    let (stream, _server) = serve(&service);
    let mut client = RawClient::new(stream);
    client.send(b"GET /stream HTTP/1.1\r\n\r\n").await;

    let (head, entity) = client.response_to(Method::GET).await;
    assert_eq!(head.headers()[http::header::TRANSFER_ENCODING], "chunked");
    assert_eq!(entity.len(), 1000 * "line 0000\n".len());
    assert!(entity.ends_with(b"line 0999\n"));
}

/// Consumes response entities slowly and counts the suspensions it caused.
struct SlowConsumer {
    suspensions: Arc<AtomicU64>,
}

impl EntityConsumer for SlowConsumer {
    fn consume(&mut self, _status: StatusCode, _headers: &HeaderMap, entity: &mut EntityReader) -> io::Result<Bytes> {
        let mut collected = BytesMut::new();
        let mut buf = [0u8; 128];
        loop {
            match entity.read(&mut buf)? {
                0 => break,
                n => collected.extend_from_slice(&buf[..n]),
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.suspensions.fetch_add(entity.suspensions(), Ordering::Relaxed);
        Ok(collected.freeze())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_client_consumer_throttles_the_response() {
    init_tracing();
    let mut registry = UriHandlerRegistry::new();
    registry.register("*", pattern_handler());
    let service = Arc::new(ExchangeService::builder(registry).build());

    let suspensions = Arc::new(AtomicU64::new(0));
    let consumer_suspensions = Arc::clone(&suspensions);
    let (client, _server) = connect(&service, small_watermarks());
    let mut client = client.with_consumers(move |_job: &Job| {
        Box::new(SlowConsumer { suspensions: Arc::clone(&consumer_suspensions) }) as Box<dyn EntityConsumer>
    });

    let large = Job::new("0123456789", 1000);
    let small = Job::new("ab", 2);
    let queue: JobQueue = [large.clone(), small.clone()].into_iter().collect();
    assert_eq!(client.run(&queue).await.unwrap(), 2);

    assert_eq!(large.state(), JobState::Succeeded { status: StatusCode::OK, body: Some(Bytes::from(large.expected())) });
    assert_eq!(small.result().as_deref(), Some("abab"));
    assert!(suspensions.load(Ordering::Relaxed) > 0);
}

/// Reads exactly the declared entity length and returns without waiting for the end.
struct ExactConsumer;

impl EntityConsumer for ExactConsumer {
    fn consume(&mut self, _status: StatusCode, headers: &HeaderMap, entity: &mut EntityReader) -> io::Result<Bytes> {
        let length = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(|| io::Error::other("response without content-length"))?;
        let mut bytes = vec![0u8; length];
        entity.read_exact(&mut bytes)?;
        Ok(Bytes::from(bytes))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_leaving_before_the_end_keeps_the_connection() {
    init_tracing();
    let mut registry = UriHandlerRegistry::new();
    registry.register("*", pattern_handler());
    let service = Arc::new(ExchangeService::builder(registry).build());

    let config = EngineConfig::builder().high_watermark(16).low_watermark(4).build().unwrap();
    let (client, server) = connect(&service, config);
    let mut client = client.with_consumers(|_job: &Job| Box::new(ExactConsumer) as Box<dyn EntityConsumer>);

    let jobs: Vec<Job> = (0..3).map(|_| Job::new("ab", 8)).collect();
    let queue: JobQueue = jobs.iter().cloned().collect();
    assert_eq!(client.run(&queue).await.unwrap(), 3);
    assert!(client.is_open());
    for job in &jobs {
        assert_eq!(job.result().as_deref(), Some("abababababababab"));
    }

    drop(client);
    server.await.unwrap().unwrap();
}
