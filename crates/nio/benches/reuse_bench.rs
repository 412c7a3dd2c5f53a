use std::hint::black_box;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode, header};
use micro_nio::codec::{RequestDecoder, ResponseEncoder};
use micro_nio::connection::{ExchangeService, HttpConnection};
use micro_nio::handler::{HandlerError, UriHandlerRegistry, make_handler};
use micro_nio::protocol::body::ReqBody;
use micro_nio::protocol::{Message, MessageFraming, PayloadItem, ProtocolVersion, ResponseHead};
use micro_nio::reuse::{ConnectionState, ResponseMeta, ReuseDecider, ReuseStrategy};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::{Decoder, Encoder};

// Mock IO for testing
#[derive(Clone)]
struct MockIO {
    read_data: Arc<Vec<u8>>,
    read_pos: usize,
}

impl MockIO {
    fn new(read_data: Arc<Vec<u8>>) -> Self {
        Self { read_data, read_pos: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

fn hello(_req: Request<ReqBody>) -> Result<Response<&'static str>, HandlerError> {
    Ok(Response::new("Hello World!"))
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    let body = Bytes::from_static(b"Hello World!");

    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let head = ResponseHead::new(());
            let framing = MessageFraming::ContentLength(body.len() as u64);
            encoder.encode(Message::<_, Bytes>::Header((head, framing)), &mut bytes).unwrap();
            encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(body.clone())), &mut bytes).unwrap();
            encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_reuse_decision(c: &mut Criterion) {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade, Keep-Alive"));
    let meta = ResponseMeta {
        version: ProtocolVersion::HTTP_10,
        status: StatusCode::OK,
        headers: &headers,
        framing: MessageFraming::ContentLength(12),
    };

    c.bench_function("reuse_decision", |b| {
        b.iter(|| black_box(ReuseDecider.keep_alive(black_box(&ConnectionState::OPEN), black_box(&meta))));
    });
}

fn bench_keep_alive_connection(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut registry = UriHandlerRegistry::new();
    registry.register("*", make_handler(hello));
    let service = Arc::new(ExchangeService::builder(registry).build());
    let requests = Arc::new(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".repeat(16));

    c.bench_function("process_16_requests_on_one_connection", |b| {
        b.to_async(&runtime).iter(|| {
            let mock_io = MockIO::new(Arc::clone(&requests));
            let connection = HttpConnection::new(mock_io.clone(), mock_io, Arc::clone(&service));
            async move { black_box(connection.process().await.unwrap()) }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_encoder, bench_reuse_decision, bench_keep_alive_connection);
criterion_main!(benches);
