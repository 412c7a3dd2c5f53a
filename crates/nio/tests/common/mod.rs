#![allow(dead_code, reason = "every suite uses a different part of the harness")]

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::{Method, Request, Response, StatusCode};
use micro_nio::client::ClientConnection;
use micro_nio::codec::ResponseDecoder;
use micro_nio::connection::{ExchangeService, HttpConnection};
use micro_nio::handler::{HandlerError, HandlerFn, make_handler};
use micro_nio::protocol::body::ReqBody;
use micro_nio::protocol::{HttpError, Message, MessageFraming, PayloadItem, ResponseHead};
use micro_nio::config::EngineConfig;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub type ServerTask = JoinHandle<Result<(), HttpError>>;
pub type Client = ClientConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

pub fn init_tracing() {
    let _ = FmtSubscriber::builder().with_max_level(Level::DEBUG).with_test_writer().try_init();
}

/// Splits `/{pattern}x{count}` into its parts.
pub fn parse_pattern(path: &str) -> Option<(&str, usize)> {
    let (pattern, count) = path.strip_prefix('/')?.rsplit_once('x')?;
    Some((pattern, count.parse().ok()?))
}

/// Answers `/{pattern}x{count}` with the pattern repeated, and echoes request entities.
pub fn pattern_response(request: Request<ReqBody>) -> Result<Response<Bytes>, HandlerError> {
    let (parts, mut body) = request.into_parts();
    if !body.is_empty() {
        let entity = body.read_to_bytes()?;
        return Ok(Response::new(entity));
    }

    match parse_pattern(parts.uri.path()) {
        Some((pattern, count)) => Ok(Response::new(Bytes::from(pattern.repeat(count)))),
        None => {
            let mut response = Response::new(Bytes::new());
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

pub fn pattern_handler() -> HandlerFn<fn(Request<ReqBody>) -> Result<Response<Bytes>, HandlerError>> {
    make_handler(pattern_response as fn(Request<ReqBody>) -> Result<Response<Bytes>, HandlerError>)
}

/// Runs a server connection for `service` over an in-memory stream.
pub fn serve(service: &Arc<ExchangeService>) -> (DuplexStream, ServerTask) {
    let (client, server) = duplex(64 * 1024);
    let service = Arc::clone(service);
    let task = tokio::spawn(async move {
        let (reader, writer) = split(server);
        HttpConnection::new(reader, writer, service).process().await
    });
    (client, task)
}

pub fn connect(service: &Arc<ExchangeService>, config: EngineConfig) -> (Client, ServerTask) {
    let (stream, task) = serve(service);
    let (reader, writer) = split(stream);
    (ClientConnection::new(reader, writer, config), task)
}

/// Speaks raw bytes to a server connection and decodes what comes back.
pub struct RawClient {
    read: FramedRead<ReadHalf<DuplexStream>, ResponseDecoder>,
    write: WriteHalf<DuplexStream>,
}

impl RawClient {
    pub fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = split(stream);
        Self { read: FramedRead::new(reader, ResponseDecoder::new()), write: writer }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.write.write_all(bytes).await.unwrap();
    }

    /// Reads the next response, interim ones included, with its whole entity.
    pub async fn response_to(&mut self, method: Method) -> (ResponseHead, Bytes) {
        self.read.decoder_mut().expect_response_to(method);
        let (head, framing) = match self.read.next().await {
            Some(Ok(Message::Header(header))) => header,
            other => panic!("expect response header, got {other:?}"),
        };

        let mut entity = BytesMut::new();
        if framing != MessageFraming::Empty && framing != MessageFraming::ContentLength(0) {
            loop {
                match self.read.next().await {
                    Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => entity.extend_from_slice(&bytes),
                    Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                    other => panic!("expect response entity, got {other:?}"),
                }
            }
        }
        (head, entity.freeze())
    }

    /// Returns true once the server has closed its side of the connection.
    pub async fn is_closed(&mut self) -> bool {
        self.read.next().await.is_none()
    }
}
