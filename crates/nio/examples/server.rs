use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use micro_nio::connection::{ExchangeService, HttpConnection};
use micro_nio::exchange::{AsyncExchange, ExchangeContext, ExchangeOutcome, expectation_failed};
use micro_nio::handler::{HandlerError, UriHandlerRegistry, make_handler};
use micro_nio::protocol::RequestHeader;
use micro_nio::protocol::body::ReqBody;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const MAX_UPLOAD: u64 = 1024 * 1024;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut registry = UriHandlerRegistry::new();
    registry.register("*", make_handler(pattern));

    let service = ExchangeService::builder(registry)
        .expectation_gate(limit_uploads)
        .observer(|context: &ExchangeContext, outcome: &ExchangeOutcome| {
            info!(exchange_id = context.exchange_id, uri = %context.uri, ?outcome, "exchange done");
        })
        .build();
    let service = Arc::new(service);

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            if let Err(e) = HttpConnection::new(reader, writer, service).process().await {
                warn!(cause = %e, "connection failed");
            }
        });
    }
}

/// Rejects uploads larger than [`MAX_UPLOAD`] before the client sends them.
fn limit_uploads(header: &RequestHeader, exchange: AsyncExchange) {
    let length = header
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    let result = match length {
        Some(length) if length > MAX_UPLOAD => exchange.submit_response(expectation_failed("upload too large\r\n")),
        _ => exchange.accept(),
    };
    if let Err(e) = result {
        warn!(cause = %e, "can't resolve expectation");
    }
}

/// `GET /{pattern}x{count}` answers the pattern repeated `count` times, `POST` echoes.
fn pattern(request: Request<ReqBody>) -> Result<Response<Bytes>, HandlerError> {
    let (parts, mut body) = request.into_parts();
    if !body.is_empty() {
        return Ok(Response::new(body.read_to_bytes()?));
    }

    let parsed = parts
        .uri
        .path()
        .strip_prefix('/')
        .and_then(|path| path.rsplit_once('x'))
        .and_then(|(pattern, count)| Some((pattern, count.parse::<usize>().ok()?)));

    let response = match parsed {
        Some((pattern, count)) => Response::new(Bytes::from(pattern.repeat(count))),
        None => Response::builder().status(StatusCode::NOT_FOUND).body(Bytes::new())?,
    };
    Ok(response)
}
