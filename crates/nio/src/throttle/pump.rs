use std::future::poll_fn;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::trace;

use crate::protocol::{ExchangeError, Message, PayloadItem, WireEntity};
use crate::throttle::ThrottledBuffer;

/// A message decoder that can be told how many entity bytes it may hand out next.
///
/// A decoder honouring the limit never yields a payload chunk larger than the
/// limit, and leaves undelivered bytes in its read buffer.
pub trait PayloadLimit {
    fn set_payload_limit(&mut self, limit: usize);
}

/// What a single pump step achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpProgress {
    Pushed(usize),
    Finished,
    /// The consumer abandoned the entity, nothing was read.
    ConsumerGone,
}

/// Moves at most one chunk of entity bytes from the connection into `buffer`.
///
/// The step first waits for room in the buffer and only then reads, so a
/// suspended buffer means the connection is not read at all. Every await point is
/// cancellation safe, so the returned future may be dropped at any time, e.g. when
/// it loses a `select!` against the exchange inbox.
pub async fn pump_entity<R, D, H>(
    framed_read: &mut FramedRead<R, D>,
    buffer: &ThrottledBuffer,
    entity: &mut WireEntity,
) -> Result<PumpProgress, ExchangeError>
where
    R: AsyncRead + Unpin,
    D: Decoder<Item = Message<H>> + PayloadLimit,
    D::Error: Into<ExchangeError>,
{
    let Some(room) = poll_fn(|cx| buffer.poll_room(cx)).await else {
        return Ok(PumpProgress::ConsumerGone);
    };

    framed_read.decoder_mut().set_payload_limit(room);
    let next = framed_read.next().await;
    framed_read.decoder_mut().set_payload_limit(usize::MAX);

    match next {
        Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
            let size = bytes.len();
            trace!(size, room, "entity bytes pumped");
            entity.record(size);
            buffer.push(bytes);
            Ok(PumpProgress::Pushed(size))
        }

        Some(Ok(Message::Payload(PayloadItem::Eof))) => {
            entity.finish();
            buffer.finish();
            Ok(PumpProgress::Finished)
        }

        Some(Ok(Message::Header(_))) => {
            let e = ExchangeError::protocol("received message header while reading an entity");
            buffer.fail(&e);
            Err(e)
        }

        Some(Err(e)) => {
            let e = e.into();
            buffer.fail(&e);
            Err(e)
        }

        None => {
            buffer.fail("connection closed before the entity was complete");
            Err(ExchangeError::Closed)
        }
    }
}

/// Reads and discards the rest of an entity nobody is going to consume.
///
/// Returns `Ok(false)` without reading everything when more than `drain_limit`
/// bytes would have to be discarded, in which case the connection can not be reused.
pub async fn drain_entity<R, D, H>(
    framed_read: &mut FramedRead<R, D>,
    entity: &mut WireEntity,
    drain_limit: u64,
) -> Result<bool, ExchangeError>
where
    R: AsyncRead + Unpin,
    D: Decoder<Item = Message<H>> + PayloadLimit,
    D::Error: Into<ExchangeError>,
{
    if entity.is_complete() {
        return Ok(true);
    }

    if entity.remaining().is_some_and(|remaining| remaining > drain_limit) {
        trace!(remaining = ?entity.remaining(), drain_limit, "entity too large to drain");
        return Ok(false);
    }

    let mut drained = 0u64;
    framed_read.decoder_mut().set_payload_limit(usize::MAX);
    loop {
        match framed_read.next().await {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                entity.record(bytes.len());
                drained += bytes.len() as u64;
                if drained > drain_limit {
                    return Ok(false);
                }
            }
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                entity.finish();
                trace!(drained, "entity drained");
                return Ok(true);
            }
            Some(Ok(Message::Header(_))) => {
                return Err(ExchangeError::protocol("received message header while draining an entity"));
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ExchangeError::Closed),
        }
    }
}
