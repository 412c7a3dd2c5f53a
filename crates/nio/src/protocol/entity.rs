use crate::protocol::MessageFraming;

/// The consumption state of one message entity as it crosses the wire.
///
/// The framing is fixed when the header is parsed. `consumed` only ever grows,
/// and once the entity is complete no further bytes are accounted to it.
///
/// An entity is complete only when the decoder has handed out its end, even
/// when all declared bytes were already counted. Until then the end marker is
/// still pending in the decoder and must be read before the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEntity {
    framing: MessageFraming,
    consumed: u64,
    complete: bool,
}

impl WireEntity {
    pub fn new(framing: MessageFraming) -> Self {
        let complete = matches!(framing, MessageFraming::Empty | MessageFraming::ContentLength(0));
        Self { framing, consumed: 0, complete }
    }

    #[inline]
    pub fn framing(&self) -> MessageFraming {
        self.framing
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bytes still expected for a length delimited entity.
    pub fn remaining(&self) -> Option<u64> {
        match self.framing {
            MessageFraming::ContentLength(length) => Some(length.saturating_sub(self.consumed)),
            MessageFraming::Empty => Some(0),
            MessageFraming::Chunked | MessageFraming::Identity => {
                if self.complete {
                    Some(0)
                } else {
                    None
                }
            }
        }
    }

    /// Accounts `size` freshly read bytes to this entity.
    pub fn record(&mut self, size: usize) {
        if !self.complete {
            self.consumed += size as u64;
        }
    }

    /// Marks the end of the entity as seen on the wire.
    pub fn finish(&mut self) {
        self.complete = true;
    }
}
