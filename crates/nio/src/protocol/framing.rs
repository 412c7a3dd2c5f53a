//! Message framing: how the end of an HTTP/1.x entity is found on the wire.

use http::StatusCode;
use http_body::SizeHint;

use crate::protocol::ProtocolVersion;

/// Describes how the entity of a single HTTP message is delimited.
///
/// Every message carries exactly one framing:
/// - `ContentLength(n)`: exactly `n` bytes follow the header
/// - `Chunked`: the entity uses chunked transfer coding
/// - `Identity`: the entity runs until the connection closes
/// - `Empty`: the message has no entity at all
///
/// `Identity` is only legal on responses. A request that would need it is a protocol
/// violation, because the server could never tell where the next request starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageFraming {
    ContentLength(u64),
    Chunked,
    Identity,
    Empty,
}

impl MessageFraming {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, MessageFraming::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, MessageFraming::Empty | MessageFraming::ContentLength(0))
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, MessageFraming::Identity)
    }

    /// Returns true if the receiver can find the end of the entity without the
    /// connection being closed.
    #[inline]
    pub fn is_determinate(&self) -> bool {
        !self.is_identity()
    }

    /// Returns the declared entity length, if the framing declares one.
    #[inline]
    pub fn declared_length(&self) -> Option<u64> {
        match self {
            MessageFraming::ContentLength(length) => Some(*length),
            MessageFraming::Empty => Some(0),
            MessageFraming::Chunked | MessageFraming::Identity => None,
        }
    }

    /// Selects the framing of a response from its status and body size hint.
    ///
    /// Statuses that never carry an entity (1xx, 204, 304) are always `Empty`.
    /// A body of unknown length is chunked for HTTP/1.1 peers, and delimited by
    /// closing the connection for older peers that do not understand chunking.
    pub fn for_response(version: ProtocolVersion, status: StatusCode, size_hint: &SizeHint) -> Self {
        if !status_allows_entity(status) {
            return MessageFraming::Empty;
        }

        match size_hint.exact() {
            Some(0) => MessageFraming::Empty,
            Some(length) => MessageFraming::ContentLength(length),
            None if version >= ProtocolVersion::HTTP_11 => MessageFraming::Chunked,
            None => MessageFraming::Identity,
        }
    }
}

/// Returns false for the statuses whose responses never carry an entity.
#[inline]
pub fn status_allows_entity(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_framing_by_size_hint() {
        let v11 = ProtocolVersion::HTTP_11;
        assert_eq!(MessageFraming::for_response(v11, StatusCode::OK, &SizeHint::with_exact(0)), MessageFraming::Empty);
        assert_eq!(
            MessageFraming::for_response(v11, StatusCode::OK, &SizeHint::with_exact(12)),
            MessageFraming::ContentLength(12)
        );
        assert_eq!(MessageFraming::for_response(v11, StatusCode::OK, &SizeHint::new()), MessageFraming::Chunked);
        assert_eq!(
            MessageFraming::for_response(ProtocolVersion::HTTP_10, StatusCode::OK, &SizeHint::new()),
            MessageFraming::Identity
        );
    }

    #[test]
    fn bodiless_statuses() {
        let hint = SizeHint::with_exact(5);
        let v11 = ProtocolVersion::HTTP_11;
        assert_eq!(MessageFraming::for_response(v11, StatusCode::NO_CONTENT, &hint), MessageFraming::Empty);
        assert_eq!(MessageFraming::for_response(v11, StatusCode::NOT_MODIFIED, &hint), MessageFraming::Empty);
        assert_eq!(MessageFraming::for_response(v11, StatusCode::CONTINUE, &hint), MessageFraming::Empty);
    }

    #[test]
    fn determinate() {
        assert!(MessageFraming::ContentLength(3).is_determinate());
        assert!(MessageFraming::Chunked.is_determinate());
        assert!(MessageFraming::Empty.is_determinate());
        assert!(!MessageFraming::Identity.is_determinate());
        assert_eq!(MessageFraming::Chunked.declared_length(), None);
        assert_eq!(MessageFraming::Empty.declared_length(), Some(0));
    }
}
