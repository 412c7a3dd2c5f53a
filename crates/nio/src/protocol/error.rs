use std::io;
use thiserror::Error;

use crate::exchange::ExchangeState;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("exchange error: {source}")]
    Exchange {
        #[from]
        source: ExchangeError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid http status")]
    InvalidStatus,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("request entity can not be delimited: {reason}")]
    IndeterminateEntity { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn indeterminate_entity<S: ToString>(str: S) -> Self {
        Self::IndeterminateEntity { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true when the peer sent something that is not valid HTTP, as opposed
    /// to the transport failing underneath the parser.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// A misuse of the engine's API. These are programming errors of the caller and are
/// always surfaced, never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("exchange {exchange_id}: response submitted more than once")]
    DoubleSubmission { exchange_id: u64 },

    #[error("exchange {exchange_id}: {operation} is not allowed in state {state:?}")]
    InvalidState { exchange_id: u64, operation: &'static str, state: ExchangeState },

    #[error("illegal exchange transition {from:?} -> {to:?}")]
    IllegalTransition { from: ExchangeState, to: ExchangeState },

    #[error("{0} has already been resolved")]
    AlreadyResolved(&'static str),
}

/// Everything that can make a single exchange fail.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("contract violation: {source}")]
    Contract {
        #[from]
        source: ContractViolation,
    },

    #[error("protocol violation: {reason}")]
    Protocol { reason: String },

    #[error("handler fault: {reason}")]
    HandlerFault { reason: String },

    #[error("resource exhausted: {resource}")]
    ResourceExhausted { resource: &'static str },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("connection closed before the exchange completed")]
    Closed,
}

impl ExchangeError {
    pub fn protocol<S: ToString>(str: S) -> Self {
        Self::Protocol { reason: str.to_string() }
    }

    pub fn handler_fault<S: ToString>(str: S) -> Self {
        Self::HandlerFault { reason: str.to_string() }
    }

    pub fn resource_exhausted(resource: &'static str) -> Self {
        Self::ResourceExhausted { resource }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

impl From<ParseError> for ExchangeError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Io { source } => Self::Io { source },
            other => Self::protocol(other),
        }
    }
}

impl From<SendError> for ExchangeError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Io { source } => Self::Io { source },
            SendError::InvalidBody { reason } => Self::HandlerFault { reason },
        }
    }
}
