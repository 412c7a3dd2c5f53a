use http::{HeaderMap, header};

const CLOSE: &str = "close";
const KEEP_ALIVE: &str = "keep-alive";

/// The tokens of all `Connection` headers of a message.
///
/// Every occurrence of the header contributes its comma separated tokens,
/// trimmed and lower-cased. A malformed token is skipped on its own without
/// discarding its neighbours, and an empty header value contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDirective {
    tokens: Vec<String>,
}

impl ConnectionDirective {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut tokens = Vec::new();
        for value in headers.get_all(header::CONNECTION) {
            // a value that is not visible ASCII can not hold a valid token
            let Ok(value) = value.to_str() else {
                continue;
            };

            tokens.extend(
                value.split(',').map(str::trim).filter(|token| is_valid_token(token)).map(str::to_ascii_lowercase),
            );
        }
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.eq_ignore_ascii_case(token))
    }

    #[inline]
    pub fn close(&self) -> bool {
        self.contains(CLOSE)
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.contains(KEEP_ALIVE)
    }
}

/// A connection option is a run of alphanumeric segments joined by single hyphens,
/// so `keep-alive` is a token while `keep--alive` or `-close` are not.
fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.split('-').all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric()))
}
