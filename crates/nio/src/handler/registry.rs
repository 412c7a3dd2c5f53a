use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::Handler;
use crate::protocol::RequestHeader;

/// Finds the handler responsible for a request. No match makes the engine answer
/// `501 Not Implemented`.
pub trait HandlerRegistry: Send + Sync {
    fn lookup(&self, header: &RequestHeader) -> Option<Arc<dyn Handler>>;
}

/// Selects handlers by request path.
///
/// Patterns are either an exact path, `*` matching every path, `prefix*` or
/// `*suffix`. An exact match wins over patterns, and among patterns the longest
/// one wins.
#[derive(Default)]
pub struct UriHandlerRegistry {
    exact: HashMap<String, Arc<dyn Handler>>,
    patterns: Vec<(Pattern, Arc<dyn Handler>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Prefix(String),
    Suffix(String),
}

impl Pattern {
    fn len(&self) -> usize {
        match self {
            Pattern::Prefix(s) | Pattern::Suffix(s) => s.len(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Pattern::Suffix(suffix) => path.ends_with(suffix.as_str()),
        }
    }
}

impl UriHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern`, replacing an earlier registration of the
    /// same pattern.
    pub fn register<H: Handler + 'static>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.register_arc(pattern, Arc::new(handler))
    }

    pub fn register_arc(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> &mut Self {
        let parsed = if let Some(prefix) = pattern.strip_suffix('*') {
            Some(Pattern::Prefix(prefix.to_string()))
        } else {
            pattern.strip_prefix('*').map(|suffix| Pattern::Suffix(suffix.to_string()))
        };

        match parsed {
            Some(pattern) => {
                self.patterns.retain(|(existing, _)| existing != &pattern);
                self.patterns.push((pattern, handler));
                // longest pattern first
                self.patterns.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.len()));
            }
            None => {
                self.exact.insert(pattern.to_string(), handler);
            }
        }
        self
    }

    pub fn unregister(&mut self, pattern: &str) {
        self.exact.remove(pattern);
        self.patterns.retain(|(existing, _)| match existing {
            Pattern::Prefix(prefix) => pattern.strip_suffix('*') != Some(prefix.as_str()),
            Pattern::Suffix(suffix) => pattern.strip_prefix('*') != Some(suffix.as_str()),
        });
    }

    pub fn lookup_path(&self, path: &str) -> Option<Arc<dyn Handler>> {
        if let Some(handler) = self.exact.get(path) {
            return Some(Arc::clone(handler));
        }
        self.patterns.iter().find(|(pattern, _)| pattern.matches(path)).map(|(_, handler)| Arc::clone(handler))
    }
}

impl HandlerRegistry for UriHandlerRegistry {
    fn lookup(&self, header: &RequestHeader) -> Option<Arc<dyn Handler>> {
        self.lookup_path(header.uri().path())
    }
}

impl fmt::Debug for UriHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriHandlerRegistry")
            .field("exact", &self.exact.keys().collect::<Vec<_>>())
            .field("patterns", &self.patterns.iter().map(|(pattern, _)| pattern).collect::<Vec<_>>())
            .finish()
    }
}
