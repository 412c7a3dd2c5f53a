//! HTTP protocol version handling.
//!
//! [`http::Version`] only knows the versions that exist today, while the reuse
//! rules have to reason about versions the engine has never seen (a response
//! claiming `HTTP/3.45` is still treated as persistent by default). This module
//! provides a plain `(major, minor)` pair for that purpose.

use std::fmt;

use http::Version;

/// An HTTP protocol version as a `(major, minor)` pair.
///
/// Versions are ordered lexicographically, so `HTTP/1.0 < HTTP/1.1 < HTTP/2.0 < HTTP/3.45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    major: u16,
    minor: u16,
}

impl ProtocolVersion {
    pub const HTTP_09: ProtocolVersion = ProtocolVersion::new(0, 9);
    pub const HTTP_10: ProtocolVersion = ProtocolVersion::new(1, 0);
    pub const HTTP_11: ProtocolVersion = ProtocolVersion::new(1, 1);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    #[inline]
    pub fn major(&self) -> u16 {
        self.major
    }

    #[inline]
    pub fn minor(&self) -> u16 {
        self.minor
    }

    /// Returns true if connections speaking this version stay open unless told otherwise.
    ///
    /// Everything from HTTP/1.1 upward is persistent by default, including versions
    /// this crate does not otherwise recognize.
    #[inline]
    pub fn is_persistent_by_default(&self) -> bool {
        *self >= Self::HTTP_11
    }

    /// Maps this version onto the closest version an HTTP/1.x peer can be answered with.
    ///
    /// A server never answers with a version greater than 1.1, and an HTTP/1.0
    /// request gets an HTTP/1.0 status line.
    pub fn response_version(&self) -> Version {
        if *self < Self::HTTP_11 { Version::HTTP_10 } else { Version::HTTP_11 }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl From<Version> for ProtocolVersion {
    fn from(version: Version) -> Self {
        match version {
            Version::HTTP_09 => Self::HTTP_09,
            Version::HTTP_10 => Self::HTTP_10,
            Version::HTTP_11 => Self::HTTP_11,
            Version::HTTP_2 => Self::new(2, 0),
            Version::HTTP_3 => Self::new(3, 0),
            // `http::Version` is open for extension, anything else is newer than we know
            _ => Self::new(u16::MAX, 0),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}
