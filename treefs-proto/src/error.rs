//! The shared error type.
//!
//! Errors cross task boundaries as channel close reasons and, on a real
//! transport, cross the wire as terminal frames, so [`FsError`] is
//! cloneable, comparable, and serde-derived rather than a boxed trait
//! object.
//!
//! Two pieces of Display output are contractual and matched by substring:
//! `"i/o error"` marks transport failures (callers may redial on it), and
//! `"auth disabled"` inside a server auth error downgrades the failure to
//! a warning during dial.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type FsResult<T> = Result<T, FsError>;

/// Errors surfaced by the client and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FsError {
    /// An inbound message had the wrong runtime shape for its operation.
    #[error("bad message")]
    BadMsg,

    /// Transport failure; the substring `"i/o error"` is the redial hint.
    #[error("i/o error: {0}")]
    Io(String),

    /// Application-level error reported by the server, forwarded verbatim.
    #[error("{0}")]
    App(String),

    /// Dial failure, prefixed with the connection address.
    #[error("{addr}: {why}")]
    Dial { addr: String, why: String },

    /// The requested tree is not served by the remote.
    #[error("no fsys '{name}' found in server")]
    FsysNotServed { name: String },

    /// The requested tree is not in the known-trees set.
    #[error("no fsys '{name}'")]
    NoFsys { name: String },

    /// A caller-supplied path was not absolute.
    #[error("'{0}' is not an absolute path")]
    NotAbs(String),
}

impl FsError {
    /// A transport error with the given detail.
    pub fn io(why: impl Into<String>) -> Self {
        FsError::Io(why.into())
    }

    /// A server application error with the given text.
    pub fn app(text: impl Into<String>) -> Self {
        FsError::App(text.into())
    }

    /// `true` for errors a caller may recover from by redialing.
    pub fn is_io(&self) -> bool {
        matches!(self, FsError::Io(_)) || self.to_string().contains("i/o error")
    }
}
