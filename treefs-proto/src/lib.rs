//! # treefs-proto
//!
//! Shared wire catalogue for the TreeFS remote filesystem protocol.
//!
//! A TreeFS server exposes one or more named trees; every operation on a
//! tree is one short-lived request/reply exchange carried as typed
//! messages. This crate holds the types both ends agree on:
//!
//! - [`DirEntry`] — ordered string→string metadata for one file or
//!   directory, with accessors for the reserved keys.
//! - [`Op`] / [`Req`] / [`Frame`] — the request catalogue and the tagged
//!   message sum type every call carries.
//! - [`FsError`] — the cloneable error that travels as a channel close
//!   reason (and, on a real wire, as a terminal frame).
//! - [`path`] — lexical helpers for the absolute slash paths the protocol
//!   uses.
//!
//! All types are serde-derived so any framed transport can carry them;
//! nothing in this crate does I/O.

pub mod dir;
pub mod error;
pub mod msg;
pub mod path;

pub use dir::{DirEntry, KEY_MTIME, KEY_NAME, KEY_PATH, KEY_TYPE, KEY_WUID};
pub use error::{FsError, FsResult};
pub use msg::{Frame, Op, Req};
