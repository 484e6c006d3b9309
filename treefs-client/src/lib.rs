//! TreeFS Client Library
//!
//! Streaming client for servers that expose named file trees over a
//! multiplexed message connection.
//!
//! ## Overview
//!
//! - **Dialing**: [`dial`] canonicalises `network!host!port!tree`
//!   addresses, authenticates one mux per endpoint, and caches live
//!   handles process-wide.
//! - **Operations**: every call on a [`RemoteFs`] returns immediately
//!   with the result half of a channel; errors arrive in-band as the
//!   channel's close reason, and closing a result channel with a reason
//!   cancels the streaming operations.
//! - **Recovery**: a hangup watcher marks the handle closed and evicts
//!   it from the cache; [`RemoteFs::redial`] rebuilds the connection on
//!   the same handle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use treefs_client::{dial, DialOpts};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // `connector` opens muxes; see the treefs-mux Connector trait.
//!     let fs = dial("host!9880!main", DialOpts::new(connector)).await?;
//!
//!     let d = fs.stat("/docs/notes.txt").one().await?;
//!     println!("{} bytes at {}", d.get("size").unwrap_or("?"), d.path());
//!
//!     let mut data = fs.get("/docs/notes.txt", 0, -1);
//!     while let Some(chunk) = data.recv().await {
//!         // ...
//!     }
//!     if let Some(err) = data.reason() {
//!         eprintln!("get failed: {err}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod addr;
pub mod auth;
mod client;
mod dial;
mod ops;

pub use addr::fill_addr;
pub use auth::{AuthHandler, AuthInfo, PlainAuth, AUTH_SERVICE};
pub use client::RemoteFs;
pub use dial::{dial, DialOpts};

// The channel and transport contracts callers interact with.
pub use treefs_mux::{channel, Call, Connector, Mux, Receiver, Sender};
pub use treefs_proto::{DirEntry, Frame, FsError, FsResult, Op, Req};
