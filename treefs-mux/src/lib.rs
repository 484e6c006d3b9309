//! # treefs-mux
//!
//! The channel and transport layer underneath a TreeFS client.
//!
//! Three pieces:
//!
//! - [`chan`] — bounded in-order channels whose closure carries an
//!   optional [`treefs_proto::FsError`] readable by the other half. These
//!   are the building block for calls and for every caller-visible result
//!   stream; consumer-side closure doubles as in-band cancellation.
//! - [`Mux`] / [`Call`] / [`Connector`] — the contracts a transport
//!   implements: allocate concurrent short-lived calls over one
//!   connection, signal peer hangup, and dial by address string.
//! - [`loopback`] — an in-memory mux pair used by tests and in-process
//!   servers.
//!
//! Byte framing and TLS belong to `Connector` implementations; nothing
//! here touches a socket.

pub mod chan;
pub mod loopback;
mod mux;

pub use chan::{channel, Receiver, Sender};
pub use mux::{Call, Connector, Mux, CALL_BUF};
