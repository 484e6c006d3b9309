//! Mux and connector contracts.
//!
//! A mux multiplexes many concurrent short-lived calls over one
//! authenticated connection. The client core only ever sees these traits;
//! framing, TLS, and the byte-level protocol live in the connector
//! implementation behind them.

use std::sync::Arc;

use async_trait::async_trait;

use treefs_proto::{Frame, FsResult};

use crate::chan::{Receiver, Sender};

/// Buffering used for the two halves of a freshly allocated call.
pub const CALL_BUF: usize = 16;

/// One request/reply exchange on a mux.
///
/// `tx` carries the request (and, for streaming puts, the payload);
/// `rx` carries the reply stream. Either half's closure carries a
/// terminal [`treefs_proto::FsError`] readable by the other side.
pub struct Call {
    pub tx: Sender<Frame>,
    pub rx: Receiver<Frame>,
}

/// A live multiplexed connection.
#[async_trait]
pub trait Mux: Send + Sync {
    /// Allocate a fresh call.
    ///
    /// Allocation itself cannot fail; on a torn-down mux the returned
    /// call's first send fails with an i/o reason instead.
    fn call(&self) -> Call;

    /// Tear the connection down. In-flight calls observe terminal
    /// errors; the hangup event fires.
    fn shutdown(&self);

    /// Resolve once the peer is gone (either side closed or the
    /// connection dropped). Fires after all prior inbound messages have
    /// surfaced on their calls.
    async fn hangup(&self);
}

/// Opens muxes to dial-string addresses.
///
/// The connector owns whatever transport security applies; a handle keeps
/// its connector so a redial reuses the same transport setup.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: &str) -> FsResult<Arc<dyn Mux>>;
}
