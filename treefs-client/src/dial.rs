//! Dialing and the process dial cache.
//!
//! Dialed handles are cached process-wide under their canonical raw
//! address (tree suffix included), so repeated dials of one endpoint
//! share a connection. Entries leave the cache when their connection
//! hangs up or is closed; there is no teardown API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tokio::sync::Mutex as AsyncMutex;

use treefs_mux::Connector;
use treefs_proto::FsResult;

use crate::addr::fill_addr;
use crate::auth::{AuthHandler, PlainAuth};
use crate::client::RemoteFs;

// Live handles keyed by canonical raw address (initialized once).
static DIALS: OnceCell<Mutex<HashMap<String, RemoteFs>>> = OnceCell::new();

// Serialises cache-miss dials so a race opens one connection, not two.
static DIAL_GATE: OnceCell<AsyncMutex<()>> = OnceCell::new();

/// The process dial cache.
pub(crate) fn dials() -> &'static Mutex<HashMap<String, RemoteFs>> {
    DIALS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn dial_gate() -> &'static AsyncMutex<()> {
    DIAL_GATE.get_or_init(|| AsyncMutex::new(()))
}

fn dialed(raddr: &str) -> Option<RemoteFs> {
    dials().lock().unwrap().get(raddr).cloned()
}

/// What a dial needs besides the address: the transport to open muxes
/// with, and the auth exchange to run on them.
///
/// The connector owns any transport-security setup; both collaborators
/// are kept by the handle and reused on every redial.
pub struct DialOpts {
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthHandler>,
}

impl DialOpts {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            auth: Arc::new(PlainAuth::new("anon")),
        }
    }

    /// Replace the default [`PlainAuth`] exchange.
    pub fn auth(mut self, auth: Arc<dyn AuthHandler>) -> Self {
        self.auth = auth;
        self
    }
}

/// Dial `addr`, canonicalised per [`fill_addr`](crate::addr::fill_addr),
/// and return a handle on its tree.
///
/// A previously dialed address yields the cached handle; different tree
/// suffixes are different dials even on one endpoint. On errors whose
/// text contains `"i/o error"` the caller may
/// [`redial`](RemoteFs::redial) the handle to recover, or
/// [`close`](RemoteFs::close) it to give up.
pub async fn dial(addr: &str, opts: DialOpts) -> FsResult<RemoteFs> {
    let raddr = fill_addr(addr);
    if let Some(fs) = dialed(&raddr) {
        return Ok(fs);
    }
    let _gate = dial_gate().lock().await;
    if let Some(fs) = dialed(&raddr) {
        return Ok(fs);
    }
    let fs = RemoteFs::new_closed(&raddr, opts.connector, opts.auth);
    fs.redial().await?;
    Ok(fs)
}
