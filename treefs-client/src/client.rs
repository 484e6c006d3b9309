//! The client handle and its connection lifecycle.
//!
//! A [`RemoteFs`] is a lightweight value: the selected tree plus a shared
//! reference to the connection state (mux, auth context, known trees,
//! closed bit). Rebinding to another tree clones the value; redial
//! rebuilds the shared state under a lock; a background watcher per mux
//! observes peer hangup, marks the handle closed, and evicts it from the
//! process dial cache.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Mutex as AsyncMutex};

use treefs_mux::{Connector, Mux};
use treefs_proto::{FsError, FsResult};

use crate::addr::split_addr;
use crate::auth::{AuthHandler, AuthInfo, AUTH_SERVICE};
use crate::dial::dials;
use crate::ops::fetch_trees;

/// A handle onto one tree of a remote TreeFS server.
///
/// Handles are cheap to clone; clones (including the ones
/// [`fsys`](RemoteFs::fsys) produces) share the underlying connection, so
/// closing or redialing any of them affects all of them.
#[derive(Clone)]
pub struct RemoteFs {
    shared: Arc<FsShared>,
    fsys: String,
}

pub(crate) struct FsShared {
    /// Connection address, `network!host!port`.
    addr: String,
    /// Raw address including the tree suffix; the dial-cache key.
    raddr: String,
    /// Tree named in `raddr`; what a cache hit binds to.
    tree0: String,
    connector: Arc<dyn Connector>,
    auth: Arc<dyn AuthHandler>,
    conn: Mutex<ConnState>,
    /// Serialises redials across all clones of this handle.
    redial_gate: AsyncMutex<()>,
}

struct ConnState {
    mux: Option<Arc<dyn Mux>>,
    ai: Option<AuthInfo>,
    trees: HashSet<String>,
    closed: bool,
    /// Completion signal of the current incarnation's hangup watcher;
    /// the next redial waits on it so watchers never overlap.
    closewc: Option<oneshot::Receiver<()>>,
}

impl RemoteFs {
    /// A not-yet-dialed handle for the canonical raw address `raddr`.
    pub(crate) fn new_closed(
        raddr: &str,
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthHandler>,
    ) -> Self {
        let (addr, tree) = split_addr(raddr);
        RemoteFs {
            shared: Arc::new(FsShared {
                addr: addr.to_string(),
                raddr: raddr.to_string(),
                tree0: tree.to_string(),
                connector,
                auth,
                conn: Mutex::new(ConnState {
                    mux: None,
                    ai: None,
                    trees: HashSet::new(),
                    closed: true,
                    closewc: None,
                }),
                redial_gate: AsyncMutex::new(()),
            }),
            fsys: tree.to_string(),
        }
    }

    /// Connection address, without the tree suffix.
    pub fn addr(&self) -> &str {
        &self.shared.addr
    }

    /// Raw address including the tree, as used by the dial cache.
    pub fn raddr(&self) -> &str {
        &self.shared.raddr
    }

    /// The tree this handle operates on.
    pub fn fsys_name(&self) -> &str {
        &self.fsys
    }

    /// Whether the connection is currently down.
    pub fn closed(&self) -> bool {
        self.shared.conn.lock().unwrap().closed
    }

    /// The auth context of the current connection, if the server
    /// authenticates.
    pub fn auth_info(&self) -> Option<AuthInfo> {
        self.shared.conn.lock().unwrap().ai.clone()
    }

    /// Trees the server reported on the last redial, sorted.
    pub fn trees(&self) -> Vec<String> {
        let conn = self.shared.conn.lock().unwrap();
        let mut ts: Vec<String> = conn.trees.iter().cloned().collect();
        ts.sort();
        ts
    }

    /// Rebind to another tree on the same connection.
    ///
    /// Succeeds for `"main"` and for any tree in the known set. The new
    /// handle aliases this one's connection: closing either closes both.
    pub fn fsys(&self, name: &str) -> FsResult<RemoteFs> {
        let known = name == "main"
            || self.shared.conn.lock().unwrap().trees.contains(name);
        if !known {
            return Err(FsError::NoFsys { name: name.to_string() });
        }
        Ok(RemoteFs {
            shared: self.shared.clone(),
            fsys: name.to_string(),
        })
    }

    /// Snapshot the live mux, if any. Envelopes call this instead of
    /// holding any lock across I/O.
    pub(crate) fn mux(&self) -> FsResult<Arc<dyn Mux>> {
        self.shared
            .conn
            .lock()
            .unwrap()
            .mux
            .clone()
            .ok_or_else(|| FsError::io("not dialed"))
    }

    /// Tear the connection down.
    ///
    /// Does not wait for in-flight calls; they observe terminal errors.
    /// The hangup watcher marks the handle closed and evicts it from the
    /// dial cache. A no-op on a handle that never dialed.
    pub fn close(&self) {
        let mux = self.shared.conn.lock().unwrap().mux.clone();
        if let Some(m) = mux {
            m.shutdown();
        }
    }

    /// Dial the remote again, replacing any live connection.
    ///
    /// Steps: tear down the old mux and wait for its watcher to finish;
    /// open a fresh mux; authenticate (tolerating the server's
    /// `"auth disabled"` signal); discover the served trees; verify this
    /// handle's tree is among them; publish the new state; reinstall the
    /// handle in the dial cache; spawn the hangup watcher.
    ///
    /// On failure the handle stays closed and out of the cache, and the
    /// error tells why; errors flagged by
    /// [`FsError::is_io`](treefs_proto::FsError::is_io) are worth a
    /// retry.
    pub async fn redial(&self) -> FsResult<()> {
        let _gate = self.shared.redial_gate.lock().await;

        // Tear down the previous incarnation and wait out its watcher.
        let (old_mux, old_wc) = {
            let mut conn = self.shared.conn.lock().unwrap();
            if conn.closed {
                (None, conn.closewc.take())
            } else {
                conn.ai = None;
                conn.closed = true;
                conn.trees.clear();
                (conn.mux.take(), conn.closewc.take())
            }
        };
        if let Some(m) = old_mux {
            m.shutdown();
        }
        if let Some(wc) = old_wc {
            let _ = wc.await;
        }

        let mux = self.shared.connector.connect(&self.shared.addr).await?;

        // One auth exchange on the first call of the fresh mux.
        let ai = match self
            .shared
            .auth
            .client_auth(mux.call(), AUTH_SERVICE)
            .await
        {
            Ok(ai) => Some(ai),
            Err(e) if e.to_string().contains("auth disabled") => {
                #[cfg(feature = "tracing")]
                tracing::warn!("{}: {}", self.shared.addr, e);
                None
            }
            Err(e) => {
                mux.shutdown();
                return Err(FsError::Dial {
                    addr: self.shared.addr.clone(),
                    why: e.to_string(),
                });
            }
        };

        let mut trees = match fetch_trees(&mux).await {
            Ok(ts) => ts,
            Err(e) => {
                mux.shutdown();
                return Err(e);
            }
        };
        // The server always serves "main", listed or not.
        trees.insert("main".to_string());

        if !trees.contains(&self.fsys) {
            mux.shutdown();
            return Err(FsError::FsysNotServed { name: self.fsys.clone() });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("{}: dialed, trees {:?}", self.shared.raddr, {
            let mut ts: Vec<&String> = trees.iter().collect();
            ts.sort();
            ts
        });

        let (wc_tx, wc_rx) = oneshot::channel();
        {
            let mut conn = self.shared.conn.lock().unwrap();
            conn.mux = Some(mux.clone());
            conn.ai = ai;
            conn.trees = trees;
            conn.closed = false;
            conn.closewc = Some(wc_rx);
        }
        dials()
            .lock()
            .unwrap()
            .insert(self.shared.raddr.clone(), self.rebound_to_tree0());

        // One watcher per mux incarnation: on hangup, mark closed, evict
        // from the cache, and release the next redial.
        let shared = self.shared.clone();
        tokio::spawn(async move {
            mux.hangup().await;
            shared.conn.lock().unwrap().closed = true;
            dials().lock().unwrap().remove(&shared.raddr);
            #[cfg(feature = "tracing")]
            tracing::debug!("{}: hangup", shared.raddr);
            let _ = wc_tx.send(());
        });
        Ok(())
    }

    // The cache entry is always bound to the tree named in the raw
    // address, whichever clone happened to redial.
    fn rebound_to_tree0(&self) -> RemoteFs {
        RemoteFs {
            shared: self.shared.clone(),
            fsys: self.shared.tree0.clone(),
        }
    }
}

impl std::fmt::Debug for RemoteFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFs")
            .field("raddr", &self.shared.raddr)
            .field("fsys", &self.fsys)
            .field("closed", &self.closed())
            .finish()
    }
}
