//! In-memory mux pair.
//!
//! [`pair`] yields a client-side mux and the matching server-side
//! [`Listener`] of incoming calls, wired directly through channels with no
//! framing. This is the transport the integration tests (and any
//! in-process server) run on; hangup semantics match a real connection:
//! either side tearing down fires the other side's hangup event.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use treefs_proto::FsError;

use crate::chan;
use crate::mux::{Call, Mux, CALL_BUF};

/// Create a connected mux/listener pair.
pub fn pair() -> (Arc<Loopback>, Listener) {
    let (hup, _) = watch::channel(false);
    let shared = Arc::new(Shared { hup });
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let mux = Arc::new(Loopback {
        shared: shared.clone(),
        accept_tx: Mutex::new(Some(accept_tx)),
    });
    let lis = Listener { accept_rx, shared };
    (mux, lis)
}

struct Shared {
    hup: watch::Sender<bool>,
}

impl Shared {
    fn fire_hangup(&self) {
        self.hup.send_replace(true);
    }
}

/// Client side of an in-memory connection.
pub struct Loopback {
    shared: Arc<Shared>,
    accept_tx: Mutex<Option<mpsc::UnboundedSender<Call>>>,
}

#[async_trait]
impl Mux for Loopback {
    fn call(&self) -> Call {
        let (ctx, srx) = chan::channel(CALL_BUF);
        let (stx, crx) = chan::channel(CALL_BUF);
        let client = Call { tx: ctx, rx: crx };
        let server = Call { tx: stx, rx: srx };

        let undelivered = {
            let guard = self.accept_tx.lock().unwrap();
            match guard.as_ref() {
                Some(tx) => tx.send(server).err().map(|e| e.0),
                None => Some(server),
            }
        };
        if let Some(Call { tx, mut rx }) = undelivered {
            // The peer is gone; surface that on first use of the call.
            let e = FsError::io("connection closed");
            rx.close(Some(e.clone()));
            tx.close(Some(e));
        }
        client
    }

    fn shutdown(&self) {
        self.accept_tx.lock().unwrap().take();
        self.shared.fire_hangup();
    }

    async fn hangup(&self) {
        wait_hangup(self.shared.hup.subscribe()).await
    }
}

/// Server side of an in-memory connection: a stream of incoming calls.
pub struct Listener {
    accept_rx: mpsc::UnboundedReceiver<Call>,
    shared: Arc<Shared>,
}

impl Listener {
    /// Next incoming call; `None` once the client shut the mux down.
    pub async fn accept(&mut self) -> Option<Call> {
        self.accept_rx.recv().await
    }

    /// A handle that lets call handlers drop the whole connection, the
    /// way a real server kills a misbehaving or dying client.
    pub fn hangup_handle(&self) -> HangupHandle {
        HangupHandle { shared: self.shared.clone() }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        // Server went away: the client observes peer hangup.
        self.shared.fire_hangup();
    }
}

/// Fires the connection's hangup event from server-side code.
#[derive(Clone)]
pub struct HangupHandle {
    shared: Arc<Shared>,
}

impl HangupHandle {
    pub fn hangup(&self) {
        self.shared.fire_hangup();
    }
}

async fn wait_hangup(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
