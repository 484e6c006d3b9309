//! Streaming RPC envelopes.
//!
//! Every filesystem operation is one short-lived call on the mux, run on
//! a spawned task so the caller immediately holds the result half of a
//! reason-carrying channel. Five shapes cover the catalogue:
//!
//! - unary request / single directory reply — [`RemoteFs::stat`],
//!   [`RemoteFs::wstat`]
//! - unary request / error-only reply — [`RemoteFs::remove`],
//!   [`RemoteFs::remove_all`], [`RemoteFs::mv`], [`RemoteFs::link`]
//! - unary request / byte stream — [`RemoteFs::get`]
//! - streamed request / single directory reply — [`RemoteFs::put`]
//! - unary request / entry or heterogeneous stream — [`RemoteFs::find`],
//!   [`RemoteFs::find_get`]
//!
//! Shared rules: a rejected request send becomes the close reason of both
//! the call's inbound half and the caller's result channel; the result
//! channel is closed exactly once, with the final terminal error or a
//! locally synthesised [`FsError::BadMsg`]; closing the result channel
//! from the consumer side cancels the call in-band.

use std::collections::HashSet;
use std::sync::Arc;

use treefs_mux::{channel, Mux, Receiver, Sender};
use treefs_proto::path::use_abs_path;
use treefs_proto::{DirEntry, Frame, FsError, FsResult, Op, Req};

use crate::client::RemoteFs;

/// The reason a send failed: the peer's recorded close reason, or a bare
/// transport error when the channel just went away.
fn send_reason(tx: &Sender<Frame>) -> FsError {
    tx.reason().unwrap_or_else(|| FsError::io("connection closed"))
}

/// A result channel that was dead on arrival.
fn closed_receiver<T>(err: FsError) -> Receiver<T> {
    let (tx, rx) = channel(1);
    tx.close(Some(err));
    rx
}

impl RemoteFs {
    fn req_at(&self, op: Op, path: &str) -> FsResult<Req> {
        let mut m = Req::new(op, self.fsys_name());
        m.path = use_abs_path(path)?;
        Ok(m)
    }

    /// Metadata for `path`: one entry, or the close reason tells why not.
    pub fn stat(&self, path: &str) -> Receiver<DirEntry> {
        match self.req_at(Op::Stat, path) {
            Ok(m) => self.dircall(m),
            Err(e) => closed_receiver(e),
        }
    }

    /// Update `path`'s metadata with the attributes in `d`; replies with
    /// the entry as stored.
    pub fn wstat(&self, path: &str, d: &DirEntry) -> Receiver<DirEntry> {
        match self.req_at(Op::Wstat, path) {
            Ok(mut m) => {
                m.d = Some(d.clone());
                self.dircall(m)
            }
            Err(e) => closed_receiver(e),
        }
    }

    /// Remove `path`. Fails on non-empty directories.
    pub fn remove(&self, path: &str) -> Receiver<()> {
        match self.req_at(Op::Remove, path) {
            Ok(m) => self.errcall(m),
            Err(e) => closed_receiver(e),
        }
    }

    /// Remove `path` and everything below it.
    pub fn remove_all(&self, path: &str) -> Receiver<()> {
        match self.req_at(Op::RemoveAll, path) {
            Ok(m) => self.errcall(m),
            Err(e) => closed_receiver(e),
        }
    }

    /// Move `from` to `to` within the tree.
    pub fn mv(&self, from: &str, to: &str) -> Receiver<()> {
        let m = self.req_at(Op::Move, from).and_then(|mut m| {
            m.to = use_abs_path(to)?;
            Ok(m)
        });
        match m {
            Ok(m) => self.errcall(m),
            Err(e) => closed_receiver(e),
        }
    }

    /// Make `newp` a link to `oldp`.
    pub fn link(&self, oldp: &str, newp: &str) -> Receiver<()> {
        let m = self.req_at(Op::Link, newp).and_then(|mut m| {
            m.to = use_abs_path(oldp)?;
            Ok(m)
        });
        match m {
            Ok(m) => self.errcall(m),
            Err(e) => closed_receiver(e),
        }
    }

    /// Read `count` bytes of `path` starting at `off`; `count == -1`
    /// reads to the end. Chunks arrive as the server sends them; closing
    /// the returned receiver with a reason cancels the transfer.
    pub fn get(&self, path: &str, off: i64, count: i64) -> Receiver<Vec<u8>> {
        let m = match self.req_at(Op::Get, path) {
            Ok(mut m) => {
                m.off = off;
                m.count = count;
                m
            }
            Err(e) => return closed_receiver(e),
        };
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            call.tx.close(None);
            loop {
                match call.rx.recv().await {
                    Some(Frame::Bytes(b)) => {
                        if rtx.send(b).await.is_err() {
                            // Caller cancelled; pass its reason upstream.
                            call.rx.close(rtx.reason());
                            break;
                        }
                    }
                    Some(_) => {
                        call.rx.close(Some(FsError::BadMsg));
                        break;
                    }
                    None => break,
                }
            }
            let err = call.rx.reason();
            #[cfg(feature = "tracing")]
            if let Some(e) = &err {
                tracing::debug!("<- {e}");
            }
            rtx.close(err);
        });
        rrx
    }

    /// Write a file or make a directory at `path`.
    ///
    /// `d` is copied before use, so the caller may keep its own entry.
    /// For files, `dc` streams the content starting at `off`; it is
    /// drained to completion, and a reasoned close from the producing
    /// side aborts the put with that reason. Directory puts (and puts
    /// with no data channel) close `dc` immediately. The reply is the
    /// entry as created.
    pub fn put(
        &self,
        path: &str,
        d: &DirEntry,
        off: i64,
        dc: Option<Receiver<Vec<u8>>>,
    ) -> Receiver<DirEntry> {
        let d = d.clone();
        let m = match self.req_at(Op::Put, path) {
            Ok(mut m) => {
                m.d = Some(d.clone());
                m.off = off;
                m
            }
            Err(e) => {
                if let Some(mut dc) = dc {
                    dc.close(Some(e.clone()));
                }
                return closed_receiver(e);
            }
        };
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mut dc = dc;
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    if let Some(dc) = dc.as_mut() {
                        dc.close(Some(e.clone()));
                    }
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                if let Some(dc) = dc.as_mut() {
                    dc.close(Some(err.clone()));
                }
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            if d.is_dir() || dc.is_none() {
                if let Some(dc) = dc.as_mut() {
                    dc.close(None);
                }
                call.tx.close(None);
            } else {
                let dc = dc.as_mut().unwrap();
                let fwd_err = loop {
                    match dc.recv().await {
                        Some(b) => {
                            if call.tx.send(Frame::Bytes(b)).await.is_err() {
                                let err = send_reason(&call.tx);
                                dc.close(Some(err.clone()));
                                break Some(err);
                            }
                        }
                        None => break dc.reason(),
                    }
                };
                call.tx.close(fwd_err.clone());
                if let Some(err) = fwd_err {
                    call.rx.close(Some(err.clone()));
                    rtx.close(Some(err));
                    return;
                }
            }
            match call.rx.recv().await {
                Some(Frame::Dir(rd)) => {
                    let _ = rtx.send(rd).await;
                    call.rx.close(None);
                    rtx.close(None);
                }
                Some(_) => {
                    call.rx.close(Some(FsError::BadMsg));
                    rtx.close(Some(FsError::BadMsg));
                }
                None => {
                    let err = call.rx.reason().unwrap_or(FsError::BadMsg);
                    rtx.close(Some(err));
                }
            }
        });
        rrx
    }

    /// Walk the tree under `path`, streaming the entries matching `pred`.
    ///
    /// Reported paths have `spref` rewritten to `dpref`; `depth0` is the
    /// depth of the walk root, for depth predicates. Closing the returned
    /// receiver with a reason cancels the walk.
    pub fn find(
        &self,
        path: &str,
        pred: &str,
        spref: &str,
        dpref: &str,
        depth0: i32,
    ) -> Receiver<DirEntry> {
        let m = match self.req_at(Op::Find, path) {
            Ok(mut m) => {
                m.pred = pred.to_string();
                m.spref = spref.to_string();
                m.dpref = dpref.to_string();
                m.depth = depth0;
                m
            }
            Err(e) => return closed_receiver(e),
        };
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            call.tx.close(None);
            loop {
                match call.rx.recv().await {
                    Some(Frame::Dir(d)) => {
                        if rtx.send(d).await.is_err() {
                            call.rx.close(rtx.reason());
                            break;
                        }
                    }
                    Some(_) => {
                        call.rx.close(Some(FsError::BadMsg));
                        break;
                    }
                    None => break,
                }
            }
            rtx.close(call.rx.reason());
        });
        rrx
    }

    /// Like [`find`](Self::find), but the server interleaves each found
    /// file's content after its entry. The stream is deliberately
    /// untyped: frames are forwarded verbatim and the caller interprets
    /// them.
    pub fn find_get(
        &self,
        path: &str,
        pred: &str,
        spref: &str,
        dpref: &str,
        depth0: i32,
    ) -> Receiver<Frame> {
        let m = match self.req_at(Op::FindGet, path) {
            Ok(mut m) => {
                m.pred = pred.to_string();
                m.spref = spref.to_string();
                m.dpref = dpref.to_string();
                m.depth = depth0;
                m
            }
            Err(e) => return closed_receiver(e),
        };
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            call.tx.close(None);
            while let Some(f) = call.rx.recv().await {
                if rtx.send(f).await.is_err() {
                    call.rx.close(rtx.reason());
                    break;
                }
            }
            rtx.close(call.rx.reason());
        });
        rrx
    }

    // Unary request, single directory reply.
    fn dircall(&self, m: Req) -> Receiver<DirEntry> {
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            call.tx.close(None);
            match call.rx.recv().await {
                Some(Frame::Dir(d)) => {
                    let _ = rtx.send(d).await;
                    call.rx.close(None);
                    rtx.close(None);
                }
                Some(_) => {
                    call.rx.close(Some(FsError::BadMsg));
                    rtx.close(Some(FsError::BadMsg));
                }
                None => {
                    let err = call.rx.reason().unwrap_or(FsError::BadMsg);
                    #[cfg(feature = "tracing")]
                    tracing::debug!("<- {err}");
                    rtx.close(Some(err));
                }
            }
        });
        rrx
    }

    // Unary request, empty reply; the close reason is the outcome.
    fn errcall(&self, m: Req) -> Receiver<()> {
        let (rtx, rrx) = channel(1);
        let mux = self.mux();
        tokio::spawn(async move {
            let mux = match mux {
                Ok(mx) => mx,
                Err(e) => {
                    rtx.close(Some(e));
                    return;
                }
            };
            let mut call = mux.call();
            #[cfg(feature = "tracing")]
            tracing::debug!("-> {m}");
            if call.tx.send(Frame::Req(m)).await.is_err() {
                let err = send_reason(&call.tx);
                call.rx.close(Some(err.clone()));
                rtx.close(Some(err));
                return;
            }
            call.tx.close(None);
            let _ = call.rx.recv().await;
            let err = call.rx.reason();
            call.rx.close(err.clone());
            #[cfg(feature = "tracing")]
            if let Some(e) = &err {
                tracing::debug!("<- {e}");
            }
            rtx.close(err);
        });
        rrx
    }
}

/// Ask the server which trees it serves: one `Ttrees` request on a fresh
/// call, then a stream of tree names. Runs against an explicit mux
/// because redial calls it before publishing the connection.
pub(crate) async fn fetch_trees(mux: &Arc<dyn Mux>) -> FsResult<HashSet<String>> {
    let mut call = mux.call();
    let m = Req::new(Op::Trees, "main");
    if call.tx.send(Frame::Req(m)).await.is_err() {
        let err = send_reason(&call.tx);
        call.rx.close(Some(err.clone()));
        return Err(err);
    }
    call.tx.close(None);
    let mut trees = HashSet::new();
    loop {
        match call.rx.recv().await {
            Some(Frame::Str(s)) => {
                trees.insert(s);
            }
            Some(_) => {
                call.rx.close(Some(FsError::BadMsg));
                return Err(FsError::BadMsg);
            }
            None => break,
        }
    }
    match call.rx.reason() {
        Some(e) => Err(e),
        None => Ok(trees),
    }
}
