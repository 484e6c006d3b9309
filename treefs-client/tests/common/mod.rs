//! In-memory protocol server for the integration tests.
//!
//! [`TestServer`] implements the connector seam: every `connect` opens a
//! loopback mux and spawns an accept loop serving the full operation
//! catalogue against a shared in-memory world, so files survive redials
//! the way they would on a real server. Config hooks simulate the
//! interesting failures: auth-disabled servers, a connection drop in the
//! middle of a get, and an ill-typed stat reply.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use treefs_client::{Connector, Mux};
use treefs_mux::loopback::{self, HangupHandle, Listener};
use treefs_mux::{Call, Receiver, Sender};
use treefs_proto::{
    path, DirEntry, Frame, FsError, FsResult, Op, Req, KEY_NAME, KEY_PATH, KEY_TYPE,
};

const GET_CHUNK: usize = 8;

#[derive(Default)]
pub struct ServerCfg {
    /// Trees reported by `Ttrees` (the client adds `main` on its own).
    pub trees: Vec<String>,
    /// Fail the auth exchange with the `"auth disabled"` signal.
    pub auth_disabled: bool,
    /// Drop the whole connection after one chunk of a get on this path.
    pub hangup_on_get: Option<String>,
    /// Answer stat on this path with a string frame instead of an entry.
    pub badmsg_on_stat: Option<String>,
}

type World = HashMap<(String, String), (DirEntry, Vec<u8>)>;

#[derive(Clone)]
pub struct TestServer {
    cfg: Arc<ServerCfg>,
    trees: Arc<Mutex<Vec<String>>>,
    world: Arc<Mutex<World>>,
    /// Connections opened so far; lets tests assert on dial dedup.
    pub connects: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn new(cfg: ServerCfg) -> Self {
        let trees = cfg.trees.clone();
        let srv = TestServer {
            cfg: Arc::new(cfg),
            trees: Arc::new(Mutex::new(trees)),
            world: Arc::new(Mutex::new(HashMap::new())),
            connects: Arc::new(AtomicUsize::new(0)),
        };
        srv.seed_roots();
        srv
    }

    pub fn serving(trees: &[&str]) -> Self {
        Self::new(ServerCfg {
            trees: trees.iter().map(|t| t.to_string()).collect(),
            ..ServerCfg::default()
        })
    }

    /// Replace the served tree set (takes effect on the next connect).
    pub fn set_trees(&self, trees: &[&str]) {
        *self.trees.lock().unwrap() = trees.iter().map(|t| t.to_string()).collect();
        self.seed_roots();
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn seed_roots(&self) {
        let mut w = self.world.lock().unwrap();
        let mut ts = self.trees.lock().unwrap().clone();
        ts.push("main".to_string());
        for t in ts {
            w.entry((t, "/".to_string()))
                .or_insert_with(|| (DirEntry::dir("/").with(KEY_PATH, "/"), Vec::new()));
        }
    }

    fn lookup(&self, fsys: &str, p: &str) -> Option<(DirEntry, Vec<u8>)> {
        self.world
            .lock()
            .unwrap()
            .get(&(fsys.to_string(), p.to_string()))
            .cloned()
    }

    async fn serve(self, mut lis: Listener) {
        let hup = lis.hangup_handle();
        while let Some(call) = lis.accept().await {
            let srv = self.clone();
            let hup = hup.clone();
            tokio::spawn(async move { srv.handle(call, hup).await });
        }
    }

    async fn handle(self, call: Call, hup: HangupHandle) {
        let Call { tx, mut rx } = call;
        let first = match rx.recv().await {
            Some(f) => f,
            None => return,
        };
        match first {
            Frame::Str(hello) => {
                if self.cfg.auth_disabled {
                    tx.close(Some(FsError::app("auth disabled")));
                    return;
                }
                let uid = hello.split_whitespace().nth(1).unwrap_or("anon");
                let _ = tx.send(Frame::Str(uid.to_string())).await;
                tx.close(None);
            }
            Frame::Req(m) => self.op(m, tx, rx, hup).await,
            _ => tx.close(Some(FsError::BadMsg)),
        }
    }

    async fn op(
        self,
        m: Req,
        tx: Sender<Frame>,
        mut rx: Receiver<Frame>,
        hup: HangupHandle,
    ) {
        match m.op {
            Op::Trees => {
                let trees = self.trees.lock().unwrap().clone();
                for t in trees {
                    if tx.send(Frame::Str(t)).await.is_err() {
                        return;
                    }
                }
                tx.close(None);
            }

            Op::Stat => {
                if self.cfg.badmsg_on_stat.as_deref() == Some(m.path.as_str()) {
                    let _ = tx.send(Frame::Str("not an entry".into())).await;
                    tx.close(None);
                    return;
                }
                match self.lookup(&m.fsys, &m.path) {
                    Some((d, _)) => {
                        let _ = tx.send(Frame::Dir(d)).await;
                        tx.close(None);
                    }
                    None => tx.close(Some(not_found(&m.path))),
                }
            }

            Op::Wstat => match self.lookup(&m.fsys, &m.path) {
                Some((mut d, b)) => {
                    if let Some(nd) = &m.d {
                        d.merge(nd);
                    }
                    d.set(KEY_PATH, &m.path);
                    self.world
                        .lock()
                        .unwrap()
                        .insert((m.fsys.clone(), m.path.clone()), (d.clone(), b));
                    let _ = tx.send(Frame::Dir(d)).await;
                    tx.close(None);
                }
                None => tx.close(Some(not_found(&m.path))),
            },

            Op::Remove => {
                let mut w = self.world.lock().unwrap();
                let key = (m.fsys.clone(), m.path.clone());
                if !w.contains_key(&key) {
                    drop(w);
                    tx.close(Some(not_found(&m.path)));
                    return;
                }
                let children = w
                    .keys()
                    .any(|(f, p)| *f == m.fsys && p != &m.path && path::has_prefix(p, &m.path));
                if children {
                    drop(w);
                    tx.close(Some(FsError::app(format!("'{}': directory not empty", m.path))));
                    return;
                }
                w.remove(&key);
                drop(w);
                tx.close(None);
            }

            Op::RemoveAll => {
                let mut w = self.world.lock().unwrap();
                let keys: Vec<_> = w
                    .keys()
                    .filter(|(f, p)| *f == m.fsys && path::has_prefix(p, &m.path))
                    .cloned()
                    .collect();
                if keys.is_empty() {
                    drop(w);
                    tx.close(Some(not_found(&m.path)));
                    return;
                }
                for k in keys {
                    w.remove(&k);
                }
                drop(w);
                tx.close(None);
            }

            Op::Move => {
                let mut w = self.world.lock().unwrap();
                let keys: Vec<_> = w
                    .keys()
                    .filter(|(f, p)| *f == m.fsys && path::has_prefix(p, &m.path))
                    .cloned()
                    .collect();
                if keys.is_empty() {
                    drop(w);
                    tx.close(Some(not_found(&m.path)));
                    return;
                }
                for (f, p) in keys {
                    let (mut d, b) = w.remove(&(f.clone(), p.clone())).unwrap();
                    let np = rewrite(&p, &m.path, &m.to);
                    d.set(KEY_PATH, &np);
                    d.set(KEY_NAME, last_elem(&np));
                    w.insert((f, np), (d, b));
                }
                drop(w);
                tx.close(None);
            }

            Op::Link => match self.lookup(&m.fsys, &m.to) {
                Some((mut d, b)) => {
                    d.set(KEY_PATH, &m.path);
                    d.set(KEY_NAME, last_elem(&m.path));
                    self.world
                        .lock()
                        .unwrap()
                        .insert((m.fsys.clone(), m.path.clone()), (d, b));
                    tx.close(None);
                }
                None => tx.close(Some(not_found(&m.to))),
            },

            Op::Get => {
                if self.cfg.hangup_on_get.as_deref() == Some(m.path.as_str()) {
                    let _ = tx.send(Frame::Bytes(b"partial".to_vec())).await;
                    tx.close(Some(FsError::io("connection reset")));
                    hup.hangup();
                    return;
                }
                match self.lookup(&m.fsys, &m.path) {
                    None => tx.close(Some(not_found(&m.path))),
                    Some((_, bytes)) => {
                        let start = (m.off.max(0) as usize).min(bytes.len());
                        let end = if m.count < 0 {
                            bytes.len()
                        } else {
                            (start + m.count as usize).min(bytes.len())
                        };
                        for chunk in bytes[start..end].chunks(GET_CHUNK) {
                            if tx.send(Frame::Bytes(chunk.to_vec())).await.is_err() {
                                return;
                            }
                        }
                        tx.close(None);
                    }
                }
            }

            Op::Put => {
                let mut d = m.d.clone().unwrap_or_default();
                d.set(KEY_PATH, &m.path);
                d.set(KEY_NAME, last_elem(&m.path));
                if d.typ().is_none() {
                    d.set(KEY_TYPE, "-");
                }
                let mut content = Vec::new();
                if !d.is_dir() {
                    let off = m.off.max(0) as usize;
                    if off > 0 {
                        if let Some((_, old)) = self.lookup(&m.fsys, &m.path) {
                            content = old;
                        }
                        if content.len() < off {
                            content.resize(off, 0);
                        }
                        content.truncate(off);
                    }
                    loop {
                        match rx.recv().await {
                            Some(Frame::Bytes(b)) => content.extend_from_slice(&b),
                            Some(_) => {
                                tx.close(Some(FsError::BadMsg));
                                return;
                            }
                            None => break,
                        }
                    }
                    if let Some(e) = rx.reason() {
                        tx.close(Some(e));
                        return;
                    }
                }
                self.world
                    .lock()
                    .unwrap()
                    .insert((m.fsys.clone(), m.path.clone()), (d.clone(), content));
                let _ = tx.send(Frame::Dir(d)).await;
                tx.close(None);
            }

            Op::Find | Op::FindGet => {
                if self.lookup(&m.fsys, &m.path).is_none() {
                    tx.close(Some(not_found(&m.path)));
                    return;
                }
                for (d, content) in self.matches(&m) {
                    if tx.send(Frame::Dir(d)).await.is_err() {
                        return;
                    }
                    if m.op == Op::FindGet {
                        if let Some(b) = content {
                            if tx.send(Frame::Bytes(b)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                tx.close(None);
            }
        }
    }

    /// Entries under the walk root matching the predicate, in path
    /// order, with paths rewritten from `spref` to `dpref`. For findget,
    /// file content rides along.
    fn matches(&self, m: &Req) -> Vec<(DirEntry, Option<Vec<u8>>)> {
        let w = self.world.lock().unwrap();
        let root_elems = path::elems(&m.path).len() as i32;
        let mut hits: Vec<(String, DirEntry, Option<Vec<u8>>)> = w
            .iter()
            .filter(|((f, p), _)| *f == m.fsys && path::has_prefix(p, &m.path))
            .filter(|((_, p), _)| {
                let depth = m.depth + path::elems(p).len() as i32 - root_elems;
                pred_matches(&m.pred, depth)
            })
            .map(|((_, p), (d, b))| {
                let content = (!d.is_dir()).then(|| b.clone());
                (p.clone(), d.clone(), content)
            })
            .collect();
        hits.sort_by(|a, b| path::path_cmp(&a.0, &b.0));
        hits.into_iter()
            .map(|(p, mut d, content)| {
                if !m.spref.is_empty() {
                    let np = rewrite(&p, &m.spref, &m.dpref);
                    d.set(KEY_PATH, &np);
                }
                (d, content)
            })
            .collect()
    }
}

#[async_trait]
impl Connector for TestServer {
    async fn connect(&self, _addr: &str) -> FsResult<Arc<dyn Mux>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (mux, lis) = loopback::pair();
        let srv = self.clone();
        tokio::spawn(srv.serve(lis));
        Ok(mux)
    }
}

fn not_found(p: &str) -> FsError {
    FsError::app(format!("'{p}': file not found"))
}

fn last_elem(p: &str) -> &str {
    path::elems(p).last().copied().unwrap_or("/")
}

/// Move `p` from under `spref` to under `dpref`.
fn rewrite(p: &str, spref: &str, dpref: &str) -> String {
    let suf = path::suffix(p, spref);
    if suf.is_empty() {
        return p.to_string();
    }
    if suf == "/" {
        return dpref.to_string();
    }
    path::clean(&format!("{dpref}{suf}"))
}

/// Minimal predicate language: empty matches everything, `depth<=N`
/// prunes by absolute depth.
fn pred_matches(pred: &str, depth: i32) -> bool {
    if pred.is_empty() {
        return true;
    }
    if let Some(n) = pred.strip_prefix("depth<=") {
        return n.parse::<i32>().map(|n| depth <= n).unwrap_or(true);
    }
    true
}

/// Await `fut` under the suite timeout.
pub async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test timed out")
}

/// Poll `cond` until it holds; the watcher runs asynchronously, so
/// closed/evicted states are eventual.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}
