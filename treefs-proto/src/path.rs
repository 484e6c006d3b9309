//! Absolute-path helpers.
//!
//! The protocol deals in slash-separated absolute paths that are cleaned
//! lexically on the client before they reach the wire. These helpers do
//! no filesystem access.

use crate::error::{FsError, FsResult};

/// Lexically clean a path: collapse repeated slashes, resolve `.` and
/// `..`, and strip any trailing slash. The result is never empty.
pub fn clean(p: &str) -> String {
    if p.is_empty() {
        return ".".to_string();
    }
    let rooted = p.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for el in p.split('/') {
        match el {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|l| *l != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            _ => out.push(el),
        }
    }
    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Require `p` to be absolute and return it cleaned.
pub fn use_abs_path(p: &str) -> FsResult<String> {
    if !p.starts_with('/') {
        return Err(FsError::NotAbs(p.to_string()));
    }
    Ok(clean(p))
}

/// Path elements of `p`; empty for `/`.
pub fn elems(p: &str) -> Vec<&str> {
    let p = p.strip_prefix('/').unwrap_or(p);
    if p.is_empty() {
        Vec::new()
    } else {
        p.split('/').collect()
    }
}

/// `true` if `pref` is a prefix path of `p` (or the same path).
pub fn has_prefix(p: &str, pref: &str) -> bool {
    if pref.is_empty() {
        return true;
    }
    let p = clean(p);
    let pref = clean(pref);
    if pref.len() > p.len() || !p.starts_with(&pref) {
        return false;
    }
    pref == "/" || p.len() == pref.len() || p.as_bytes()[pref.len()] == b'/'
}

/// The suffix of `p` relative to `pref`, starting with `/`, or `""` when
/// `pref` is not a prefix of `p`. `suffix(p, p)` is `"/"`.
pub fn suffix(p: &str, pref: &str) -> String {
    if p.is_empty() {
        return String::new();
    }
    let p = clean(p);
    if pref.is_empty() {
        return p;
    }
    let pref = clean(pref);
    if (pref.starts_with('/')) != (p.starts_with('/')) {
        return String::new();
    }
    if pref == "." || pref == "/" {
        return p;
    }
    if p.len() < pref.len() || !p.starts_with(&pref) {
        return String::new();
    }
    if p.len() == pref.len() {
        return "/".to_string();
    }
    if p.as_bytes()[pref.len()] != b'/' {
        return String::new();
    }
    p[pref.len()..].to_string()
}

/// Order two paths one element at a time, so `/a/b` sorts before `/a!c`
/// would under plain string order.
pub fn path_cmp(p0: &str, p1: &str) -> std::cmp::Ordering {
    let e0 = elems(p0);
    let e1 = elems(p1);
    for (a, b) in e0.iter().zip(e1.iter()) {
        match a.cmp(b) {
            std::cmp::Ordering::Equal => {}
            other => return other,
        }
    }
    e0.len().cmp(&e1.len())
}
