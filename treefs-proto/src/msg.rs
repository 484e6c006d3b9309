//! Request and frame catalogue.
//!
//! Every exchange on a call starts with a [`Req`] naming the operation and
//! the tree it acts on; replies are a stream of [`Frame`]s whose runtime
//! shape depends on the operation. The envelope code tags frames at decode
//! time, so a reply of the wrong shape is detected as soon as it arrives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dir::DirEntry;

/// Operation codes, one per request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "Ttrees")]
    Trees,
    #[serde(rename = "Tstat")]
    Stat,
    #[serde(rename = "Twstat")]
    Wstat,
    #[serde(rename = "Tremove")]
    Remove,
    #[serde(rename = "Tremoveall")]
    RemoveAll,
    #[serde(rename = "Tmove")]
    Move,
    #[serde(rename = "Tlink")]
    Link,
    #[serde(rename = "Tget")]
    Get,
    #[serde(rename = "Tput")]
    Put,
    #[serde(rename = "Tfind")]
    Find,
    #[serde(rename = "Tfindget")]
    FindGet,
}

impl Op {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Trees => "Ttrees",
            Op::Stat => "Tstat",
            Op::Wstat => "Twstat",
            Op::Remove => "Tremove",
            Op::RemoveAll => "Tremoveall",
            Op::Move => "Tmove",
            Op::Link => "Tlink",
            Op::Get => "Tget",
            Op::Put => "Tput",
            Op::Find => "Tfind",
            Op::FindGet => "Tfindget",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_zero_i64(n: &i64) -> bool {
    *n == 0
}

fn is_zero_i32(n: &i32) -> bool {
    *n == 0
}

/// One request message.
///
/// Only the fields an operation uses are populated; the rest keep their
/// defaults and are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Req {
    pub op: Op,
    /// Tree the operation acts on.
    pub fsys: String,
    /// Primary path (the source for move, the new link for link).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Secondary path for move and link.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,
    /// Directory entry for put and wstat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<DirEntry>,
    /// Byte offset for get and put.
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub off: i64,
    /// Byte count for get; `-1` reads to the end.
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub count: i64,
    /// Find predicate, evaluated by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pred: String,
    /// Find: source prefix to strip from reported paths.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spref: String,
    /// Find: destination prefix replacing `spref`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dpref: String,
    /// Find: depth of the walk root, used by depth predicates.
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub depth: i32,
}

impl Req {
    /// A request with everything but `op` and `fsys` at its default.
    pub fn new(op: Op, fsys: impl Into<String>) -> Self {
        Req {
            op,
            fsys: fsys.into(),
            path: String::new(),
            to: String::new(),
            d: None,
            off: 0,
            count: 0,
            pred: String::new(),
            spref: String::new(),
            dpref: String::new(),
            depth: 0,
        }
    }
}

impl fmt::Display for Req {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.fsys)?;
        if !self.path.is_empty() {
            write!(f, " {}", self.path)?;
        }
        if !self.to.is_empty() {
            write!(f, " to {}", self.to)?;
        }
        if let Some(d) = &self.d {
            write!(f, " [{d}]")?;
        }
        if self.off != 0 || self.count != 0 {
            write!(f, " off {} count {}", self.off, self.count)?;
        }
        if !self.pred.is_empty() {
            write!(f, " pred {}", self.pred)?;
        }
        Ok(())
    }
}

/// One message on a call, in either direction.
///
/// Requests travel as `Frame::Req`; replies are directory entries, byte
/// chunks, or strings depending on the operation. `FindGet` replies are
/// deliberately heterogeneous and are forwarded to the caller as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "v", rename_all = "snake_case")]
pub enum Frame {
    Req(Req),
    Dir(DirEntry),
    Bytes(Vec<u8>),
    Str(String),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Req(m) => write!(f, "{m}"),
            Frame::Dir(d) => write!(f, "dir[{d}]"),
            Frame::Bytes(b) => write!(f, "[{}]bytes", b.len()),
            Frame::Str(s) => write!(f, "str[{s}]"),
        }
    }
}
