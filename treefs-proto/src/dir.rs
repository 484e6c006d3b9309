//! Directory entries.
//!
//! A [`DirEntry`] is the metadata record the protocol uses for every file
//! and directory: an ordered mapping from string keys to string values,
//! carried across the wire as a single message. A handful of keys are
//! reserved by convention; everything else is opaque to the client.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved key: entry kind, `"-"` for files and `"d"` for directories.
pub const KEY_TYPE: &str = "type";
/// Reserved key: absolute path of the entry within its tree.
pub const KEY_PATH: &str = "path";
/// Reserved key: last path element.
pub const KEY_NAME: &str = "name";
/// Reserved key: modification time.
pub const KEY_MTIME: &str = "mtime";
/// Reserved key: uid of the last writer.
pub const KEY_WUID: &str = "wuid";

/// Metadata for one file or directory.
///
/// Value semantics throughout: entries are cheap to clone and the client
/// copies them defensively before sending, so a caller may keep mutating
/// its own copy after issuing a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirEntry(BTreeMap<String, String>);

impl DirEntry {
    /// An empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry describing a file named `name`.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new().with(KEY_TYPE, "-").with(KEY_NAME, name)
    }

    /// An entry describing a directory named `name`.
    pub fn dir(name: impl Into<String>) -> Self {
        Self::new().with(KEY_TYPE, "d").with(KEY_NAME, name)
    }

    /// Look up an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set an attribute in place.
    pub fn set(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.0.insert(key.into(), val.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.set(key, val);
        self
    }

    /// Remove an attribute, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// The `type` attribute, if present.
    pub fn typ(&self) -> Option<&str> {
        self.get(KEY_TYPE)
    }

    /// `true` if this entry describes a directory (`type == "d"`).
    pub fn is_dir(&self) -> bool {
        self.typ() == Some("d")
    }

    /// The `path` attribute, or `""` when unset.
    pub fn path(&self) -> &str {
        self.get(KEY_PATH).unwrap_or("")
    }

    /// The `name` attribute, or `""` when unset.
    pub fn name(&self) -> &str {
        self.get(KEY_NAME).unwrap_or("")
    }

    /// The `mtime` attribute, if present.
    pub fn mtime(&self) -> Option<&str> {
        self.get(KEY_MTIME)
    }

    /// The `wuid` attribute, if present.
    pub fn wuid(&self) -> Option<&str> {
        self.get(KEY_WUID)
    }

    /// Iterate attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other`'s attributes into `self`, overwriting on conflict.
    ///
    /// This is the wstat merge rule: the server applies the supplied
    /// attributes on top of the stored entry.
    pub fn merge(&mut self, other: &DirEntry) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (k, v) in self.iter() {
            write!(f, "{sep}{k}={v}")?;
            sep = " ";
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for DirEntry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
