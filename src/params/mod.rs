//! Nested request parameters
//!
//! A [`ParamBag`] is a tree of mappings and sequences, with text, uploads
//! or nulls at the leaves. Nodes are addressed by key paths such as
//! `["user", "avatar"]`; a segment addressing a sequence is parsed as an
//! index.

mod upload;

pub use upload::{Upload, UploadId};

use std::collections::BTreeMap;

/// Key used when a resolution is asked for an empty key path
pub const DEFAULT_KEY: &str = "upload";

/// One node of a parameter tree
#[derive(Debug)]
pub enum Param {
    Null,
    Text(String),
    Upload(Upload),
    Map(BTreeMap<String, Param>),
    List(Vec<Param>),
}

impl Param {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_upload(&self) -> Option<&Upload> {
        match self {
            Self::Upload(upload) => Some(upload),
            _ => None,
        }
    }

    pub fn as_upload_mut(&mut self) -> Option<&mut Upload> {
        match self {
            Self::Upload(upload) => Some(upload),
            _ => None,
        }
    }

    fn child(&self, segment: &str) -> Option<&Param> {
        match self {
            Self::Map(map) => map.get(segment),
            Self::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut Param> {
        match self {
            Self::Map(map) => map.get_mut(segment),
            Self::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get_mut(i)),
            _ => None,
        }
    }

    /// Replace or insert the child at `segment`.
    ///
    /// Mappings accept any key. Sequences only accept an existing index.
    fn put(&mut self, segment: &str, value: Param) -> Result<(), Param> {
        match self {
            Self::Map(map) => {
                map.insert(segment.to_string(), value);
                Ok(())
            }
            Self::List(list) => match segment.parse::<usize>().ok().and_then(|i| list.get_mut(i)) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(value),
            },
            _ => Err(value),
        }
    }
}

impl From<&str> for Param {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Param {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Upload> for Param {
    fn from(upload: Upload) -> Self {
        Self::Upload(upload)
    }
}

impl From<serde_json::Value> for Param {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Param::from).collect()),
            Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Param::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Submitted form fields, rooted at a mapping
#[derive(Debug)]
pub struct ParamBag {
    root: Param,
}

impl ParamBag {
    pub fn new() -> Self {
        Self {
            root: Param::Map(BTreeMap::new()),
        }
    }

    /// Build a bag from a decoded JSON form payload.
    ///
    /// A non-object payload is wrapped under [`DEFAULT_KEY`].
    pub fn from_json(value: serde_json::Value) -> Self {
        match Param::from(value) {
            root @ Param::Map(_) => Self { root },
            other => {
                let mut bag = Self::new();
                bag.insert(DEFAULT_KEY, other);
                bag
            }
        }
    }

    /// Insert a top-level field
    pub fn insert(&mut self, key: &str, value: impl Into<Param>) {
        if let Param::Map(map) = &mut self.root {
            map.insert(key.to_string(), value.into());
        }
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Param> {
        path.iter()
            .try_fold(&self.root, |node, segment| node.child(segment.as_ref()))
    }

    pub fn get_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Param> {
        path.iter()
            .try_fold(&mut self.root, |node, segment| node.child_mut(segment.as_ref()))
    }

    /// Write `value` at `path`.
    ///
    /// Intermediate nodes are never created: if any of them is missing the
    /// bag is left untouched and `false` is returned.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<Param>) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        match self.get_mut(parents) {
            Some(parent) => parent.put(last.as_ref(), value.into()).is_ok(),
            None => false,
        }
    }

    /// Insert `value` at `path`, creating intermediate mappings on the way.
    ///
    /// For building bags. Resolution write-back goes through [`set`](Self::set).
    pub fn insert_path<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<Param>) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };

        let mut node = &mut self.root;
        for segment in parents {
            let Param::Map(map) = node else {
                return false;
            };
            node = map
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| Param::Map(BTreeMap::new()));
        }
        node.put(last.as_ref(), value.into()).is_ok()
    }

    /// Detach the node at `path`, leaving `Null` behind in sequences
    pub fn take<S: AsRef<str>>(&mut self, path: &[S]) -> Option<Param> {
        let (last, parents) = path.split_last()?;
        match self.get_mut(parents)? {
            Param::Map(map) => map.remove(last.as_ref()),
            Param::List(list) => {
                let slot = list.get_mut(last.as_ref().parse::<usize>().ok()?)?;
                Some(std::mem::replace(slot, Param::Null))
            }
            _ => None,
        }
    }
}

impl Default for ParamBag {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a dotted key such as `user.avatar` into a key path
pub fn parse_key(key: &str) -> Vec<String> {
    key.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
