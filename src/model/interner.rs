//! Frame name interning.
//!
//! Every stack source owns one `FrameInterner`. A frame is a
//! (module, method) pair; its identity is the index it was assigned
//! on first insertion. Ids are dense and follow insertion order.

use crate::utils::config::{BROKEN_FRAME_NAME, UNKNOWN_FRAME_NAME};
use indexmap::{Equivalent, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a frame within one interner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u32);

impl FrameId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned (module, method-or-symbol) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub module: String,
    pub name: String,
}

// Hash must agree with `FrameKey` so borrowed lookups find owned entries.
impl Hash for Frame {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module.as_str().hash(state);
        self.name.as_str().hash(state);
    }
}

impl Frame {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// `module!name`, or just `name` when the module is empty
    pub fn display_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}!{}", self.module, self.name)
        }
    }

    /// Split a `module!name` string; text without `!` has no module
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('!') {
            Some((module, name)) => Frame::new(module.trim(), name.trim()),
            None => Frame::new("", qualified.trim()),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}!{}", self.module, self.name)
        }
    }
}

/// Borrowed lookup key, avoids allocating on an interning hit
struct FrameKey<'a> {
    module: &'a str,
    name: &'a str,
}

impl Hash for FrameKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module.hash(state);
        self.name.hash(state);
    }
}

impl Equivalent<Frame> for FrameKey<'_> {
    fn equivalent(&self, key: &Frame) -> bool {
        self.module == key.module && self.name == key.name
    }
}

/// Deduplicates frames into stable small integer ids
#[derive(Debug, Clone, Default)]
pub struct FrameInterner {
    frames: IndexSet<Frame>,
}

impl FrameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `(module, name)`, allocating the next id on first sight
    pub fn intern(&mut self, module: &str, name: &str) -> FrameId {
        let key = FrameKey { module, name };
        if let Some(index) = self.frames.get_index_of(&key) {
            return FrameId(index as u32);
        }
        let (index, _) = self.frames.insert_full(Frame::new(module, name));
        FrameId(index as u32)
    }

    /// Intern an owned frame
    pub fn intern_frame(&mut self, frame: &Frame) -> FrameId {
        self.intern(&frame.module, &frame.name)
    }

    /// Sentinel for frames whose name is missing
    pub fn intern_unknown(&mut self) -> FrameId {
        self.intern("", UNKNOWN_FRAME_NAME)
    }

    /// Sentinel for frames that could not be decoded
    pub fn intern_broken(&mut self) -> FrameId {
        self.intern("", BROKEN_FRAME_NAME)
    }

    /// Look up an id without interning
    pub fn find(&self, module: &str, name: &str) -> Option<FrameId> {
        self.frames
            .get_index_of(&FrameKey { module, name })
            .map(|index| FrameId(index as u32))
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get_index(id.index())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in id order
    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .map(|(index, frame)| (FrameId(index as u32), frame))
    }
}
