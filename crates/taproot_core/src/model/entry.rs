//! Dotted label entries.
//!
//! # Responsibility
//! - Parse and format the `0:1:3` tag paths that address labels.
//! - Keep the entry grammar in one place.
//!
//! # Invariants
//! - Every entry starts with the root tag `0`.
//! - Tags are non-negative integers; sibling order is tag-ascending.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(:\d+)*$").expect("valid entry regex"));

/// Tag identifying one label among its siblings.
pub type Tag = u32;

/// Dotted tag path addressing one label from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Entry(Vec<Tag>);

/// Entry parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryParseError {
    /// Input is blank after trim.
    Empty,
    /// Input does not match the `d(:d)*` grammar.
    Malformed(String),
    /// Input does not start at the root tag `0`.
    NotRooted(String),
    /// A tag segment does not fit the tag integer type.
    TagOutOfRange(String),
}

impl Display for EntryParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "entry must not be blank"),
            Self::Malformed(value) => write!(f, "malformed entry: {value}"),
            Self::NotRooted(value) => write!(f, "entry must start at root tag 0: {value}"),
            Self::TagOutOfRange(value) => write!(f, "entry tag out of range: {value}"),
        }
    }
}

impl Error for EntryParseError {}

impl Entry {
    /// Returns the root entry `0`.
    pub fn root() -> Self {
        Self(vec![0])
    }

    /// Returns a child entry extending this one by `tag`.
    pub fn child(&self, tag: Tag) -> Self {
        let mut tags = self.0.clone();
        tags.push(tag);
        Self(tags)
    }

    /// Returns the tags below the root, in root-to-leaf order.
    pub fn tags_below_root(&self) -> &[Tag] {
        &self.0[1..]
    }

    /// Returns the own tag of the addressed label.
    pub fn tag(&self) -> Tag {
        *self.0.last().expect("entry holds at least the root tag")
    }

    /// Returns distance from the root (root itself has depth 0).
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// Returns whether this entry addresses the root label.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }
}

impl FromStr for Entry {
    type Err = EntryParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EntryParseError::Empty);
        }
        if !ENTRY_RE.is_match(trimmed) {
            return Err(EntryParseError::Malformed(trimmed.to_string()));
        }

        let mut tags = Vec::new();
        for segment in trimmed.split(':') {
            let tag: Tag = segment
                .parse()
                .map_err(|_| EntryParseError::TagOutOfRange(trimmed.to_string()))?;
            tags.push(tag);
        }
        if tags[0] != 0 {
            return Err(EntryParseError::NotRooted(trimmed.to_string()));
        }
        Ok(Self(tags))
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for tag in &self.0 {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{tag}")?;
            first = false;
        }
        Ok(())
    }
}

impl TryFrom<String> for Entry {
    type Error = EntryParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Entry> for String {
    fn from(value: Entry) -> Self {
        value.to_string()
    }
}
