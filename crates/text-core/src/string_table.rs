//! Static token tables mapping spellings to small integer ids
//!
//! A [`StringTable`] is an immutable list of spellings; an entry's id is its
//! index. Each entry also carries a precomputed *key*: the smallest character
//! offset at which its spelling differs (case-insensitively) from every other
//! entry of the same length. Lookup compares that single byte first and only
//! falls back to a full case-insensitive compare when it matches, so most
//! non-matching candidates are rejected after one byte.
//!
//! Tables are normally emitted ahead of time by the `strtable-gen` tool as
//! `static` data (see [`crate::codegen`]), or built once at startup with
//! [`StringTable::new`] behind a lazy static.
//!
//! # Examples
//!
//! ```rust
//! use rvoip_text_core::string_table::{StringTable, StringTableEntry};
//!
//! static METHODS: StringTable = StringTable::from_static(&[
//!     StringTableEntry::new("SET-PARAMS", 0),
//!     StringTableEntry::new("GET-PARAMS", 0),
//!     StringTableEntry::new("SPEAK", 0),
//! ]);
//!
//! assert_eq!(METHODS.find(b"speak"), Some(2));
//! assert_eq!(METHODS.get(0), Some("SET-PARAMS"));
//! assert_eq!(METHODS.position(b"STOP"), METHODS.len());
//! ```

use std::borrow::Cow;

use crate::error::{Error, Result};

/// One immutable table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTableEntry {
    spelling: &'static str,
    key: usize,
}

impl StringTableEntry {
    /// Creates an entry with a precomputed discriminating index
    pub const fn new(spelling: &'static str, key: usize) -> Self {
        Self { spelling, key }
    }

    pub fn spelling(&self) -> &'static str {
        self.spelling
    }

    /// Discriminating character index (equal to the spelling length when no
    /// single index discriminates)
    pub fn key(&self) -> usize {
        self.key
    }

    fn matches(&self, candidate: &[u8]) -> bool {
        let spelling = self.spelling.as_bytes();
        if spelling.len() != candidate.len() {
            return false;
        }
        if self.key < spelling.len() && !spelling[self.key].eq_ignore_ascii_case(&candidate[self.key]) {
            return false;
        }
        spelling.eq_ignore_ascii_case(candidate)
    }
}

/// Immutable id <-> spelling table
#[derive(Debug, Clone)]
pub struct StringTable {
    entries: Cow<'static, [StringTableEntry]>,
}

impl StringTable {
    /// Wraps a generated static entry list
    pub const fn from_static(entries: &'static [StringTableEntry]) -> Self {
        Self { entries: Cow::Borrowed(entries) }
    }

    /// Builds a table, computing every entry's discriminating index.
    ///
    /// Fails if the same spelling (ignoring case) appears twice.
    pub fn new(spellings: &[&'static str]) -> Result<Self> {
        check_unique(spellings)?;
        let entries = compute_keys(spellings)
            .into_iter()
            .zip(spellings.iter().copied())
            .map(|(key, spelling)| StringTableEntry::new(spelling, key))
            .collect::<Vec<_>>();
        Ok(Self { entries: Cow::Owned(entries) })
    }

    /// Number of entries; also the "not found" sentinel of [`StringTable::position`]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StringTableEntry] {
        &self.entries
    }

    /// Spelling of `id`
    pub fn get(&self, id: usize) -> Option<&'static str> {
        self.entries.get(id).map(StringTableEntry::spelling)
    }

    /// Id of `candidate` (case-insensitive), or `self.len()` when absent
    pub fn position(&self, candidate: &[u8]) -> usize {
        self.entries
            .iter()
            .position(|entry| entry.matches(candidate))
            .unwrap_or(self.entries.len())
    }

    /// Id of `candidate` (case-insensitive)
    pub fn find(&self, candidate: &[u8]) -> Option<usize> {
        let id = self.position(candidate);
        (id < self.len()).then_some(id)
    }

    /// Iterates `(id, spelling)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'static str)> + '_ {
        self.entries.iter().enumerate().map(|(id, entry)| (id, entry.spelling))
    }
}

/// Rejects case-insensitive duplicate spellings
pub fn check_unique<S: AsRef<str>>(spellings: &[S]) -> Result<()> {
    for (i, spelling) in spellings.iter().enumerate() {
        let spelling = spelling.as_ref();
        if spellings[..i].iter().any(|other| other.as_ref().eq_ignore_ascii_case(spelling)) {
            return Err(Error::DuplicateEntry(spelling.to_string()));
        }
    }
    Ok(())
}

/// Smallest index at which `spellings[index]` differs case-insensitively
/// from every other spelling of the same length; the spelling's own length
/// when there is no such index.
pub fn discriminating_index<S: AsRef<str>>(spellings: &[S], index: usize) -> usize {
    let target = spellings[index].as_ref().as_bytes();
    let rivals: Vec<&[u8]> = spellings
        .iter()
        .enumerate()
        .filter(|(i, other)| *i != index && other.as_ref().len() == target.len())
        .map(|(_, other)| other.as_ref().as_bytes())
        .collect();

    (0..target.len())
        .find(|&pos| rivals.iter().all(|rival| !rival[pos].eq_ignore_ascii_case(&target[pos])))
        .unwrap_or(target.len())
}

/// Discriminating index for every spelling, in order
pub fn compute_keys<S: AsRef<str>>(spellings: &[S]) -> Vec<usize> {
    (0..spellings.len())
        .map(|index| discriminating_index(spellings, index))
        .collect()
}
