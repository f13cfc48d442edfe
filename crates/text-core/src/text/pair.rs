//! Name/value pair lists (`name=value;name2=value2`)
//!
//! MRCP carries vendor-specific parameters and similar extension data in
//! this shape. Values are optional (`name` alone is a valid pair).

use std::fmt;

use bytes::Bytes;

use crate::error::Result;

use super::cursor::ByteCursor;

const PAIR_SEPARATOR: u8 = b';';
const NAME_VALUE_SEPARATOR: u8 = b'=';

/// One `name[=value]` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub name: Bytes,
    pub value: Option<Bytes>,
}

impl Pair {
    /// Creates a pair with a value
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self { name: name.into(), value: Some(value.into()) }
    }

    /// Creates a pair without a value
    pub fn flag(name: impl Into<Bytes>) -> Self {
        Self { name: name.into(), value: None }
    }
}

/// Ordered list of name/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairArray {
    pairs: Vec<Pair>,
}

impl PairArray {
    /// Creates an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `name=value;name2=value2`. Empty segments are skipped.
    pub fn parse(input: &[u8]) -> Self {
        let mut pairs = Vec::new();
        let mut cursor = ByteCursor::new(input);
        while !cursor.is_eos() {
            let segment = cursor.read_field(PAIR_SEPARATOR, true);
            if segment.is_empty() {
                continue;
            }
            let mut segment = ByteCursor::new(segment);
            let name = segment.read_field(NAME_VALUE_SEPARATOR, true);
            if name.is_empty() {
                continue;
            }
            let name = Bytes::copy_from_slice(trim_end(name));
            let value = if segment.is_eos() {
                None
            } else {
                Some(Bytes::copy_from_slice(trim_end(segment.read_field(PAIR_SEPARATOR, true))))
            };
            pairs.push(Pair { name, value });
        }
        Self { pairs }
    }

    /// Appends a pair
    pub fn push(&mut self, pair: Pair) {
        self.pairs.push(pair);
    }

    /// Builder-style append
    pub fn with(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.pairs.push(Pair::new(name, value));
        self
    }

    /// Value of the first pair named `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Pair> {
        self.pairs
            .iter()
            .find(|pair| pair.name.eq_ignore_ascii_case(name.as_bytes()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encoded form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push(PAIR_SEPARATOR);
            }
            out.extend_from_slice(&pair.name);
            if let Some(value) = &pair.value {
                out.push(NAME_VALUE_SEPARATOR);
                out.extend_from_slice(value);
            }
        }
        out
    }

    /// Writes the encoded form; nothing is written if it does not fit
    pub fn generate<B: AsRef<[u8]> + AsMut<[u8]>>(&self, cursor: &mut ByteCursor<B>) -> Result<()> {
        cursor.write_string(self.to_bytes())
    }
}

impl fmt::Display for PairArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_bytes()))
    }
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != b' ' && b != b'\t').map_or(0, |i| i + 1);
    &bytes[..end]
}
