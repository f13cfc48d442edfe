use std::fmt;
use std::str;

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::text::{ByteCursor, HeaderLine};

/// Numeric header field id assigned by a header namespace
pub type FieldId = usize;

/// A single `name: value` header field.
///
/// The id stays `None` until a header namespace recognises the name. An
/// unresolved field is still a valid member of a [`HeaderSection`] and is
/// preserved verbatim.
///
/// [`HeaderSection`]: super::HeaderSection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: Bytes,
    value: Bytes,
    id: Option<FieldId>,
}

impl HeaderField {
    /// Creates an unresolved field
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self { name: name.into(), value: value.into(), id: None }
    }

    /// Creates a field whose id is already known
    pub fn with_id(name: impl Into<Bytes>, value: impl Into<Bytes>, id: FieldId) -> Self {
        Self { name: name.into(), value: value.into(), id: Some(id) }
    }

    /// Parses a single `name: value` line (no terminator required)
    pub fn from_line(line: &[u8]) -> Option<Self> {
        let mut owned = line.to_vec();
        owned.extend_from_slice(b"\r\n");
        let mut cursor = ByteCursor::new(&owned[..]);
        match cursor.read_header_pair() {
            HeaderLine::Pair { name, value } if !name.is_empty() => {
                Some(Self::new(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value)))
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Name as UTF-8, if it is
    pub fn name_str(&self) -> Option<&str> {
        str::from_utf8(&self.name).ok()
    }

    /// Value as UTF-8, if it is
    pub fn value_str(&self) -> Option<&str> {
        str::from_utf8(&self.value).ok()
    }

    pub fn id(&self) -> Option<FieldId> {
        self.id
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }

    /// Assigns the id. Fields that are already members of a section are
    /// re-resolved through [`HeaderSection::resolve`] instead.
    ///
    /// [`HeaderSection::resolve`]: super::HeaderSection::resolve
    pub fn set_id(&mut self, id: Option<FieldId>) {
        self.id = id;
    }

    pub fn set_value(&mut self, value: impl Into<Bytes>) {
        self.value = value.into();
    }

    /// Appends folded continuation content to the value
    pub fn append_value(&mut self, more: &[u8]) {
        if more.is_empty() {
            return;
        }
        let mut value = BytesMut::with_capacity(self.value.len() + more.len());
        value.extend_from_slice(&self.value);
        value.extend_from_slice(more);
        self.value = value.freeze();
    }

    /// Case-insensitive name comparison
    pub fn name_eq(&self, name: &[u8]) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Writes `name: value` CRLF; nothing is written if it does not fit.
    ///
    /// The value goes out without its leading whitespace, which a parser
    /// would not keep. Values must not contain CR or LF; fold them into
    /// continuation lines before generating.
    ///
    pub fn generate<B: AsRef<[u8]> + AsMut<[u8]>>(&self, cursor: &mut ByteCursor<B>) -> Result<()> {
        cursor.write_name_value(&self.name, &self.value)
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}
