//! Error types for the text protocol toolkit
//!
//! The staged parser and generator never surface these errors directly; they
//! report [`MessageStatus`](crate::message::MessageStatus) instead. `Error` is
//! returned by the primitive cursor writers, the header containers and the
//! configuration-time checks performed when header namespaces are composed.

use thiserror::Error;

/// Result type alias for toolkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the text protocol toolkit
#[derive(Error, Debug)]
pub enum Error {
    /// A writer could not fit its output into the remaining cursor capacity
    #[error("Buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    /// The id-indexed slot for this field id already holds a field
    #[error("Header field slot {id} is already occupied")]
    FieldOccupied { id: usize },

    /// The field id does not fit into the section's id-indexed array
    #[error("Header field id {id} is out of range (array size {size})")]
    FieldIdOutOfRange { id: usize, size: usize },

    /// The operation needs a resolved field id
    #[error("Header field '{0}' has no resolved id")]
    UnresolvedField(String),

    /// The field handle no longer refers to a member of the section
    #[error("Stale header field handle {0}")]
    StaleHandle(usize),

    /// The namespace has no field with this id
    #[error("Unknown field id {id} in namespace '{namespace}'")]
    UnknownFieldId { namespace: &'static str, id: usize },

    /// Two namespaces composed into one chain claim the same header name
    #[error("Header name '{name}' is claimed by both '{first}' and '{second}' namespaces")]
    NamespaceCollision {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    /// Two namespaces composed into one chain share the same name
    #[error("Namespace '{0}' is already part of the accessor chain")]
    DuplicateNamespace(&'static str),

    /// Duplicate was asked to copy between accessors of different namespaces
    #[error("Namespace mismatch: expected '{expected}', found '{found}'")]
    NamespaceMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A header value failed to decode
    #[error("Invalid value for header '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    /// A self-inclusive message length needs more digits than were reserved
    #[error("Message length {length} does not fit into {width} reserved digits")]
    LengthOverflow { length: usize, width: usize },

    /// A string table was given the same spelling twice
    #[error("Duplicate string table entry '{0}'")]
    DuplicateEntry(String),

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure (codegen tool only)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new invalid value error
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying after flushing or enlarging the buffer can succeed
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
