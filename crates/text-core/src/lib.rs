//! Text protocol toolkit for the rvoip stack
//!
//! Building blocks for CRLF-delimited, header-plus-body protocols such as
//! SIP, MRCP and RTSP:
//!
//! - [`text`]: the [`ByteCursor`] every reader and writer goes through, plus
//!   the generic value primitives (sizes, booleans, floats, `name=value`
//!   lists).
//! - [`string_table`]: static token tables with case-insensitive lookup.
//! - [`header`]: header fields, the ordered/id-indexed [`HeaderSection`] and
//!   the [`HeaderNamespace`] / [`HeaderAccessors`] machinery that gives
//!   field ids and decoded values to protocol-specific headers.
//! - [`message`]: the resumable [`MessageParser`] and [`MessageGenerator`].
//!
//! The toolkit performs no I/O. Transports append received bytes to a
//! cursor and call the parser until it reports
//! [`MessageStatus::Incomplete`]; output is generated into a cursor over the
//! transport's send buffer and flushed after each step.
//!
//! A protocol plugs in by providing string tables of its header names, a
//! [`HeaderNamespace`] per group of headers, and a [`MessageHandler`] /
//! [`MessageWriter`] that know its start-line grammar.

pub mod codegen;
pub mod config;
pub mod error;
pub mod header;
pub mod message;
pub mod string_table;
pub mod text;

pub use config::{GeneratorConfig, ParserConfig, TextConfig};
pub use error::{Error, Result};
pub use header::{
    FieldAccessor, FieldHandle, FieldId, HeaderAccessor, HeaderAccessors, HeaderField, HeaderNamespace,
    HeaderSection,
};
pub use message::{
    MessageGenerator, MessageHandler, MessageId, MessageParser, MessageStatus, MessageWriter, TextMessage,
};
pub use string_table::{StringTable, StringTableEntry};
pub use text::{ByteCursor, HeaderLine, LengthPlaceholder, Line};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        ByteCursor, Error, FieldAccessor, FieldHandle, FieldId, GeneratorConfig, HeaderAccessor, HeaderAccessors,
        HeaderField, HeaderLine, HeaderNamespace, HeaderSection, LengthPlaceholder, Line, MessageGenerator,
        MessageHandler, MessageId, MessageParser, MessageStatus, MessageWriter, ParserConfig, Result, StringTable,
        StringTableEntry, TextConfig, TextMessage,
    };
}
