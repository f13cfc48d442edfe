//! Staged message parsing and generation
//!
//! A text message is a start-line, a header section and an optional body.
//! [`MessageParser`] turns a byte stream into [`TextMessage`]s and
//! [`MessageGenerator`] turns them back into bytes. Both are resumable: they
//! return [`MessageStatus::Incomplete`] whenever the cursor runs out of input
//! (or output room) and pick up exactly where they stopped on the next call.
//!
//! The start-line grammar belongs to the protocol and is supplied through
//! [`MessageHandler`] and [`MessageWriter`].

pub mod generator;
pub mod parser;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::header::{FieldHandle, FieldId, HeaderAccessors, HeaderField, HeaderNamespace, HeaderSection};

pub use generator::{MessageGenerator, MessageWriter};
pub use parser::{MessageHandler, MessageParser};

/// Outcome of one parser or generator step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus<T> {
    /// The stage machine finished a message
    Complete(T),
    /// More input (parser) or more output room (generator) is needed; call
    /// again with the same object
    Incomplete,
    /// The current message cannot be processed; state has been reset for
    /// the next one
    Invalid,
}

impl<T> MessageStatus<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, MessageStatus::Complete(_))
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, MessageStatus::Incomplete)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MessageStatus::Invalid)
    }

    /// The completed value, if any
    pub fn complete(self) -> Option<T> {
        match self {
            MessageStatus::Complete(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> MessageStatus<U> {
        match self {
            MessageStatus::Complete(value) => MessageStatus::Complete(f(value)),
            MessageStatus::Incomplete => MessageStatus::Incomplete,
            MessageStatus::Invalid => MessageStatus::Invalid,
        }
    }
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique message identity
///
/// The generator keeps its partial state only while it is driven with the
/// same message; a different id starts generation from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Allocates a fresh id
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parsed or to-be-generated message
///
/// `M` is the protocol's start-line type. The message owns the accessor
/// chain holding its decoded header values, so they stay with it after the
/// parser moves on. Cloning gives the copy a new [`MessageId`].
#[derive(Debug)]
pub struct TextMessage<M> {
    id: MessageId,
    /// Protocol start-line
    pub start_line: M,
    /// Header fields in wire order
    pub header: HeaderSection,
    /// Namespaces the header section is resolved against, with their
    /// decoded data
    pub accessors: HeaderAccessors,
    /// Body bytes received or to be sent
    pub body: BytesMut,
    /// Declared body length. Set by the protocol while handling the header
    /// section; `None` means the message has no body.
    pub content_length: Option<usize>,
}

impl<M> TextMessage<M> {
    /// Message without header namespaces; every field stays unresolved
    pub fn new(start_line: M, header: HeaderSection) -> Self {
        Self::from_parts(start_line, header, HeaderAccessors::new())
    }

    /// Message with an empty header section sized for `accessors`
    pub fn with_accessors(start_line: M, accessors: HeaderAccessors) -> Self {
        let header = accessors.new_section();
        Self::from_parts(start_line, header, accessors)
    }

    fn from_parts(start_line: M, header: HeaderSection, accessors: HeaderAccessors) -> Self {
        Self {
            id: MessageId::next(),
            start_line,
            header,
            accessors,
            body: BytesMut::new(),
            content_length: None,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Resolves and decodes `field` through the message's own accessors,
    /// then adds it to the header section
    pub fn add_field(&mut self, field: HeaderField) -> Result<FieldHandle> {
        self.accessors.add_field(&mut self.header, field)
    }

    /// Generates `id` from the decoded data into the header section
    pub fn add_property(&mut self, id: FieldId, empty: bool) -> Result<FieldHandle> {
        self.accessors.add_property(&mut self.header, id, empty)
    }

    /// Decoded values of namespace `N`, if any were parsed or set
    pub fn data<N: HeaderNamespace>(&self) -> Option<&N::Data> {
        self.accessors.accessor::<N>().and_then(|accessor| accessor.data())
    }

    /// Decoded values of namespace `N`, allocated on first use. `None` when
    /// `N` is not in the message's chain.
    pub fn data_mut<N: HeaderNamespace>(&mut self) -> Option<&mut N::Data> {
        self.accessors.accessor_mut::<N>().map(|accessor| accessor.data_mut())
    }

    /// Replaces the body and declares its length
    pub fn set_body(&mut self, body: impl AsRef<[u8]>) {
        let body = body.as_ref();
        self.body.clear();
        self.body.extend_from_slice(body);
        self.content_length = (!body.is_empty()).then_some(body.len());
    }

    /// Body length the message declares, `0` without a body
    pub fn declared_length(&self) -> usize {
        self.content_length.unwrap_or(0)
    }

    /// Freezes the current body contents
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }
}

impl<M: Clone> Clone for TextMessage<M> {
    fn clone(&self) -> Self {
        Self {
            id: MessageId::next(),
            start_line: self.start_line.clone(),
            header: self.header.clone(),
            accessors: self.accessors.clone(),
            body: self.body.clone(),
            content_length: self.content_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let status: MessageStatus<u32> = MessageStatus::Complete(3);
        assert!(status.is_complete());
        assert_eq!(status.clone().map(|v| v * 2), MessageStatus::Complete(6));
        assert_eq!(status.complete(), Some(3));
        assert!(MessageStatus::<u32>::Incomplete.is_incomplete());
        assert_eq!(MessageStatus::<u32>::Invalid.complete(), None);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = TextMessage::new((), HeaderSection::new());
        let b = a.clone();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_set_body() {
        let mut message = TextMessage::new("line", HeaderSection::new());
        assert_eq!(message.declared_length(), 0);
        message.set_body("hello");
        assert_eq!(message.content_length, Some(5));
        assert_eq!(&message.body_bytes()[..], b"hello");
        message.set_body("");
        assert_eq!(message.content_length, None);
    }
}
