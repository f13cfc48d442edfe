//! Resumable message parser
//!
//! [`MessageParser`] drives a [`ByteCursor`] through the stages of one
//! message, over and over:
//!
//! ```text
//! START-LINE --> HEADER --> BODY --+
//!     ^                            |
//!     +----------------------------+
//! ```
//!
//! Each call to [`MessageParser::run`] consumes as much of the cursor as it
//! can. When a line or the body is cut short it returns
//! [`MessageStatus::Incomplete`]; every piece of partial state (stage,
//! the header field still open for folding, body bytes so far) lives on the
//! parser, so the caller only has to append more bytes (scrolling first if
//! it likes) and call again.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::error::Result;
use crate::header::{HeaderAccessors, HeaderField};
use crate::text::{ByteCursor, HeaderLine, CR, LF};

use super::{MessageStatus, TextMessage};

/// Protocol hooks of a [`MessageParser`]
pub trait MessageHandler {
    /// Protocol start-line
    type StartLine;

    /// Reads one start-line from the cursor.
    ///
    /// Returns `Incomplete` when the line is not all there yet (whatever was
    /// consumed is given back) and `Invalid` when it cannot be a start-line.
    fn on_start<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<Self::StartLine>;

    /// Header namespaces of a new message, chosen from its start-line. The
    /// chain moves into the message, so the decoded values travel with it.
    fn new_accessors(&mut self, _start_line: &Self::StartLine) -> HeaderAccessors {
        HeaderAccessors::new()
    }

    /// Takes one complete header field (folded continuations already
    /// appended). An error drops just this field.
    fn on_header_field(&mut self, message: &mut TextMessage<Self::StartLine>, field: HeaderField) -> Result<()> {
        message.add_field(field).map(drop)
    }

    /// Called after the empty line ending the header section. Must record
    /// the body length in `message.content_length`; returning false rejects
    /// the message.
    fn on_header_complete(&mut self, message: &mut TextMessage<Self::StartLine>) -> bool;

    /// Called once the declared body has been received
    fn on_body_complete(&mut self, _message: &mut TextMessage<Self::StartLine>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    StartLine,
    Header,
    Body,
}

/// Staged parser for CRLF-delimited header-plus-body messages
pub struct MessageParser<H: MessageHandler> {
    handler: H,
    config: ParserConfig,
    stage: Stage,
    message: Option<TextMessage<H::StartLine>>,
    /// Last header field read, kept open for folded continuations
    pending: Option<HeaderField>,
    field_count: usize,
    /// The previous step ended on a CR whose LF has not been seen yet
    skip_lf: bool,
}

impl<H: MessageHandler> MessageParser<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, ParserConfig::default())
    }

    pub fn with_config(handler: H, config: ParserConfig) -> Self {
        Self {
            handler,
            config,
            stage: Stage::StartLine,
            message: None,
            pending: None,
            field_count: 0,
            skip_lf: false,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// True between messages, i.e. no partial message is held
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::StartLine && self.message.is_none()
    }

    /// Drops any partial message and starts over at the start-line
    pub fn reset(&mut self) {
        self.stage = Stage::StartLine;
        self.message = None;
        self.pending = None;
        self.field_count = 0;
        self.skip_lf = false;
    }

    fn invalid<T>(&mut self, reason: &str) -> MessageStatus<T> {
        warn!("discarding message: {}", reason);
        self.reset();
        MessageStatus::Invalid
    }

    /// Parses from the cursor until one message completes, input runs out,
    /// or the message turns out to be invalid
    pub fn run<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<TextMessage<H::StartLine>> {
        if self.skip_lf && cursor.remaining() > 0 {
            cursor.skip_lf();
            self.skip_lf = false;
        }

        if self.stage == Stage::StartLine {
            match self.parse_start_line(cursor) {
                MessageStatus::Complete(()) => {}
                MessageStatus::Incomplete => return MessageStatus::Incomplete,
                MessageStatus::Invalid => return self.invalid("malformed start-line"),
            }
        }

        if self.stage == Stage::Header {
            match self.parse_header(cursor) {
                MessageStatus::Complete(()) => {}
                MessageStatus::Incomplete => return MessageStatus::Incomplete,
                MessageStatus::Invalid => return MessageStatus::Invalid,
            }
        }

        if self.stage == Stage::Body {
            return self.parse_body(cursor);
        }

        self.finish()
    }

    fn parse_start_line<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<()> {
        if self.config.skip_leading_empty_lines {
            while let Some(b) = cursor.peek() {
                if b != CR && b != LF {
                    break;
                }
                cursor.take(1);
            }
            if cursor.crlf_segmented() {
                self.skip_lf = true;
            }
            if cursor.remaining() == 0 {
                return MessageStatus::Incomplete;
            }
        }

        let start = cursor.pos();
        let start_line = match self.handler.on_start(cursor) {
            MessageStatus::Complete(start_line) => start_line,
            MessageStatus::Incomplete => {
                cursor.set_pos(start);
                return MessageStatus::Incomplete;
            }
            MessageStatus::Invalid => return MessageStatus::Invalid,
        };

        // the start-line reader may have stopped between a CR and its LF
        self.skip_lf = cursor.crlf_segmented();
        let accessors = self.handler.new_accessors(&start_line);
        let message = TextMessage::with_accessors(start_line, accessors);
        debug!("message {} start-line parsed", message.id());
        self.message = Some(message);
        self.field_count = 0;
        self.stage = Stage::Header;
        MessageStatus::Complete(())
    }

    fn flush_pending(&mut self) {
        if let (Some(field), Some(message)) = (self.pending.take(), self.message.as_mut()) {
            trace!("header field {}", field);
            let name = String::from_utf8_lossy(field.name()).into_owned();
            if let Err(err) = self.handler.on_header_field(message, field) {
                warn!("skipping header field '{}': {}", name, err);
            }
        }
    }

    fn parse_header<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<()> {
        loop {
            match cursor.read_header_pair() {
                HeaderLine::Incomplete => return MessageStatus::Incomplete,
                HeaderLine::Pair { name, .. } if name.is_empty() => {
                    warn!("skipping header line without a name");
                }
                HeaderLine::Pair { name, value } => {
                    let field = HeaderField::new(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value));
                    self.flush_pending();
                    self.field_count += 1;
                    if self.field_count > self.config.max_header_fields {
                        return self.invalid("too many header fields");
                    }
                    self.pending = Some(field);
                }
                HeaderLine::Continuation(more) => match self.pending.as_mut() {
                    Some(field) if self.config.allow_folding => field.append_value(more),
                    _ => warn!("skipping unexpected continuation line"),
                },
                HeaderLine::Malformed(line) => {
                    warn!("skipping malformed header line '{}'", String::from_utf8_lossy(line));
                }
                HeaderLine::End => break,
            }
        }
        self.flush_pending();

        let Some(message) = self.message.as_mut() else {
            return self.invalid("no message in progress");
        };
        if !self.handler.on_header_complete(message) {
            return self.invalid("header section rejected");
        }
        match message.content_length {
            Some(length) if length > self.config.max_body_size => {
                let reason = format!("body length {} exceeds limit {}", length, self.config.max_body_size);
                self.invalid(&reason)
            }
            Some(length) if length > 0 => {
                debug!("message {} expects {} body bytes", message.id(), length);
                message.body.clear();
                message.body.reserve(length);
                self.stage = Stage::Body;
                MessageStatus::Complete(())
            }
            _ => {
                self.stage = Stage::StartLine;
                MessageStatus::Complete(())
            }
        }
    }

    fn parse_body<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<TextMessage<H::StartLine>> {
        let Some(message) = self.message.as_mut() else {
            return self.invalid("no message in progress");
        };
        let wanted = message.declared_length().saturating_sub(message.body.len());
        let chunk = cursor.take(wanted);
        message.body.extend_from_slice(chunk);
        if message.body.len() < message.declared_length() {
            trace!("message {} body {}/{}", message.id(), message.body.len(), message.declared_length());
            return MessageStatus::Incomplete;
        }
        if !self.handler.on_body_complete(message) {
            return self.invalid("body rejected");
        }
        self.finish()
    }

    fn finish(&mut self) -> MessageStatus<TextMessage<H::StartLine>> {
        self.stage = Stage::StartLine;
        self.field_count = 0;
        match self.message.take() {
            Some(message) => {
                debug!("message {} complete", message.id());
                MessageStatus::Complete(message)
            }
            None => MessageStatus::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Start-line is any non-empty line; body length comes from `Length`
    struct LineHandler;

    impl MessageHandler for LineHandler {
        type StartLine = String;

        fn on_start<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<String> {
            match cursor.read_line() {
                crate::text::Line::Complete(line) if !line.is_empty() => {
                    MessageStatus::Complete(String::from_utf8_lossy(line).into_owned())
                }
                crate::text::Line::Complete(_) => MessageStatus::Invalid,
                crate::text::Line::Partial(_) => MessageStatus::Incomplete,
            }
        }

        fn on_header_complete(&mut self, message: &mut TextMessage<String>) -> bool {
            match message.header.find_by_name(b"Length") {
                Some(field) => match crate::text::parse_size(field.value()) {
                    Some(length) => {
                        message.content_length = Some(length);
                        true
                    }
                    None => false,
                },
                None => true,
            }
        }
    }

    fn reader(data: &[u8]) -> ByteCursor<Vec<u8>> {
        ByteCursor::new(data.to_vec())
    }

    #[test]
    fn test_simple_message() {
        let mut parser = MessageParser::new(LineHandler);
        let mut cursor = reader(b"HELLO\r\nFoo: bar\r\nBaz:\r\n\r\n");
        let message = parser.run(&mut cursor).complete().unwrap();
        assert_eq!(message.start_line, "HELLO");
        let fields: Vec<_> = message.header.iter().map(|f| f.to_string()).collect();
        assert_eq!(fields, vec!["Foo: bar", "Baz: "]);
        assert!(message.body.is_empty());
        assert!(parser.is_idle());
    }

    #[test]
    fn test_body() {
        let mut parser = MessageParser::new(LineHandler);
        let mut cursor = reader(b"HELLO\r\nLength: 5\r\n\r\nabcdeNEXT");
        let message = parser.run(&mut cursor).complete().unwrap();
        assert_eq!(&message.body[..], b"abcde");
        assert_eq!(cursor.unread(), b"NEXT");
    }

    #[test]
    fn test_folding_disabled() {
        let config = ParserConfig::default().with_folding(false);
        let mut parser = MessageParser::with_config(LineHandler, config);
        let mut cursor = reader(b"HELLO\r\nX: a\r\n b\r\n\r\n");
        let message = parser.run(&mut cursor).complete().unwrap();
        assert_eq!(message.header.find_by_name(b"X").unwrap().value(), b"a");
    }

    #[test]
    fn test_leading_empty_lines() {
        let mut parser = MessageParser::new(LineHandler);
        let mut cursor = reader(b"\r\n\r\nHELLO\r\n\r\n");
        assert_eq!(parser.run(&mut cursor).complete().unwrap().start_line, "HELLO");

        let config = ParserConfig::default().with_leading_empty_lines_skipped(false);
        let mut parser = MessageParser::with_config(LineHandler, config);
        let mut cursor = reader(b"\r\nHELLO\r\n\r\n");
        assert!(parser.run(&mut cursor).is_invalid());
    }

    #[test]
    fn test_body_limit() {
        let config = ParserConfig::default().with_max_body_size(4);
        let mut parser = MessageParser::with_config(LineHandler, config);
        let mut cursor = reader(b"HELLO\r\nLength: 5\r\n\r\nabcde");
        assert!(parser.run(&mut cursor).is_invalid());
        assert!(parser.is_idle());
    }
}
