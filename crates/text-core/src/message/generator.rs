//! Resumable message generator
//!
//! Mirror image of the parser with two stages:
//!
//! 1. start-line and header section, written atomically: if they do not fit
//!    the output cursor is left exactly as it was and the step reports
//!    [`MessageStatus::Incomplete`];
//! 2. body, written in as many steps as the output room (and
//!    [`GeneratorConfig::max_body_chunk`]) requires.
//!
//! The generator remembers which message it is working on by
//! [`MessageId`](super::MessageId). Driving it with a different message
//! starts over; driving it with the same one resumes. The body may still be
//! growing between steps: the generator emits what is there and waits for
//! the rest of the declared length, never padding. A body that shrinks below
//! what was already written makes the message invalid.

use tracing::{debug, trace, warn};

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::text::ByteCursor;

use super::{MessageId, MessageStatus, TextMessage};

/// Protocol hooks of a [`MessageGenerator`]
pub trait MessageWriter {
    /// Protocol start-line
    type StartLine;

    /// Writes the start-line, including its line terminator. A capacity
    /// error makes the step incomplete; any other error makes the message
    /// invalid.
    fn on_start<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<Self::StartLine>,
        cursor: &mut ByteCursor<B>,
    ) -> Result<()>;

    /// Called after the header section and its terminating empty line have
    /// been written. `message_start` is where [`on_start`](Self::on_start)
    /// began writing, so a length reserved there can be spliced in now.
    fn on_header_complete<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        _message: &TextMessage<Self::StartLine>,
        _cursor: &mut ByteCursor<B>,
        _message_start: usize,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    StartLineAndHeader,
    Body,
}

/// Staged generator for CRLF-delimited header-plus-body messages
pub struct MessageGenerator<W: MessageWriter> {
    writer: W,
    config: GeneratorConfig,
    stage: Stage,
    current: Option<MessageId>,
    body_written: usize,
}

impl<W: MessageWriter> MessageGenerator<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, GeneratorConfig::default())
    }

    pub fn with_config(writer: W, config: GeneratorConfig) -> Self {
        Self {
            writer,
            config,
            stage: Stage::StartLineAndHeader,
            current: None,
            body_written: 0,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Body bytes of the current message emitted so far
    pub fn body_written(&self) -> usize {
        self.body_written
    }

    /// Forgets the current message
    pub fn reset(&mut self) {
        self.stage = Stage::StartLineAndHeader;
        self.current = None;
        self.body_written = 0;
    }

    /// Writes as much of `message` as fits into `cursor`
    pub fn run<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<W::StartLine>,
        cursor: &mut ByteCursor<B>,
    ) -> MessageStatus<()> {
        if self.current != Some(message.id()) {
            self.reset();
            self.current = Some(message.id());
        }

        if message.body.len() > message.declared_length() {
            warn!(
                "message {} body holds {} bytes but declares {}",
                message.id(),
                message.body.len(),
                message.declared_length()
            );
            self.reset();
            return MessageStatus::Invalid;
        }

        if self.body_written > message.body.len() {
            warn!(
                "message {} body shrank to {} bytes after {} were written",
                message.id(),
                message.body.len(),
                self.body_written
            );
            self.reset();
            return MessageStatus::Invalid;
        }

        if self.stage == Stage::StartLineAndHeader {
            let start = cursor.pos();
            match self.write_head(message, cursor, start) {
                Ok(()) => {
                    debug!("message {} head written ({} bytes)", message.id(), cursor.pos() - start);
                    self.stage = Stage::Body;
                }
                Err(err) if err.is_capacity() => {
                    trace!("message {} head does not fit: {}", message.id(), err);
                    cursor.set_pos(start);
                    return MessageStatus::Incomplete;
                }
                Err(err) => {
                    warn!("message {} cannot be generated: {}", message.id(), err);
                    cursor.set_pos(start);
                    self.reset();
                    return MessageStatus::Invalid;
                }
            }
        }

        self.write_body(message, cursor)
    }

    fn write_head<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<W::StartLine>,
        cursor: &mut ByteCursor<B>,
        start: usize,
    ) -> Result<()> {
        self.writer.on_start(message, cursor)?;
        for field in &message.header {
            field.generate(cursor)?;
        }
        cursor.write_eol()?;
        self.writer.on_header_complete(message, cursor, start)
    }

    fn write_body<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<W::StartLine>,
        cursor: &mut ByteCursor<B>,
    ) -> MessageStatus<()> {
        let declared = message.declared_length();
        let available = message.body.len() - self.body_written;
        let chunk = self.config.chunk_limit(cursor.remaining()).min(available);
        if chunk > 0 {
            let from = self.body_written;
            if let Err(err) = cursor.write_string(&message.body[from..from + chunk]) {
                warn!("message {} body write failed: {}", message.id(), err);
                return MessageStatus::Incomplete;
            }
            self.body_written += chunk;
        }

        if self.body_written < declared {
            trace!("message {} body {}/{}", message.id(), self.body_written, declared);
            return MessageStatus::Incomplete;
        }
        debug!("message {} complete", message.id());
        self.reset();
        MessageStatus::Complete(())
    }
}
