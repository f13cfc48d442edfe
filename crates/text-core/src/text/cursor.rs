//! Byte cursor over a caller-owned buffer
//!
//! [`ByteCursor`] is the only way the rest of the toolkit touches protocol
//! bytes. It tracks a position (`pos`) and an end marker (`end`) inside a
//! buffer it does not own. For reading, `end` is the number of valid bytes
//! received so far; for writing, `end` is the capacity the writers may fill.
//!
//! Invariant: `0 <= pos <= end <= capacity`.
//!
//! Readers never consume a partial line. When a terminator is missing, the
//! cursor keeps `pos` where it was and raises the sticky end-of-stream flag so
//! the owner can append more bytes (optionally after [`ByteCursor::scroll`])
//! and retry.

use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};

use super::value::{format_float, count_digits};
use super::{COLON, CR, HT, LF, SP};

/// Result of [`ByteCursor::read_line`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// A terminated line (terminator excluded); the cursor moved past it
    Complete(&'a [u8]),
    /// No terminator before `end`; the unterminated fragment is returned but
    /// not consumed
    Partial(&'a [u8]),
}

impl<'a> Line<'a> {
    /// Line content regardless of completeness
    pub fn content(&self) -> &'a [u8] {
        match self {
            Line::Complete(line) | Line::Partial(line) => line,
        }
    }

    /// Returns true if the line was terminated
    pub fn is_complete(&self) -> bool {
        matches!(self, Line::Complete(_))
    }
}

/// Result of [`ByteCursor::read_header_pair`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLine<'a> {
    /// `name: value` (either side may be empty)
    Pair { name: &'a [u8], value: &'a [u8] },
    /// A folded continuation line, leading whitespace run removed
    Continuation(&'a [u8]),
    /// The empty line that ends a header section
    End,
    /// A line without a `:` separator; it has been consumed
    Malformed(&'a [u8]),
    /// No complete line available yet; nothing consumed
    Incomplete,
}

/// Reserved fixed-width slot for a length that is only known once the whole
/// message has been generated (see [`ByteCursor::splice_length`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPlaceholder {
    offset: usize,
    width: usize,
}

impl LengthPlaceholder {
    /// Offset of the slot in the cursor's buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of reserved digits
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Locates the end of the first line in `bytes`.
///
/// Accepts CRLF, a bare LF or a bare CR as terminator and returns
/// `(line_len, consumed)` where `consumed` includes the terminator.
///
/// A CR that is the very last byte is *not* a terminator: the matching LF may
/// still be in flight in the next transport chunk, so the line is reported as
/// incomplete (`None`) and rescanned once more bytes arrive.
pub fn scan_line_terminator(bytes: &[u8]) -> Option<(usize, usize)> {
    let idx = bytes.iter().position(|&b| b == CR || b == LF)?;
    if bytes[idx] == LF {
        return Some((idx, idx + 1));
    }
    match bytes.get(idx + 1) {
        Some(&LF) => Some((idx, idx + 2)),
        Some(_) => Some((idx, idx + 1)),
        None => None,
    }
}

/// Smallest total length `L` such that `L == base + digits(L)`.
///
/// Used for start-lines that carry the length of the whole message,
/// including the length field itself.
pub fn self_inclusive_length(base: usize) -> usize {
    let mut digits = count_digits(base);
    loop {
        let total = base + digits;
        let needed = count_digits(total);
        if needed == digits {
            return total;
        }
        digits = needed;
    }
}

fn is_wsp(b: u8) -> bool {
    b == SP || b == HT
}

fn trim_leading_wsp(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_wsp(b)).unwrap_or(bytes.len());
    &bytes[start..]
}

fn trim_trailing_wsp(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| !is_wsp(b)).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Read/write position tracker over a byte buffer
///
/// `B` is anything that derefs to bytes: `&[u8]` for read-only sub-syntax
/// scanning, `&mut [u8]` or `Vec<u8>` for transport buffers and output.
pub struct ByteCursor<B> {
    buf: B,
    pos: usize,
    end: usize,
    eos: bool,
}

impl<B: AsRef<[u8]>> fmt::Debug for ByteCursor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteCursor")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("capacity", &self.capacity())
            .field("eos", &self.eos)
            .finish()
    }
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Cursor over the whole buffer: every byte is readable, or for writers,
    /// the whole buffer is available capacity.
    pub fn new(buf: B) -> Self {
        let end = buf.as_ref().len();
        Self { buf, pos: 0, end, eos: false }
    }

    /// Cursor whose first `len` bytes hold received data
    pub fn with_len(buf: B, len: usize) -> Self {
        let end = len.min(buf.as_ref().len());
        Self { buf, pos: 0, end, eos: false }
    }

    /// Empty cursor ready to be filled with [`ByteCursor::append`]
    pub fn empty(buf: B) -> Self {
        Self::with_len(buf, 0)
    }

    /// Current read/write position
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the position, clamped to `end`
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    /// End marker (data length for readers, limit for writers)
    pub fn len(&self) -> usize {
        self.end
    }

    /// True if the cursor holds no data at all
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// Size of the underlying buffer
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Bytes between `pos` and `end`
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// True if nothing is left to read or the last read hit the end
    /// without finding its terminator
    pub fn is_eos(&self) -> bool {
        self.pos >= self.end || self.eos
    }

    /// Clears the sticky end-of-stream flag
    pub fn clear_eos(&mut self) {
        self.eos = false;
    }

    /// All valid bytes, `[0, end)`
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_ref()[..self.end]
    }

    /// Bytes not consumed yet, `[pos, end)`
    pub fn unread(&self) -> &[u8] {
        &self.buf.as_ref()[self.pos..self.end]
    }

    /// Bytes produced so far by the writers, `[0, pos)`
    pub fn written(&self) -> &[u8] {
        &self.buf.as_ref()[..self.pos]
    }

    /// Underlying buffer
    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    /// Consumes the cursor and returns the buffer
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Next byte without consuming it
    pub fn peek(&self) -> Option<u8> {
        self.unread().first().copied()
    }

    /// Advances past spaces and tabs
    pub fn skip_whitespace(&mut self) {
        let skipped = self.unread().iter().take_while(|&&b| is_wsp(b)).count();
        self.pos += skipped;
    }

    /// Consumes a single leading LF, returning true if one was there
    pub fn skip_lf(&mut self) -> bool {
        if self.peek() == Some(LF) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// True if everything has been consumed and the last consumed byte was a
    /// CR, i.e. a CRLF pair may have been split between two deliveries
    pub fn crlf_segmented(&self) -> bool {
        self.pos > 0 && self.pos == self.end && self.buf.as_ref()[self.pos - 1] == CR
    }

    /// Consumes up to `n` bytes and returns them
    pub fn take(&mut self, n: usize) -> &[u8] {
        let start = self.pos;
        let n = n.min(self.remaining());
        self.pos += n;
        &self.buf.as_ref()[start..start + n]
    }

    /// Reads one line terminated by CR, LF or CRLF.
    ///
    /// On success the cursor moves past the terminator. Otherwise the
    /// end-of-stream flag is raised, `pos` is left untouched and the
    /// unterminated fragment (without a trailing CR) is returned.
    pub fn read_line(&mut self) -> Line<'_> {
        let start = self.pos;
        let scan = scan_line_terminator(&self.buf.as_ref()[start..self.end]);
        match scan {
            Some((len, consumed)) => {
                self.pos += consumed;
                Line::Complete(&self.buf.as_ref()[start..start + len])
            }
            None => {
                self.eos = true;
                let fragment = &self.buf.as_ref()[start..self.end];
                let fragment = fragment.strip_suffix(&[CR]).unwrap_or(fragment);
                Line::Partial(fragment)
            }
        }
    }

    /// Reads one header line and splits it on the first `:`.
    ///
    /// Leading whitespace is trimmed from the value; trailing whitespace is
    /// trimmed from the name. A line starting with whitespace is a folded
    /// continuation of the previous field. A line with no `:` is consumed and
    /// reported as [`HeaderLine::Malformed`].
    pub fn read_header_pair(&mut self) -> HeaderLine<'_> {
        let line = match self.read_line() {
            Line::Complete(line) => line,
            Line::Partial(_) => return HeaderLine::Incomplete,
        };
        if line.is_empty() {
            return HeaderLine::End;
        }
        if is_wsp(line[0]) {
            return HeaderLine::Continuation(trim_leading_wsp(line));
        }
        match line.iter().position(|&b| b == COLON) {
            Some(colon) => HeaderLine::Pair {
                name: trim_trailing_wsp(&line[..colon]),
                value: trim_leading_wsp(&line[colon + 1..]),
            },
            None => HeaderLine::Malformed(line),
        }
    }

    /// Reads a token bounded by `separator` (or `end`).
    ///
    /// The separator is consumed but not returned. An empty slice means there
    /// was no token. Line terminators are not special here; this is meant for
    /// sub-syntax inside an already extracted value.
    pub fn read_field(&mut self, separator: u8, skip_leading_spaces: bool) -> &[u8] {
        if skip_leading_spaces {
            self.skip_whitespace();
        }
        let start = self.pos;
        let len = self.unread().iter().position(|&b| b == separator).unwrap_or(self.end - start);
        self.pos += len;
        if self.pos < self.end {
            self.pos += 1;
        }
        &self.buf.as_ref()[start..start + len]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<B> {
    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(Error::BufferTooSmall { needed, available });
        }
        Ok(())
    }

    fn put(&mut self, data: &[u8]) {
        let pos = self.pos;
        self.buf.as_mut()[pos..pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    /// Appends raw bytes at `pos`
    pub fn write_string(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        self.ensure(data.len())?;
        self.put(data);
        Ok(())
    }

    /// Appends a single byte
    pub fn write_char(&mut self, ch: u8) -> Result<()> {
        self.write_string([ch])
    }

    /// Appends CRLF
    pub fn write_eol(&mut self) -> Result<()> {
        self.write_string([CR, LF])
    }

    /// Appends `line` followed by CRLF
    pub fn write_line(&mut self, line: impl AsRef<[u8]>) -> Result<()> {
        let line = line.as_ref();
        self.ensure(line.len() + 2)?;
        self.put(line);
        self.put(&[CR, LF]);
        Ok(())
    }

    /// Appends `name: value` followed by CRLF (`name:` when the value is
    /// empty).
    ///
    /// Leading whitespace of `value` is dropped, as the header-pair reader
    /// would strip it.
    pub fn write_name_value(&mut self, name: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let (name, value) = (name.as_ref(), trim_leading_wsp(value.as_ref()));
        let separator: &[u8] = if value.is_empty() { b":" } else { b": " };
        self.ensure(name.len() + separator.len() + value.len() + 2)?;
        self.put(name);
        self.put(separator);
        self.put(value);
        self.put(&[CR, LF]);
        Ok(())
    }

    /// Appends a decimal size value
    pub fn write_size(&mut self, value: usize) -> Result<()> {
        self.write_string(value.to_string())
    }

    /// Appends a float with trailing zeros removed
    pub fn write_float(&mut self, value: f64) -> Result<()> {
        self.write_string(format_float(value))
    }

    /// Appends `true` or `false`
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_string(if value { "true" } else { "false" })
    }

    /// Reserves `width` digits for a length that is filled in later by
    /// [`ByteCursor::splice_length`]
    pub fn reserve_length(&mut self, width: usize) -> Result<LengthPlaceholder> {
        self.ensure(width)?;
        let offset = self.pos;
        self.buf.as_mut()[offset..offset + width].fill(b'0');
        self.pos += width;
        Ok(LengthPlaceholder { offset, width })
    }

    /// Writes the final message length into a reserved slot.
    ///
    /// The length covers everything from `message_start` up to `pos`, plus
    /// `content_length` body bytes still to come, plus the digits of the
    /// length itself. When fewer digits than reserved are needed, the bytes
    /// after the slot are shifted left and `pos` moves back accordingly.
    /// Returns the computed length.
    pub fn splice_length(
        &mut self,
        slot: LengthPlaceholder,
        message_start: usize,
        content_length: usize,
    ) -> Result<usize> {
        let slot_end = slot.offset + slot.width;
        if message_start > slot.offset || slot_end > self.pos {
            return Err(Error::Config(format!(
                "length slot {}..{} outside generated message {}..{}",
                slot.offset, slot_end, message_start, self.pos
            )));
        }
        let base = self.pos - message_start - slot.width + content_length;
        let total = self_inclusive_length(base);
        let digits = total.to_string();
        if digits.len() > slot.width {
            return Err(Error::LengthOverflow { length: total, width: slot.width });
        }

        let buf = self.buf.as_mut();
        buf[slot.offset..slot.offset + digits.len()].copy_from_slice(digits.as_bytes());
        let shift = slot.width - digits.len();
        if shift > 0 {
            buf.copy_within(slot_end..self.pos, slot_end - shift);
            self.pos -= shift;
        }
        Ok(total)
    }

    /// Compacts the buffer by discarding consumed bytes.
    ///
    /// If everything has been consumed the cursor becomes empty; otherwise
    /// the unread tail `[pos, end)` moves to the start of the buffer.
    /// Scrolling twice without appending is a no-op.
    pub fn scroll(&mut self) {
        if self.pos >= self.end {
            self.pos = 0;
            self.end = 0;
        } else if self.pos > 0 {
            let (pos, end) = (self.pos, self.end);
            trace!("scrolling {} unread bytes from offset {}", end - pos, pos);
            self.buf.as_mut().copy_within(pos..end, 0);
            self.end = end - pos;
            self.pos = 0;
        }
    }

    /// Writable room after `end`, for transports that read straight into the
    /// buffer; follow with [`ByteCursor::commit`]
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        let end = self.end;
        &mut self.buf.as_mut()[end..]
    }

    /// Marks `n` bytes after `end` as received
    pub fn commit(&mut self, n: usize) {
        self.end = (self.end + n).min(self.capacity());
        self.eos = false;
    }

    /// Copies as much of `data` after `end` as fits and returns the count
    pub fn append(&mut self, data: &[u8]) -> usize {
        let room = self.spare_capacity_mut();
        let n = data.len().min(room.len());
        room[..n].copy_from_slice(&data[..n]);
        self.commit(n);
        n
    }

    /// Resets a writer cursor to the beginning of its buffer
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.eos = false;
    }
}
