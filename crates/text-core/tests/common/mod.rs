//! A small MRCP-flavoured protocol built only on the public toolkit API,
//! shared by the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use once_cell::sync::Lazy;
use rvoip_text_core::prelude::*;
use rvoip_text_core::text::{format_float, parse_bool, parse_float, parse_size, parse_string, LengthPlaceholder, Line, PairArray};

// ---------------------------------------------------------------------------
// Generic namespace
// ---------------------------------------------------------------------------

pub const CONTENT_TYPE: FieldId = 0;
pub const CONTENT_LENGTH: FieldId = 1;
pub const CHANNEL_IDENTIFIER: FieldId = 2;
pub const VENDOR_SPECIFIC_PARAMETERS: FieldId = 3;

static GENERIC_FIELDS: Lazy<StringTable> = Lazy::new(|| {
    StringTable::new(&["Content-Type", "Content-Length", "Channel-Identifier", "Vendor-Specific-Parameters"])
        .expect("generic header names are unique")
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct GenericHeaders {
    pub content_type: Option<String>,
    pub content_length: Option<usize>,
    pub channel_identifier: Option<String>,
    pub vendor_params: Option<PairArray>,
}

pub struct GenericNamespace;

pub static GENERIC: GenericNamespace = GenericNamespace;

fn text(name: &str, value: &[u8]) -> Result<String> {
    parse_string(value)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_value(name, "not UTF-8"))
}

impl HeaderNamespace for GenericNamespace {
    type Data = GenericHeaders;

    fn name(&self) -> &'static str {
        "generic"
    }

    fn field_table(&self) -> &StringTable {
        &GENERIC_FIELDS
    }

    fn allocate(&self) -> GenericHeaders {
        GenericHeaders::default()
    }

    fn parse_field(&self, data: &mut GenericHeaders, id: FieldId, value: &[u8]) -> Result<()> {
        match id {
            CONTENT_TYPE => data.content_type = Some(text("Content-Type", value)?),
            CONTENT_LENGTH => {
                let length = parse_size(value).ok_or_else(|| Error::invalid_value("Content-Length", "not a size"))?;
                data.content_length = Some(length);
            }
            CHANNEL_IDENTIFIER => data.channel_identifier = Some(text("Channel-Identifier", value)?),
            VENDOR_SPECIFIC_PARAMETERS => data.vendor_params = Some(PairArray::parse(value)),
            _ => return Err(Error::UnknownFieldId { namespace: "generic", id }),
        }
        Ok(())
    }

    fn generate_field(&self, data: &GenericHeaders, id: FieldId) -> Result<Bytes> {
        let value = match id {
            CONTENT_TYPE => data.content_type.clone().unwrap_or_default(),
            CONTENT_LENGTH => data.content_length.unwrap_or(0).to_string(),
            CHANNEL_IDENTIFIER => data.channel_identifier.clone().unwrap_or_default(),
            VENDOR_SPECIFIC_PARAMETERS => data.vendor_params.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            _ => return Err(Error::UnknownFieldId { namespace: "generic", id }),
        };
        Ok(Bytes::from(value))
    }

    fn duplicate_field(&self, dst: &mut GenericHeaders, src: &GenericHeaders, id: FieldId, _value: &[u8]) -> Result<()> {
        match id {
            CONTENT_TYPE => dst.content_type = src.content_type.clone(),
            CONTENT_LENGTH => dst.content_length = src.content_length,
            CHANNEL_IDENTIFIER => dst.channel_identifier = src.channel_identifier.clone(),
            VENDOR_SPECIFIC_PARAMETERS => dst.vendor_params = src.vendor_params.clone(),
            _ => return Err(Error::UnknownFieldId { namespace: "generic", id }),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Synthesizer namespace
// ---------------------------------------------------------------------------

pub const SPEECH_LANGUAGE: FieldId = 0;
pub const VOICE_AGE: FieldId = 1;
pub const KILL_ON_BARGE_IN: FieldId = 2;
pub const PROSODY_RATE: FieldId = 3;

static SYNTH_FIELDS: Lazy<StringTable> = Lazy::new(|| {
    StringTable::new(&["Speech-Language", "Voice-Age", "Kill-On-Barge-In", "Prosody-Rate"])
        .expect("synthesizer header names are unique")
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SynthHeaders {
    pub speech_language: Option<String>,
    pub voice_age: Option<usize>,
    pub kill_on_barge_in: Option<bool>,
    pub prosody_rate: Option<f64>,
}

pub struct SynthNamespace;

pub static SYNTH: SynthNamespace = SynthNamespace;

impl HeaderNamespace for SynthNamespace {
    type Data = SynthHeaders;

    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn field_table(&self) -> &StringTable {
        &SYNTH_FIELDS
    }

    fn allocate(&self) -> SynthHeaders {
        SynthHeaders::default()
    }

    fn parse_field(&self, data: &mut SynthHeaders, id: FieldId, value: &[u8]) -> Result<()> {
        match id {
            SPEECH_LANGUAGE => data.speech_language = Some(text("Speech-Language", value)?),
            VOICE_AGE => {
                data.voice_age = Some(parse_size(value).ok_or_else(|| Error::invalid_value("Voice-Age", "not a size"))?)
            }
            KILL_ON_BARGE_IN => {
                data.kill_on_barge_in =
                    Some(parse_bool(value).ok_or_else(|| Error::invalid_value("Kill-On-Barge-In", "not a boolean"))?)
            }
            PROSODY_RATE => {
                data.prosody_rate =
                    Some(parse_float(value).ok_or_else(|| Error::invalid_value("Prosody-Rate", "not a number"))?)
            }
            _ => return Err(Error::UnknownFieldId { namespace: "synthesizer", id }),
        }
        Ok(())
    }

    fn generate_field(&self, data: &SynthHeaders, id: FieldId) -> Result<Bytes> {
        let value = match id {
            SPEECH_LANGUAGE => data.speech_language.clone().unwrap_or_default(),
            VOICE_AGE => data.voice_age.unwrap_or(0).to_string(),
            KILL_ON_BARGE_IN => data.kill_on_barge_in.unwrap_or(false).to_string(),
            PROSODY_RATE => format_float(data.prosody_rate.unwrap_or(1.0)),
            _ => return Err(Error::UnknownFieldId { namespace: "synthesizer", id }),
        };
        Ok(Bytes::from(value))
    }

    fn duplicate_field(&self, dst: &mut SynthHeaders, src: &SynthHeaders, id: FieldId, _value: &[u8]) -> Result<()> {
        match id {
            SPEECH_LANGUAGE => dst.speech_language = src.speech_language.clone(),
            VOICE_AGE => dst.voice_age = src.voice_age,
            KILL_ON_BARGE_IN => dst.kill_on_barge_in = src.kill_on_barge_in,
            PROSODY_RATE => dst.prosody_rate = src.prosody_rate,
            _ => return Err(Error::UnknownFieldId { namespace: "synthesizer", id }),
        }
        Ok(())
    }
}

/// Generic ids first, synthesizer ids offset by the generic field count
pub fn accessors() -> HeaderAccessors {
    HeaderAccessors::new()
        .with(HeaderAccessor::new(&GENERIC))
        .and_then(|chain| chain.with(HeaderAccessor::new(&SYNTH)))
        .expect("namespaces do not collide")
}

/// Chain-wide id of a synthesizer field
pub fn synth_id(local: FieldId) -> FieldId {
    GENERIC_FIELDS.len() + local
}

// ---------------------------------------------------------------------------
// Start-line
// ---------------------------------------------------------------------------

/// `METHOD uri VERSION`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

impl RequestLine {
    pub fn new(method: &str, uri: &str, version: &str) -> Self {
        Self { method: method.to_string(), uri: uri.to_string(), version: version.to_string() }
    }

    fn parse(line: &[u8]) -> Option<Self> {
        let line = std::str::from_utf8(line).ok()?;
        let mut tokens = line.split(' ').filter(|t| !t.is_empty());
        let method = tokens.next()?;
        let uri = tokens.next()?;
        let version = tokens.next()?;
        if tokens.next().is_some() || !method.bytes().all(|b| b.is_ascii_uppercase() || b == b'-') {
            return None;
        }
        Some(Self::new(method, uri, version))
    }
}

/// Parser hooks of the sample protocol. Every message gets its own
/// generic + synthesizer chain.
pub struct SampleHandler {
    pub completed_bodies: usize,
}

impl SampleHandler {
    pub fn new() -> Self {
        Self { completed_bodies: 0 }
    }
}

impl MessageHandler for SampleHandler {
    type StartLine = RequestLine;

    fn on_start<B: AsRef<[u8]>>(&mut self, cursor: &mut ByteCursor<B>) -> MessageStatus<RequestLine> {
        match cursor.read_line() {
            Line::Complete(line) => match RequestLine::parse(line) {
                Some(start_line) => MessageStatus::Complete(start_line),
                None => MessageStatus::Invalid,
            },
            Line::Partial(_) => MessageStatus::Incomplete,
        }
    }

    fn new_accessors(&mut self, _start_line: &RequestLine) -> HeaderAccessors {
        accessors()
    }

    fn on_header_complete(&mut self, message: &mut TextMessage<RequestLine>) -> bool {
        if message.start_line.method == "REJECT" {
            return false;
        }
        message.content_length = message.data::<GenericNamespace>().and_then(|generic| generic.content_length);
        true
    }

    fn on_body_complete(&mut self, _message: &mut TextMessage<RequestLine>) -> bool {
        self.completed_bodies += 1;
        true
    }
}

/// Writes `METHOD uri VERSION`
pub struct SampleWriter;

impl MessageWriter for SampleWriter {
    type StartLine = RequestLine;

    fn on_start<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<RequestLine>,
        cursor: &mut ByteCursor<B>,
    ) -> Result<()> {
        let line = &message.start_line;
        cursor.write_line(format!("{} {} {}", line.method, line.uri, line.version))
    }
}

/// Writes `VERSION length METHOD uri`, where `length` counts the whole
/// message including itself
pub struct LengthPrefixedWriter {
    pub width: usize,
    slot: Option<LengthPlaceholder>,
    pub last_length: Option<usize>,
}

impl LengthPrefixedWriter {
    pub fn new(width: usize) -> Self {
        Self { width, slot: None, last_length: None }
    }
}

impl MessageWriter for LengthPrefixedWriter {
    type StartLine = RequestLine;

    fn on_start<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<RequestLine>,
        cursor: &mut ByteCursor<B>,
    ) -> Result<()> {
        let line = &message.start_line;
        cursor.write_string(&line.version)?;
        cursor.write_char(b' ')?;
        self.slot = Some(cursor.reserve_length(self.width)?);
        cursor.write_line(format!(" {} {}", line.method, line.uri))
    }

    fn on_header_complete<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        message: &TextMessage<RequestLine>,
        cursor: &mut ByteCursor<B>,
        message_start: usize,
    ) -> Result<()> {
        let slot = self
            .slot
            .take()
            .ok_or_else(|| Error::Config("no length slot reserved".to_string()))?;
        self.last_length = Some(cursor.splice_length(slot, message_start, message.declared_length())?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reader cursor with `extra` bytes of spare room after `data`
pub fn reader(data: &[u8], extra: usize) -> ByteCursor<Vec<u8>> {
    let mut buf = vec![0u8; data.len() + extra];
    buf[..data.len()].copy_from_slice(data);
    ByteCursor::with_len(buf, data.len())
}

/// Routes library logs to the test output; set RUST_LOG to see them
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Feeds `chunks` one at a time (scrolling in between) and collects every
/// message the parser completes
pub fn parse_chunks(
    parser: &mut MessageParser<SampleHandler>,
    chunks: &[&[u8]],
) -> Vec<MessageStatus<TextMessage<RequestLine>>> {
    init_logging();
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut cursor = ByteCursor::empty(vec![0u8; total + 16]);
    let mut results = Vec::new();
    for chunk in chunks {
        cursor.scroll();
        assert_eq!(cursor.append(chunk), chunk.len());
        loop {
            match parser.run(&mut cursor) {
                MessageStatus::Incomplete => break,
                status => {
                    let invalid = status.is_invalid();
                    results.push(status);
                    if invalid {
                        return results;
                    }
                }
            }
        }
    }
    results
}

/// `(name, value)` pairs in wire order
pub fn fields(section: &HeaderSection) -> Vec<(String, String)> {
    section
        .iter()
        .map(|f| {
            (
                String::from_utf8_lossy(f.name()).into_owned(),
                String::from_utf8_lossy(f.value()).into_owned(),
            )
        })
        .collect()
}

/// Builds a request with the given header fields (resolved through the
/// sample accessors) and body
pub fn request(method: &str, headers: &[(&str, &str)], body: &str) -> TextMessage<RequestLine> {
    let mut message = TextMessage::with_accessors(RequestLine::new(method, "session:1", "MRCP/2.0"), accessors());
    for (name, value) in headers {
        message
            .add_field(HeaderField::new(name.to_string(), value.to_string()))
            .expect("valid test header");
    }
    message.set_body(body);
    message
}
