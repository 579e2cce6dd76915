// crates/contacts-core/src/events.rs
//
// Pull-based XML event source on top of quick-xml.
// - Reads through a BufReader; nothing beyond the read buffer and the open
//   element path is retained
// - Self-closing elements are expanded into an open/close pair
// - Entity and character references arrive as their own Text events
// - Comments, PIs, the XML declaration and DOCTYPE are skipped
// - The first failure ends the sequence; no event follows MalformedInput

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::errors::{Error as XmlError, IllFormedError, SyntaxError};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use std::collections::VecDeque;
use std::fmt;
use std::io::{BufReader, Read};
use std::str;

/// Location of a failure in the input stream. Line and column are 1-based;
/// the column counts bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub offset: u64,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedCause {
    UnclosedTag,
    MismatchedTag,
    InvalidCharacter,
    EntityError,
    DuplicateAttribute,
    PrematureEnd,
    MissingRoot,
    Other,
}

impl MalformedCause {
    pub fn code(self) -> &'static str {
        match self {
            MalformedCause::UnclosedTag => "UNCLOSED_TAG",
            MalformedCause::MismatchedTag => "MISMATCHED_TAG",
            MalformedCause::InvalidCharacter => "INVALID_CHARACTER",
            MalformedCause::EntityError => "ENTITY_ERROR",
            MalformedCause::DuplicateAttribute => "DUPLICATE_ATTRIBUTE",
            MalformedCause::PrematureEnd => "PREMATURE_END",
            MalformedCause::MissingRoot => "ROOT_ELEMENT_ERROR",
            MalformedCause::Other => "MALFORMED_XML",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub position: Position,
    pub cause: MalformedCause,
    pub detail: String,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.detail, self.position.line, self.position.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    ElementOpen {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    ElementClose {
        name: String,
    },
    EndOfDocument,
    MalformedInput(Malformed),
    /// The underlying stream failed while being read.
    ReadFailure(String),
}

impl XmlEvent {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            XmlEvent::EndOfDocument | XmlEvent::MalformedInput(_) | XmlEvent::ReadFailure(_)
        )
    }
}

/// Turns byte offsets into line/column pairs. Newlines before the oldest
/// offset still of interest are folded into a running line count, so only the
/// ones inside the current read window are kept.
struct LineTracker<R> {
    inner: R,
    consumed: u64,
    newlines: VecDeque<u64>,
    /// Newlines already folded away.
    lines_before: usize,
    /// Offset just past the last folded newline.
    line_start: u64,
}

impl<R: Read> Read for LineTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (i, byte) in buf[..n].iter().enumerate() {
            if *byte == b'\n' {
                self.newlines.push_back(self.consumed + i as u64);
            }
        }
        self.consumed += n as u64;
        Ok(n)
    }
}

impl<R> LineTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: 0,
            newlines: VecDeque::new(),
            lines_before: 0,
            line_start: 0,
        }
    }

    /// Folds away newlines before `offset`. Positions are never asked for
    /// offsets before it afterwards.
    fn forget_before(&mut self, offset: u64) {
        while let Some(&nl) = self.newlines.front() {
            if nl >= offset {
                break;
            }
            self.newlines.pop_front();
            self.lines_before += 1;
            self.line_start = nl + 1;
        }
    }

    fn position(&self, offset: u64) -> Position {
        let preceding = self.newlines.partition_point(|&nl| nl < offset);
        let line_start = match preceding {
            0 => self.line_start,
            n => self.newlines[n - 1] + 1,
        };
        Position {
            offset,
            line: self.lines_before + preceding + 1,
            column: offset.saturating_sub(line_start) as usize + 1,
        }
    }
}

/// Owned copy of one quick-xml event, so the read buffer can be reused
/// before the event is interpreted.
enum RawEvent {
    Open(String, Vec<(String, String)>),
    Close(String),
    Text(String),
    Markup,
    Eof,
}

type Failure = (MalformedCause, String);

enum ReadError {
    /// Reported by quick-xml while scanning markup.
    Xml(Failure),
    /// Found while decoding the content of an event that scanned cleanly.
    Content(Failure),
    Io(String),
}

impl From<XmlError> for ReadError {
    fn from(err: XmlError) -> Self {
        let cause = match &err {
            XmlError::Io(io) => return ReadError::Io(io.to_string()),
            XmlError::Syntax(SyntaxError::UnclosedTag) => MalformedCause::UnclosedTag,
            XmlError::Syntax(_) => MalformedCause::PrematureEnd,
            XmlError::IllFormed(
                IllFormedError::MismatchedEndTag { .. } | IllFormedError::UnmatchedEndTag(_),
            ) => MalformedCause::MismatchedTag,
            XmlError::IllFormed(IllFormedError::MissingEndTag(_)) => MalformedCause::UnclosedTag,
            XmlError::InvalidAttr(AttrError::Duplicated(..)) => MalformedCause::DuplicateAttribute,
            XmlError::Encoding(_) => MalformedCause::InvalidCharacter,
            XmlError::Escape(_) => MalformedCause::EntityError,
            _ => MalformedCause::Other,
        };
        ReadError::Xml((cause, err.to_string()))
    }
}

/// Lazy, non-restartable sequence of [`XmlEvent`]s over a byte stream.
///
/// The sequence always ends with exactly one terminal event
/// (`EndOfDocument`, `MalformedInput` or `ReadFailure`), after which the
/// iterator yields `None`. Dropping it part way releases everything.
pub struct EventSource<R: Read> {
    reader: Reader<BufReader<LineTracker<R>>>,
    buf: Vec<u8>,
    open: Vec<String>,
    saw_element: bool,
    saw_content: bool,
    done: bool,
}

impl<R: Read> EventSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(BufReader::new(LineTracker::new(input)));
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;
        // Whitespace is significant inside fields; the builder decides what to trim.
        config.trim_text(false);

        Self {
            reader,
            buf: Vec::new(),
            open: Vec::new(),
            saw_element: false,
            saw_content: false,
            done: false,
        }
    }

    /// Names of the currently open elements, outermost first.
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }

    fn malformed(&self, offset: u64, (cause, detail): Failure) -> XmlEvent {
        XmlEvent::MalformedInput(Malformed {
            position: self.reader.get_ref().get_ref().position(offset),
            cause,
            detail,
        })
    }

    fn read_raw(&mut self) -> Result<RawEvent, ReadError> {
        self.buf.clear();
        let raw = match self.reader.read_event_into(&mut self.buf)? {
            Event::Start(e) => {
                let name = element_name(e.local_name().as_ref()).map_err(ReadError::Content)?;
                let attributes = attributes(&e).map_err(ReadError::Content)?;
                RawEvent::Open(name, attributes)
            }
            Event::End(e) => {
                RawEvent::Close(element_name(e.local_name().as_ref()).map_err(ReadError::Content)?)
            }
            Event::Text(t) => RawEvent::Text(
                t.decode()
                    .map_err(|err| {
                        ReadError::Content((MalformedCause::InvalidCharacter, err.to_string()))
                    })?
                    .into_owned(),
            ),
            Event::CData(c) => RawEvent::Text(
                c.decode()
                    .map_err(|err| {
                        ReadError::Content((MalformedCause::InvalidCharacter, err.to_string()))
                    })?
                    .into_owned(),
            ),
            Event::GeneralRef(r) => {
                let name = str::from_utf8(r.as_ref()).map_err(|err| {
                    ReadError::Content((MalformedCause::InvalidCharacter, err.to_string()))
                })?;
                RawEvent::Text(resolve_reference(name).map_err(ReadError::Content)?)
            }
            Event::Eof => RawEvent::Eof,
            _ => RawEvent::Markup,
        };
        Ok(raw)
    }

    fn pull(&mut self) -> XmlEvent {
        loop {
            let start = self.reader.buffer_position() as u64;
            self.reader.get_mut().get_mut().forget_before(start);
            let raw = match self.read_raw() {
                Ok(raw) => raw,
                Err(ReadError::Io(detail)) => return XmlEvent::ReadFailure(detail),
                Err(ReadError::Content(failure)) => return self.malformed(start, failure),
                Err(ReadError::Xml(failure)) => {
                    let at = start.max(self.reader.error_position() as u64);
                    return self.malformed(at, failure);
                }
            };

            match raw {
                RawEvent::Open(name, attributes) => {
                    if self.open.is_empty() && self.saw_element {
                        let detail =
                            format!("<{name}> follows the root element; only one is allowed");
                        return self.malformed(start, (MalformedCause::MissingRoot, detail));
                    }
                    let invalid = attributes
                        .iter()
                        .find_map(|(key, value)| first_invalid_char(value).map(|c| (key, c)));
                    if let Some((key, bad)) = invalid {
                        let detail = format!(
                            "attribute {key} of <{name}> contains invalid character U+{:04X}",
                            bad as u32
                        );
                        return self.malformed(start, (MalformedCause::InvalidCharacter, detail));
                    }
                    self.saw_element = true;
                    self.saw_content = true;
                    self.open.push(name.clone());
                    return XmlEvent::ElementOpen { name, attributes };
                }
                RawEvent::Close(name) => {
                    if self.open.last() != Some(&name) {
                        let detail = match self.open.last() {
                            Some(expected) => {
                                format!("expected </{expected}> but found </{name}>")
                            }
                            None => format!("</{name}> does not close any open element"),
                        };
                        return self.malformed(start, (MalformedCause::MismatchedTag, detail));
                    }
                    self.open.pop();
                    return XmlEvent::ElementClose { name };
                }
                RawEvent::Text(text) => {
                    if let Some(bad) = first_invalid_char(&text) {
                        let detail = format!("invalid character U+{:04X} in text", bad as u32);
                        return self.malformed(start, (MalformedCause::InvalidCharacter, detail));
                    }
                    if self.open.is_empty() {
                        if is_blank(&text) {
                            continue;
                        }
                        let detail = if self.saw_element {
                            "content is not allowed after the root element"
                        } else {
                            "content is not allowed before the root element"
                        };
                        return self.malformed(start, (MalformedCause::MissingRoot, detail.into()));
                    }
                    return XmlEvent::Text(text);
                }
                RawEvent::Markup => {
                    self.saw_content = true;
                }
                RawEvent::Eof => {
                    if !self.saw_element && self.saw_content {
                        let detail = "document has no root element".to_string();
                        return self.malformed(start, (MalformedCause::MissingRoot, detail));
                    }
                    return XmlEvent::EndOfDocument;
                }
            }
        }
    }
}

impl<R: Read> Iterator for EventSource<R> {
    type Item = XmlEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let event = self.pull();
        if event.is_terminal() {
            self.done = true;
        }
        Some(event)
    }
}

fn element_name(raw: &[u8]) -> Result<String, Failure> {
    str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| (MalformedCause::InvalidCharacter, format!("element name: {err}")))
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, Failure> {
    let mut out = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| match err {
            AttrError::Duplicated(..) => (MalformedCause::DuplicateAttribute, err.to_string()),
            AttrError::ExpectedQuote(..) => (MalformedCause::UnclosedTag, err.to_string()),
            _ => (MalformedCause::Other, err.to_string()),
        })?;
        let key = element_name(a.key.local_name().as_ref())?;
        let value = a
            .unescape_value()
            .map_err(|err| (MalformedCause::EntityError, err.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Resolves the body of `&...;`: the predefined entities and numeric
/// character references. DTD-declared entities are not supported.
fn resolve_reference(name: &str) -> Result<String, Failure> {
    if let Some(resolved) = resolve_predefined_entity(name) {
        return Ok(resolved.to_string());
    }
    let Some(digits) = name.strip_prefix('#') else {
        return Err((
            MalformedCause::EntityError,
            format!("unknown entity &{name};"),
        ));
    };
    let code = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse::<u32>().ok(),
    };
    code.and_then(char::from_u32)
        .filter(|c| is_xml_char(*c))
        .map(String::from)
        .ok_or_else(|| {
            (
                MalformedCause::EntityError,
                format!("invalid character reference &{name};"),
            )
        })
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn first_invalid_char(text: &str) -> Option<char> {
    text.chars().find(|c| !is_xml_char(*c))
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{FEFF}')
}
