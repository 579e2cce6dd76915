// crates/contacts-core/src/parse.rs
//
// Entry points for turning a contacts XML stream into a contact tree.
// - EventSource pulls events lazily from the stream
// - ContactBuilder is the only stateful consumer; each call gets its own
// - Any failure ends the parse; there is no partial result

use crate::builder::ContactBuilder;
use crate::config::ParserConfig;
use crate::events::{EventSource, Malformed};
use crate::model::ParsedContacts;
use crate::report::ParseResponse;
use crate::source::ContactSource;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("XML format error: {0}")]
    MalformedXml(Malformed),

    #[error("unexpected structure: {0}")]
    Structure(String),

    #[error("incomplete document: <{element}> was never closed")]
    IncompleteDocument { element: String },

    #[error("contacts are nested deeper than the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    #[error("the XML content is empty")]
    EmptyInput,

    #[error("{0}")]
    SourceUnavailable(String),

    #[error("<{field}> value is longer than {max_length} bytes")]
    FieldTooLong { field: String, max_length: usize },
}

/// Failure categories, independent of how each one is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedXml,
    IncompleteDocument,
    DepthExceeded,
    EmptyInput,
    SourceUnavailable,
    FieldTooLong,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MalformedXml => "MALFORMED_XML",
            ErrorKind::IncompleteDocument => "INCOMPLETE_DOCUMENT",
            ErrorKind::DepthExceeded => "DEPTH_EXCEEDED",
            ErrorKind::EmptyInput => "EMPTY_INPUT",
            ErrorKind::SourceUnavailable => "SOURCE_UNAVAILABLE",
            ErrorKind::FieldTooLong => "FIELD_TOO_LONG",
        }
    }
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::MalformedXml(_) | ParseError::Structure(_) => ErrorKind::MalformedXml,
            ParseError::IncompleteDocument { .. } => ErrorKind::IncompleteDocument,
            ParseError::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            ParseError::EmptyInput => ErrorKind::EmptyInput,
            ParseError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            ParseError::FieldTooLong { .. } => ErrorKind::FieldTooLong,
        }
    }

    /// Response `errorType`. Malformed input reports its finer cause.
    pub fn error_type(&self) -> &'static str {
        match self {
            ParseError::MalformedXml(malformed) => malformed.cause.code(),
            other => other.kind().code(),
        }
    }

    pub fn malformed(&self) -> Option<&Malformed> {
        match self {
            ParseError::MalformedXml(malformed) => Some(malformed),
            _ => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a contacts document from a byte stream.
///
/// The stream is read incrementally; contacts are assembled as their closing
/// tags arrive. On success the root-level contacts are returned in document
/// order.
pub fn parse_contacts<R: Read>(input: R, config: &ParserConfig) -> ParseResult<ParsedContacts> {
    let mut builder = ContactBuilder::new(config);
    for event in EventSource::new(input) {
        builder.feed(event)?;
    }
    let parsed = builder.finish()?;
    tracing::debug!(
        count = parsed.count(),
        total = parsed.total_count(),
        "parsed contacts"
    );
    Ok(parsed)
}

/// Parse a contacts document held in memory.
pub fn parse_str(xml: &str, config: &ParserConfig) -> ParseResult<ParsedContacts> {
    if xml.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }
    parse_contacts(xml.as_bytes(), config)
}

/// Open `source`, parse it and report the outcome in the response contract
/// the front ends consume.
pub fn parse_source(source: &dyn ContactSource, config: &ParserConfig) -> ParseResponse {
    let description = source.describe();
    tracing::debug!(source = %description, "parsing contacts");

    let result = source
        .open()
        .and_then(|input| parse_contacts(input, config));

    match &result {
        Ok(parsed) => tracing::info!(
            source = %description,
            count = parsed.count(),
            "contacts parsed"
        ),
        Err(err) => tracing::warn!(
            source = %description,
            error_type = err.error_type(),
            "contacts parse failed: {err}"
        ),
    }

    let response = ParseResponse::from(result);
    match source.file_name() {
        Some(name) if response.success => response.with_file_name(name),
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MalformedCause;

    #[test]
    fn error_type_prefers_malformed_cause() {
        let err = parse_str("<contacts></contact>", &ParserConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedXml);
        assert_eq!(err.error_type(), MalformedCause::MismatchedTag.code());
        assert!(err.malformed().is_some());
    }

    #[test]
    fn error_type_falls_back_to_kind() {
        let err = parse_str("   ", &ParserConfig::default()).unwrap_err();
        assert_eq!(err.error_type(), "EMPTY_INPUT");
        assert!(err.malformed().is_none());
    }

    #[test]
    fn structure_errors_count_as_malformed() {
        let err = ParseError::Structure("bad".into());
        assert_eq!(err.kind(), ErrorKind::MalformedXml);
        assert_eq!(err.error_type(), "MALFORMED_XML");
    }
}
