use crate::model::{Contact, ParsedContacts};
use crate::parse::{ParseError, ParseResult};
use serde::{Deserialize, Serialize};

/// The response contract consumed by the contact front ends.
///
/// `contacts` and `count` are present iff `success`; `error` and
/// `errorType` are present iff not. `count` is the root-level count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ParseResponse {
    pub fn success(parsed: ParsedContacts) -> Self {
        let count = parsed.count();
        Self {
            success: true,
            contacts: Some(parsed.contacts),
            count: Some(count),
            error: None,
            error_type: None,
            line_number: None,
            column_number: None,
            file_name: None,
        }
    }

    pub fn failure(err: &ParseError) -> Self {
        let position = err.malformed().map(|m| m.position);
        Self {
            success: false,
            contacts: None,
            count: None,
            error: Some(err.to_string()),
            error_type: Some(err.error_type().to_string()),
            line_number: position.map(|p| p.line),
            column_number: position.map(|p| p.column),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<ParseResult<ParsedContacts>> for ParseResponse {
    fn from(result: ParseResult<ParsedContacts>) -> Self {
        match result {
            Ok(parsed) => ParseResponse::success(parsed),
            Err(err) => ParseResponse::failure(&err),
        }
    }
}
