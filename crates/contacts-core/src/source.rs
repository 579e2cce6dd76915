use crate::parse::{ParseError, ParseResult};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Logical description of where a document came from, for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescription {
    Path(PathBuf),
    Upload {
        file_name: Option<String>,
        size: usize,
    },
    Inline {
        length: usize,
    },
}

impl fmt::Display for SourceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescription::Path(path) => write!(f, "path {}", path.display()),
            SourceDescription::Upload { file_name, size } => write!(
                f,
                "upload {} ({size} bytes)",
                file_name.as_deref().unwrap_or("<unnamed>")
            ),
            SourceDescription::Inline { length } => write!(f, "inline text ({length} bytes)"),
        }
    }
}

/// Something that can hand the parser a byte stream.
///
/// Implementations report their own I/O problems as
/// [`ParseError::SourceUnavailable`]; the parser never inspects which kind of
/// source it was given.
pub trait ContactSource {
    fn describe(&self) -> SourceDescription;

    fn open(&self) -> ParseResult<Box<dyn Read + '_>>;

    /// Name echoed back in the response, if the source has one.
    fn file_name(&self) -> Option<&str> {
        None
    }
}

/// A document on the local filesystem.
#[derive(Debug, Clone)]
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContactSource for PathSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription::Path(self.path.clone())
    }

    fn open(&self) -> ParseResult<Box<dyn Read + '_>> {
        let display = self.path.display();
        let metadata = std::fs::metadata(&self.path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ParseError::SourceUnavailable(format!("File not found: {display}"))
            } else {
                ParseError::SourceUnavailable(format!("Cannot read file: {display}: {err}"))
            }
        })?;
        if !metadata.is_file() {
            return Err(ParseError::SourceUnavailable(format!(
                "Path is not a file: {display}"
            )));
        }
        let file = File::open(&self.path).map_err(|err| {
            ParseError::SourceUnavailable(format!("Cannot read file: {display}: {err}"))
        })?;
        Ok(Box::new(file))
    }
}

/// A payload received from a client, such as a multipart file part.
#[derive(Debug, Clone)]
pub struct UploadSource {
    file_name: Option<String>,
    payload: Vec<u8>,
}

impl UploadSource {
    pub fn new(file_name: Option<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name,
            payload: payload.into(),
        }
    }
}

impl ContactSource for UploadSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription::Upload {
            file_name: self.file_name.clone(),
            size: self.payload.len(),
        }
    }

    fn open(&self) -> ParseResult<Box<dyn Read + '_>> {
        if self.payload.is_empty() {
            return Err(ParseError::SourceUnavailable("File is empty".into()));
        }
        Ok(Box::new(self.payload.as_slice()))
    }

    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

/// XML text pasted directly by the caller.
#[derive(Debug, Clone)]
pub struct InlineSource {
    text: String,
}

impl InlineSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ContactSource for InlineSource {
    fn describe(&self) -> SourceDescription {
        SourceDescription::Inline {
            length: self.text.len(),
        }
    }

    fn open(&self) -> ParseResult<Box<dyn Read + '_>> {
        if self.text.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }
        Ok(Box::new(self.text.as_bytes()))
    }
}
