pub mod builder;
pub mod config;
pub mod events;
#[cfg(feature = "cli")]
pub mod logger;
pub mod model;
pub mod parse;
pub mod report;
pub mod source;
pub use config::{ConfigError, ParserConfig, Vocabulary};
pub use model::{Contact, ParsedContacts};
pub use parse::{ErrorKind, ParseError, ParseResult, parse_contacts, parse_source, parse_str};
pub use report::ParseResponse;
pub use source::{ContactSource, InlineSource, PathSource, UploadSource};
