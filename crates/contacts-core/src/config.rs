use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAX_DEPTH: usize = 1000;
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Limits and vocabulary for a single parse.
///
/// Keys are camelCase so the same document can be shared with the JSON-facing
/// service (`maxDepth`, `maxFieldLength`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserConfig {
    /// Maximum number of nested record elements.
    pub max_depth: usize,
    /// Maximum length of one field value, in bytes.
    pub max_field_length: usize,
    /// Strip surrounding whitespace from field values.
    pub trim_fields: bool,
    pub vocabulary: Vocabulary,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            trim_fields: true,
            vocabulary: Vocabulary::default(),
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let config: ParserConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_field_length(mut self, max_field_length: usize) -> Self {
        self.max_field_length = max_field_length;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("maxDepth must be at least 1".into()));
        }
        if self.max_field_length == 0 {
            return Err(ConfigError::Invalid(
                "maxFieldLength must be at least 1".into(),
            ));
        }
        self.vocabulary.validate()
    }
}

/// Element names the builder recognizes. Anything else is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vocabulary {
    /// Element that opens a new contact.
    pub record: String,
    /// Structural wrapper around record elements.
    pub group: String,
    pub id: String,
    pub name: String,
    pub last_name: String,
    /// Attribute on the record element that also supplies the id.
    pub id_attribute: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            record: "contact".into(),
            group: "contacts".into(),
            id: "id".into(),
            name: "name".into(),
            last_name: "lastName".into(),
            id_attribute: "id".into(),
        }
    }
}

impl Vocabulary {
    fn validate(&self) -> ConfigResult<()> {
        let elements = [
            ("record", &self.record),
            ("group", &self.group),
            ("id", &self.id),
            ("name", &self.name),
            ("lastName", &self.last_name),
        ];
        for (i, (key, value)) in elements.iter().enumerate() {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "vocabulary.{key} must not be empty"
                )));
            }
            if let Some((other, _)) = elements[..i].iter().find(|(_, v)| v == value) {
                return Err(ConfigError::Invalid(format!(
                    "vocabulary.{key} and vocabulary.{other} both use <{value}>"
                )));
            }
        }
        Ok(())
    }
}
