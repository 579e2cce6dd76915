use crate::config::ParserConfig;
use crate::events::XmlEvent;
use crate::model::{Contact, ParsedContacts};
use crate::parse::{ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Name,
    LastName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Record,
    Group,
    Field(Field),
    Other,
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    role: Role,
}

/// Text collected for the leaf field that is currently open.
#[derive(Debug)]
struct FieldBuffer {
    field: Field,
    /// Length of the open-element path when the field was opened.
    depth: usize,
    text: String,
}

/// Consumes [`XmlEvent`]s and assembles the contact tree.
///
/// Records are kept on an explicit stack rather than the call stack, so
/// nesting depth is bounded by `max_depth` no matter what the input does.
/// A record becomes immutable when it is popped: it is moved into its
/// parent's `contacts`, or into the root sequence when the stack is empty.
#[derive(Debug)]
pub struct ContactBuilder<'c> {
    config: &'c ParserConfig,
    open: Vec<OpenElement>,
    frames: Vec<Contact>,
    field: Option<FieldBuffer>,
    roots: Vec<Contact>,
    saw_root: bool,
    ended: bool,
}

impl<'c> ContactBuilder<'c> {
    pub fn new(config: &'c ParserConfig) -> Self {
        Self {
            config,
            open: Vec::new(),
            frames: Vec::new(),
            field: None,
            roots: Vec::new(),
            saw_root: false,
            ended: false,
        }
    }

    /// Current record nesting depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn feed(&mut self, event: XmlEvent) -> ParseResult<()> {
        if self.ended {
            return Err(ParseError::Structure(
                "event received after end of document".into(),
            ));
        }
        match event {
            XmlEvent::ElementOpen { name, attributes } => self.open_element(name, &attributes),
            XmlEvent::Text(text) => self.text(&text),
            XmlEvent::ElementClose { name } => self.close_element(&name),
            XmlEvent::EndOfDocument => self.end_document(),
            XmlEvent::MalformedInput(malformed) => Err(ParseError::MalformedXml(malformed)),
            XmlEvent::ReadFailure(detail) => Err(ParseError::SourceUnavailable(format!(
                "Error reading XML input: {detail}"
            ))),
        }
    }

    /// Returns the root-level contacts once the whole document was consumed.
    pub fn finish(self) -> ParseResult<ParsedContacts> {
        if !self.ended {
            return Err(ParseError::IncompleteDocument {
                element: self
                    .open
                    .last()
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|| "document".into()),
            });
        }
        Ok(ParsedContacts {
            contacts: self.roots,
        })
    }

    fn role_of(&self, name: &str) -> Role {
        let vocabulary = &self.config.vocabulary;
        if self.field.is_some() {
            // Markup nested in a leaf field is not interpreted.
            return Role::Other;
        }
        if name == vocabulary.record {
            return Role::Record;
        }
        if name == vocabulary.group {
            return Role::Group;
        }
        let parent_is_record = self.open.last().is_some_and(|e| e.role == Role::Record);
        if !parent_is_record {
            return Role::Other;
        }
        if name == vocabulary.id {
            Role::Field(Field::Id)
        } else if name == vocabulary.name {
            Role::Field(Field::Name)
        } else if name == vocabulary.last_name {
            Role::Field(Field::LastName)
        } else {
            Role::Other
        }
    }

    fn open_element(&mut self, name: String, attributes: &[(String, String)]) -> ParseResult<()> {
        self.saw_root = true;
        let role = self.role_of(&name);
        match role {
            Role::Record => {
                if self.frames.len() >= self.config.max_depth {
                    return Err(ParseError::DepthExceeded {
                        max_depth: self.config.max_depth,
                    });
                }
                let mut contact = Contact::default();
                let id_attribute = &self.config.vocabulary.id_attribute;
                if let Some((_, value)) = attributes.iter().find(|(key, _)| key == id_attribute) {
                    self.check_length(id_attribute, value.len())?;
                    contact.id = Some(self.finish_value(value));
                }
                self.frames.push(contact);
            }
            Role::Field(field) => {
                self.field = Some(FieldBuffer {
                    field,
                    depth: self.open.len() + 1,
                    text: String::new(),
                });
            }
            Role::Group | Role::Other => {}
        }
        self.open.push(OpenElement { name, role });
        Ok(())
    }

    fn text(&mut self, text: &str) -> ParseResult<()> {
        let depth = self.open.len();
        let max_length = self.config.max_field_length;
        let Some(buffer) = self.field.as_mut() else {
            return Ok(());
        };
        if buffer.depth != depth {
            return Ok(());
        }
        if buffer.text.len() + text.len() > max_length {
            let field = buffer.field;
            return Err(ParseError::FieldTooLong {
                field: self.field_name(field).to_string(),
                max_length,
            });
        }
        buffer.text.push_str(text);
        Ok(())
    }

    fn close_element(&mut self, name: &str) -> ParseResult<()> {
        let element = self.open.pop().ok_or_else(|| {
            ParseError::Structure(format!("</{name}> does not close any open element"))
        })?;
        if element.name != name {
            return Err(ParseError::Structure(format!(
                "expected </{}> but found </{name}>",
                element.name
            )));
        }

        match element.role {
            Role::Field(_) => {
                if let Some(buffer) = self.field.take() {
                    let value = self.finish_value(&buffer.text);
                    if let Some(contact) = self.frames.last_mut() {
                        match buffer.field {
                            Field::Id => contact.id = Some(value),
                            Field::Name => contact.name = Some(value),
                            Field::LastName => contact.last_name = Some(value),
                        }
                    }
                }
            }
            Role::Record => {
                let contact = self.frames.pop().ok_or_else(|| {
                    ParseError::Structure(format!("</{name}> closed a record that was never opened"))
                })?;
                match self.frames.last_mut() {
                    Some(parent) => parent.contacts.push(contact),
                    None => self.roots.push(contact),
                }
            }
            Role::Group | Role::Other => {}
        }
        Ok(())
    }

    fn end_document(&mut self) -> ParseResult<()> {
        if let Some(element) = self.open.last() {
            return Err(ParseError::IncompleteDocument {
                element: element.name.clone(),
            });
        }
        if !self.saw_root {
            return Err(ParseError::EmptyInput);
        }
        self.ended = true;
        Ok(())
    }

    fn check_length(&self, field: &str, len: usize) -> ParseResult<()> {
        let max_length = self.config.max_field_length;
        if len > max_length {
            return Err(ParseError::FieldTooLong {
                field: field.to_string(),
                max_length,
            });
        }
        Ok(())
    }

    fn finish_value(&self, raw: &str) -> String {
        if self.config.trim_fields {
            raw.trim().to_string()
        } else {
            raw.to_string()
        }
    }

    fn field_name(&self, field: Field) -> &str {
        let vocabulary = &self.config.vocabulary;
        match field {
            Field::Id => &vocabulary.id,
            Field::Name => &vocabulary.name,
            Field::LastName => &vocabulary.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str) -> XmlEvent {
        XmlEvent::ElementOpen {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    fn close(name: &str) -> XmlEvent {
        XmlEvent::ElementClose { name: name.into() }
    }

    fn text(t: &str) -> XmlEvent {
        XmlEvent::Text(t.into())
    }

    fn run(config: &ParserConfig, events: Vec<XmlEvent>) -> ParseResult<ParsedContacts> {
        let mut builder = ContactBuilder::new(config);
        for event in events {
            builder.feed(event)?;
        }
        builder.finish()
    }

    #[test]
    fn field_text_split_across_events_is_joined() {
        let config = ParserConfig::default();
        let parsed = run(
            &config,
            vec![
                open("contact"),
                open("name"),
                text("Tom "),
                text("&"),
                text(" Jerry"),
                close("name"),
                close("contact"),
                XmlEvent::EndOfDocument,
            ],
        )
        .expect("parse");
        assert_eq!(parsed.contacts[0].name.as_deref(), Some("Tom & Jerry"));
    }

    #[test]
    fn fields_outside_a_record_are_ignored() {
        let config = ParserConfig::default();
        let parsed = run(
            &config,
            vec![
                open("contacts"),
                open("name"),
                text("stray"),
                close("name"),
                open("contact"),
                open("extra"),
                open("name"),
                text("nested"),
                close("name"),
                close("extra"),
                close("contact"),
                close("contacts"),
                XmlEvent::EndOfDocument,
            ],
        )
        .expect("parse");
        assert_eq!(parsed.count(), 1);
        assert_eq!(parsed.contacts[0].name, None);
    }

    #[test]
    fn text_of_markup_inside_a_field_is_ignored() {
        let config = ParserConfig::default();
        let parsed = run(
            &config,
            vec![
                open("contact"),
                open("name"),
                text("Ann"),
                open("b"),
                text("ignored"),
                close("b"),
                close("name"),
                close("contact"),
                XmlEvent::EndOfDocument,
            ],
        )
        .expect("parse");
        assert_eq!(parsed.contacts[0].name.as_deref(), Some("Ann"));
    }

    #[test]
    fn depth_limit_counts_records_only() {
        let config = ParserConfig::default().with_max_depth(2);
        let mut builder = ContactBuilder::new(&config);
        for event in [open("contacts"), open("contact"), open("contacts"), open("contact")] {
            builder.feed(event).expect("within limit");
        }
        assert_eq!(builder.depth(), 2);
        let err = builder.feed(open("contact")).unwrap_err();
        assert_eq!(err, ParseError::DepthExceeded { max_depth: 2 });
    }

    #[test]
    fn field_length_limit() {
        let config = ParserConfig::default().with_max_field_length(4);
        let err = run(
            &config,
            vec![open("contact"), open("name"), text("abc"), text("de")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldTooLong {
                field: "name".into(),
                max_length: 4
            }
        );
    }

    #[test]
    fn stream_ending_without_end_of_document_is_incomplete() {
        let config = ParserConfig::default();
        let err = run(&config, vec![open("contacts"), open("contact")]).unwrap_err();
        assert_eq!(
            err,
            ParseError::IncompleteDocument {
                element: "contact".into()
            }
        );
    }

    #[test]
    fn unbalanced_close_is_rejected() {
        let config = ParserConfig::default();
        let err = run(&config, vec![open("contacts"), close("contact")]).unwrap_err();
        assert!(matches!(err, ParseError::Structure(_)), "{err:?}");
    }

    #[test]
    fn nothing_is_accepted_after_end_of_document() {
        let config = ParserConfig::default();
        let mut builder = ContactBuilder::new(&config);
        builder.feed(open("contacts")).unwrap();
        builder.feed(close("contacts")).unwrap();
        builder.feed(XmlEvent::EndOfDocument).unwrap();
        assert!(builder.feed(open("contact")).is_err());
    }

    #[test]
    fn untrimmed_values_when_configured() {
        let config = ParserConfig {
            trim_fields: false,
            ..ParserConfig::default()
        };
        let parsed = run(
            &config,
            vec![
                open("contact"),
                open("name"),
                text("  Ann "),
                close("name"),
                close("contact"),
                XmlEvent::EndOfDocument,
            ],
        )
        .expect("parse");
        assert_eq!(parsed.contacts[0].name.as_deref(), Some("  Ann "));
    }
}
