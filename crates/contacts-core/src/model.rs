use serde::{Deserialize, Serialize};

/// One contact record, possibly carrying nested sub-contacts.
///
/// Absent fields stay `None`; they are never synthesized. An element that was
/// present but empty (`<name></name>`) yields `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Direct children in document order.
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Contact {
    /// Number of contacts in this subtree, excluding `self`.
    pub fn descendant_count(&self) -> usize {
        let mut total = 0;
        let mut pending: Vec<&Contact> = vec![self];
        while let Some(contact) = pending.pop() {
            total += contact.contacts.len();
            pending.extend(contact.contacts.iter());
        }
        total
    }

    /// Depth of the deepest nested contact, where a leaf contact has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&Contact, usize)> = vec![(self, 1)];
        while let Some((contact, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(contact.contacts.iter().map(|c| (c, depth + 1)));
        }
        deepest
    }
}

/// Successful outcome of a parse: the root-level contacts in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedContacts {
    pub contacts: Vec<Contact>,
}

impl ParsedContacts {
    /// Root-level count. Nested sub-contacts are not included.
    pub fn count(&self) -> usize {
        self.contacts.len()
    }

    /// Every contact in the tree, nested ones included.
    pub fn total_count(&self) -> usize {
        self.contacts
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}
