//! Engine-native documents.

use serde::{Deserialize, Serialize};

/// A named value plus the flags that decide how it is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    /// Returned by `IndexReader::document`.
    pub stored: bool,
    /// Searchable.
    pub indexed: bool,
    /// Run through the standard analyzer; otherwise indexed verbatim as one term.
    pub tokenized: bool,
}

impl Field {
    /// Stored, indexed and tokenized.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            stored: true,
            indexed: true,
            tokenized: true,
        }
    }

    /// Stored and indexed as a single untokenized term.
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            stored: true,
            indexed: true,
            tokenized: false,
        }
    }

    /// Indexed and tokenized, but not retrievable.
    pub fn unstored(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            stored: false,
            indexed: true,
            tokenized: true,
        }
    }

    /// Retrievable only.
    pub fn stored_only(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            stored: true,
            indexed: false,
            tokenized: false,
        }
    }
}

/// An ordered list of fields. Names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Builder-style variant of [`Document::add`].
    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Field::text(name, value))
    }

    pub fn add_keyword(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Field::keyword(name, value))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// A copy holding only stored fields.
    pub fn stored(&self) -> Document {
        Document {
            fields: self.fields.iter().filter(|f| f.stored).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_first_value() {
        let doc = Document::new()
            .add_text("tag", "first")
            .add_text("tag", "second");
        assert_eq!(doc.get("tag"), Some("first"));
        assert_eq!(doc.values("tag").count(), 2);
    }

    #[test]
    fn test_stored_projection() {
        let doc = Document::new()
            .with(Field::unstored("body", "hidden"))
            .add_text("title", "shown");
        let stored = doc.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get("title"), Some("shown"));
        assert_eq!(stored.get("body"), None);
    }
}
