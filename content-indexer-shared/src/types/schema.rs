//! Schema descriptors declared by indexing strategies.
//!
//! A schema is consumed once, when a physical index is created. It lists the
//! document fields and their kinds; engines translate it into their own
//! mapping format.

use serde::{Deserialize, Serialize};

use crate::types::search_document::SearchDocument;

/// Kind of a document field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Analyzed full text.
    Text,
    /// Exact-match string.
    Keyword,
    Integer,
    Float,
    Boolean,
    Date,
    GeoPoint,
}

/// One declared field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    /// Whether the field can be queried.
    pub searchable: bool,
    /// Whether the raw value is kept retrievable in addition to the source.
    pub stored: bool,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            searchable: true,
            stored: false,
        }
    }

    pub fn not_searchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }
}

/// Field name → kind description for one index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSchema {
    fields: Vec<SchemaField>,
}

impl IndexSchema {
    /// A schema with no fields at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The base fields every document carries.
    pub fn base() -> Self {
        Self::empty()
            .with(SchemaField::new(SearchDocument::OBJECT_ID, FieldKind::Keyword))
            .with(SchemaField::new(SearchDocument::ITEM_GUID, FieldKind::Keyword))
            .with(SchemaField::new(SearchDocument::URL, FieldKind::Keyword).not_searchable())
            .with(SchemaField::new(
                SearchDocument::CONTENT_TYPE_NAME,
                FieldKind::Keyword,
            ))
            .with(SchemaField::new(SearchDocument::LANGUAGE_NAME, FieldKind::Keyword))
            .with(SchemaField::new(SearchDocument::NAME, FieldKind::Text))
            .with(SchemaField::new(SearchDocument::INDEXED_AT, FieldKind::Date))
    }

    /// Add a field, replacing any earlier declaration with the same name.
    pub fn with(mut self, field: SchemaField) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    pub fn text(self, name: impl Into<String>) -> Self {
        self.with(SchemaField::new(name, FieldKind::Text))
    }

    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.with(SchemaField::new(name, FieldKind::Keyword))
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.with(SchemaField::new(name, FieldKind::Integer))
    }

    pub fn date(self, name: impl Into<String>) -> Self {
        self.with(SchemaField::new(name, FieldKind::Date))
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
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
    fn test_base_schema_declares_identity_fields() {
        let schema = IndexSchema::base();
        assert_eq!(
            schema.field("object_id").map(|f| f.kind),
            Some(FieldKind::Keyword)
        );
        assert_eq!(schema.field("name").map(|f| f.kind), Some(FieldKind::Text));
        assert!(!schema.field("url").unwrap().searchable);
    }

    #[test]
    fn test_redeclaring_a_field_replaces_it() {
        let schema = IndexSchema::base().keyword("name").text("summary");
        assert_eq!(schema.field("name").unwrap().kind, FieldKind::Keyword);
        assert_eq!(schema.len(), IndexSchema::base().len() + 1);
    }
}
