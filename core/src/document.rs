use crate::{DocId, FieldId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A document as supplied by a caller, before analysis.
///
/// Fields are keyed by schema field name; fields the schema defines but the
/// document omits are indexed as empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub id: Option<DocId>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl NewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: DocId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn field(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.fields.insert(name.into(), text.into());
        self
    }

    pub fn created_at(mut self, at: OffsetDateTime) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// A document owned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocId,
    /// Raw text per field, in schema order.
    pub fields: Vec<String>,
    /// Token count per field, in schema order.
    pub field_lengths: Vec<u32>,
    pub total_length: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl StoredDocument {
    pub fn field_text(&self, field: FieldId) -> &str {
        self.fields.get(field as usize).map(String::as_str).unwrap_or("")
    }

    pub fn field_length(&self, field: FieldId) -> u32 {
        self.field_lengths.get(field as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields() {
        let doc = NewDocument::new().with_id(7).field("title", "cat").field("content", "the cat sat");
        assert_eq!(doc.id, Some(7));
        assert_eq!(doc.fields.get("content").map(String::as_str), Some("the cat sat"));
    }

    #[test]
    fn new_document_parses_from_json() {
        let doc: NewDocument = serde_json::from_str(
            r#"{"fields":{"title":"dog"},"created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(doc.id, None);
        assert_eq!(doc.created_at.map(|t| t.year()), Some(2024));
    }

    #[test]
    fn stored_document_survives_bincode() {
        let stored = StoredDocument {
            id: 1,
            fields: vec!["cat".into(), "the cat sat".into()],
            field_lengths: vec![1, 3],
            total_length: 4,
            created_at: time::macros::datetime!(2024-05-06 07:08:09 UTC),
        };
        let bytes = bincode::serialize(&stored).unwrap();
        let back: StoredDocument = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, stored);
        assert_eq!(back.field_text(1), "the cat sat");
        assert_eq!(back.field_length(5), 0);
    }
}
