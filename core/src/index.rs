//! Inverted index with per-field postings and incrementally maintained
//! corpus statistics.
//!
//! Postings are keyed by term. Each [`PostingList`] holds at most one
//! [`Posting`] per (document, field), sorted by document id then field so
//! candidate lists can be intersected with a linear merge. Document
//! frequency is kept on the list itself and counts distinct documents.

use crate::document::{NewDocument, StoredDocument};
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use crate::{DocId, FieldId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use time::OffsetDateTime;

/// Ordered, fixed set of named fields agreed at index creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
    category_field: Option<FieldId>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(Error::schema("at least one field is required"));
        }
        if fields.len() > FieldId::MAX as usize {
            return Err(Error::schema(format!("too many fields ({})", fields.len())));
        }
        let mut seen = HashSet::new();
        for name in &fields {
            if name.trim().is_empty() {
                return Err(Error::schema("field names must not be blank"));
            }
            if name.chars().any(|c| c.is_whitespace() || c == ':' || c == '"') {
                return Err(Error::schema(format!("field name '{name}' contains reserved characters")));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::schema(format!("duplicate field '{name}'")));
            }
        }
        Ok(Self { fields, category_field: None })
    }

    /// Designate `name` as the field category filters and breakdowns read.
    pub fn with_category_field(mut self, name: &str) -> Result<Self> {
        let id = self
            .field_id(name)
            .ok_or_else(|| Error::schema(format!("category field '{name}' is not in the schema")))?;
        self.category_field = Some(id);
        Ok(self)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|f| f == name).map(|i| i as FieldId)
    }

    pub fn field_name(&self, id: FieldId) -> &str {
        self.fields.get(id as usize).map(String::as_str).unwrap_or("")
    }

    pub fn category_field(&self) -> Option<FieldId> {
        self.category_field
    }

    /// Category value of `doc`, if the schema designates a category field.
    pub fn category_of<'d>(&self, doc: &'d StoredDocument) -> Option<&'d str> {
        self.category_field.map(|f| doc.field_text(f).trim())
    }
}

/// Occurrences of one term in one field of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub field: FieldId,
    /// Token positions within the field, ascending.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn term_frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    entries: Vec<Posting>,
    doc_freq: u32,
}

impl PostingList {
    pub fn entries(&self) -> &[Posting] {
        &self.entries
    }

    /// Number of distinct documents containing the term in any field.
    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Postings of `doc_id`, ordered by field.
    pub fn for_doc(&self, doc_id: DocId) -> &[Posting] {
        let start = self.entries.partition_point(|p| p.doc_id < doc_id);
        let end = start + self.entries[start..].partition_point(|p| p.doc_id == doc_id);
        &self.entries[start..end]
    }

    /// Distinct document ids, ascending, optionally limited to one field.
    pub fn doc_ids(&self, field: Option<FieldId>) -> Vec<DocId> {
        let mut ids: Vec<DocId> = Vec::new();
        for p in &self.entries {
            if field.is_some_and(|f| f != p.field) {
                continue;
            }
            if ids.last() != Some(&p.doc_id) {
                ids.push(p.doc_id);
            }
        }
        ids
    }

    /// Insert the postings of a document that is not yet in the list.
    /// `postings` must be sorted by field.
    fn insert_doc(&mut self, doc_id: DocId, postings: Vec<Posting>) {
        if postings.is_empty() {
            return;
        }
        let at = self.entries.partition_point(|p| p.doc_id < doc_id);
        self.entries.splice(at..at, postings);
        self.doc_freq += 1;
    }

    fn remove_doc(&mut self, doc_id: DocId) -> bool {
        let start = self.entries.partition_point(|p| p.doc_id < doc_id);
        let end = start + self.entries[start..].partition_point(|p| p.doc_id == doc_id);
        if start == end {
            return false;
        }
        self.entries.drain(start..end);
        self.doc_freq -= 1;
        true
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.entries.is_empty() {
            return Err("empty posting list".into());
        }
        let mut distinct = 0u32;
        let mut prev: Option<(DocId, FieldId)> = None;
        for p in &self.entries {
            if p.positions.is_empty() {
                return Err(format!("posting for document {} has no positions", p.doc_id));
            }
            if let Some(prev) = prev {
                if (p.doc_id, p.field) <= prev {
                    return Err(format!("postings out of order at document {}", p.doc_id));
                }
            }
            if prev.map(|(d, _)| d) != Some(p.doc_id) {
                distinct += 1;
            }
            prev = Some((p.doc_id, p.field));
        }
        if distinct != self.doc_freq {
            return Err(format!("document frequency {} != {}", self.doc_freq, distinct));
        }
        Ok(())
    }
}

/// Running corpus totals. Averages are derived, never rescanned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusTotals {
    pub document_count: u64,
    pub field_lengths: Vec<u64>,
    pub total_length: u64,
}

impl CorpusTotals {
    fn new(fields: usize) -> Self {
        Self { document_count: 0, field_lengths: vec![0; fields], total_length: 0 }
    }

    fn add(&mut self, doc: &StoredDocument) {
        self.document_count += 1;
        for (total, len) in self.field_lengths.iter_mut().zip(&doc.field_lengths) {
            *total += u64::from(*len);
        }
        self.total_length += doc.total_length;
    }

    fn remove(&mut self, doc: &StoredDocument) {
        self.document_count = self.document_count.saturating_sub(1);
        for (total, len) in self.field_lengths.iter_mut().zip(&doc.field_lengths) {
            *total = total.saturating_sub(u64::from(*len));
        }
        self.total_length = self.total_length.saturating_sub(doc.total_length);
    }

    pub fn average_field_length(&self, field: FieldId) -> Option<f64> {
        if self.document_count == 0 {
            return None;
        }
        let total = self.field_lengths.get(field as usize).copied().unwrap_or(0);
        Some(total as f64 / self.document_count as f64)
    }

    pub fn average_document_length(&self) -> Option<f64> {
        if self.document_count == 0 {
            return None;
        }
        Some(self.total_length as f64 / self.document_count as f64)
    }
}

/// A document tokenised against a schema, ready to be committed.
///
/// Analysis happens outside the index lock so that a failed analysis never
/// leaves the index half-mutated.
#[derive(Debug, Clone)]
pub struct AnalyzedDocument {
    requested_id: Option<DocId>,
    fields: Vec<String>,
    field_lengths: Vec<u32>,
    terms: BTreeMap<String, Vec<Posting>>,
    created_at: OffsetDateTime,
}

impl AnalyzedDocument {
    pub fn analyze(schema: &Schema, tokenizer: &Tokenizer, mut doc: NewDocument) -> Result<Self> {
        if let Some(unknown) = doc.fields.keys().find(|name| schema.field_id(name).is_none()) {
            return Err(Error::validation(format!("unknown field '{unknown}'")));
        }
        let mut fields = Vec::with_capacity(schema.len());
        let mut field_lengths = Vec::with_capacity(schema.len());
        let mut terms: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        for (fid, name) in schema.fields().iter().enumerate() {
            let text = doc.fields.remove(name).unwrap_or_default();
            let mut len = 0u32;
            for token in tokenizer.tokenize(&text, name).iter() {
                len += 1;
                let postings = terms.entry(token.term).or_default();
                match postings.last_mut() {
                    Some(p) if p.field == fid as FieldId => p.positions.push(token.position),
                    _ => postings.push(Posting {
                        doc_id: 0,
                        field: fid as FieldId,
                        positions: vec![token.position],
                    }),
                }
            }
            fields.push(text);
            field_lengths.push(len);
        }
        Ok(Self {
            requested_id: doc.id,
            fields,
            field_lengths,
            terms,
            created_at: doc.created_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }

    pub fn requested_id(&self) -> Option<DocId> {
        self.requested_id
    }

    pub fn total_length(&self) -> u64 {
        self.field_lengths.iter().map(|l| u64::from(*l)).sum()
    }
}

/// `DocId::MAX` is reserved so that the next automatic id always exists.
fn check_id(id: DocId) -> Result<()> {
    if id == DocId::MAX {
        return Err(Error::validation(format!("document id {id} is out of range")));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct InvertedIndex {
    schema: Schema,
    postings: HashMap<String, PostingList>,
    /// Distinct terms of each document, so deletes touch only its lists.
    doc_terms: HashMap<DocId, Vec<String>>,
    docs: BTreeMap<DocId, StoredDocument>,
    totals: CorpusTotals,
    next_doc_id: DocId,
}

impl InvertedIndex {
    pub fn new(schema: Schema) -> Self {
        let totals = CorpusTotals::new(schema.len());
        Self {
            schema,
            postings: HashMap::new(),
            doc_terms: HashMap::new(),
            docs: BTreeMap::new(),
            totals,
            next_doc_id: 1,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn totals(&self) -> &CorpusTotals {
        &self.totals
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.docs.contains_key(&id)
    }

    pub fn document(&self, id: DocId) -> Option<&StoredDocument> {
        self.docs.get(&id)
    }

    /// Documents in ascending id order.
    pub fn documents(&self) -> impl Iterator<Item = &StoredDocument> {
        self.docs.values()
    }

    pub fn next_doc_id(&self) -> DocId {
        self.next_doc_id
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.postings.iter().map(|(t, l)| (t.as_str(), l))
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    /// Postings of `term`, optionally restricted to one field. Unknown
    /// terms yield an empty list.
    pub fn lookup_postings(&self, term: &str, field: Option<FieldId>) -> Vec<Posting> {
        match self.postings.get(term) {
            Some(list) => list
                .entries()
                .iter()
                .filter(|p| field.map_or(true, |f| f == p.field))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.postings.get(term).map_or(0, PostingList::doc_freq)
    }

    pub fn average_field_length(&self, field: FieldId) -> Result<f64> {
        if field as usize >= self.schema.len() {
            return Err(Error::validation(format!("unknown field id {field}")));
        }
        self.totals.average_field_length(field).ok_or(Error::EmptyCorpus)
    }

    /// Resolve the id a staged document would receive.
    fn assign_id(&self, doc: &AnalyzedDocument) -> Result<DocId> {
        let id = doc.requested_id.unwrap_or(self.next_doc_id);
        check_id(id)?;
        if self.docs.contains_key(&id) {
            return Err(Error::DuplicateDocument(id));
        }
        Ok(id)
    }

    pub fn insert(&mut self, doc: AnalyzedDocument) -> Result<DocId> {
        let id = self.assign_id(&doc)?;
        self.commit(id, doc);
        Ok(id)
    }

    /// Insert every document or none of them. Ids are resolved for the
    /// whole batch before anything is committed.
    pub fn insert_batch(&mut self, docs: Vec<AnalyzedDocument>) -> Result<Vec<DocId>> {
        let mut claimed = HashSet::new();
        for doc in &docs {
            if let Some(id) = doc.requested_id {
                check_id(id)?;
                if self.docs.contains_key(&id) || !claimed.insert(id) {
                    return Err(Error::DuplicateDocument(id));
                }
            }
        }
        let mut next = self.next_doc_id;
        let mut ids = Vec::with_capacity(docs.len());
        for doc in &docs {
            let id = match doc.requested_id {
                Some(id) => id,
                None => {
                    while claimed.contains(&next) || self.docs.contains_key(&next) {
                        next += 1;
                    }
                    check_id(next)?;
                    claimed.insert(next);
                    next
                }
            };
            ids.push(id);
        }
        for (id, doc) in ids.iter().zip(docs) {
            self.commit(*id, doc);
        }
        Ok(ids)
    }

    pub fn delete(&mut self, id: DocId) -> Result<StoredDocument> {
        let doc = self.docs.remove(&id).ok_or(Error::NotFound(id))?;
        for term in self.doc_terms.remove(&id).unwrap_or_default() {
            if let Some(list) = self.postings.get_mut(&term) {
                list.remove_doc(id);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        self.totals.remove(&doc);
        Ok(doc)
    }

    /// Replace document `id` with a staged document, keeping the id.
    ///
    /// All fallible checks run before anything is removed, so an error
    /// leaves the previous version in place.
    pub fn replace(&mut self, id: DocId, doc: AnalyzedDocument) -> Result<()> {
        if !self.docs.contains_key(&id) {
            return Err(Error::NotFound(id));
        }
        if let Some(requested) = doc.requested_id {
            if requested != id {
                return Err(Error::validation(format!(
                    "document id {requested} does not match update target {id}"
                )));
            }
        }
        self.delete(id)?;
        self.commit(id, doc);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_terms.clear();
        self.docs.clear();
        self.totals = CorpusTotals::new(self.schema.len());
        self.next_doc_id = 1;
    }

    fn commit(&mut self, id: DocId, doc: AnalyzedDocument) {
        self.doc_terms.insert(id, doc.terms.keys().cloned().collect());
        for (term, mut postings) in doc.terms {
            for p in &mut postings {
                p.doc_id = id;
            }
            self.postings.entry(term).or_default().insert_doc(id, postings);
        }
        let total_length = doc.field_lengths.iter().map(|l| u64::from(*l)).sum();
        let stored = StoredDocument {
            id,
            fields: doc.fields,
            field_lengths: doc.field_lengths,
            total_length,
            created_at: doc.created_at,
        };
        self.totals.add(&stored);
        self.docs.insert(id, stored);
        self.next_doc_id = self.next_doc_id.max(id + 1);
    }

    /// Rebuild an index from persisted records, verifying every invariant.
    pub fn from_parts(
        schema: Schema,
        docs: Vec<StoredDocument>,
        postings: Vec<(String, PostingList)>,
        next_doc_id: DocId,
    ) -> std::result::Result<Self, String> {
        let mut index = Self::new(schema);
        for doc in docs {
            if index.docs.contains_key(&doc.id) {
                return Err(format!("document {} stored twice", doc.id));
            }
            index.totals.add(&doc);
            index.docs.insert(doc.id, doc);
        }
        for (term, list) in postings {
            for doc_id in list.doc_ids(None) {
                index.doc_terms.entry(doc_id).or_default().push(term.clone());
            }
            if index.postings.insert(term.clone(), list).is_some() {
                return Err(format!("term '{term}' stored twice"));
            }
        }
        index.next_doc_id = next_doc_id;
        index.check_invariants()?;
        Ok(index)
    }

    /// Verify the structural invariants of the index.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let width = self.schema.len();
        let mut indexed: HashMap<(DocId, FieldId), u64> = HashMap::new();
        for (term, list) in &self.postings {
            list.check().map_err(|e| format!("term '{term}': {e}"))?;
            for p in list.entries() {
                if !self.docs.contains_key(&p.doc_id) {
                    return Err(format!("term '{term}' references unknown document {}", p.doc_id));
                }
                if p.field as usize >= width {
                    return Err(format!("term '{term}' references unknown field {}", p.field));
                }
                *indexed.entry((p.doc_id, p.field)).or_default() += u64::from(p.term_frequency());
            }
        }
        for doc in self.docs.values() {
            if doc.fields.len() != width || doc.field_lengths.len() != width {
                return Err(format!("document {} does not match the schema", doc.id));
            }
            let sum: u64 = doc.field_lengths.iter().map(|l| u64::from(*l)).sum();
            if sum != doc.total_length {
                return Err(format!("document {} total length {} != {}", doc.id, doc.total_length, sum));
            }
            for (fid, len) in doc.field_lengths.iter().enumerate() {
                let seen = indexed.get(&(doc.id, fid as FieldId)).copied().unwrap_or(0);
                if seen != u64::from(*len) {
                    return Err(format!("document {} field {fid} length {len} != {seen} postings", doc.id));
                }
            }
            if doc.id >= self.next_doc_id {
                return Err(format!("document {} is not below next id {}", doc.id, self.next_doc_id));
            }
        }
        Ok(())
    }
}
