//! Query parsing.
//!
//! Syntax, all clauses combined with AND:
//!
//! ```text
//! cat                 required term in any field
//! title:cat           required term in the title field only
//! "sat on the mat"    phrase: consecutive positions in one field
//! title:"cat sat"     phrase restricted to one field
//! -dog  -title:dog    exclude documents matching the term or phrase
//! ```
//!
//! A bare word that analyses to several tokens (`full-text`) is matched as a
//! phrase.

use crate::document::StoredDocument;
use crate::error::{Error, Result};
use crate::index::Schema;
use crate::tokenizer::Tokenizer;
use crate::FieldId;
use serde::Serialize;

/// One analysed query term, optionally restricted to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryTerm {
    pub term: String,
    pub field: Option<FieldId>,
}

impl QueryTerm {
    pub fn any_field(term: impl Into<String>) -> Self {
        Self { term: term.into(), field: None }
    }
}

/// A term or phrase to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub terms: Vec<String>,
    /// Position of each term relative to the first, for phrase adjacency.
    pub offsets: Vec<u32>,
    pub field: Option<FieldId>,
}

impl Match {
    pub fn is_phrase(&self) -> bool {
        self.terms.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Require(Match),
    Exclude(Match),
}

/// Predicate evaluated on candidates before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Category field equals the value, ignoring case and surrounding space.
    Category(String),
}

impl Filter {
    pub fn matches(&self, schema: &Schema, doc: &StoredDocument) -> bool {
        match self {
            Filter::Category(want) => schema
                .category_of(doc)
                .is_some_and(|have| have.to_lowercase() == want.trim().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub clauses: Vec<Clause>,
    pub filter: Option<Filter>,
}

struct RawClause {
    text: String,
    field: Option<String>,
    negated: bool,
    quoted: bool,
}

fn lex(input: &str) -> Vec<RawClause> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else { break };
        let negated = first == '-';
        if negated {
            chars.next();
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }
        let (field, rest) = match word.split_once(':') {
            Some((f, r)) if !f.is_empty() => (Some(f.to_string()), r.to_string()),
            _ => (None, word),
        };
        if rest.is_empty() && chars.peek() == Some(&'"') {
            chars.next();
            let mut phrase = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                phrase.push(c);
            }
            out.push(RawClause { text: phrase, field, negated, quoted: true });
        } else if !rest.is_empty() {
            out.push(RawClause { text: rest, field, negated, quoted: false });
        }
    }
    out
}

impl Query {
    pub fn parse(text: &str, schema: &Schema, tokenizer: &Tokenizer) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::validation("query must not be empty"));
        }
        let mut clauses = Vec::new();
        for raw in lex(text) {
            let field = match &raw.field {
                Some(name) => Some(
                    schema
                        .field_id(name)
                        .ok_or_else(|| Error::validation(format!("unknown field '{name}' in query")))?,
                ),
                None => None,
            };
            let field_name = field.map(|f| schema.field_name(f)).unwrap_or("");
            let tokens: Vec<_> = tokenizer.tokenize(&raw.text, field_name).iter().collect();
            let Some(first) = tokens.first() else { continue };
            let base = first.position;
            let m = Match {
                offsets: tokens.iter().map(|t| t.position - base).collect(),
                terms: tokens.into_iter().map(|t| t.term).collect(),
                field,
            };
            tracing::trace!(terms = ?m.terms, quoted = raw.quoted, negated = raw.negated, "query clause");
            clauses.push(if raw.negated { Clause::Exclude(m) } else { Clause::Require(m) });
        }
        if !clauses.iter().any(|c| matches!(c, Clause::Require(_))) {
            return Err(Error::validation(format!("query '{text}' has no searchable terms")));
        }
        Ok(Self { text: text.to_string(), clauses, filter: None })
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn required(&self) -> impl Iterator<Item = &Match> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Require(m) => Some(m),
            Clause::Exclude(_) => None,
        })
    }

    pub fn excluded(&self) -> impl Iterator<Item = &Match> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Exclude(m) => Some(m),
            Clause::Require(_) => None,
        })
    }

    /// Distinct required terms in query order; these are the terms scored.
    pub fn required_terms(&self) -> Vec<QueryTerm> {
        let mut out: Vec<QueryTerm> = Vec::new();
        for m in self.required() {
            for term in &m.terms {
                let qt = QueryTerm { term: term.clone(), field: m.field };
                if !out.contains(&qt) {
                    out.push(qt);
                }
            }
        }
        out
    }

    /// Words of the raw query text, for highlighting.
    pub fn highlight_terms(&self) -> Vec<String> {
        lex(&self.text)
            .into_iter()
            .filter(|raw| !raw.negated)
            .flat_map(|raw| {
                raw.text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(["title", "content", "category"]).unwrap()
    }

    fn parse(text: &str) -> Result<Query> {
        Query::parse(text, &schema(), &Tokenizer::default())
    }

    #[test]
    fn bare_words_are_required_terms() {
        let q = parse("Cat  SAT").unwrap();
        let terms = q.required_terms();
        assert_eq!(terms, vec![QueryTerm::any_field("cat"), QueryTerm::any_field("sat")]);
    }

    #[test]
    fn field_restriction_resolves_ids() {
        let q = parse("title:cat content:\"sat down\"").unwrap();
        let required: Vec<&Match> = q.required().collect();
        assert_eq!(required[0].field, Some(0));
        assert_eq!(required[1].field, Some(1));
        assert!(required[1].is_phrase());
        assert_eq!(required[1].offsets, vec![0, 1]);
    }

    #[test]
    fn exclusions_are_separate() {
        let q = parse("cat -dog -title:\"big bird\"").unwrap();
        assert_eq!(q.required().count(), 1);
        let excluded: Vec<&Match> = q.excluded().collect();
        assert_eq!(excluded.len(), 2);
        assert_eq!(excluded[1].terms, vec!["big", "bird"]);
    }

    #[test]
    fn hyphenated_word_becomes_phrase() {
        let q = parse("full-text").unwrap();
        assert!(q.required().next().unwrap().is_phrase());
    }

    #[test]
    fn empty_and_unsearchable_queries_are_rejected() {
        assert!(matches!(parse(""), Err(Error::Validation(_))));
        assert!(matches!(parse("   \t"), Err(Error::Validation(_))));
        assert!(matches!(parse("!!! ???"), Err(Error::Validation(_))));
        assert!(matches!(parse("-dog"), Err(Error::Validation(_))));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(parse("body:cat"), Err(Error::Validation(_))));
    }

    #[test]
    fn duplicate_terms_are_scored_once() {
        let q = parse("cat cat title:cat").unwrap();
        assert_eq!(q.required_terms().len(), 2);
    }

    #[test]
    fn highlight_terms_skip_exclusions() {
        let q = parse("title:Cat \"sat down\" -dog").unwrap();
        assert_eq!(q.highlight_terms(), vec!["Cat", "sat", "down"]);
    }
}
