use lazy_static::lazy_static;
use regex::{Matches, Regex};
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Optional analysis strategies layered on top of the baseline normaliser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Reduce words to their Snowball English stem.
    pub stemming: bool,
    /// Drop common English function words.
    pub stopwords: bool,
    /// Fields indexed as one token holding the whole normalised value.
    pub keyword_fields: Vec<String>,
}

/// A normalised term and its position among the raw words of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Lowercase and strip diacritics (NFKD, then drop combining marks).
pub fn normalize(text: &str) -> String {
    text.nfkd()
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Analyse `text` as it would be indexed under `field_name`.
    ///
    /// The returned stream owns the normalised text; every call to
    /// [`TokenStream::iter`] restarts tokenisation from the beginning.
    pub fn tokenize(&self, text: &str, field_name: &str) -> TokenStream {
        let normalized = normalize(text);
        if self.config.keyword_fields.iter().any(|f| f == field_name) {
            let joined = RE
                .find_iter(&normalized)
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            return TokenStream {
                buffer: joined,
                keyword: true,
                stopwords: false,
                stemming: false,
            };
        }
        TokenStream {
            buffer: normalized,
            keyword: false,
            stopwords: self.config.stopwords,
            stemming: self.config.stemming,
        }
    }

    /// Collect the terms of `text` without positions.
    pub fn terms(&self, text: &str, field_name: &str) -> Vec<String> {
        self.tokenize(text, field_name).iter().map(|t| t.term).collect()
    }
}

/// Normalised text of one field, ready to be tokenised lazily.
#[derive(Debug, Clone)]
pub struct TokenStream {
    buffer: String,
    keyword: bool,
    stopwords: bool,
    stemming: bool,
}

impl TokenStream {
    pub fn iter(&self) -> Tokens<'_> {
        let inner = if self.keyword {
            Inner::Keyword { done: false }
        } else {
            Inner::Words(RE.find_iter(&self.buffer))
        };
        Tokens { stream: self, inner, position: 0 }
    }

    /// The normalised text backing this stream.
    pub fn normalized(&self) -> &str {
        &self.buffer
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = Token;
    type IntoIter = Tokens<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum Inner<'a> {
    Keyword { done: bool },
    Words(Matches<'static, 'a>),
}

pub struct Tokens<'a> {
    stream: &'a TokenStream,
    inner: Inner<'a>,
    position: u32,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match &mut self.inner {
            Inner::Keyword { done } => {
                if *done || self.stream.buffer.is_empty() {
                    return None;
                }
                *done = true;
                Some(Token { term: self.stream.buffer.clone(), position: 0 })
            }
            Inner::Words(matches) => {
                for mat in matches.by_ref() {
                    let position = self.position;
                    self.position += 1;
                    let word = mat.as_str();
                    if self.stream.stopwords && STOPWORDS.contains(word) {
                        continue;
                    }
                    let term = if self.stream.stemming {
                        STEMMER.stem(word).into_owned()
                    } else {
                        word.to_string()
                    };
                    return Some(Token { term, position });
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokenizer: &Tokenizer, text: &str) -> Vec<String> {
        tokenizer.terms(text, "content")
    }

    #[test]
    fn baseline_lowercases_and_splits() {
        let t = Tokenizer::default();
        assert_eq!(words(&t, "Hello, World! full-text"), vec!["hello", "world", "full", "text"]);
    }

    #[test]
    fn strips_diacritics() {
        let t = Tokenizer::default();
        assert_eq!(words(&t, "Café Müller naïve"), vec!["cafe", "muller", "naive"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let t = Tokenizer::default();
        assert!(words(&t, "").is_empty());
        assert!(words(&t, "  ...  ").is_empty());
    }

    #[test]
    fn stream_is_restartable() {
        let t = Tokenizer::default();
        let stream = t.tokenize("one two three", "content");
        let first: Vec<Token> = stream.iter().collect();
        let second: Vec<Token> = stream.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first[2], Token { term: "three".into(), position: 2 });
    }

    #[test]
    fn stopword_positions_are_preserved() {
        let t = Tokenizer::new(TokenizerConfig { stopwords: true, ..Default::default() });
        let toks: Vec<Token> = t.tokenize("the cat and the dog", "content").iter().collect();
        assert_eq!(
            toks,
            vec![
                Token { term: "cat".into(), position: 1 },
                Token { term: "dog".into(), position: 4 },
            ]
        );
    }

    #[test]
    fn stemming_is_optional() {
        let plain = Tokenizer::default();
        assert!(words(&plain, "Running").contains(&"running".to_string()));
        let stemmed = Tokenizer::new(TokenizerConfig { stemming: true, ..Default::default() });
        assert!(words(&stemmed, "Running").contains(&"run".to_string()));
    }

    #[test]
    fn keyword_fields_produce_single_token() {
        let t = Tokenizer::new(TokenizerConfig {
            keyword_fields: vec!["category".into()],
            ..Default::default()
        });
        assert_eq!(t.terms("Machine  Learning", "category"), vec!["machine learning"]);
        assert_eq!(t.terms("Machine  Learning", "title"), vec!["machine", "learning"]);
        assert!(t.terms("  ", "category").is_empty());
    }
}
