use crate::tokenizer::normalize;
use regex::{Regex, RegexBuilder};

/// Whole-word alternation over the normalized non-blank terms, longest first.
fn term_pattern(terms: &[String]) -> Option<Regex> {
    let mut words: Vec<String> = terms.iter().map(|t| normalize(t.trim())).filter(|t| !t.is_empty()).collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    words.dedup();
    let alternation = words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
    RegexBuilder::new(&format!(r"\b(?:{alternation})\b")).case_insensitive(true).build().ok()
}

/// Text folded the way the tokenizer folds it, with the original byte
/// offset of every folded byte. `origin` has one extra entry for the end.
struct Folded {
    text: String,
    origin: Vec<usize>,
}

fn fold(text: &str) -> Folded {
    let mut folded = Folded { text: String::with_capacity(text.len()), origin: Vec::with_capacity(text.len() + 1) };
    let mut buf = [0u8; 4];
    for (offset, c) in text.char_indices() {
        let piece = normalize(c.encode_utf8(&mut buf));
        folded.origin.extend(std::iter::repeat(offset).take(piece.len()));
        folded.text.push_str(&piece);
    }
    folded.origin.push(text.len());
    folded
}

/// Byte ranges of `text` whose folded form matches `re`.
fn matches(text: &str, re: &Regex) -> Vec<(usize, usize)> {
    let folded = fold(text);
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for m in re.find_iter(&folded.text) {
        let (start, end) = (folded.origin[m.start()], folded.origin[m.end()]);
        // Matches inside a single expanded character have no original span.
        if start < end && ranges.last().map_or(true, |&(_, prev)| prev <= start) {
            ranges.push((start, end));
        }
    }
    ranges
}

fn mark(text: &str, re: &Regex) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for (start, end) in matches(text, re) {
        out.push_str(&text[last..start]);
        out.push_str("<em>");
        out.push_str(&text[start..end]);
        out.push_str("</em>");
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// Wrap every whole-word occurrence of a term in `<em>`. Matching ignores
/// case and diacritics; the original spelling is kept in the output.
pub fn highlight(text: &str, terms: &[String]) -> String {
    match term_pattern(terms) {
        Some(re) => mark(text, &re),
        None => text.to_string(),
    }
}

/// A window of at most `max_len` characters around the first term match,
/// with `...` marking truncated ends and matches highlighted.
pub fn snippet(text: &str, terms: &[String], max_len: usize) -> String {
    let re = term_pattern(terms);
    let total = text.chars().count();
    let first = re
        .as_ref()
        .and_then(|re| matches(text, re).first().copied())
        .map(|(start, _)| text[..start].chars().count())
        .unwrap_or(0);
    let start = if total <= max_len { 0 } else { first.saturating_sub(max_len / 4).min(total - max_len) };
    let window: String = text.chars().skip(start).take(max_len).collect();
    let mut out = String::with_capacity(window.len() + 6);
    if start > 0 {
        out.push_str("...");
    }
    match &re {
        Some(re) => out.push_str(&mark(&window, re)),
        None => out.push_str(&window),
    }
    if start + max_len < total {
        out.push_str("...");
    }
    out
}
