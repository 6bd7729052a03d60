use bm25_core::{analyze, Bm25Params, Error, ErrorKind, Index, NewDocument, SearchOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn pets() -> Index {
    let index = Index::create(["title", "content"]).unwrap();
    index.insert(NewDocument::new().field("title", "cat").field("content", "the cat sat")).unwrap();
    index
        .insert(NewDocument::new().field("title", "dog").field("content", "the cat and the dog sat and sat"))
        .unwrap();
    index
}

fn index_of(contents: &[String]) -> Index {
    let index = Index::create(["title", "content"]).unwrap();
    let docs = contents
        .iter()
        .map(|c| NewDocument::new().field("title", "doc").field("content", c.as_str()))
        .collect();
    index.batch_insert(docs).unwrap();
    index
}

fn rel_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn shorter_content_outranks_diluted_content() {
    let index = pets();
    let rs = index.search("cat", &SearchOptions::default()).unwrap();
    assert_eq!(rs.doc_ids(), vec![1, 2]);
    assert!(rs.results[0].score > rs.results[1].score);
}

#[test]
fn missing_term_gives_empty_result_set() {
    let rs = pets().search("zzz_nonexistent_term", &SearchOptions::default()).unwrap();
    assert!(rs.is_empty());
}

#[test]
fn stats_over_five_scores() {
    let index = Index::create(["content"]).unwrap();
    // Five documents whose scores differ only through term frequency.
    for tf in 1..=5 {
        let text = vec!["word"; tf].join(" ");
        index.insert(NewDocument::new().field("content", text)).unwrap();
    }
    let rs = index.search("word", &SearchOptions::default()).unwrap();
    let stats = analyze(&rs, 10).unwrap();
    assert_eq!(stats.count, 5);
    assert_eq!(stats.max, rs.results[0].score);
    assert_eq!(stats.min, rs.results[4].score);
    assert_eq!(stats.median, rs.results[2].score);
}

#[test]
fn insert_then_delete_restores_statistics_exactly() {
    let index = pets();
    let before = index.read(|i| i.totals().clone());
    let avg_before = index.average_field_length("content").unwrap();
    let id = index
        .insert(NewDocument::new().field("title", "x y z").field("content", "a much longer body of text"))
        .unwrap();
    assert_ne!(index.average_field_length("content").unwrap(), avg_before);
    index.delete(id).unwrap();
    assert_eq!(index.read(|i| i.totals().clone()), before);
    assert_eq!(index.average_field_length("content").unwrap(), avg_before);
}

#[test]
fn errors_are_typed() {
    let index = pets();
    let dup = NewDocument::new().with_id(1).field("title", "again");
    assert_eq!(index.insert(dup).unwrap_err().kind(), ErrorKind::DuplicateDocument);
    assert_eq!(index.delete(99).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(index.search("   ", &SearchOptions::default()).unwrap_err().kind(), ErrorKind::Validation);
    let empty = Index::create(["title"]).unwrap();
    assert!(matches!(empty.search("cat", &SearchOptions::default()), Err(Error::EmptyCorpus)));
    assert!(matches!(empty.average_field_length("title"), Err(Error::EmptyCorpus)));
}

proptest! {
    #[test]
    fn search_is_deterministic(
        contents in prop::collection::vec("(alpha|beta|gamma|delta)( (alpha|beta|gamma|delta)){0,12}", 1..25),
        query in "(alpha|beta|gamma|delta)",
    ) {
        let index = index_of(&contents);
        let opts = SearchOptions::default().with_max_results(100);
        let a = index.search(&query, &opts).unwrap();
        let b = index.search(&query, &opts).unwrap();
        prop_assert_eq!(&a, &b);
        for pair in a.results.windows(2) {
            prop_assert!(pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id));
        }
    }

    #[test]
    fn explain_sums_to_score(
        contents in prop::collection::vec("(alpha|beta|gamma)( (alpha|beta|gamma|pad)){0,15}", 1..20),
        query in "(alpha|beta|gamma)( (alpha|beta|gamma)){0,2}",
        title_weight in 0.0f64..5.0,
    ) {
        let index = index_of(&contents);
        let opts = SearchOptions::default().with_weight("title", title_weight);
        for id in 1..=contents.len() as u64 {
            let e = index.explain(id, &query, &opts).unwrap();
            let score = index.score(id, &query, &opts.field_weights, opts.bm25).unwrap();
            prop_assert!(rel_close(e.contribution_sum(), score));
            prop_assert!(rel_close(e.score, score));
        }
    }

    #[test]
    fn more_occurrences_never_lower_the_score(
        pad in 1usize..10,
        extra in 1usize..5,
        others in prop::collection::vec("(filler|noise)( (filler|noise)){0,10}", 1..10),
    ) {
        // Same length, more occurrences of the query term.
        let base = format!("target {}", vec!["filler"; pad + extra].join(" "));
        let boosted = format!("{} {}", vec!["target"; 1 + extra].join(" "), vec!["filler"; pad].join(" "));
        let mut a = others.clone();
        a.push(base);
        let mut b = others;
        b.push(boosted);
        let id = a.len() as u64;
        let weights = BTreeMap::new();
        let low = index_of(&a).score(id, "target", &weights, Bm25Params::default()).unwrap();
        let high = index_of(&b).score(id, "target", &weights, Bm25Params::default()).unwrap();
        prop_assert!(high >= low, "{} < {}", high, low);
    }

    #[test]
    fn shorter_field_scores_at_least_as_high(
        short_pad in 0usize..5,
        long_extra in 1usize..20,
        b in 0.01f64..=1.0,
    ) {
        let short = format!("target {}", vec!["pad"; short_pad].join(" "));
        let long = format!("target {}", vec!["pad"; short_pad + long_extra].join(" "));
        let index = index_of(&[short, long]);
        let params = Bm25Params { k1: 1.2, b };
        let weights = BTreeMap::new();
        let s = index.score(1, "target", &weights, params).unwrap();
        let l = index.score(2, "target", &weights, params).unwrap();
        prop_assert!(s >= l);
    }
}
