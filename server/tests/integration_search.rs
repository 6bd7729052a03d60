use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use bm25_core::corpus::CorpusGenerator;
use bm25_core::{EngineConfig, Index, NewDocument};
use bm25_server::{router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn pets() -> (AppState, TempDir) {
    let dir = tempdir().unwrap();
    let index = Index::with_config(CorpusGenerator::schema().unwrap(), EngineConfig::default()).unwrap();
    index
        .batch_insert(vec![
            NewDocument::new().field("title", "Cat").field("content", "the cat sat").field("category", "animals"),
            NewDocument::new()
                .field("title", "Dog")
                .field("content", "the dog ran after the cat for a very long time")
                .field("category", "animals"),
            NewDocument::new().field("title", "Stocks").field("content", "markets closed higher").field("category", "finance"),
        ])
        .unwrap();
    let state = AppState { index: Arc::new(index), dir: dir.path().to_path_buf(), admin_token: Some(TOKEN.into()) };
    (state, dir)
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    send(state, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri).header("X-ADMIN-TOKEN", TOKEN);
    match body {
        Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (state, _dir) = pets();
    let (status, _) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (state, _dir) = pets();
    let (status, json) = get(&state, "/search?q=cat&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], 1);
    assert_eq!(arr[1]["doc_id"], 2);
    assert_eq!(arr[0]["relevance"], "excellent");
    assert_eq!(arr[0]["title"], "Cat");
}

#[tokio::test]
async fn search_can_attach_snippets_and_breakdowns() {
    let (state, _dir) = pets();
    let (_, json) = get(&state, "/search?q=cat&snippets=true&explain=true").await;
    let first = &json["results"][0];
    assert!(first["snippet"].as_str().unwrap().contains("<em>cat</em>"));
    assert!(!first["breakdown"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn category_and_weights_are_applied() {
    let (state, _dir) = pets();
    let (status, json) = get(&state, "/search?q=the&category=finance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);

    let (status, json) = get(&state, "/search?q=title").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);

    let (status, json) = get(&state, "/search?q=cat&weights=title").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("field=weight"));

    let (status, _) = get(&state, "/search?q=cat&weights=nope=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_index_is_a_conflict() {
    let dir = tempdir().unwrap();
    let index = Index::with_config(CorpusGenerator::schema().unwrap(), EngineConfig::default()).unwrap();
    let state = AppState { index: Arc::new(index), dir: dir.path().to_path_buf(), admin_token: None };
    let (status, json) = get(&state, "/search?q=cat").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn stats_summarise_scores() {
    let (state, _dir) = pets();
    let (status, json) = get(&state, "/stats?q=cat&buckets=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["histogram"].as_array().unwrap().len(), 2);
    assert_eq!(json["categories"][0]["category"], "animals");
}

#[tokio::test]
async fn explain_matches_search_score() {
    let (state, _dir) = pets();
    let (_, search) = get(&state, "/search?q=cat").await;
    let (status, explain) = get(&state, "/explain/1?q=cat").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(explain["score"], search["results"][0]["score"]);
    assert_eq!(explain["matched"], true);
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let (state, _dir) = pets();
    let (status, json) = get(&state, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "document 99 not found");

    let (status, json) = get(&state, "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["fields"]["title"], "Dog");
    assert_eq!(json["field_lengths"]["title"], 1);
}

#[tokio::test]
async fn mutations_require_admin_token() {
    let (state, _dir) = pets();
    let req = Request::delete("/documents/1").body(Body::empty()).unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.index.len(), 3);
}

#[tokio::test]
async fn documents_can_be_added_updated_and_deleted() {
    let (state, _dir) = pets();
    let docs = json!([{ "fields": { "title": "Bird", "content": "a bird sang", "category": "animals" } }]);
    let (status, json) = send(&state, admin("POST", "/documents", Some(docs))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["ids"], json!([4]));

    let (_, json) = get(&state, "/search?q=bird").await;
    assert_eq!(json["results"][0]["doc_id"], 4);

    let update = json!({ "fields": { "title": "Parrot", "content": "a parrot talked" } });
    let (status, _) = send(&state, admin("PUT", "/documents/4", Some(update))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = get(&state, "/search?q=bird").await;
    assert_eq!(json["total_hits"], 0);

    let (status, _) = send(&state, admin("DELETE", "/documents/4", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, admin("DELETE", "/documents/4", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_ids_conflict() {
    let (state, _dir) = pets();
    let docs = json!([{ "id": 1, "fields": { "title": "Again" } }]);
    let (status, _) = send(&state, admin("POST", "/documents", Some(docs))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn commit_persists_snapshot() {
    let (state, dir) = pets();
    let (status, meta) = send(&state, admin("POST", "/index/commit", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["num_docs"], 3);

    let reopened = Index::open(dir.path(), EngineConfig::default()).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.document(3).unwrap().fields[0], "Stocks");
}
