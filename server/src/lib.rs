use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use bm25_core::corpus::CorpusGenerator;
use bm25_core::persist::MetaFile;
use bm25_core::scorer::TermFieldScore;
use bm25_core::{DocId, EngineConfig, Explanation, Index, NewDocument, Relevance, SearchOptions, Statistics};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod error;

pub use error::ApiError;

/// Query-string parameters shared by `/search`, `/stats` and `/explain`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    pub category: Option<String>,
    /// Comma-separated `field=weight` pairs.
    pub weights: Option<String>,
    pub k1: Option<f64>,
    pub b: Option<f64>,
    #[serde(default)]
    pub explain: bool,
    #[serde(default)]
    pub snippets: bool,
    pub buckets: Option<usize>,
}

impl SearchParams {
    fn options(&self, index: &Index) -> Result<SearchOptions, ApiError> {
        let mut opts = index.default_options().with_explain(self.explain);
        if let Some(k) = self.k {
            opts.max_results = k;
        }
        for pair in self.weights.iter().flat_map(|w| w.split(',')).filter(|p| !p.trim().is_empty()) {
            let (field, weight) = pair
                .split_once('=')
                .ok_or_else(|| ApiError::BadRequest(format!("expected field=weight, got '{pair}'")))?;
            let weight: f64 = weight
                .trim()
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid weight '{weight}'")))?;
            opts.field_weights.insert(field.trim().to_string(), weight);
        }
        opts.category_filter = self.category.clone();
        if let Some(k1) = self.k1 {
            opts.bm25.k1 = k1;
        }
        if let Some(b) = self.b {
            opts.bm25.b = b;
        }
        Ok(opts)
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub relevance: Relevance,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<TermFieldScore>>,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub fields: BTreeMap<String, String>,
    pub field_lengths: BTreeMap<String, u32>,
    pub total_length: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<Index>,
    pub dir: PathBuf,
    pub admin_token: Option<String>,
}

/// Open (or create) the index under `index_dir` and build the router.
pub fn build_app(index_dir: impl Into<PathBuf>, config: EngineConfig) -> Result<Router> {
    let dir = index_dir.into();
    let index = Index::open_or_create(&dir, CorpusGenerator::schema()?, config)?;
    tracing::info!(dir = %dir.display(), docs = index.len(), "loaded index");
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { index: Arc::new(index), dir, admin_token }))
}

fn cors() -> CorsLayer {
    // CORS_ALLOW_ORIGIN is a comma-separated list; unset or unparsable means Any.
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/explain/:doc_id", get(explain_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/documents", post(add_documents))
        .route("/documents/:doc_id", put(update_document).delete(delete_document))
        .route("/index/commit", post(index_commit))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}

/// Run engine work off the async executor; index locks are blocking.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Index) -> bm25_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let index = Arc::clone(&state.index);
    tokio::task::spawn_blocking(move || f(&index))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let opts = params.options(&state.index)?;
    let SearchParams { q, snippets, .. } = params;
    let query_text = q.clone();
    let (total_hits, results) = blocking(&state, move |index| {
        let page = index.search_page(&q, &opts)?;
        let title = index.schema().field_id("title").unwrap_or(0);
        let best = page.results.best_score().unwrap_or(0.0);
        let hits: Vec<SearchHit> = page
            .hits()
            .map(|(r, doc)| SearchHit {
                doc_id: r.doc_id,
                score: r.score,
                relevance: Relevance::classify(r.score, best),
                title: doc.field_text(title).to_string(),
                category: r.category.clone(),
                snippet: snippets.then(|| page.snippet(doc)),
                breakdown: r.breakdown.clone(),
            })
            .collect();
        Ok((page.results.total_hits, hits))
    })
    .await?;
    Ok(Json(SearchResponse { query: query_text, took_s: start.elapsed().as_secs_f64(), total_hits, results }))
}

pub async fn stats_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Statistics>, ApiError> {
    let mut opts = params.options(&state.index)?;
    if params.k.is_none() {
        opts.max_results = 100;
    }
    let buckets = params.buckets.unwrap_or(state.index.config().histogram_buckets);
    let stats = blocking(&state, move |index| {
        let rs = index.search(&params.q, &opts)?;
        index.stats(&rs, buckets)
    })
    .await?;
    Ok(Json(stats))
}

pub async fn explain_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Explanation>, ApiError> {
    let opts = params.options(&state.index)?;
    let explanation = blocking(&state, move |index| index.explain(doc_id, &params.q, &opts)).await?;
    Ok(Json(explanation))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocResponse>, ApiError> {
    let doc = state.index.document(doc_id)?;
    let schema = state.index.schema();
    let names = schema.fields();
    Ok(Json(DocResponse {
        doc_id,
        fields: names.iter().cloned().zip(doc.fields.iter().cloned()).collect(),
        field_lengths: names.iter().cloned().zip(doc.field_lengths.iter().copied()).collect(),
        total_length: doc.total_length,
        created_at: doc.created_at,
    }))
}

// --- Admin endpoints ---

async fn add_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(docs): Json<Vec<NewDocument>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&state, &headers)?;
    let ids = blocking(&state, move |index| index.batch_insert(docs)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ids": ids }))))
}

async fn update_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
    Json(doc): Json<NewDocument>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    blocking(&state, move |index| index.update(doc_id, doc)).await?;
    Ok(Json(json!({ "doc_id": doc_id })))
}

async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    blocking(&state, move |index| index.delete(doc_id)).await?;
    Ok(Json(json!({ "deleted": doc_id })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MetaFile>, ApiError> {
    authorize(&state, &headers)?;
    let dir = state.dir.clone();
    let meta = blocking(&state, move |index| index.save(&dir)).await?;
    Ok(Json(meta))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}
