//! Article-graph read endpoints and process health (SPEC_FULL.md §6).

use std::path::PathBuf;
use std::sync::Arc;

use rocket::http::Header;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{get, Request, State};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::graph::ArticleGraph;
use crate::models::{ArticleResponse, CanonicalTitleResponse, HealthResponse, ResolveTitleResponse};

/// Rocket's `<title..>` segments arrive percent-decoded per segment; titles
/// use underscores in place of spaces on the wire, matching Wikipedia's own
/// URL convention.
fn decode_title(segments: PathBuf) -> String {
    segments.to_string_lossy().replace('_', " ")
}

/// Wraps any JSON responder with a `Cache-Control: public, max-age=<ttl>`
/// header, used for the article lookups that are safe to cache client-side.
pub struct CacheControl<R> {
    inner: R,
    max_age_secs: u64,
}

impl<R> CacheControl<R> {
    pub fn new(inner: R, max_age_secs: u64) -> Self {
        CacheControl { inner, max_age_secs }
    }
}

impl<'r, 'o: 'r, R: Responder<'r, 'o>> Responder<'r, 'o> for CacheControl<R> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        Response::build_from(self.inner.respond_to(req)?)
            .header(Header::new("Cache-Control", format!("public, max-age={}", self.max_age_secs)))
            .ok()
    }
}

#[get("/health")]
pub fn health(graph: &State<Arc<dyn ArticleGraph>>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".to_string(), article_count: graph.article_count() })
}

#[get("/get_all_articles")]
pub fn get_all_articles(graph: &State<Arc<dyn ArticleGraph>>) -> Json<Vec<String>> {
    Json(graph.all_titles())
}

#[get("/get_article_with_links/<title..>")]
pub fn get_article_with_links(graph: &State<Arc<dyn ArticleGraph>>, title: PathBuf) -> ApiResult<Json<ArticleResponse>> {
    let title = decode_title(title);
    let resolved = graph.resolve_title(&title).ok_or_else(|| ApiError::NotFound(format!("Article not found: {title}")))?;
    let (title, links) =
        graph.article_with_links(&resolved).ok_or_else(|| ApiError::NotFound(format!("Article not found: {title}")))?;
    Ok(Json(ArticleResponse { title, links }))
}

#[get("/resolve_article/<title..>")]
pub fn resolve_article(
    graph: &State<Arc<dyn ArticleGraph>>,
    config: &State<Config>,
    title: PathBuf,
) -> CacheControl<Json<ResolveTitleResponse>> {
    let title = decode_title(title);
    let resolved = graph.resolve_title(&title);
    let body = ResolveTitleResponse { exists: resolved.is_some(), title: resolved };
    CacheControl::new(Json(body), config.resolve_article_cache_ttl_secs)
}

#[get("/canonical_title/<title..>")]
pub fn canonical_title(graph: &State<Arc<dyn ArticleGraph>>, title: PathBuf) -> Json<CanonicalTitleResponse> {
    let title = decode_title(title);
    let resolved = graph.canonical_title(&title).unwrap_or(title);
    Json(CanonicalTitleResponse { title: resolved })
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "detail": "Not found" }))
}
