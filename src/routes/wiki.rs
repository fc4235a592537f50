//! The outbound HTML proxy route (SPEC_FULL.md §4.7).

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use rocket::http::{ContentType, Header};
use rocket::response::{self, Responder, Response};
use rocket::{get, Request, State};

use crate::config::Config;
use crate::wiki_cache::WikiCache;

pub struct WikiHtmlResponse {
    html: String,
    cache_status: &'static str,
    max_age_secs: u64,
}

impl<'r> Responder<'r, 'static> for WikiHtmlResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::HTML)
            .header(Header::new("X-Wiki-Proxy-Cache", self.cache_status))
            .header(Header::new("Cache-Control", format!("public, max-age={}", self.max_age_secs)))
            .sized_body(self.html.len(), Cursor::new(self.html))
            .ok()
    }
}

#[get("/wiki/<title..>")]
pub async fn wiki_page(cache: &State<Arc<WikiCache>>, config: &State<Config>, title: PathBuf) -> WikiHtmlResponse {
    let title = title.to_string_lossy().replace('_', " ");
    let page = cache.get(&title).await;
    WikiHtmlResponse { html: page.html, cache_status: page.cache_status, max_age_secs: config.wiki_cache_ttl_secs }
}
