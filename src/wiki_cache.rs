//! The outbound HTML proxy cache (SPEC_FULL.md §4.7): fetch a Simple
//! Wikipedia page, rewrite it for same-origin iframe embedding, and serve it
//! from a bounded LRU+TTL cache with in-flight coalescing. A fetch failure
//! falls back to an offline page built straight from the article graph.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use regex::Regex;
use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::graph::ArticleGraph;

const SIMPLEWIKI_ORIGIN: &str = "https://simple.wikipedia.org";

pub struct WikiPage {
    pub html: String,
    pub cache_status: &'static str,
}

pub struct WikiCache {
    client: reqwest::Client,
    graph: Arc<dyn ArticleGraph>,
    ttl: Duration,
    pub cache_ttl_secs: u64,
    entries: Mutex<LruCache<String, (Instant, String)>>,
    inflight: Mutex<HashMap<String, broadcast::Sender<Arc<Result<String, String>>>>>,
}

impl WikiCache {
    pub fn new(graph: Arc<dyn ArticleGraph>, config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.wiki_fetch_timeout_secs))
            .connect_timeout(Duration::from_secs(config.wiki_fetch_connect_timeout_secs))
            .user_agent("wikiracing-llms")
            .build()
            .expect("failed to build wiki HTTP client");

        WikiCache {
            client,
            graph,
            ttl: Duration::from_secs(config.wiki_cache_ttl_secs),
            cache_ttl_secs: config.wiki_cache_ttl_secs,
            entries: Mutex::new(LruCache::new(NonZeroUsize::new(config.wiki_cache_max_entries.max(1)).unwrap())),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, article_title: &str) -> WikiPage {
        let resolved = self.graph.resolve_title(article_title);
        let safe_title = normalize_title(resolved.as_deref().unwrap_or(article_title));
        let cache_key = resolved.clone().unwrap_or_else(|| safe_title.clone());

        if let Some(html) = self.cache_get(&cache_key).await {
            return WikiPage { html, cache_status: "HIT" };
        }

        let remote_url = format!("{SIMPLEWIKI_ORIGIN}/wiki/{}", url_encode_path_segment(&safe_title));
        match self.fetch_coalesced(&cache_key, &remote_url).await {
            Ok(html) => {
                self.cache_set(cache_key, html.clone()).await;
                WikiPage { html, cache_status: "MISS" }
            }
            Err(error) => {
                let resolved_for_fallback =
                    resolved.unwrap_or_else(|| article_title.replace('_', " ").trim().to_string());
                let (title, links) = self
                    .graph
                    .article_with_links(&resolved_for_fallback)
                    .unwrap_or((resolved_for_fallback.clone(), Vec::new()));
                let fallback = inject_wiki_bridge(&offline_page(&title, &links, Some(&error)));
                WikiPage { html: fallback, cache_status: "OFFLINE" }
            }
        }
    }

    async fn cache_get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        if let Some((expires_at, html)) = entries.get(key) {
            if *expires_at > Instant::now() {
                return Some(html.clone());
            }
        }
        entries.pop(key);
        None
    }

    async fn cache_set(&self, key: String, html: String) {
        let mut entries = self.entries.lock().await;
        entries.put(key, (Instant::now() + self.ttl, html));
    }

    /// Coalesce concurrent fetches for the same key onto one upstream
    /// request: the first caller in becomes the "leader" and fetches; every
    /// other caller subscribes to the leader's result instead of re-fetching.
    async fn fetch_coalesced(&self, cache_key: &str, remote_url: &str) -> Result<String, String> {
        let mut inflight = self.inflight.lock().await;
        if let Some(tx) = inflight.get(cache_key) {
            let mut rx = tx.subscribe();
            drop(inflight);
            return match rx.recv().await {
                Ok(result) => (*result).clone(),
                Err(_) => Err("coalesced wiki fetch was dropped".to_string()),
            };
        }

        let (tx, _rx) = broadcast::channel(1);
        inflight.insert(cache_key.to_string(), tx.clone());
        drop(inflight);

        let result = self.fetch_and_rewrite(remote_url).await;

        self.inflight.lock().await.remove(cache_key);
        let _ = tx.send(Arc::new(result.clone()));
        result
    }

    async fn fetch_and_rewrite(&self, remote_url: &str) -> Result<String, String> {
        let response = self.client.get(remote_url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("Failed to fetch wiki page ({})", response.status()));
        }
        let html = response.text().await.map_err(|e| e.to_string())?;
        Ok(rewrite_html(&html))
    }
}

fn normalize_title(title: &str) -> String {
    title.replace(' ', "_").trim().to_string()
}

fn url_encode_path_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.as_bytes() {
        match *byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(*byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn strip_script_tags(html: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script>").expect("static regex is valid"));
    re.replace_all(html, "").into_owned()
}

fn inject_base_href(html: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)<head[^>]*>").expect("static regex is valid"));
    let base_tag = format!("<base href=\"{SIMPLEWIKI_ORIGIN}/\" />");
    match re.find(html) {
        Some(m) => format!("{}{base_tag}{}", &html[..m.end()], &html[m.end()..]),
        None => format!("{base_tag}{html}"),
    }
}

/// The bridge script's contract (SPEC_FULL.md §4.7): tell the parent window
/// the iframe's current article title and visible outbound links, and ask
/// before following a link rather than letting the iframe navigate on its
/// own.
const WIKI_BRIDGE_SCRIPT: &str = r#"
<script>
(function () {
  function articleTitleFromPath(pathname) {
    var match = /\/wiki\/(.+)$/.exec(pathname);
    return match ? decodeURIComponent(match[1]).replace(/_/g, " ") : null;
  }

  function visibleLinks() {
    var anchors = document.querySelectorAll("a[href^='/wiki/']");
    var seen = Object.create(null);
    var links = [];
    for (var i = 0; i < anchors.length; i++) {
      var title = articleTitleFromPath(anchors[i].getAttribute("href"));
      if (!title || seen[title]) continue;
      seen[title] = true;
      links.push(title);
    }
    return links;
  }

  function reportPage() {
    window.parent.postMessage(
      { type: "wikirace:page", title: articleTitleFromPath(location.pathname), links: visibleLinks() },
      "*"
    );
  }

  document.addEventListener(
    "click",
    function (event) {
      var anchor = event.target.closest && event.target.closest("a[href^='/wiki/']");
      if (!anchor) return;
      var title = articleTitleFromPath(anchor.getAttribute("href"));
      if (!title) return;
      event.preventDefault();
      window.parent.postMessage({ type: "wikirace:navigate", title: title }, "*");
    },
    true
  );

  if (document.readyState === "complete") {
    reportPage();
  } else {
    window.addEventListener("load", reportPage);
  }
})();
</script>
"#;

fn inject_wiki_bridge(html: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("static regex is valid"));
    match re.find(html) {
        Some(m) => format!("{}{WIKI_BRIDGE_SCRIPT}{}", &html[..m.start()], &html[m.start()..]),
        None => format!("{html}{WIKI_BRIDGE_SCRIPT}"),
    }
}

fn rewrite_html(html: &str) -> String {
    let html = strip_script_tags(html);
    let html = inject_base_href(&html);
    inject_wiki_bridge(&html)
}

fn escape_html(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#039;")
}

fn offline_page(title: &str, links: &[String], error: Option<&str>) -> String {
    const MAX_LINKS: usize = 400;
    let items: String = links
        .iter()
        .take(MAX_LINKS)
        .map(|link| {
            let safe_title = url_encode_path_segment(&link.replace(' ', "_"));
            format!("<li><a href=\"/wiki/{safe_title}\">{}</a></li>", escape_html(link))
        })
        .collect();

    let error_html =
        error.map(|e| format!("<div class='error'>Fetch error: {}</div>", escape_html(e))).unwrap_or_default();
    let title_escaped = escape_html(title);
    let shown = links.len().min(MAX_LINKS);

    format!(
        "<!doctype html>\n\
         <html>\n\
         <head>\n\
         <meta charset='utf-8' />\n\
         <meta name='viewport' content='width=device-width, initial-scale=1' />\n\
         <title>{title_escaped}</title>\n\
         <style>\n\
         body {{ font-family: system-ui, -apple-system, Segoe UI, Roboto, sans-serif; padding: 16px; line-height: 1.4; }}\n\
         h1 {{ font-size: 22px; margin: 0 0 8px; }}\n\
         .note {{ font-size: 12px; color: #555; margin-bottom: 12px; }}\n\
         .error {{ font-size: 12px; color: #7f1d1d; background: #fef2f2; border: 1px solid #fecaca; padding: 8px; border-radius: 6px; margin-bottom: 12px; }}\n\
         ul {{ padding-left: 18px; }}\n\
         li {{ margin: 4px 0; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <h1>{title_escaped}</h1>\n\
         <div class='note'>Offline wiki view (rendered from the article graph). Some content may be missing.</div>\n\
         {error_html}\n\
         <div class='note'>Links ({shown} shown):</div>\n\
         <ul>\n{items}\n</ul>\n\
         </body>\n\
         </html>"
    )
}
