use std::sync::Mutex;

use lru::LruCache;
use rusqlite::Connection;

/// Read-only view over the article graph: title lookup, link adjacency, and
/// title resolution/canonicalization. Implemented once against SQLite, but
/// kept behind a trait so the room/validator/executor modules never touch
/// `rusqlite` directly.
pub trait ArticleGraph: Send + Sync {
    /// Resolve user/LLM-supplied text to the stored title it names, if any.
    /// Tries an exact match first, then a case-insensitive one.
    fn resolve_title(&self, article_title: &str) -> Option<String>;

    /// Resolve to a stable canonical title by chasing single-link redirect
    /// stubs a bounded number of hops.
    fn canonical_title(&self, article_title: &str) -> Option<String>;

    /// Title plus outbound links for an exact stored title. Returns `None`
    /// if the title doesn't exist verbatim (callers resolve first).
    fn article_with_links(&self, article_title: &str) -> Option<(String, Vec<String>)>;

    fn all_titles(&self) -> Vec<String>;

    fn article_count(&self) -> i64;
}

const MAX_CANONICAL_HOPS: usize = 6;

struct ResolveCaches {
    resolve: LruCache<String, Option<String>>,
    canonical: LruCache<String, Option<String>>,
    article: LruCache<String, Option<(String, Vec<String>)>>,
}

pub struct SqliteArticleGraph {
    conn: Mutex<Connection>,
    caches: Mutex<ResolveCaches>,
    article_count: i64,
}

impl SqliteArticleGraph {
    pub fn open(path: &str) -> Self {
        let conn = Connection::open(path).expect("failed to open article graph database");
        let article_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM core_articles", [], |row| row.get(0))
            .expect("core_articles table missing or unreadable");
        tracing::info!(article_count, db_path = path, "connected to article graph database");

        SqliteArticleGraph {
            conn: Mutex::new(conn),
            caches: Mutex::new(ResolveCaches {
                resolve: LruCache::new(std::num::NonZeroUsize::new(32_768).unwrap()),
                canonical: LruCache::new(std::num::NonZeroUsize::new(16_384).unwrap()),
                article: LruCache::new(std::num::NonZeroUsize::new(8_192).unwrap()),
            }),
            article_count,
        }
    }

    fn resolve_title_normalized(&self, title: &str) -> Option<String> {
        if let Some(hit) = self.caches.lock().unwrap_or_else(|e| e.into_inner()).resolve.get(title) {
            return hit.clone();
        }

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let exact: Option<String> = conn
            .query_row("SELECT title FROM core_articles WHERE title = ? LIMIT 1", [title], |row| row.get(0))
            .ok();

        let found = if exact.is_some() {
            exact
        } else {
            conn.query_row(
                "SELECT title FROM core_articles WHERE title = ? COLLATE NOCASE LIMIT 1",
                [title],
                |row| row.get(0),
            )
            .ok()
        };

        drop(conn);
        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resolve
            .put(title.to_string(), found.clone());
        found
    }

    fn article_with_links_uncached(&self, title: &str) -> Option<(String, Vec<String>)> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT title, links_json FROM core_articles WHERE title = ?",
                [title],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        row.and_then(|(title, links_json)| {
            serde_json::from_str::<Vec<String>>(&links_json).ok().map(|links| (title, links))
        })
    }
}

impl ArticleGraph for SqliteArticleGraph {
    fn resolve_title(&self, article_title: &str) -> Option<String> {
        if article_title.is_empty() {
            return None;
        }
        let title = article_title.replace('_', " ");
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        self.resolve_title_normalized(title)
    }

    fn canonical_title(&self, article_title: &str) -> Option<String> {
        if let Some(hit) = self.caches.lock().unwrap_or_else(|e| e.into_inner()).canonical.get(article_title) {
            return hit.clone();
        }

        let result = (|| {
            let resolved = self.resolve_title(article_title)?;

            let mut current = resolved;
            let mut seen = std::collections::HashSet::new();
            seen.insert(current.clone());

            for _ in 0..MAX_CANONICAL_HOPS {
                let Some((_, links)) = self.article_with_links(&current) else { break };
                if links.len() != 1 {
                    break;
                }

                let Some(candidate) = self.resolve_title(&links[0]) else { break };
                if seen.contains(&candidate) {
                    break;
                }
                seen.insert(candidate.clone());
                current = candidate;
            }

            Some(current)
        })();

        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .canonical
            .put(article_title.to_string(), result.clone());
        result
    }

    fn article_with_links(&self, article_title: &str) -> Option<(String, Vec<String>)> {
        if let Some(hit) = self.caches.lock().unwrap_or_else(|e| e.into_inner()).article.get(article_title) {
            return hit.clone();
        }

        let result = self.article_with_links_uncached(article_title);
        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .article
            .put(article_title.to_string(), result.clone());
        result
    }

    fn all_titles(&self) -> Vec<String> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare("SELECT title FROM core_articles").expect("prepare failed");
        stmt.query_map([], |row| row.get(0))
            .expect("query failed")
            .filter_map(Result::ok)
            .collect()
    }

    fn article_count(&self) -> i64 {
        self.article_count
    }
}
