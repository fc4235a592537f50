use std::env;

/// Every tunable the server reads at startup. Constructed once in
/// [`Config::from_env`] and handed to Rocket as managed state; nothing here
/// panics on a missing or malformed value, each field just keeps its default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the read-only article-graph SQLite database.
    pub db_path: String,

    pub room_ttl_secs: u64,
    pub room_cleanup_interval_secs: u64,

    pub max_llm_runs_per_room: usize,
    pub max_concurrent_llm_calls: usize,

    pub wiki_cache_max_entries: usize,
    pub wiki_cache_ttl_secs: u64,
    pub wiki_fetch_timeout_secs: u64,
    pub wiki_fetch_connect_timeout_secs: u64,
    pub wiki_http_max_connections: usize,
    pub resolve_article_cache_ttl_secs: u64,

    pub public_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "wikihop.db".to_string(),
            room_ttl_secs: 21_600,
            room_cleanup_interval_secs: 300,
            max_llm_runs_per_room: 8,
            max_concurrent_llm_calls: 3,
            wiki_cache_max_entries: 256,
            wiki_cache_ttl_secs: 3600,
            wiki_fetch_timeout_secs: 10,
            wiki_fetch_connect_timeout_secs: 5,
            wiki_http_max_connections: 32,
            resolve_article_cache_ttl_secs: 300,
            public_host: None,
        }
    }
}

impl Config {
    /// Build the config from the environment, falling back to documented
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("WIKISPEEDIA_DB_PATH") {
            config.db_path = val;
        }

        if let Ok(val) = env::var("WIKIRACE_ROOM_TTL_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.room_ttl_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_ROOM_CLEANUP_INTERVAL_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.room_cleanup_interval_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_MAX_LLM_RUNS_PER_ROOM")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_llm_runs_per_room = n;
        }
        if let Ok(val) = env::var("WIKIRACE_MAX_CONCURRENT_LLM_CALLS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_concurrent_llm_calls = n;
        }
        if let Ok(val) = env::var("WIKIRACE_WIKI_CACHE_MAX_ENTRIES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.wiki_cache_max_entries = n;
        }
        if let Ok(val) = env::var("WIKIRACE_WIKI_CACHE_TTL_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.wiki_cache_ttl_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_WIKI_FETCH_TIMEOUT_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.wiki_fetch_timeout_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_WIKI_FETCH_CONNECT_TIMEOUT_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.wiki_fetch_connect_timeout_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_WIKI_HTTP_MAX_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.wiki_http_max_connections = n;
        }
        if let Ok(val) = env::var("WIKIRACE_RESOLVE_ARTICLE_CACHE_TTL_SECONDS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.resolve_article_cache_ttl_secs = n;
        }
        if let Ok(val) = env::var("WIKIRACE_PUBLIC_HOST") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                config.public_host = Some(trimmed.to_string());
            }
        }

        config
    }
}
