//! Test fixtures shared between in-crate unit tests and the `tests/integration`
//! binary: an in-memory article graph and a scripted LLM gateway. Not behind
//! `#[cfg(test)]` because the integration test binary links this crate as an
//! ordinary dependency and needs these types at normal visibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::ApiResult;
use crate::graph::ArticleGraph;
use crate::llm::{LlmCallParams, LlmGateway};
use crate::models::LlmUsage;

const MAX_CANONICAL_HOPS: usize = 6;

/// An in-memory stand-in for [`crate::graph::SqliteArticleGraph`]: a fixed
/// adjacency map, same resolve/canonical semantics, no database.
pub struct FakeGraph {
    pub articles: HashMap<String, Vec<String>>,
}

impl FakeGraph {
    pub fn new(articles: HashMap<String, Vec<String>>) -> Self {
        FakeGraph { articles }
    }
}

impl ArticleGraph for FakeGraph {
    fn resolve_title(&self, article_title: &str) -> Option<String> {
        let title = article_title.replace('_', " ");
        let title = title.trim();
        if let Some(k) = self.articles.keys().find(|k| k.as_str() == title) {
            return Some(k.clone());
        }
        self.articles.keys().find(|k| k.eq_ignore_ascii_case(title)).cloned()
    }

    fn canonical_title(&self, article_title: &str) -> Option<String> {
        let mut current = self.resolve_title(article_title)?;
        let mut seen = std::collections::HashSet::new();
        seen.insert(current.clone());
        for _ in 0..MAX_CANONICAL_HOPS {
            let links = self.articles.get(&current)?;
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
    }

    fn article_with_links(&self, article_title: &str) -> Option<(String, Vec<String>)> {
        self.articles.get(article_title).map(|links| (article_title.to_string(), links.clone()))
    }

    fn all_titles(&self) -> Vec<String> {
        self.articles.keys().cloned().collect()
    }

    fn article_count(&self) -> i64 {
        self.articles.len() as i64
    }
}

/// An LLM gateway that returns a fixed queue of raw response texts, one per
/// call, repeating the last entry once the queue is drained. Used to drive
/// the executor/protocol through scripted win/lose/malformed-answer paths
/// without a network call.
pub struct ScriptedLlmGateway {
    responses: Vec<String>,
    calls: AtomicUsize,
    /// When set, every call waits on this before returning — lets a test
    /// pause an in-flight executor iteration to exercise restart/cancel
    /// races.
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedLlmGateway {
    pub fn new(responses: Vec<&str>) -> Self {
        ScriptedLlmGateway {
            responses: responses.into_iter().map(str::to_string).collect(),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Always answer with the same numeric choice, e.g. `always_choose(1)`.
    pub fn always_choose(index: i64) -> Self {
        ScriptedLlmGateway::new(vec![]).with_answer(index)
    }

    fn with_answer(mut self, index: i64) -> Self {
        self.responses = vec![format!("<answer>{index}</answer>")];
        self
    }

    /// Block every call on `notify` (awaiting it) before returning a result.
    /// The test drives `notify.notify_one()` to release the blocked call.
    pub fn gated(mut self, notify: Arc<Notify>) -> Self {
        self.gate = Mutex::new(Some(notify));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlmGateway {
    async fn call(&self, _params: LlmCallParams) -> ApiResult<(String, Option<LlmUsage>)> {
        let gate = self.gate.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }

        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .responses
            .get(call_index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        Ok((text, None))
    }
}
