//! The background LLM run executor (SPEC_FULL.md §4.5): one `tokio::spawn`
//! per running LLM run, looping snapshot -> decide -> commit until the run
//! terminates, gets cancelled, or its snapshot goes stale.

use std::sync::Arc;

use crate::error::ApiError;
use crate::graph::ArticleGraph;
use crate::llm::protocol::{self, ChooseLinkRequest};
use crate::llm::LlmGateway;
use crate::models::{ProviderHints, Step};

use super::{CommitOutcome, RoomRegistry};

/// Everything [`compute_step`] needs to decide the next move, already
/// resolved from room/run state by the caller under the room lock.
pub struct StepInput {
    pub current_article: String,
    pub destination_article: String,
    pub next_hops: i64,
    pub max_steps: i64,
    pub max_links: Option<i64>,
    pub max_tokens: Option<i64>,
    pub model: String,
    pub hints: ProviderHints,
    pub path_so_far: Vec<String>,
}

fn lose(article: String, reason: &str, extra: serde_json::Map<String, serde_json::Value>) -> Step {
    Step::lose(article, crate::time::now_iso(), reason, Some(extra))
}

/// Run one iteration of the executor loop: fetch links for the current
/// article, ask the model to pick one, and validate the pick the same way a
/// human move is validated. Always returns a `Step` — never an `Err` — since
/// every failure mode here is a terminal `lose` step, not an HTTP error.
pub async fn compute_step(graph: &dyn ArticleGraph, gateway: &dyn LlmGateway, input: StepInput) -> Step {
    let now = crate::time::now_iso();

    let mut already_there = crate::room::validator::titles_match(&input.current_article, &input.destination_article);
    if !already_there {
        if let Some(canonical_current) = graph.canonical_title(&input.current_article) {
            already_there = crate::room::validator::titles_match(&canonical_current, &input.destination_article);
        }
    }
    if already_there {
        return Step { kind: crate::models::StepKind::Win, article: input.destination_article, at: now, metadata: None };
    }

    let Some((canonical_current, mut links)) = graph.article_with_links(&input.current_article) else {
        return lose(input.current_article, "article_not_found", serde_json::Map::new());
    };

    if let Some(limit) = input.max_links.filter(|v| *v > 0) {
        links.truncate(limit as usize);
    }

    if links.is_empty() {
        return lose(canonical_current, "no_links", serde_json::Map::new());
    }

    let outcome = match protocol::choose_link(
        gateway,
        ChooseLinkRequest {
            model: &input.model,
            current_article: &canonical_current,
            target_article: &input.destination_article,
            path_so_far: &input.path_so_far,
            links: &links,
            max_tries: protocol::DEFAULT_MAX_TRIES,
            max_tokens: input.max_tokens,
            hints: input.hints,
        },
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(ApiError::UpstreamFetch(message)) => {
            let mut extra = serde_json::Map::new();
            extra.insert("error".to_string(), serde_json::Value::String(message));
            return lose(canonical_current, "llm_error", extra);
        }
        Err(other) => {
            let mut extra = serde_json::Map::new();
            extra.insert("error".to_string(), serde_json::Value::String(other.to_string()));
            return lose(canonical_current, "llm_error", extra);
        }
    };

    let mut metadata = serde_json::Map::new();
    metadata.insert("tries".to_string(), serde_json::Value::from(outcome.tries));
    if let Some(usage) = &outcome.usage {
        if let Some(v) = usage.prompt_tokens {
            metadata.insert("prompt_tokens".to_string(), serde_json::Value::from(v));
        }
        if let Some(v) = usage.completion_tokens {
            metadata.insert("completion_tokens".to_string(), serde_json::Value::from(v));
        }
        if let Some(v) = usage.total_tokens {
            metadata.insert("total_tokens".to_string(), serde_json::Value::from(v));
        }
    }
    if let Some(outputs) = &outcome.llm_outputs {
        metadata.insert(
            "llm_outputs".to_string(),
            serde_json::Value::Array(outputs.iter().cloned().map(serde_json::Value::String).collect()),
        );
    } else if let Some(output) = &outcome.llm_output {
        metadata.insert("llm_output".to_string(), serde_json::Value::String(output.clone()));
    }

    let Some(index) = outcome.selected_index else {
        if let Some(errors) = &outcome.answer_errors {
            metadata.insert(
                "answer_errors".to_string(),
                serde_json::Value::Array(errors.iter().cloned().map(serde_json::Value::String).collect()),
            );
        }
        metadata.insert("reason".to_string(), serde_json::Value::String("bad_answer".to_string()));
        return Step { kind: crate::models::StepKind::Lose, article: canonical_current, at: now, metadata: Some(serde_json::Value::Object(metadata)) };
    };

    metadata.insert("selected_index".to_string(), serde_json::Value::from(index));

    let chosen = &links[(index - 1) as usize];
    let canonical_next = graph.canonical_title(chosen).unwrap_or_else(|| chosen.clone());

    let reached_target = crate::room::validator::titles_match(&canonical_next, &input.destination_article);
    if reached_target {
        return Step { kind: crate::models::StepKind::Win, article: canonical_next, at: now, metadata: Some(serde_json::Value::Object(metadata)) };
    }

    if input.next_hops >= input.max_steps {
        metadata.insert("reason".to_string(), serde_json::Value::String("max_steps".to_string()));
        metadata.insert("max_steps".to_string(), serde_json::Value::from(input.max_steps));
        return Step { kind: crate::models::StepKind::Lose, article: canonical_next, at: now, metadata: Some(serde_json::Value::Object(metadata)) };
    }

    Step { kind: crate::models::StepKind::Move, article: canonical_next, at: now, metadata: Some(serde_json::Value::Object(metadata)) }
}

pub fn spawn(registry: Arc<RoomRegistry>, room_id: String, run_id: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { run_loop(registry, room_id, run_id).await })
}

async fn run_loop(registry: Arc<RoomRegistry>, room_id: String, run_id: String) {
    loop {
        let Some(snapshot) = registry.snapshot_for_run(&room_id, &run_id).await else { return };

        let step = compute_step(
            registry.graph(),
            registry.gateway(),
            StepInput {
                current_article: snapshot.current_article,
                destination_article: snapshot.destination_article,
                next_hops: snapshot.next_hops,
                max_steps: snapshot.max_steps,
                max_links: snapshot.max_links,
                max_tokens: snapshot.max_tokens,
                model: snapshot.model,
                hints: snapshot.hints,
                path_so_far: snapshot.path_so_far,
            },
        )
        .await;

        match registry.commit_run_step(&room_id, &run_id, &snapshot.precondition_article, step).await {
            CommitOutcome::Continue => continue,
            CommitOutcome::Finished | CommitOutcome::Aborted => return,
        }
    }
}
