//! Standalone LLM endpoints (SPEC_FULL.md §6.1): the same decision protocol
//! and executor step the room orchestrator uses, reachable without a room so
//! a headless harness can drive a race (or just talk to the model) directly.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{post, State};

use crate::error::ApiResult;
use crate::graph::ArticleGraph;
use crate::llm::protocol::{self, ChooseLinkRequest};
use crate::llm::{LlmCallParams, LlmGateway};
use crate::models::*;
use crate::room::executor::{compute_step, StepInput};

#[post("/llm/chat", format = "json", data = "<body>")]
pub async fn llm_chat(gateway: &State<Arc<dyn LlmGateway>>, body: Json<LlmChatRequest>) -> ApiResult<Json<LlmChatResponse>> {
    let body = body.into_inner();
    let (content, usage) = gateway
        .call(LlmCallParams {
            model: body.model,
            prompt: body.prompt,
            max_tokens: body.max_tokens,
            temperature: body.temperature,
            hints: body.hints,
        })
        .await?;
    Ok(Json(LlmChatResponse { content, usage }))
}

#[post("/llm/choose_link", format = "json", data = "<body>")]
pub async fn choose_link_route(
    gateway: &State<Arc<dyn LlmGateway>>,
    body: Json<LlmChooseLinkRequest>,
) -> ApiResult<Json<LlmChooseLinkResponse>> {
    let body = body.into_inner();
    let max_tries = body.max_tries.unwrap_or(protocol::DEFAULT_MAX_TRIES);
    let outcome = protocol::choose_link(
        gateway.as_ref().as_ref(),
        ChooseLinkRequest {
            model: &body.model,
            current_article: &body.current_article,
            target_article: &body.target_article,
            path_so_far: &body.path_so_far,
            links: &body.links,
            max_tries,
            max_tokens: body.max_tokens,
            hints: body.hints,
        },
    )
    .await?;

    Ok(Json(LlmChooseLinkResponse {
        selected_index: outcome.selected_index,
        tries: outcome.tries,
        llm_output: outcome.llm_output,
        llm_outputs: outcome.llm_outputs,
        answer_errors: outcome.answer_errors,
        prompt_tokens: outcome.usage.as_ref().and_then(|u| u.prompt_tokens),
        completion_tokens: outcome.usage.as_ref().and_then(|u| u.completion_tokens),
        total_tokens: outcome.usage.as_ref().and_then(|u| u.total_tokens),
    }))
}

#[post("/llm/local_run/step", format = "json", data = "<body>")]
pub async fn local_run_step(
    graph: &State<Arc<dyn ArticleGraph>>,
    gateway: &State<Arc<dyn LlmGateway>>,
    body: Json<LocalLlmStepRequest>,
) -> ApiResult<Json<LocalLlmStepResponse>> {
    let body = body.into_inner();
    let current_article = body.steps.last().map(|s| s.article.clone()).unwrap_or_else(|| body.start_article.clone());
    let current_hops = (body.steps.len() as i64 - 1).max(0);
    let path_so_far = protocol::path_so_far(&body.start_article, &body.steps);

    let step = compute_step(
        graph.as_ref().as_ref(),
        gateway.as_ref().as_ref(),
        StepInput {
            current_article,
            destination_article: body.destination_article,
            next_hops: current_hops + 1,
            max_steps: body.max_steps.unwrap_or(20),
            max_links: body.max_links,
            max_tokens: body.max_tokens,
            model: body.model,
            hints: body.hints,
            path_so_far,
        },
    )
    .await;

    Ok(Json(LocalLlmStepResponse { step }))
}
