//! Standalone move validation (SPEC_FULL.md §6.1): the same §4.3 validator a
//! room move goes through, reachable without a room.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{post, State};

use crate::error::ApiResult;
use crate::graph::ArticleGraph;
use crate::models::{ValidateMoveRequest, ValidateMoveResponse};
use crate::room::validator::{self, MoveOutcome};
use crate::time::now_iso;

#[post("/local/validate_move", format = "json", data = "<body>")]
pub fn validate_move_route(
    graph: &State<Arc<dyn ArticleGraph>>,
    body: Json<ValidateMoveRequest>,
) -> ApiResult<Json<ValidateMoveResponse>> {
    let body = body.into_inner();
    let outcome = validator::validate_move(
        graph.as_ref().as_ref(),
        &body.current_article,
        &body.to_article,
        &body.destination_article,
        body.current_hops,
        body.max_hops,
        &now_iso(),
    )?;

    Ok(Json(match outcome {
        MoveOutcome::Noop => ValidateMoveResponse { noop: true, step: None },
        MoveOutcome::Step(step) => ValidateMoveResponse { noop: false, step: Some(step) },
    }))
}
