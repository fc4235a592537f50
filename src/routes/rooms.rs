//! Room lifecycle endpoints (SPEC_FULL.md §4.1-4.2): thin handlers that
//! deserialize a body and delegate straight to the [`RoomRegistry`].

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::config::Config;
use crate::error::ApiResult;
use crate::join_url::{build_join_url, RequestOrigin};
use crate::models::*;
use crate::room::RoomRegistry;

#[post("/rooms", format = "json", data = "<body>")]
pub fn create_room(
    registry: &State<Arc<RoomRegistry>>,
    config: &State<Config>,
    origin: RequestOrigin,
    body: Json<CreateRoomRequest>,
) -> ApiResult<Json<CreateRoomResponse>> {
    let body = body.into_inner();
    let (room, owner_player_id) = registry.create(
        &body.start_article,
        &body.destination_article,
        body.title.as_deref(),
        body.owner_name.as_deref(),
        body.rules,
    )?;
    let join_url = build_join_url(config, &origin, &room.id);
    Ok(Json(CreateRoomResponse { room_id: room.id.clone(), owner_player_id, join_url, room }))
}

#[get("/rooms/<room_id>")]
pub async fn get_room(registry: &State<Arc<RoomRegistry>>, room_id: &str) -> ApiResult<Json<Room>> {
    Ok(Json(registry.get(room_id).await?))
}

#[post("/rooms/<room_id>/join", format = "json", data = "<body>")]
pub async fn join_room(
    registry: &State<Arc<RoomRegistry>>,
    room_id: &str,
    body: Json<JoinRoomRequest>,
) -> ApiResult<Json<JoinRoomResponse>> {
    let (player_id, room) = registry.join(room_id, &body.name).await?;
    Ok(Json(JoinRoomResponse { player_id, room }))
}

#[post("/rooms/<room_id>/start", format = "json", data = "<body>")]
pub async fn start_room(registry: &State<Arc<RoomRegistry>>, room_id: &str, body: Json<StartRoomRequest>) -> ApiResult<Json<Room>> {
    Ok(Json(registry.start(room_id, &body.player_id).await?))
}

#[post("/rooms/<room_id>/new_round", format = "json", data = "<body>")]
pub async fn new_round(registry: &State<Arc<RoomRegistry>>, room_id: &str, body: Json<NewRoundRequest>) -> ApiResult<Json<Room>> {
    Ok(Json(registry.new_round(room_id, &body.start_article, &body.destination_article, &body.player_id).await?))
}

#[post("/rooms/<room_id>/move", format = "json", data = "<body>")]
pub async fn move_room(registry: &State<Arc<RoomRegistry>>, room_id: &str, body: Json<MoveRoomRequest>) -> ApiResult<Json<Room>> {
    Ok(Json(registry.move_player(room_id, &body.player_id, &body.to_article).await?))
}

#[post("/rooms/<room_id>/add_llm", format = "json", data = "<body>")]
pub async fn add_llm_run(registry: &State<Arc<RoomRegistry>>, room_id: &str, body: Json<AddLlmRunRequest>) -> ApiResult<Json<Room>> {
    Ok(Json(registry.add_llm(room_id, &body.into_inner()).await?))
}

#[post("/rooms/<room_id>/runs/<run_id>/cancel", format = "json", data = "<body>")]
pub async fn cancel_run(
    registry: &State<Arc<RoomRegistry>>,
    room_id: &str,
    run_id: &str,
    body: Json<RoomRunControlRequest>,
) -> ApiResult<Json<Room>> {
    Ok(Json(registry.cancel_run(room_id, run_id, &body.requested_by_player_id).await?))
}

#[post("/rooms/<room_id>/runs/<run_id>/restart", format = "json", data = "<body>")]
pub async fn restart_run(
    registry: &State<Arc<RoomRegistry>>,
    room_id: &str,
    run_id: &str,
    body: Json<RoomRunControlRequest>,
) -> ApiResult<Json<Room>> {
    Ok(Json(registry.restart_run(room_id, run_id, &body.requested_by_player_id).await?))
}

#[post("/rooms/<room_id>/runs/<run_id>/abandon", format = "json", data = "<body>")]
pub async fn abandon_run(
    registry: &State<Arc<RoomRegistry>>,
    room_id: &str,
    run_id: &str,
    body: Json<RoomRunControlRequest>,
) -> ApiResult<Json<Room>> {
    Ok(Json(registry.abandon_run(room_id, run_id, &body.requested_by_player_id).await?))
}
