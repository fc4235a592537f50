//! The room WebSocket upgrade route (SPEC_FULL.md §4.6).

use std::sync::Arc;

use rocket::get;
use rocket::State;
use rocket_ws::{Channel, WebSocket};

use crate::realtime;
use crate::room::RoomRegistry;

#[get("/rooms/<room_id>/ws?<player_id>")]
pub fn room_ws(ws: WebSocket, registry: &State<Arc<RoomRegistry>>, room_id: String, player_id: Option<String>) -> Channel<'static> {
    realtime::channel(ws, registry.inner().clone(), room_id, player_id)
}
