//! The idle-room reaper's end-to-end effect: a stale room disappears from
//! the registry entirely, not just its `status` field.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use rocket::http::Status;
use rocket::local::blocking::Client;

use wikirace_arena::config::Config;
use wikirace_arena::test_support::ScriptedLlmGateway;

use crate::common::{create_room, fixture_graph};

#[test]
fn idle_rooms_are_reaped() {
    let mut config = Config::default();
    config.room_ttl_secs = 0;
    config.room_cleanup_interval_secs = 0;

    let rocket = wikirace_arena::build_rocket_with(Arc::new(fixture_graph()), Arc::new(ScriptedLlmGateway::new(vec![])), config);
    let client = Client::tracked(rocket).expect("valid rocket instance");

    let (room_id, _owner_id) = create_room(&client, "Cat", "Dog");

    sleep(Duration::from_millis(200));

    let res = client.get(format!("/rooms/{room_id}")).dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
