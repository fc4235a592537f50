//! Room/run lifecycle rules that don't involve an executor: ownership checks,
//! cancel/restart/abandon semantics, round resets, the per-room LLM-run cap,
//! and rejoining a finished room.

use std::sync::Arc;

use rocket::http::Status;
use tokio::sync::Notify;

use wikirace_arena::config::Config;
use wikirace_arena::test_support::ScriptedLlmGateway;

use crate::common::{create_room, fixture_graph, join_room, post_json, run_for_player, start_room, test_client, test_client_with};

#[test]
fn only_the_owner_can_start_the_room() {
    let client = test_client();
    let (room_id, _owner_id) = create_room(&client, "Cat", "Dog");
    let impostor = join_room(&client, &room_id, "Impostor");

    let (status, _) = post_json(&client, &format!("/rooms/{room_id}/start"), &format!(r#"{{"player_id":"{impostor}"}}"#));
    assert_eq!(status, Status::Forbidden);
}

#[test]
fn starting_twice_is_a_noop() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    let first = start_room(&client, &room_id, &owner_id);
    let second = start_room(&client, &room_id, &owner_id);
    assert_eq!(first["updated_at"], second["updated_at"]);
}

#[test]
fn cancelling_an_unstarted_llm_run_removes_it() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");

    let (status, room) =
        post_json(&client, &format!("/rooms/{room_id}/add_llm"), &format!(r#"{{"model":"stub-model","requested_by_player_id":"{owner_id}"}}"#));
    assert_eq!(status, Status::Ok);
    let run_id = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap()["id"].as_str().unwrap().to_string();

    let (status, room) =
        post_json(&client, &format!("/rooms/{room_id}/runs/{run_id}/cancel"), &format!(r#"{{"requested_by_player_id":"{owner_id}"}}"#));
    assert_eq!(status, Status::Ok);
    assert!(room["runs"].as_array().unwrap().iter().all(|r| r["id"] != run_id));
}

#[test]
fn cancelling_a_running_llm_run_is_a_terminal_loss() {
    // A gateway that never releases keeps the run in `running` so the cancel
    // below is guaranteed to observe it mid-flight rather than racing a
    // background executor iteration that might finish first.
    let gateway = ScriptedLlmGateway::always_choose(1).gated(Arc::new(Notify::new()));
    let client = test_client_with(fixture_graph(), gateway, Config::default());
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");

    let (_, room) =
        post_json(&client, &format!("/rooms/{room_id}/add_llm"), &format!(r#"{{"model":"stub-model","requested_by_player_id":"{owner_id}"}}"#));
    let run_id = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap()["id"].as_str().unwrap().to_string();

    start_room(&client, &room_id, &owner_id);
    std::thread::sleep(std::time::Duration::from_millis(50));

    let (status, room) =
        post_json(&client, &format!("/rooms/{room_id}/runs/{run_id}/cancel"), &format!(r#"{{"requested_by_player_id":"{owner_id}"}}"#));
    assert_eq!(status, Status::Ok);
    let run = room["runs"].as_array().unwrap().iter().find(|r| r["id"] == run_id).unwrap();
    assert_eq!(run["status"], "finished");
    assert_eq!(run["result"], "lose");
    assert_eq!(run["steps"].as_array().unwrap().last().unwrap()["metadata"]["reason"], "cancelled");
}

#[test]
fn llm_run_cap_is_enforced_and_recovers_after_a_finish() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");

    for _ in 0..8 {
        let (status, _) = post_json(
            &client,
            &format!("/rooms/{room_id}/add_llm"),
            &format!(r#"{{"model":"stub-model","requested_by_player_id":"{owner_id}"}}"#),
        );
        assert_eq!(status, Status::Ok);
    }

    let (status, _) = post_json(
        &client,
        &format!("/rooms/{room_id}/add_llm"),
        &format!(r#"{{"model":"stub-model","requested_by_player_id":"{owner_id}"}}"#),
    );
    assert_eq!(status, Status::Conflict);

    let (_, room) = crate::common::get_room_json(&client, &room_id);
    let a_run_id = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap()["id"].as_str().unwrap().to_string();
    let (status, _) =
        post_json(&client, &format!("/rooms/{room_id}/runs/{a_run_id}/cancel"), &format!(r#"{{"requested_by_player_id":"{owner_id}"}}"#));
    assert_eq!(status, Status::Ok);

    let (status, _) = post_json(
        &client,
        &format!("/rooms/{room_id}/add_llm"),
        &format!(r#"{{"model":"stub-model","requested_by_player_id":"{owner_id}"}}"#),
    );
    assert_eq!(status, Status::Ok);
}

#[test]
fn abandoning_a_human_run_is_a_terminal_loss() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (_, room_before) = crate::common::get_room_json(&client, &room_id);
    let run_id = run_for_player(&room_before, &owner_id)["id"].as_str().unwrap().to_string();

    let (status, room) =
        post_json(&client, &format!("/rooms/{room_id}/runs/{run_id}/abandon"), &format!(r#"{{"requested_by_player_id":"{owner_id}"}}"#));
    assert_eq!(status, Status::Ok);
    let run = run_for_player(&room, &owner_id);
    assert_eq!(run["status"], "finished");
    assert_eq!(run["result"], "abandoned");
}

#[test]
fn new_round_resets_every_run_and_reopens_the_room() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);
    crate::common::move_player(&client, &room_id, &owner_id, "Animal");

    let (status, room) = post_json(
        &client,
        &format!("/rooms/{room_id}/new_round"),
        &format!(r#"{{"player_id":"{owner_id}","start_article":"Animal","destination_article":"B"}}"#),
    );
    assert_eq!(status, Status::Ok);
    assert_eq!(room["status"], "lobby");
    assert_eq!(room["start_article"], "Animal");
    let run = run_for_player(&room, &owner_id);
    assert!(run["steps"].as_array().unwrap().is_empty());
    assert_eq!(run["status"], "not_started");
}

#[test]
fn joining_a_finished_room_reopens_it() {
    let client = test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);
    crate::common::move_player(&client, &room_id, &owner_id, "Animal");
    crate::common::move_player(&client, &room_id, &owner_id, "Dog");

    let (_, room) = crate::common::get_room_json(&client, &room_id);
    assert_eq!(room["status"], "finished");

    let _latecomer = join_room(&client, &room_id, "Latecomer");
    let (_, room) = crate::common::get_room_json(&client, &room_id);
    assert_eq!(room["status"], "running");
}
