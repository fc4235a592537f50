//! LLM-run scenarios: a scripted gateway stands in for the model so the
//! executor's decide/commit loop can be driven deterministically.

use std::thread::sleep;
use std::time::Duration;

use rocket::http::{ContentType, Status};

use wikirace_arena::config::Config;
use wikirace_arena::test_support::ScriptedLlmGateway;

use crate::common::{create_room, fixture_graph, get_room_json, start_room, test_client_with};

fn add_llm_run(client: &rocket::local::blocking::Client, room_id: &str, owner_id: &str, model: &str) -> serde_json::Value {
    let res = client
        .post(format!("/rooms/{room_id}/add_llm"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"model":"{model}","requested_by_player_id":"{owner_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

/// Poll the room until the given run reaches `finished`, or panic after a
/// generous timeout -- the executor runs on a background task, not inline
/// with the request that started it.
fn wait_for_run_finished(client: &rocket::local::blocking::Client, room_id: &str, run_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let (_, room) = get_room_json(client, room_id);
        let run = room["runs"].as_array().unwrap().iter().find(|r| r["id"] == run_id).unwrap();
        if run["status"] == "finished" {
            return room;
        }
        sleep(Duration::from_millis(20));
    }
    panic!("run {run_id} did not finish in time");
}

#[test]
fn llm_run_wins() {
    let gateway = ScriptedLlmGateway::always_choose(1);
    let client = test_client_with(fixture_graph(), gateway, Config::default());
    let (room_id, owner_id) = create_room(&client, "LlmStart", "LlmGoal");

    let room = add_llm_run(&client, &room_id, &owner_id, "stub-model");
    let llm_run = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap();
    let run_id = llm_run["id"].as_str().unwrap().to_string();

    start_room(&client, &room_id, &owner_id);

    let room = wait_for_run_finished(&client, &room_id, &run_id);
    let run = room["runs"].as_array().unwrap().iter().find(|r| r["id"] == run_id).unwrap();
    assert_eq!(run["result"], "win");
    let last = run["steps"].as_array().unwrap().last().unwrap();
    assert_eq!(last["type"], "win");
    assert_eq!(last["article"], "LlmGoal");
}

#[test]
fn llm_run_loses_on_unparseable_answers() {
    let gateway = ScriptedLlmGateway::new(vec!["I think link two"]);
    let client = test_client_with(fixture_graph(), gateway, Config::default());
    let (room_id, owner_id) = create_room(&client, "LlmStart", "LlmGoal");

    let room = add_llm_run(&client, &room_id, &owner_id, "stub-model");
    let run_id = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap()["id"].as_str().unwrap().to_string();

    start_room(&client, &room_id, &owner_id);

    let room = wait_for_run_finished(&client, &room_id, &run_id);
    let run = room["runs"].as_array().unwrap().iter().find(|r| r["id"] == run_id).unwrap();
    assert_eq!(run["result"], "lose");
    let last = run["steps"].as_array().unwrap().last().unwrap();
    assert_eq!(last["metadata"]["reason"], "bad_answer");
    assert_eq!(last["metadata"]["answer_errors"].as_array().unwrap().len(), 3);
}

#[test]
fn restart_during_in_flight_call_leaves_a_single_start_step() {
    use std::sync::Arc;
    use tokio::sync::Notify;

    let notify = Arc::new(Notify::new());
    let gateway = ScriptedLlmGateway::always_choose(1).gated(notify.clone());
    let client = test_client_with(fixture_graph(), gateway, Config::default());
    let (room_id, owner_id) = create_room(&client, "LlmStart", "LlmGoal");

    let room = add_llm_run(&client, &room_id, &owner_id, "stub-model");
    let run_id = room["runs"].as_array().unwrap().iter().find(|r| r["kind"] == "llm").unwrap()["id"].as_str().unwrap().to_string();

    start_room(&client, &room_id, &owner_id);

    // The executor's first iteration is now blocked waiting on `notify`.
    sleep(Duration::from_millis(50));

    let res = client
        .post(format!("/rooms/{room_id}/runs/{run_id}/restart"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"requested_by_player_id":"{owner_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // The old executor was aborted by `restart`; give the freshly spawned one
    // time to reach its own blocked call before releasing the gate once.
    sleep(Duration::from_millis(50));
    notify.notify_one();

    let room = wait_for_run_finished(&client, &room_id, &run_id);
    let run = room["runs"].as_array().unwrap().iter().find(|r| r["id"] == run_id).unwrap();
    let starts = run["steps"].as_array().unwrap().iter().filter(|s| s["type"] == "start").count();
    assert_eq!(starts, 1, "exactly one start step should survive the restart");
}
