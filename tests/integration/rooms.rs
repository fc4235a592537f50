//! End-to-end human-run scenarios against the HTTP API: lobby -> win, illegal
//! moves, bounded loss, and the idempotence/case-insensitivity guarantees a
//! client relies on.

use rocket::http::Status;

use crate::common::{create_room, create_room_with_max_hops, get_room_json, move_player, start_room};

#[test]
fn lobby_to_win() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (status, room) = move_player(&client, &room_id, &owner_id, "Animal");
    assert_eq!(status, Status::Ok);
    let run = crate::common::run_for_player(&room, &owner_id);
    assert_eq!(run["steps"].as_array().unwrap().last().unwrap()["type"], "move");

    let (status, room) = move_player(&client, &room_id, &owner_id, "Dog");
    assert_eq!(status, Status::Ok);
    let run = crate::common::run_for_player(&room, &owner_id);
    assert_eq!(run["status"], "finished");
    assert_eq!(run["result"], "win");
    let last = run["steps"].as_array().unwrap().last().unwrap();
    assert_eq!(last["type"], "win");
    assert_eq!(last["article"], "Dog");
}

#[test]
fn illegal_move_is_rejected_without_changing_state() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (_, before) = get_room_json(&client, &room_id);

    let (status, _) = move_player(&client, &room_id, &owner_id, "Nonexistent");
    assert_eq!(status, Status::NotFound);

    let (_, after) = get_room_json(&client, &room_id);
    assert_eq!(before["updated_at"], after["updated_at"]);
}

#[test]
fn bounded_loss_on_hop_budget() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room_with_max_hops(&client, "A", "Z", 2);
    start_room(&client, &room_id, &owner_id);

    let (status, room) = move_player(&client, &room_id, &owner_id, "B");
    assert_eq!(status, Status::Ok);
    assert_eq!(crate::common::run_for_player(&room, &owner_id)["status"], "running");

    let (status, room) = move_player(&client, &room_id, &owner_id, "C");
    assert_eq!(status, Status::Ok);
    let run = crate::common::run_for_player(&room, &owner_id);
    assert_eq!(run["status"], "finished");
    assert_eq!(run["result"], "lose");
    let last = run["steps"].as_array().unwrap().last().unwrap();
    assert_eq!(last["type"], "lose");
    assert_eq!(last["article"], "C");
    assert_eq!(last["metadata"]["reason"], "max_hops");
    assert_eq!(last["metadata"]["max_hops"], 2);
}

#[test]
fn moving_to_the_current_article_is_a_noop() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (_, before) = get_room_json(&client, &room_id);
    let (status, after) = move_player(&client, &room_id, &owner_id, "Cat");
    assert_eq!(status, Status::Ok);
    assert_eq!(before["updated_at"], after["updated_at"]);
}

#[test]
fn moves_are_case_insensitive() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (status, room) = move_player(&client, &room_id, &owner_id, "animal");
    assert_eq!(status, Status::Ok);
    let run = crate::common::run_for_player(&room, &owner_id);
    assert_eq!(run["steps"].as_array().unwrap().last().unwrap()["article"], "Animal");
}

#[test]
fn wiki_fragment_is_stripped_before_validation() {
    let client = crate::common::test_client();
    let (room_id, owner_id) = create_room(&client, "Cat", "Dog");
    start_room(&client, &room_id, &owner_id);

    let (status, room) = move_player(&client, &room_id, &owner_id, "Animal#History");
    assert_eq!(status, Status::Ok);
    let run = crate::common::run_for_player(&room, &owner_id);
    assert_eq!(run["steps"].as_array().unwrap().last().unwrap()["article"], "Animal");
}

#[test]
fn creating_a_room_with_identical_start_and_destination_is_rejected() {
    let client = crate::common::test_client();
    let res = client
        .post("/rooms")
        .header(rocket::http::ContentType::JSON)
        .body(r#"{"start_article":"Cat","destination_article":"cat"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
