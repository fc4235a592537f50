use std::collections::HashMap;
use std::sync::Arc;

use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;

use wikirace_arena::config::Config;
use wikirace_arena::test_support::{FakeGraph, ScriptedLlmGateway};

/// A small fixed article graph exercised across the suite.
///
/// Every node a test treats as a "real" stop (as opposed to a one-way
/// redirect) carries at least two outgoing links, since a single-link page
/// is exactly what `canonical_title` follows through as a redirect chain
/// (mirroring Wikipedia's own soft-redirect convention). Getting this wrong
/// makes `create_room`'s start/destination canonicalization collapse two
/// distinct-looking titles onto the same article.
pub fn fixture_graph() -> FakeGraph {
    let mut articles = HashMap::new();
    articles.insert("Cat".to_string(), vec!["Animal".to_string(), "Feline".to_string()]);
    articles.insert("Animal".to_string(), vec!["Dog".to_string(), "Mammal".to_string()]);
    articles.insert("Dog".to_string(), vec!["Animal".to_string(), "Puppy".to_string()]);
    articles.insert("Feline".to_string(), vec![]);
    articles.insert("Mammal".to_string(), vec![]);
    articles.insert("Puppy".to_string(), vec![]);

    articles.insert("A".to_string(), vec!["B".to_string(), "A2".to_string()]);
    articles.insert("B".to_string(), vec!["C".to_string(), "Z".to_string()]);
    articles.insert("C".to_string(), vec!["A".to_string(), "C2".to_string()]);
    articles.insert("Z".to_string(), vec!["A".to_string(), "Z2".to_string()]);
    articles.insert("A2".to_string(), vec![]);
    articles.insert("C2".to_string(), vec![]);
    articles.insert("Z2".to_string(), vec![]);

    articles.insert("LlmStart".to_string(), vec!["LlmMid".to_string(), "LlmStartAlt".to_string()]);
    articles.insert("LlmMid".to_string(), vec!["LlmGoal".to_string(), "LlmOther".to_string()]);
    articles.insert("LlmGoal".to_string(), vec![]);
    articles.insert("LlmStartAlt".to_string(), vec![]);
    articles.insert("LlmOther".to_string(), vec![]);
    FakeGraph::new(articles)
}

pub fn test_client() -> Client {
    test_client_with(fixture_graph(), ScriptedLlmGateway::new(vec![]), Config::default())
}

pub fn test_client_with(graph: FakeGraph, gateway: ScriptedLlmGateway, config: Config) -> Client {
    let rocket = wikirace_arena::build_rocket_with(Arc::new(graph), Arc::new(gateway), config);
    Client::tracked(rocket).expect("valid rocket instance")
}

/// Create a room via the HTTP API and return `(room_id, owner_player_id)`.
pub fn create_room(client: &Client, start: &str, destination: &str) -> (String, String) {
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .body(format!(r#"{{"start_article":"{start}","destination_article":"{destination}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    (body["room_id"].as_str().unwrap().to_string(), body["owner_player_id"].as_str().unwrap().to_string())
}

pub fn create_room_with_max_hops(client: &Client, start: &str, destination: &str, max_hops: i64) -> (String, String) {
    let res = client
        .post("/rooms")
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"start_article":"{start}","destination_article":"{destination}","rules":{{"max_hops":{max_hops}}}}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    (body["room_id"].as_str().unwrap().to_string(), body["owner_player_id"].as_str().unwrap().to_string())
}

pub fn join_room(client: &Client, room_id: &str, name: &str) -> String {
    let res = client
        .post(format!("/rooms/{room_id}/join"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"name":"{name}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    body["player_id"].as_str().unwrap().to_string()
}

pub fn start_room(client: &Client, room_id: &str, owner_id: &str) -> serde_json::Value {
    let res = client
        .post(format!("/rooms/{room_id}/start"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"player_id":"{owner_id}"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

pub fn move_player(client: &Client, room_id: &str, player_id: &str, to_article: &str) -> (Status, serde_json::Value) {
    let res = client
        .post(format!("/rooms/{room_id}/move"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"player_id":"{player_id}","to_article":"{to_article}"}}"#))
        .dispatch();
    let status = res.status();
    let body = res.into_json().unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub fn get_room_json(client: &Client, room_id: &str) -> (Status, serde_json::Value) {
    let res = client.get(format!("/rooms/{room_id}")).dispatch();
    let status = res.status();
    let body = res.into_json().unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub fn run_for_player<'a>(room: &'a serde_json::Value, player_id: &str) -> &'a serde_json::Value {
    room["runs"].as_array().unwrap().iter().find(|r| r["player_id"] == player_id).unwrap()
}

pub fn post_json(client: &Client, path: &str, body: &str) -> (Status, serde_json::Value) {
    let res = client.post(path).header(ContentType::JSON).body(body.to_string()).dispatch();
    let status = res.status();
    let body = res.into_json().unwrap_or(serde_json::Value::Null);
    (status, body)
}
