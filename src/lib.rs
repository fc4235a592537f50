pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod join_url;
pub mod llm;
pub mod models;
pub mod realtime;
pub mod reaper;
pub mod room;
pub mod routes;
pub mod test_support;
pub mod time;
pub mod wiki_cache;

use std::sync::Arc;
use std::time::Duration;

use rocket_cors::CorsOptions;

use config::Config;
use graph::{ArticleGraph, SqliteArticleGraph};
use llm::{HttpLlmGateway, LlmGateway};
use room::RoomRegistry;
use wiki_cache::WikiCache;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    build_rocket(Config::from_env())
}

/// Build the server against the real article-graph database and a real LLM
/// gateway. Tests use [`build_rocket_with`] directly to inject fakes instead.
pub fn build_rocket(config: Config) -> rocket::Rocket<rocket::Build> {
    let graph: Arc<dyn ArticleGraph> = Arc::new(SqliteArticleGraph::open(&config.db_path));
    let gateway: Arc<dyn LlmGateway> = Arc::new(HttpLlmGateway::new(config.max_concurrent_llm_calls));
    build_rocket_with(graph, gateway, config)
}

pub fn build_rocket_with(
    graph: Arc<dyn ArticleGraph>,
    gateway: Arc<dyn LlmGateway>,
    config: Config,
) -> rocket::Rocket<rocket::Build> {
    let registry = RoomRegistry::new(graph.clone(), gateway.clone(), config.clone());
    let wiki_cache = Arc::new(WikiCache::new(graph.clone(), &config));

    let reaper_registry = registry.clone();
    let room_ttl = Duration::from_secs(config.room_ttl_secs);
    let cleanup_interval = Duration::from_secs(config.room_cleanup_interval_secs);

    let cors = CorsOptions::default().to_cors().expect("failed to build CORS policy");

    rocket::build()
        .manage(config)
        .manage(graph)
        .manage(gateway)
        .manage(registry)
        .manage(wiki_cache)
        .attach(cors)
        .register("/", rocket::catchers![routes::not_found])
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::get_all_articles,
                routes::get_article_with_links,
                routes::resolve_article,
                routes::canonical_title,
                routes::wiki_page,
                routes::create_room,
                routes::get_room,
                routes::join_room,
                routes::start_room,
                routes::new_round,
                routes::move_room,
                routes::add_llm_run,
                routes::cancel_run,
                routes::restart_run,
                routes::abandon_run,
                routes::room_ws,
                routes::llm_chat,
                routes::choose_link_route,
                routes::local_run_step,
                routes::validate_move_route,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Idle Room Reaper", move |_rocket| {
            Box::pin(async move {
                reaper::spawn(reaper_registry, room_ttl, cleanup_interval);
            })
        }))
}
