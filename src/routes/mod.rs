// Route module decomposition — each domain area in its own file.

mod llm;
mod rooms;
mod system;
mod validate;
mod wiki;
mod ws;

pub use llm::{choose_link_route, llm_chat, local_run_step};
pub use rooms::{abandon_run, add_llm_run, cancel_run, create_room, get_room, join_room, move_room, new_round, restart_run, start_room};
pub use system::{canonical_title, get_all_articles, get_article_with_links, health, not_found, resolve_article};
pub use validate::validate_move_route;
pub use wiki::wiki_page;
pub use ws::room_ws;
