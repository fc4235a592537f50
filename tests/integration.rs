mod common;
mod lifecycle;
mod llm_runs;
mod reaper;
mod rooms;
