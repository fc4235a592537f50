//! The room registry and per-room state machine (SPEC_FULL.md §4.1-4.3).
//!
//! One [`RoomRegistry`] is managed Rocket state for the whole process. It owns
//! the `room id -> RoomEntry` map; each [`RoomEntry`] in turn owns the room's
//! value state behind a `tokio::sync::Mutex`, a broadcast channel fan-out
//! point, and the set of live LLM run executors for that room. There is no
//! back-pointer from a run to its room: every lookup goes `registry -> entry
//! -> room -> run`.

pub mod executor;
pub mod validator;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::graph::ArticleGraph;
use crate::ids;
use crate::llm::LlmGateway;
use crate::llm::protocol::path_so_far;
use crate::models::*;
use crate::time::now_iso;
use validator::MoveOutcome;

const BROADCAST_CAPACITY: usize = 32;

/// Per-room realtime/lifecycle bookkeeping that never gets serialized: the
/// broadcast point every WS connection subscribes to, and the run executors
/// currently in flight for this room.
pub struct RoomEntry {
    pub(crate) state: AsyncMutex<Room>,
    broadcast: broadcast::Sender<Room>,
    executors: StdMutex<HashMap<String, JoinHandle<()>>>,
    pub(crate) closed: Notify,
}

impl RoomEntry {
    fn new(room: Room) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Arc::new(RoomEntry {
            state: AsyncMutex::new(room),
            broadcast: tx,
            executors: StdMutex::new(HashMap::new()),
            closed: Notify::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Room> {
        self.broadcast.subscribe()
    }

    fn notify(&self, room: &Room) {
        let _ = self.broadcast.send(room.clone());
    }

    fn install_executor(&self, run_id: String, handle: JoinHandle<()>) {
        let mut map = self.executors.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = map.insert(run_id, handle) {
            old.abort();
        }
    }

    fn cancel_executor(&self, run_id: &str) {
        if let Some(handle) = self.executors.lock().unwrap_or_else(|e| e.into_inner()).remove(run_id) {
            handle.abort();
        }
    }

    fn cancel_all(&self) {
        let mut map = self.executors.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in map.drain() {
            handle.abort();
        }
    }
}

/// Snapshot of everything an executor iteration needs, captured under the
/// room lock and carried across the unlocked LLM/graph calls.
pub(crate) struct ExecutorSnapshot {
    pub current_article: String,
    pub destination_article: String,
    pub next_hops: i64,
    pub max_steps: i64,
    pub max_links: Option<i64>,
    pub max_tokens: Option<i64>,
    pub model: String,
    pub hints: ProviderHints,
    pub path_so_far: Vec<String>,
    pub precondition_article: String,
}

pub(crate) enum CommitOutcome {
    Continue,
    Finished,
    Aborted,
}

/// Transition a room to `finished` once every run in it has reached a
/// terminal state. Nothing in the data model provides another trigger for
/// this transition; see DESIGN.md for the reasoning.
fn maybe_finish_room(room: &mut Room, now: &str) {
    if matches!(room.status, RoomStatus::Running) && !room.runs.is_empty() && room.runs.iter().all(|r| r.is_finished()) {
        room.status = RoomStatus::Finished;
        room.finished_at = Some(now.to_string());
    }
}

fn default_run_fields(kind: RunKind) -> Run {
    Run {
        id: String::new(),
        kind,
        player_id: None,
        player_name: None,
        model: None,
        api_base: None,
        openai_api_mode: None,
        openai_reasoning_effort: None,
        openai_reasoning_summary: None,
        anthropic_thinking_budget_tokens: None,
        google_thinking_config: None,
        max_steps: None,
        max_links: None,
        max_tokens: None,
        started_at: None,
        finished_at: None,
        status: RunStatus::NotStarted,
        result: None,
        steps: Vec::new(),
    }
}

pub struct RoomRegistry {
    rooms: StdMutex<HashMap<String, Arc<RoomEntry>>>,
    graph: Arc<dyn ArticleGraph>,
    gateway: Arc<dyn LlmGateway>,
    config: Config,
}

impl RoomRegistry {
    pub fn new(graph: Arc<dyn ArticleGraph>, gateway: Arc<dyn LlmGateway>, config: Config) -> Arc<Self> {
        Arc::new(RoomRegistry { rooms: StdMutex::new(HashMap::new()), graph, gateway, config })
    }

    pub(crate) fn graph(&self) -> &dyn ArticleGraph {
        self.graph.as_ref()
    }

    pub(crate) fn gateway(&self) -> &dyn LlmGateway {
        self.gateway.as_ref()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn entry(&self, room_id: &str) -> ApiResult<Arc<RoomEntry>> {
        let id = ids::normalize_room_id(room_id);
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Room {id} not found")))
    }

    fn canonicalize_distinct(&self, start_article: &str, destination_article: &str) -> ApiResult<(String, String)> {
        let start_raw = start_article.replace('_', " ");
        let start_raw = start_raw.trim();
        let dest_raw = destination_article.replace('_', " ");
        let dest_raw = dest_raw.trim();
        if start_raw.is_empty() || dest_raw.is_empty() {
            return Err(ApiError::BadInput("start_article and destination_article are required".to_string()));
        }

        let start_canonical = self
            .graph
            .canonical_title(start_raw)
            .ok_or_else(|| ApiError::NotFound(format!("Article not found: {start_raw}")))?;
        let dest_canonical = self
            .graph
            .canonical_title(dest_raw)
            .ok_or_else(|| ApiError::NotFound(format!("Article not found: {dest_raw}")))?;

        if validator::titles_match(&start_canonical, &dest_canonical) {
            return Err(ApiError::BadInput("start_article and destination_article must differ".to_string()));
        }

        Ok((start_canonical, dest_canonical))
    }

    /// §4.1 `create`.
    pub fn create(
        &self,
        start_article: &str,
        destination_article: &str,
        title: Option<&str>,
        owner_name: Option<&str>,
        rules: Option<RoomRules>,
    ) -> ApiResult<(Room, String)> {
        let (start_canonical, dest_canonical) = self.canonicalize_distinct(start_article, destination_article)?;
        let rules = RoomRules::normalize(rules);

        let owner_id = ids::player_id();
        let owner_name = owner_name.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("Host").to_string();
        let now = now_iso();

        let mut owner_run = default_run_fields(RunKind::Human);
        owner_run.id = ids::run_id();
        owner_run.player_id = Some(owner_id.clone());
        owner_run.player_name = Some(owner_name.clone());
        owner_run.max_steps = Some(rules.max_hops);

        let owner_player = Player { id: owner_id.clone(), name: owner_name, connected: false, joined_at: now.clone() };

        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let room_id = loop {
            let candidate = ids::room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Room {
            id: room_id.clone(),
            created_at: now.clone(),
            updated_at: now,
            owner_player_id: owner_id.clone(),
            title: title.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            start_article: start_canonical,
            destination_article: dest_canonical,
            rules,
            status: RoomStatus::Lobby,
            started_at: None,
            finished_at: None,
            players: vec![owner_player],
            runs: vec![owner_run],
        };

        rooms.insert(room_id, RoomEntry::new(room.clone()));
        Ok((room, owner_id))
    }

    pub async fn get(&self, room_id: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let room = entry.state.lock().await;
        Ok(room.clone())
    }

    pub fn subscribe(&self, room_id: &str) -> ApiResult<Arc<RoomEntry>> {
        self.entry(room_id)
    }

    /// §4.2 `join`.
    pub async fn join(&self, room_id: &str, name: &str) -> ApiResult<(String, Room)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::BadInput("name is required".to_string()));
        }

        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        let now = now_iso();
        if matches!(room.status, RoomStatus::Finished) {
            room.status = RoomStatus::Running;
            room.finished_at = None;
        }
        let runs_now_active = matches!(room.status, RoomStatus::Running);

        let player_id = ids::player_id();
        let mut run = default_run_fields(RunKind::Human);
        run.id = ids::run_id();
        run.player_id = Some(player_id.clone());
        run.player_name = Some(name.to_string());
        run.max_steps = Some(room.rules.max_hops);

        if runs_now_active {
            run.status = RunStatus::Running;
            run.started_at = Some(now.clone());
            run.steps.push(Step::start(room.start_article.clone(), now.clone()));
        }

        room.players.push(Player { id: player_id.clone(), name: name.to_string(), connected: false, joined_at: now.clone() });
        room.runs.push(run);
        room.updated_at = now;

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
        Ok((player_id, snapshot))
    }

    /// §4.2 `start`.
    pub async fn start(self: &Arc<Self>, room_id: &str, player_id: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if room.owner_player_id != player_id {
            return Err(ApiError::Unauthorized("Only the room owner can start the race".to_string()));
        }

        if matches!(room.status, RoomStatus::Running) {
            return Ok(room.clone());
        }

        let now = now_iso();
        room.status = RoomStatus::Running;
        room.started_at = Some(now.clone());
        room.finished_at = None;

        let start_article = room.start_article.clone();
        let mut llm_run_ids = Vec::new();
        for run in room.runs.iter_mut() {
            if matches!(run.status, RunStatus::NotStarted) {
                run.status = RunStatus::Running;
                run.started_at = Some(now.clone());
                run.steps.push(Step::start(start_article.clone(), now.clone()));
                if matches!(run.kind, RunKind::Llm) {
                    llm_run_ids.push(run.id.clone());
                }
            }
        }

        room.updated_at = now;
        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);

        let normalized_id = ids::normalize_room_id(room_id);
        for run_id in llm_run_ids {
            let handle = executor::spawn(self.clone(), normalized_id.clone(), run_id.clone());
            entry.install_executor(run_id, handle);
        }

        Ok(snapshot)
    }

    /// §4.2 `new_round`.
    pub async fn new_round(
        &self,
        room_id: &str,
        start_article: &str,
        destination_article: &str,
        player_id: &str,
    ) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if room.owner_player_id != player_id {
            return Err(ApiError::Unauthorized("Only the room owner can start a new round".to_string()));
        }

        let (start_canonical, dest_canonical) = self.canonicalize_distinct(start_article, destination_article)?;

        entry.cancel_all();

        let now = now_iso();
        room.start_article = start_canonical;
        room.destination_article = dest_canonical;
        room.status = RoomStatus::Lobby;
        room.started_at = None;
        room.finished_at = None;
        for run in room.runs.iter_mut() {
            run.steps.clear();
            run.status = RunStatus::NotStarted;
            run.result = None;
            run.started_at = None;
            run.finished_at = None;
        }
        room.updated_at = now;

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
        Ok(snapshot)
    }

    /// §4.2 `move`, via the shared §4.3 validator.
    pub async fn move_player(&self, room_id: &str, player_id: &str, to_article: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if !matches!(room.status, RoomStatus::Running) {
            return Err(ApiError::Conflict("Room is not running".to_string()));
        }

        let run_idx = room
            .runs
            .iter()
            .position(|r| r.player_id.as_deref() == Some(player_id))
            .ok_or_else(|| ApiError::NotFound("No run for this player in this room".to_string()))?;

        if !matches!(room.runs[run_idx].status, RunStatus::Running) {
            return Err(ApiError::Conflict("Run is not running".to_string()));
        }

        let start_article = room.start_article.clone();
        let destination_article = room.destination_article.clone();
        let max_hops = room.runs[run_idx].max_steps.unwrap_or(room.rules.max_hops);
        let current_article = room.runs[run_idx].current_article(&start_article).to_string();
        let current_hops = room.runs[run_idx].current_hops();

        let now = now_iso();
        let outcome = validator::validate_move(
            self.graph.as_ref(),
            &current_article,
            to_article,
            &destination_article,
            current_hops,
            max_hops,
            &now,
        )?;

        let step = match outcome {
            MoveOutcome::Noop => return Ok(room.clone()),
            MoveOutcome::Step(step) => step,
        };

        let finished = matches!(step.kind, StepKind::Win | StepKind::Lose);
        {
            let run = &mut room.runs[run_idx];
            run.steps.push(step);
            if finished {
                let kind = run.steps.last().unwrap().kind;
                run.status = RunStatus::Finished;
                run.result = Some(if matches!(kind, StepKind::Win) { RunResult::Win } else { RunResult::Lose });
                run.finished_at = Some(now.clone());
            }
        }
        room.updated_at = now.clone();
        maybe_finish_room(&mut room, &now);

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
        Ok(snapshot)
    }

    /// §4.2 `add_llm`.
    pub async fn add_llm(self: &Arc<Self>, room_id: &str, req: &AddLlmRunRequest) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if room.owner_player_id != req.requested_by_player_id {
            return Err(ApiError::Unauthorized("Only the room owner can add AI runs".to_string()));
        }

        let model = req.model.trim();
        if model.is_empty() {
            return Err(ApiError::BadInput("model is required".to_string()));
        }

        if matches!(room.status, RoomStatus::Finished) {
            room.status = RoomStatus::Running;
            room.finished_at = None;
        }

        let active_llm_runs = room.runs.iter().filter(|r| matches!(r.kind, RunKind::Llm) && !r.is_finished()).count();
        if active_llm_runs >= self.config.max_llm_runs_per_room {
            return Err(ApiError::Conflict(format!(
                "Room already has {active_llm_runs} AI runs (max {})",
                self.config.max_llm_runs_per_room
            )));
        }

        let is_running = matches!(room.status, RoomStatus::Running);
        let now = now_iso();
        let run_id = ids::run_id();

        let mut run = default_run_fields(RunKind::Llm);
        run.id = run_id.clone();
        run.player_name = req.player_name.clone().or_else(|| Some(model.to_string()));
        run.model = Some(model.to_string());
        run.api_base = req.api_base.clone();
        run.openai_api_mode = req.openai_api_mode.clone();
        run.openai_reasoning_effort = req.openai_reasoning_effort.clone();
        run.openai_reasoning_summary = req.openai_reasoning_summary.clone();
        run.anthropic_thinking_budget_tokens = req.anthropic_thinking_budget_tokens;
        run.google_thinking_config = req.google_thinking_config.clone();
        run.max_steps = req.max_steps.or(Some(room.rules.max_hops));
        run.max_links = req.max_links.or(room.rules.max_links);
        run.max_tokens = req.max_tokens.or(room.rules.max_tokens);

        if is_running {
            run.status = RunStatus::Running;
            run.started_at = Some(now.clone());
            run.steps.push(Step::start(room.start_article.clone(), now.clone()));
        }

        room.runs.push(run);
        room.updated_at = now;

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);

        if is_running {
            let normalized_id = ids::normalize_room_id(room_id);
            let handle = executor::spawn(self.clone(), normalized_id, run_id.clone());
            entry.install_executor(run_id, handle);
        }

        Ok(snapshot)
    }

    /// §4.2 `cancel_run`.
    pub async fn cancel_run(&self, room_id: &str, run_id: &str, player_id: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if room.owner_player_id != player_id {
            return Err(ApiError::Unauthorized("Only the room owner can cancel AI runs".to_string()));
        }

        let run_idx = room.runs.iter().position(|r| r.id == run_id).ok_or_else(|| ApiError::NotFound("Run not found".to_string()))?;

        if !matches!(room.runs[run_idx].kind, RunKind::Llm) {
            return Err(ApiError::BadInput("Only AI runs can be cancelled".to_string()));
        }

        if room.runs[run_idx].is_finished() {
            return Ok(room.clone());
        }

        entry.cancel_executor(run_id);

        let now = now_iso();
        if matches!(room.runs[run_idx].status, RunStatus::NotStarted) {
            room.runs.remove(run_idx);
        } else {
            let start_article = room.start_article.clone();
            let run = &mut room.runs[run_idx];
            let article = run.current_article(&start_article).to_string();
            run.steps.push(Step::lose(article, now.clone(), "cancelled", None));
            run.status = RunStatus::Finished;
            run.result = Some(RunResult::Lose);
            run.finished_at = Some(now.clone());
        }

        room.updated_at = now.clone();
        maybe_finish_room(&mut room, &now);

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
        Ok(snapshot)
    }

    /// §4.2 `restart_run`.
    pub async fn restart_run(self: &Arc<Self>, room_id: &str, run_id: &str, player_id: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        if room.owner_player_id != player_id {
            return Err(ApiError::Unauthorized("Only the room owner can restart AI runs".to_string()));
        }

        let run_idx = room.runs.iter().position(|r| r.id == run_id).ok_or_else(|| ApiError::NotFound("Run not found".to_string()))?;

        if !matches!(room.runs[run_idx].kind, RunKind::Llm) {
            return Err(ApiError::BadInput("Only AI runs can be restarted".to_string()));
        }

        entry.cancel_executor(run_id);

        let now = now_iso();
        let is_room_running = matches!(room.status, RoomStatus::Running);
        let start_article = room.start_article.clone();
        {
            let run = &mut room.runs[run_idx];
            run.steps.clear();
            run.result = None;
            run.finished_at = None;
            if is_room_running {
                run.status = RunStatus::Running;
                run.started_at = Some(now.clone());
                run.steps.push(Step::start(start_article, now.clone()));
            } else {
                run.status = RunStatus::NotStarted;
                run.started_at = None;
            }
        }

        room.updated_at = now;

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);

        if is_room_running {
            let normalized_id = ids::normalize_room_id(room_id);
            let handle = executor::spawn(self.clone(), normalized_id, run_id.to_string());
            entry.install_executor(run_id.to_string(), handle);
        }

        Ok(snapshot)
    }

    /// §4.2 `abandon_run`.
    pub async fn abandon_run(&self, room_id: &str, run_id: &str, player_id: &str) -> ApiResult<Room> {
        let entry = self.entry(room_id)?;
        let mut room = entry.state.lock().await;

        let run_idx = room.runs.iter().position(|r| r.id == run_id).ok_or_else(|| ApiError::NotFound("Run not found".to_string()))?;

        if room.runs[run_idx].player_id.as_deref() != Some(player_id) {
            return Err(ApiError::Unauthorized("Only the run's own player can abandon it".to_string()));
        }

        if !matches!(room.runs[run_idx].kind, RunKind::Human) {
            return Err(ApiError::Conflict("Only human runs can be abandoned".to_string()));
        }

        if room.runs[run_idx].is_finished() {
            return Ok(room.clone());
        }

        let now = now_iso();
        let start_article = room.start_article.clone();
        {
            let run = &mut room.runs[run_idx];
            let article = run.current_article(&start_article).to_string();
            run.steps.push(Step::lose(article, now.clone(), "abandoned", None));
            run.status = RunStatus::Finished;
            run.result = Some(RunResult::Abandoned);
            run.finished_at = Some(now.clone());
        }
        room.updated_at = now.clone();
        maybe_finish_room(&mut room, &now);

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
        Ok(snapshot)
    }

    /// §4.6 presence: set a player's `connected` flag, broadcasting only if
    /// it actually changed.
    pub async fn set_connected(&self, room_id: &str, player_id: &str, connected: bool) {
        let Ok(entry) = self.entry(room_id) else { return };
        let mut room = entry.state.lock().await;
        let Some(player) = room.players.iter_mut().find(|p| p.id == player_id) else { return };
        if player.connected == connected {
            return;
        }
        player.connected = connected;
        room.updated_at = now_iso();
        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);
    }

    /// §4.1 `idleReaper`: sweep rooms whose `updated_at` is older than `ttl`.
    pub async fn reap_idle(&self, ttl: Duration) -> Vec<String> {
        let candidates: Vec<(String, Arc<RoomEntry>)> = {
            let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
            rooms.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let now = Utc::now();
        let mut expired = Vec::new();
        for (id, entry) in candidates {
            let updated_at = entry.state.lock().await.updated_at.clone();
            let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&updated_at) else { continue };
            let age = now.signed_duration_since(parsed.with_timezone(&Utc));
            let Ok(age_std) = age.to_std() else { continue };
            if age_std >= ttl {
                entry.cancel_all();
                entry.closed.notify_waiters();
                self.rooms.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
                expired.push(id);
            }
        }
        expired
    }

    pub(crate) async fn snapshot_for_run(&self, room_id: &str, run_id: &str) -> Option<ExecutorSnapshot> {
        let entry = self.entry(room_id).ok()?;
        let room = entry.state.lock().await;
        if !matches!(room.status, RoomStatus::Running) {
            return None;
        }
        let run = room.runs.iter().find(|r| r.id == run_id)?;
        if !matches!(run.status, RunStatus::Running) {
            return None;
        }

        let current_article = run.current_article(&room.start_article).to_string();
        let next_hops = run.current_hops() + 1;

        Some(ExecutorSnapshot {
            current_article: current_article.clone(),
            destination_article: room.destination_article.clone(),
            next_hops,
            max_steps: run.max_steps.unwrap_or(room.rules.max_hops),
            max_links: run.max_links.or(room.rules.max_links),
            max_tokens: run.max_tokens.or(room.rules.max_tokens),
            model: run.model.clone().unwrap_or_default(),
            hints: ProviderHints {
                api_base: run.api_base.clone(),
                openai_api_mode: run.openai_api_mode.clone(),
                openai_reasoning_effort: run.openai_reasoning_effort.clone(),
                openai_reasoning_summary: run.openai_reasoning_summary.clone(),
                anthropic_thinking_budget_tokens: run.anthropic_thinking_budget_tokens,
                google_thinking_config: run.google_thinking_config.clone(),
            },
            path_so_far: path_so_far(&room.start_article, &run.steps),
            precondition_article: current_article,
        })
    }

    pub(crate) async fn commit_run_step(
        &self,
        room_id: &str,
        run_id: &str,
        precondition_article: &str,
        step: Step,
    ) -> CommitOutcome {
        let Ok(entry) = self.entry(room_id) else { return CommitOutcome::Aborted };
        let mut room = entry.state.lock().await;
        if !matches!(room.status, RoomStatus::Running) {
            return CommitOutcome::Aborted;
        }

        let start_article = room.start_article.clone();
        let Some(run_idx) = room.runs.iter().position(|r| r.id == run_id) else { return CommitOutcome::Aborted };

        {
            let run = &room.runs[run_idx];
            if !matches!(run.status, RunStatus::Running) {
                return CommitOutcome::Aborted;
            }
            if run.current_article(&start_article) != precondition_article {
                return CommitOutcome::Aborted;
            }
        }

        let finished = matches!(step.kind, StepKind::Win | StepKind::Lose);
        let now = now_iso();
        {
            let run = &mut room.runs[run_idx];
            let kind = step.kind;
            run.steps.push(step);
            if finished {
                run.status = RunStatus::Finished;
                run.result = Some(if matches!(kind, StepKind::Win) { RunResult::Win } else { RunResult::Lose });
                run.finished_at = Some(now.clone());
            }
        }
        room.updated_at = now.clone();
        maybe_finish_room(&mut room, &now);

        let snapshot = room.clone();
        drop(room);
        entry.notify(&snapshot);

        if finished {
            CommitOutcome::Finished
        } else {
            CommitOutcome::Continue
        }
    }
}
