use serde::{Deserialize, Serialize};

// --- Room rules ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRules {
    pub max_hops: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_links: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub include_image_links: bool,
    #[serde(default)]
    pub disable_links_view: bool,
}

impl Default for RoomRules {
    fn default() -> Self {
        Self {
            max_hops: 20,
            max_links: None,
            max_tokens: None,
            include_image_links: false,
            disable_links_view: false,
        }
    }
}

impl RoomRules {
    /// Clamp user-supplied rules to sane values, falling back to defaults for
    /// anything non-positive.
    pub fn normalize(raw: Option<RoomRules>) -> RoomRules {
        let Some(raw) = raw else {
            return RoomRules::default();
        };

        RoomRules {
            max_hops: if raw.max_hops > 0 { raw.max_hops } else { 20 },
            max_links: raw.max_links.filter(|v| *v > 0),
            max_tokens: raw.max_tokens.filter(|v| *v > 0),
            include_image_links: raw.include_image_links,
            disable_links_view: raw.disable_links_view,
        }
    }
}

// --- Players ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub joined_at: String,
}

// --- Steps ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Start,
    Move,
    Win,
    Lose,
}

/// A single step of a run. `metadata` is an open map rather than a fixed
/// struct: human moves carry none, LLM moves carry usage/try counters, and
/// terminal steps carry a `reason`. Keeping it as JSON on the wire matches
/// what every client already expects; the constructors below are what give
/// call sites type safety when building one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub article: String,
    pub at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Step {
    pub fn start(article: impl Into<String>, at: impl Into<String>) -> Self {
        Step { kind: StepKind::Start, article: article.into(), at: at.into(), metadata: None }
    }

    pub fn mv(article: impl Into<String>, at: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        Step { kind: StepKind::Move, article: article.into(), at: at.into(), metadata }
    }

    pub fn win(article: impl Into<String>, at: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        Step { kind: StepKind::Win, article: article.into(), at: at.into(), metadata }
    }

    /// Build a terminal `lose` step. `reason` always ends up in the resulting
    /// metadata object; `extra` fields (e.g. `max_hops`, `error`, LLM usage
    /// counters) are merged alongside it.
    pub fn lose(
        article: impl Into<String>,
        at: impl Into<String>,
        reason: &str,
        extra: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        let mut map = extra.unwrap_or_default();
        map.insert("reason".to_string(), serde_json::Value::String(reason.to_string()));
        Step {
            kind: StepKind::Lose,
            article: article.into(),
            at: at.into(),
            metadata: Some(serde_json::Value::Object(map)),
        }
    }
}

// --- Runs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Human,
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Win,
    Lose,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub kind: RunKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_reasoning_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_thinking_budget_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_thinking_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_links: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub steps: Vec<Step>,
}

impl Run {
    /// The article this run is currently standing on: the last step's
    /// article, or the room's start article if no steps have been taken yet.
    pub fn current_article<'a>(&'a self, start_article: &'a str) -> &'a str {
        self.steps.last().map(|s| s.article.as_str()).unwrap_or(start_article)
    }

    pub fn current_hops(&self) -> i64 {
        (self.steps.len() as i64 - 1).max(0)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Finished)
    }
}

// --- Room ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub owner_player_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub start_article: String,
    pub destination_article: String,
    pub rules: RoomRules,
    pub status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub players: Vec<Player>,
    pub runs: Vec<Run>,
}

impl Room {
    pub fn run_for_player(&self, player_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.player_id.as_deref() == Some(player_id))
    }

    pub fn run_by_id(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == run_id)
    }

    pub fn run_by_id_mut(&mut self, run_id: &str) -> Option<&mut Run> {
        self.runs.iter_mut().find(|r| r.id == run_id)
    }

    pub fn player_by_id(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

// --- Article graph DTOs ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub title: String,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveTitleResponse {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTitleResponse {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub article_count: i64,
}

// --- Room lifecycle request/response bodies ---

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub start_article: String,
    pub destination_article: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub rules: Option<RoomRules>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub owner_player_id: String,
    pub join_url: String,
    pub room: Room,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub player_id: String,
    pub room: Room,
}

#[derive(Debug, Deserialize)]
pub struct StartRoomRequest {
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NewRoundRequest {
    pub player_id: String,
    pub start_article: String,
    pub destination_article: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRoomRequest {
    pub player_id: String,
    pub to_article: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateMoveRequest {
    pub current_article: String,
    pub to_article: String,
    pub destination_article: String,
    pub current_hops: i64,
    pub max_hops: i64,
}

#[derive(Debug, Serialize)]
pub struct ValidateMoveResponse {
    #[serde(default)]
    pub noop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

#[derive(Debug, Deserialize)]
pub struct AddLlmRunRequest {
    pub model: String,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub openai_api_mode: Option<String>,
    #[serde(default)]
    pub openai_reasoning_effort: Option<String>,
    #[serde(default)]
    pub openai_reasoning_summary: Option<String>,
    #[serde(default)]
    pub anthropic_thinking_budget_tokens: Option<i64>,
    #[serde(default)]
    pub google_thinking_config: Option<serde_json::Value>,
    #[serde(default)]
    pub max_steps: Option<i64>,
    #[serde(default)]
    pub max_links: Option<i64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    pub requested_by_player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomRunControlRequest {
    pub requested_by_player_id: String,
}

// --- LLM gateway / protocol DTOs ---

/// Provider-specific hints that pass straight through to the LLM gateway.
/// Grouped because almost every LLM-facing request body repeats the same set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderHints {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub openai_api_mode: Option<String>,
    #[serde(default)]
    pub openai_reasoning_effort: Option<String>,
    #[serde(default)]
    pub openai_reasoning_summary: Option<String>,
    #[serde(default)]
    pub anthropic_thinking_budget_tokens: Option<i64>,
    #[serde(default)]
    pub google_thinking_config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmChatRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(flatten)]
    pub hints: ProviderHints,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LlmChatResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
pub struct LlmChooseLinkRequest {
    pub model: String,
    pub current_article: String,
    pub target_article: String,
    #[serde(default)]
    pub path_so_far: Vec<String>,
    pub links: Vec<String>,
    #[serde(default)]
    pub max_tries: Option<i64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(flatten)]
    pub hints: ProviderHints,
}

#[derive(Debug, Serialize)]
pub struct LlmChooseLinkResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_index: Option<i64>,
    pub tries: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_outputs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LocalLlmStepRequest {
    pub start_article: String,
    pub destination_article: String,
    pub model: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(flatten)]
    pub hints: ProviderHints,
    /// Defaults to 20 (the room rules default, SPEC_FULL.md §6.1) when omitted.
    #[serde(default)]
    pub max_steps: Option<i64>,
    #[serde(default)]
    pub max_links: Option<i64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LocalLlmStepResponse {
    pub step: Step,
}
