//! The link-choosing protocol: prompt format, `<answer>` extraction, and the
//! retry loop that ties them to an [`LlmGateway`] call.

use std::sync::OnceLock;

use regex::Regex;

use super::{LlmCallParams, LlmGateway};
use crate::models::{LlmUsage, ProviderHints};

pub const DEFAULT_MAX_TRIES: i64 = 3;
pub const MAX_TRIES_HARD_CAP: i64 = 10;

fn answer_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<answer>(\d+)</answer>").expect("static regex is valid"))
}

pub fn build_prompt(current: &str, target: &str, path_so_far: &[String], links: &[String]) -> String {
    let formatted_links: String =
        links.iter().enumerate().map(|(idx, title)| format!("{}. {title}", idx + 1)).collect::<Vec<_>>().join("\n");
    let formatted_path = path_so_far.join(" -> ");

    format!(
        "You are playing WikiRun, trying to navigate from one Wikipedia article to another using only links.\n\n\
         IMPORTANT: You MUST put your final answer in <answer>NUMBER</answer> tags, where NUMBER is the link number.\n\
         For example, if you want to choose link 3, output <answer>3</answer>.\n\n\
         Current article: {current}\n\
         Target article: {target}\n\
         Available links (numbered):\n\
         {formatted_links}\n\n\
         Your path so far: {formatted_path}\n\n\
         Think about which link is most likely to lead you toward the target article.\n\
         First, analyze each link briefly and how it connects to your goal, then select the most promising one.\n\n\
         Remember to format your final answer by explicitly writing out the xml number tags like this: <answer>NUMBER</answer>"
    )
}

/// Extract the single `<answer>NUMBER</answer>` from a model response.
/// Returns `Ok(index)` (1-based, matching the numbered link list) or an error
/// message meant to be appended to the prompt on retry.
pub fn extract_answer(response: &str, maximum_answer: i64) -> Result<i64, String> {
    let matches: Vec<i64> = answer_tag_re().captures_iter(response).filter_map(|c| c[1].parse::<i64>().ok()).collect();

    if matches.is_empty() {
        return Err(format!("No <answer>NUMBER</answer> found. Choose a number between 1 and {maximum_answer}."));
    }
    if matches.len() > 1 {
        return Err("Multiple <answer> tags found. Respond with exactly one.".to_string());
    }

    let value = matches[0];
    if value < 1 || value > maximum_answer {
        return Err(format!("Answer out of bounds. Choose a number between 1 and {maximum_answer}."));
    }

    Ok(value)
}

pub struct ChooseLinkRequest<'a> {
    pub model: &'a str,
    pub current_article: &'a str,
    pub target_article: &'a str,
    pub path_so_far: &'a [String],
    pub links: &'a [String],
    pub max_tries: i64,
    pub max_tokens: Option<i64>,
    pub hints: ProviderHints,
}

/// Metadata describing how a `choose_link` call went, win or lose. Mirrors
/// the fields the wire response/step metadata carries, just type-safe.
#[derive(Debug, Clone, Default)]
pub struct ChooseLinkOutcome {
    pub selected_index: Option<i64>,
    pub tries: i64,
    pub llm_output: Option<String>,
    pub llm_outputs: Option<Vec<String>>,
    pub answer_errors: Option<Vec<String>>,
    pub usage: Option<LlmUsage>,
}

/// Drive the retry loop: build the prompt once, re-send with the previous
/// error appended each time the model fails to produce a parseable answer,
/// up to `max_tries` attempts (clamped to [1, MAX_TRIES_HARD_CAP]).
///
/// `tries` in the outcome is 1-based on success (the attempt number that
/// produced a valid answer) and equals `max_tries` on exhaustion.
pub async fn choose_link(
    gateway: &dyn LlmGateway,
    req: ChooseLinkRequest<'_>,
) -> crate::error::ApiResult<ChooseLinkOutcome> {
    let max_tries = req.max_tries.clamp(1, MAX_TRIES_HARD_CAP);
    let base_prompt = build_prompt(req.current_article, req.target_article, req.path_so_far, req.links);
    let mut prompt = base_prompt.clone();

    let mut llm_outputs: Vec<String> = Vec::new();
    let mut last_output: Option<String> = None;
    let mut answer_errors: Vec<String> = Vec::new();

    let mut prompt_tokens_sum = 0i64;
    let mut completion_tokens_sum = 0i64;
    let mut total_tokens_sum = 0i64;
    let mut saw_prompt_tokens = false;
    let mut saw_completion_tokens = false;
    let mut saw_any_usage = false;

    let mut chosen_index: Option<i64> = None;
    let mut used_try: Option<i64> = None;

    for try_num in 0..max_tries {
        let (response_text, usage) = gateway
            .call(LlmCallParams {
                model: req.model.to_string(),
                prompt: prompt.clone(),
                max_tokens: req.max_tokens,
                temperature: None,
                hints: req.hints.clone(),
            })
            .await?;

        llm_outputs.push(response_text.clone());
        last_output = Some(response_text.clone());

        if let Some(usage) = usage {
            if let Some(p) = usage.prompt_tokens {
                prompt_tokens_sum += p;
                saw_prompt_tokens = true;
                saw_any_usage = true;
            }
            if let Some(c) = usage.completion_tokens {
                completion_tokens_sum += c;
                saw_completion_tokens = true;
                saw_any_usage = true;
            }
            if let Some(t) = usage.total_tokens {
                total_tokens_sum += t;
                saw_any_usage = true;
            } else if usage.prompt_tokens.is_some() || usage.completion_tokens.is_some() {
                total_tokens_sum += usage.prompt_tokens.unwrap_or(0) + usage.completion_tokens.unwrap_or(0);
                saw_any_usage = true;
            }
        }

        match extract_answer(&response_text, req.links.len() as i64) {
            Ok(answer) => {
                chosen_index = Some(answer);
                used_try = Some(try_num + 1);
                break;
            }
            Err(error) => {
                prompt = format!("{base_prompt}\n\nIMPORTANT: {error}");
                answer_errors.push(error);
            }
        }
    }

    let usage = if saw_any_usage {
        Some(LlmUsage {
            prompt_tokens: saw_prompt_tokens.then_some(prompt_tokens_sum),
            completion_tokens: saw_completion_tokens.then_some(completion_tokens_sum),
            total_tokens: Some(total_tokens_sum),
        })
    } else {
        None
    };

    Ok(ChooseLinkOutcome {
        selected_index: chosen_index,
        tries: used_try.unwrap_or(max_tries),
        llm_output: last_output,
        llm_outputs: (llm_outputs.len() > 1).then_some(llm_outputs),
        answer_errors: (!answer_errors.is_empty() && chosen_index.is_none()).then_some(answer_errors),
        usage,
    })
}

/// Build the path-so-far list the prompt shows the model: the start
/// article followed by each step's article, de-duplicating consecutive
/// repeats (a `noop` move never lands in `steps`, but defensive anyway).
pub fn path_so_far(start_article: &str, steps: &[crate::models::Step]) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    for step in steps {
        if step.article.is_empty() {
            continue;
        }
        if path.last().map(|last| last == &step.article).unwrap_or(false) {
            continue;
        }
        path.push(step.article.clone());
    }

    let start_value = start_article.trim();
    if path.is_empty() {
        return if start_value.is_empty() { Vec::new() } else { vec![start_value.to_string()] };
    }

    if !start_value.is_empty() && path[0] != start_value {
        path.insert(0, start_value.to_string());
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_answer() {
        assert_eq!(extract_answer("blah <answer>3</answer>", 5), Ok(3));
    }

    #[test]
    fn rejects_missing_answer() {
        assert!(extract_answer("no tag here", 5).is_err());
    }

    #[test]
    fn rejects_multiple_answers() {
        assert!(extract_answer("<answer>1</answer> <answer>2</answer>", 5).is_err());
    }

    #[test]
    fn rejects_out_of_bounds_answer() {
        assert!(extract_answer("<answer>9</answer>", 5).is_err());
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(extract_answer("<ANSWER>2</ANSWER>", 5), Ok(2));
    }

    #[test]
    fn path_so_far_dedupes_and_prefixes_start() {
        let steps = vec![
            crate::models::Step::start("A", "t"),
            crate::models::Step::mv("B", "t", None),
            crate::models::Step::mv("B", "t", None),
        ];
        assert_eq!(path_so_far("A", &steps), vec!["A".to_string(), "B".to_string()]);
    }
}
