use crate::error::{ApiError, ApiResult};
use crate::graph::ArticleGraph;
use crate::models::Step;

/// Result of validating a proposed move: either a no-op (the player clicked
/// through to the article they're already standing on) or the `Step` to
/// append to the run.
pub enum MoveOutcome {
    Noop,
    Step(Step),
}

fn strip_wiki_fragment(title: &str) -> &str {
    title.split('#').next().unwrap_or(title)
}

fn normalize_spaces(title: &str) -> String {
    title.replace('_', " ").trim().to_string()
}

pub fn titles_match(a: &str, b: &str) -> bool {
    normalize_spaces(a).to_lowercase() == normalize_spaces(b).to_lowercase()
}

/// Validate a proposed move from `current_article` to `to_article` given the
/// room's destination and hop budget. Pure function over an [`ArticleGraph`]:
/// no room state is read or mutated here, callers own the transaction.
pub fn validate_move(
    graph: &dyn ArticleGraph,
    current_article: &str,
    to_article: &str,
    destination_article: &str,
    current_hops: i64,
    max_hops: i64,
    at: &str,
) -> ApiResult<MoveOutcome> {
    let to_raw = normalize_spaces(strip_wiki_fragment(to_article));
    if to_raw.is_empty() {
        return Err(ApiError::BadInput("to_article is required".to_string()));
    }

    let resolved = graph
        .resolve_title(&to_raw)
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    let canonical_next = graph.canonical_title(&resolved).unwrap_or_else(|| resolved.clone());

    let destination_raw = normalize_spaces(destination_article);
    if destination_raw.is_empty() {
        return Err(ApiError::BadInput("destination_article is required".to_string()));
    }

    let current_raw = normalize_spaces(strip_wiki_fragment(current_article));
    if current_raw.is_empty() {
        return Err(ApiError::BadInput("current_article is required".to_string()));
    }

    let current_resolved = graph.resolve_title(&current_raw).unwrap_or_else(|| current_raw.clone());
    let canonical_current = graph.canonical_title(&current_resolved).unwrap_or_else(|| current_resolved.clone());

    if titles_match(&canonical_current, &canonical_next) {
        return Ok(MoveOutcome::Noop);
    }

    let current_hops = if current_hops > 0 { current_hops } else { 0 };
    let next_hops = current_hops + 1;
    let max_hops = if max_hops > 0 { max_hops } else { 20 };

    let (title, links) = graph
        .article_with_links(&canonical_current)
        .ok_or_else(|| ApiError::BadInput(format!("Current article not found ({canonical_current})")))?;

    if !links.contains(&resolved) && !links.contains(&canonical_next) {
        return Err(ApiError::BadInput(format!("Invalid move: '{resolved}' is not a link from '{title}'")));
    }

    let mut reached_target = titles_match(&canonical_next, &destination_raw);
    if !reached_target {
        if let Some(canonical_target) = graph.canonical_title(&destination_raw) {
            reached_target = titles_match(&canonical_next, &canonical_target);
        }
    }

    let step = if reached_target {
        Step::win(destination_raw, at.to_string(), None)
    } else if next_hops >= max_hops {
        let mut extra = serde_json::Map::new();
        extra.insert("max_hops".to_string(), serde_json::Value::from(max_hops));
        Step::lose(canonical_next, at.to_string(), "max_hops", Some(extra))
    } else {
        Step::mv(canonical_next, at.to_string(), None)
    };

    Ok(MoveOutcome::Step(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeGraph;
    use std::collections::HashMap;

    fn graph() -> FakeGraph {
        let mut articles = HashMap::new();
        articles.insert("Start".to_string(), vec!["Middle".to_string(), "Other".to_string()]);
        articles.insert("Middle".to_string(), vec!["Destination".to_string()]);
        articles.insert("Destination".to_string(), vec![]);
        articles.insert("Other".to_string(), vec!["Dead End".to_string()]);
        articles.insert("Dead End".to_string(), vec![]);
        FakeGraph { articles }
    }

    #[test]
    fn noop_when_clicking_current_article() {
        let g = graph();
        let outcome = validate_move(&g, "Start", "start", "Destination", 0, 20, "t").unwrap();
        assert!(matches!(outcome, MoveOutcome::Noop));
    }

    #[test]
    fn rejects_move_to_non_linked_article() {
        let g = graph();
        let err = validate_move(&g, "Start", "Destination", "Destination", 0, 20, "t").unwrap_err();
        assert!(matches!(err, ApiError::BadInput(_)));
    }

    #[test]
    fn move_to_linked_article_is_a_move_step() {
        let g = graph();
        let outcome = validate_move(&g, "Start", "Middle", "Destination", 0, 20, "t").unwrap();
        match outcome {
            MoveOutcome::Step(step) => assert_eq!(step.article, "Middle"),
            MoveOutcome::Noop => panic!("expected a move step"),
        }
    }

    #[test]
    fn reaching_destination_wins() {
        let g = graph();
        let outcome = validate_move(&g, "Middle", "Destination", "Destination", 1, 20, "t").unwrap();
        match outcome {
            MoveOutcome::Step(step) => assert_eq!(step.kind, crate::models::StepKind::Win),
            MoveOutcome::Noop => panic!("expected a win step"),
        }
    }

    #[test]
    fn exhausting_hop_budget_loses() {
        let g = graph();
        let outcome = validate_move(&g, "Start", "Other", "Destination", 19, 20, "t").unwrap();
        match outcome {
            MoveOutcome::Step(step) => assert_eq!(step.kind, crate::models::StepKind::Lose),
            MoveOutcome::Noop => panic!("expected a lose step"),
        }
    }

    #[test]
    fn unknown_article_is_not_found() {
        let g = graph();
        let err = validate_move(&g, "Start", "Nowhere", "Destination", 0, 20, "t").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
