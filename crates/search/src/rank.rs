//! Context Ranker: the additive multi-factor boost table in spec §4.8.

use crate::context::UserContext;
use cortex_graph::RelationshipGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const RECENT_WINDOW_MS: i64 = 60 * 60 * 1000;
const RECENCY_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;
const FREQUENT_TOP_N: usize = 10;

/// A candidate result before ranking: the fields the boost table needs.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub chunk_id: String,
    pub project_id: String,
    pub file_path: String,
    pub symbol_name: Option<String>,
    pub base_score: f32,
    pub modified_at_unix_ms: Option<i64>,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: String,
    pub project_id: String,
    pub file_path: String,
    pub base_score: f32,
    pub boost_breakdown: HashMap<String, f32>,
    pub final_score: f32,
    pub snippet: String,
}

/// Frequency table of files touched across the whole team, keyed by path.
/// An external collaborator the caller assembles (e.g. from aggregate
/// `UserContext` snapshots); an empty table simply contributes no boost.
pub type TeamFrequencyTable = HashMap<String, u32>;

/// Ranks candidates against a user's session context and the relationship
/// graph. Deterministic given `(candidates, ctx, graph, now_unix_ms)`.
pub fn rank(
    candidates: Vec<RankCandidate>,
    ctx: &UserContext,
    team_frequency: &TeamFrequencyTable,
    graph: &mut RelationshipGraph,
    query_keywords: &[String],
    now_unix_ms: i64,
    k: usize,
) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .map(|candidate| rank_one(candidate, ctx, team_frequency, graph, query_keywords, now_unix_ms))
        .collect();

    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.base_score.partial_cmp(&a.base_score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    ranked.truncate(k);
    ranked
}

fn rank_one(
    candidate: RankCandidate,
    ctx: &UserContext,
    team_frequency: &TeamFrequencyTable,
    graph: &mut RelationshipGraph,
    query_keywords: &[String],
    now_unix_ms: i64,
) -> RankedResult {
    let mut breakdown: HashMap<String, f32> = HashMap::new();

    let same_project = ctx.current_project.as_deref() == Some(candidate.project_id.as_str());
    let is_current_file = ctx.current_file.as_deref() == Some(candidate.file_path.as_str());
    if is_current_file || same_project {
        breakdown.insert("current_file".to_string(), 2.0);
    }

    if ctx.recently_touched(&candidate.file_path, now_unix_ms, RECENT_WINDOW_MS) {
        breakdown.insert("recent_files".to_string(), 1.5);
    }

    if ctx.is_frequent(&candidate.file_path, FREQUENT_TOP_N) {
        breakdown.insert("frequent_files".to_string(), 1.3);
    }

    if team_frequency.get(&candidate.file_path).copied().unwrap_or(0) > 0 {
        breakdown.insert("team_patterns".to_string(), 1.2);
    }

    if let Some(current_project) = &ctx.current_project {
        if current_project != &candidate.project_id {
            let weight = graph
                .edges_from(current_project, None)
                .ok()
                .and_then(|edges| edges.into_iter().find(|(id, _)| id == &candidate.project_id))
                .map(|(_, edge)| edge.weight);
            if let Some(weight) = weight {
                breakdown.insert("relationship".to_string(), 1.5 * weight);
            }
        }
    }

    if let Some(modified_at) = candidate.modified_at_unix_ms {
        let age_ms = (now_unix_ms - modified_at).max(0);
        if age_ms <= RECENCY_WINDOW_MS {
            let decay = 1.0 - (age_ms as f32 / RECENCY_WINDOW_MS as f32);
            breakdown.insert("recency".to_string(), 0.5 * decay);
        }
    }

    let haystack = format!(
        "{} {}",
        candidate.file_path.to_lowercase(),
        candidate.symbol_name.as_deref().unwrap_or("").to_lowercase()
    );
    if query_keywords.iter().any(|kw| haystack.contains(kw.as_str())) {
        breakdown.insert("exact_match".to_string(), 0.8);
    }

    let total: f32 = breakdown.values().sum();
    let final_score = candidate.base_score * (1.0 + total);

    RankedResult {
        chunk_id: candidate.chunk_id,
        project_id: candidate.project_id,
        file_path: candidate.file_path,
        base_score: candidate.base_score,
        boost_breakdown: breakdown,
        final_score,
        snippet: candidate.snippet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, project: &str, file: &str, score: f32) -> RankCandidate {
        RankCandidate {
            chunk_id: id.to_string(),
            project_id: project.to_string(),
            file_path: file.to_string(),
            symbol_name: None,
            base_score: score,
            modified_at_unix_ms: None,
            snippet: String::new(),
        }
    }

    #[test]
    fn current_file_boost_beats_an_unrelated_result() {
        let mut ctx = UserContext::new("u1");
        ctx.current_project = Some("p1".to_string());
        let mut graph = RelationshipGraph::new();
        let candidates = vec![candidate("a", "p1", "a.rs", 0.5), candidate("b", "p2", "b.rs", 0.5)];
        let ranked = rank(candidates, &ctx, &TeamFrequencyTable::new(), &mut graph, &[], 0, 10);
        assert!(ranked[0].final_score > ranked[1].final_score);
        assert!(ranked[0].boost_breakdown.contains_key("current_file"));
    }

    #[test]
    fn final_score_never_drops_below_base_score() {
        let ctx = UserContext::new("u1");
        let mut graph = RelationshipGraph::new();
        let candidates = vec![candidate("a", "p1", "a.rs", 0.4)];
        let ranked = rank(candidates, &ctx, &TeamFrequencyTable::new(), &mut graph, &[], 0, 10);
        assert!(ranked[0].final_score >= ranked[0].base_score);
    }

    #[test]
    fn relationship_boost_scales_with_edge_weight() {
        let mut ctx = UserContext::new("u1");
        ctx.current_project = Some("p1".to_string());
        let mut graph = RelationshipGraph::new();
        graph.add_node("p1");
        graph.add_node("p2");
        graph.add_edge("p1", "p2", cortex_graph::RelationshipType::ApiClient, 0.8).unwrap();
        let candidates = vec![candidate("a", "p2", "a.rs", 0.5)];
        let ranked = rank(candidates, &ctx, &TeamFrequencyTable::new(), &mut graph, &[], 0, 10);
        assert_eq!(ranked[0].boost_breakdown.get("relationship"), Some(&(1.5 * 0.8)));
    }

    #[test]
    fn exact_match_boost_fires_on_filename_keyword() {
        let ctx = UserContext::new("u1");
        let mut graph = RelationshipGraph::new();
        let candidates = vec![candidate("a", "p1", "auth_handler.rs", 0.3)];
        let keywords = vec!["auth".to_string()];
        let ranked = rank(candidates, &ctx, &TeamFrequencyTable::new(), &mut graph, &keywords, 0, 10);
        assert!(ranked[0].boost_breakdown.contains_key("exact_match"));
    }

    #[test]
    fn ties_break_on_base_score_then_chunk_id() {
        let ctx = UserContext::new("u1");
        let mut graph = RelationshipGraph::new();
        let candidates = vec![candidate("b", "p1", "b.rs", 0.5), candidate("a", "p1", "a.rs", 0.5)];
        let ranked = rank(candidates, &ctx, &TeamFrequencyTable::new(), &mut graph, &[], 0, 10);
        assert_eq!(ranked[0].chunk_id, "a");
    }
}
