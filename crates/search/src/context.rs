//! Per-user session context the ranker reads from (spec §3's `UserContext`).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

const BOUNDED_DEQUE_CAP: usize = 20;
const BOUNDED_MAP_CAP: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEntry {
    pub value: String,
    pub at_unix_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub current_file: Option<String>,
    pub current_project: Option<String>,
    pub recent_files: VecDeque<TimestampedEntry>,
    pub file_access_counts: HashMap<String, u32>,
    pub recent_queries: VecDeque<TimestampedEntry>,
    /// Access order for `file_access_counts`, oldest-touched first, so the
    /// map can evict by least-recent-access once it's at capacity.
    access_order: VecDeque<String>,
}

impl UserContext {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_file: None,
            current_project: None,
            recent_files: VecDeque::new(),
            file_access_counts: HashMap::new(),
            recent_queries: VecDeque::new(),
            access_order: VecDeque::new(),
        }
    }

    pub fn touch_file(&mut self, path: impl Into<String>, now_unix_ms: i64) {
        let path = path.into();
        self.recent_files.push_front(TimestampedEntry { value: path.clone(), at_unix_ms: now_unix_ms });
        while self.recent_files.len() > BOUNDED_DEQUE_CAP {
            self.recent_files.pop_back();
        }

        *self.file_access_counts.entry(path.clone()).or_insert(0) += 1;
        self.access_order.retain(|p| p != &path);
        self.access_order.push_back(path);
        while self.file_access_counts.len() > BOUNDED_MAP_CAP {
            if let Some(oldest) = self.access_order.pop_front() {
                self.file_access_counts.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn record_query(&mut self, query: impl Into<String>, now_unix_ms: i64) {
        self.recent_queries.push_front(TimestampedEntry { value: query.into(), at_unix_ms: now_unix_ms });
        while self.recent_queries.len() > BOUNDED_DEQUE_CAP {
            self.recent_queries.pop_back();
        }
    }

    #[must_use]
    pub fn recently_touched(&self, path: &str, now_unix_ms: i64, window_ms: i64) -> bool {
        self.recent_files
            .iter()
            .any(|e| e.value == path && now_unix_ms - e.at_unix_ms <= window_ms)
    }

    /// `true` if `path` is among the top-N most frequently accessed files.
    #[must_use]
    pub fn is_frequent(&self, path: &str, top_n: usize) -> bool {
        let mut counts: Vec<(&String, &u32)> = self.file_access_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        counts.iter().take(top_n).any(|(p, _)| p.as_str() == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_files_deque_is_bounded() {
        let mut ctx = UserContext::new("u1");
        for i in 0..30 {
            ctx.touch_file(format!("f{i}.rs"), i as i64);
        }
        assert!(ctx.recent_files.len() <= BOUNDED_DEQUE_CAP);
    }

    #[test]
    fn access_counts_evict_least_recently_touched() {
        let mut ctx = UserContext::new("u1");
        for i in 0..25 {
            ctx.touch_file(format!("f{i}.rs"), i as i64);
        }
        assert!(ctx.file_access_counts.len() <= BOUNDED_MAP_CAP);
        assert!(!ctx.file_access_counts.contains_key("f0.rs"));
    }

    #[test]
    fn repeated_touches_increment_the_count() {
        let mut ctx = UserContext::new("u1");
        ctx.touch_file("a.rs", 0);
        ctx.touch_file("a.rs", 1);
        assert_eq!(ctx.file_access_counts.get("a.rs"), Some(&2));
    }
}
