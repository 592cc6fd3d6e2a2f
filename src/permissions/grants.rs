//! Session grant cache (spec.md §3 "Session Grant", §4.2).
//!
//! Small and hot on the execution path, so it's `parking_lot::Mutex`-backed
//! rather than async-locked — mirroring the teacher's preference for sync
//! primitives on in-process, short-held state.

use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
struct GrantState {
    /// `session`-scoped grants, live until process end or reset.
    session: HashSet<String>,
    /// `once`-scoped grants, consumed on first use.
    once: HashSet<String>,
}

/// Keyed by exact `signature` (`tool_name:extractor(params)`) and,
/// separately, by `(tool_name, abstract_rule)` so a grant earned under one
/// concrete signature can also satisfy the tool's declared abstract rule.
#[derive(Default)]
pub struct GrantCache {
    state: Mutex<GrantState>,
}

impl GrantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if either key has a live grant, consuming it if it was
    /// `once`-scoped.
    pub fn check_and_consume(&self, signature: &str, abstract_rule: Option<&str>) -> bool {
        let mut state = self.state.lock();
        for key in [Some(signature), abstract_rule].into_iter().flatten() {
            if state.once.remove(key) {
                return true;
            }
            if state.session.contains(key) {
                return true;
            }
        }
        false
    }

    pub fn grant_session(&self, signature: &str, abstract_rule: Option<&str>) {
        let mut state = self.state.lock();
        state.session.insert(signature.to_string());
        if let Some(rule) = abstract_rule {
            state.session.insert(rule.to_string());
        }
    }

    pub fn grant_once(&self, signature: &str, abstract_rule: Option<&str>) {
        let mut state = self.state.lock();
        state.once.insert(signature.to_string());
        if let Some(rule) = abstract_rule {
            state.once.insert(rule.to_string());
        }
    }

    /// Clears every grant — full reset, or on a `plan -> default`/`plan ->
    /// *` mode transition (Open Question decision, SPEC_FULL.md §9).
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.session.clear();
        state.once.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_grant_consumed_after_first_use() {
        let cache = GrantCache::new();
        cache.grant_once("Bash:ls", None);
        assert!(cache.check_and_consume("Bash:ls", None));
        assert!(!cache.check_and_consume("Bash:ls", None));
    }

    #[test]
    fn session_grant_survives_repeated_use() {
        let cache = GrantCache::new();
        cache.grant_session("Bash:ls", None);
        assert!(cache.check_and_consume("Bash:ls", None));
        assert!(cache.check_and_consume("Bash:ls", None));
    }

    #[test]
    fn abstract_rule_grant_covers_other_signatures() {
        let cache = GrantCache::new();
        cache.grant_session("Write:a.txt", Some("Write:workspace"));
        assert!(cache.check_and_consume("Write:b.txt", Some("Write:workspace")));
    }

    #[test]
    fn clear_drops_all_grants() {
        let cache = GrantCache::new();
        cache.grant_session("Bash:ls", None);
        cache.clear();
        assert!(!cache.check_and_consume("Bash:ls", None));
    }
}
