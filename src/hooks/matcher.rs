//! Matcher predicate evaluation (spec.md §4.3).

use super::config::{Matcher, ScalarOrArray};
use glob::Pattern;
use regex::Regex;

fn any_match(values: &[String], candidate: &str) -> bool {
    values.iter().any(|v| {
        if let Some(inner) = v.strip_prefix('/').and_then(|s| s.strip_suffix('/')) {
            Regex::new(inner).map(|re| re.is_match(candidate)).unwrap_or(false)
        } else if let Ok(pattern) = Pattern::new(v) {
            pattern.matches(candidate)
        } else {
            v == candidate
        }
    })
}

/// One invocation's projections used for matcher evaluation.
pub struct MatchTarget<'a> {
    pub tool_name: &'a str,
    pub primary_path: Option<&'a str>,
    pub primary_command: Option<&'a str>,
}

/// A matcher fires when *all* its present predicates hold (spec.md §4.3).
pub fn matcher_fires(matcher: &Matcher, target: &MatchTarget<'_>) -> bool {
    if let Some(ScalarOrArray::Scalar(_) | ScalarOrArray::Array(_)) = &matcher.tools {
        let values = matcher.tools.as_ref().unwrap().values();
        if !any_match(values, target.tool_name) {
            return false;
        }
    }
    if let Some(paths) = &matcher.paths {
        match target.primary_path {
            Some(p) if any_match(paths.values(), p) => {}
            _ => return false,
        }
    }
    if let Some(commands) = &matcher.commands {
        match target.primary_command {
            Some(c) if any_match(commands.values(), c) => {}
            _ => return false,
        }
    }
    true
}
