//! Permission Rule grammar (spec.md §3): bare name, `Name(pattern)`,
//! pipe-union, or regex; matched against a tool name or a (name, primary
//! argument) pair.
//!
//! Grounded on the teacher's `skills/permissions.rs::SkillPermissions`
//! pattern matching, generalized from its bare prefix-wildcard grammar to
//! the richer `Tool(glob)` / pipe-union / regex grammar this spec requires.

use regex::Regex;
use std::fmt;

#[derive(Debug, Clone)]
enum NamePattern {
    Exact(String),
    /// `/regex/` literal.
    Regex(Regex),
    /// One of a pipe-union, e.g. `Edit|Write`.
    Union(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct PermissionRule {
    raw: String,
    name: NamePattern,
    /// The `(pattern)` inside `Tool(pattern)`, if present — glob syntax
    /// against the tool's primary argument.
    arg_glob: Option<glob::Pattern>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid permission rule `{0}`: {1}")]
pub struct RuleParseError(String, String);

impl PermissionRule {
    pub fn parse(raw: &str) -> Result<Self, RuleParseError> {
        let raw_owned = raw.to_string();
        let trimmed = raw.trim();

        if let Some(inner) = trimmed.strip_prefix('/').and_then(|s| s.strip_suffix('/')) {
            let re = Regex::new(inner)
                .map_err(|e| RuleParseError(raw_owned.clone(), e.to_string()))?;
            return Ok(Self {
                raw: raw_owned,
                name: NamePattern::Regex(re),
                arg_glob: None,
            });
        }

        let (name_part, arg_glob) = if let Some(open) = trimmed.find('(') {
            if !trimmed.ends_with(')') {
                return Err(RuleParseError(
                    raw_owned,
                    "unterminated argument pattern".into(),
                ));
            }
            let name_part = &trimmed[..open];
            let pattern_str = &trimmed[open + 1..trimmed.len() - 1];
            let pattern = glob::Pattern::new(pattern_str)
                .map_err(|e| RuleParseError(raw.to_string(), e.to_string()))?;
            (name_part, Some(pattern))
        } else {
            (trimmed, None)
        };

        let name = if name_part.contains('|') {
            NamePattern::Union(name_part.split('|').map(str::to_string).collect())
        } else {
            NamePattern::Exact(name_part.to_string())
        };

        Ok(Self {
            raw: raw_owned,
            name,
            arg_glob,
        })
    }

    fn name_matches(&self, tool_name: &str) -> bool {
        match &self.name {
            NamePattern::Exact(n) => n == tool_name,
            NamePattern::Regex(re) => re.is_match(tool_name),
            NamePattern::Union(names) => names.iter().any(|n| n == tool_name),
        }
    }

    /// Does this rule match the invocation? `primary_arg` is the tool's
    /// primary argument (command / file_path), when one exists.
    pub fn matches(&self, tool_name: &str, primary_arg: Option<&str>) -> bool {
        if !self.name_matches(tool_name) {
            return false;
        }
        match (&self.arg_glob, primary_arg) {
            (None, _) => true,
            (Some(pattern), Some(arg)) => glob_match_with_double_star(pattern, arg),
            (Some(_), None) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `glob::Pattern` already supports `*`, `?`, `[...]` and, with
/// `MatchOptions::require_literal_separator = false` (the default used
/// here), lets a bare `*` cross path separators the way `**` does in
/// other globbing dialects — which is exactly the `**` behavior spec.md
/// §4.2 asks for, so a single matcher covers both.
fn glob_match_with_double_star(pattern: &glob::Pattern, text: &str) -> bool {
    pattern.matches_with(
        text,
        glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        },
    )
}

/// An ordered list of rules, evaluated first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct RuleList(pub Vec<PermissionRule>);

impl RuleList {
    pub fn parse(patterns: &[String]) -> Result<Self, RuleParseError> {
        patterns
            .iter()
            .map(|p| PermissionRule::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map(RuleList)
    }

    pub fn first_match(&self, tool_name: &str, primary_arg: Option<&str>) -> Option<&PermissionRule> {
        self.0.iter().find(|r| r.matches(tool_name, primary_arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_matches_exactly() {
        let r = PermissionRule::parse("Read").unwrap();
        assert!(r.matches("Read", None));
        assert!(!r.matches("Write", None));
    }

    #[test]
    fn argument_glob_matches_primary_arg() {
        let r = PermissionRule::parse("Bash(npm test*)").unwrap();
        assert!(r.matches("Bash", Some("npm test --watch")));
        assert!(!r.matches("Bash", Some("rm -rf /")));
        assert!(!r.matches("Bash", None));
    }

    #[test]
    fn double_star_crosses_separators() {
        let r = PermissionRule::parse("Read(src/**)").unwrap();
        assert!(r.matches("Read", Some("src/a/b/c.rs")));
    }

    #[test]
    fn pipe_union_matches_any_name() {
        let r = PermissionRule::parse("Edit|Write").unwrap();
        assert!(r.matches("Edit", None));
        assert!(r.matches("Write", None));
        assert!(!r.matches("Read", None));
    }

    #[test]
    fn regex_rule_matches() {
        let r = PermissionRule::parse("/^mcp__.*$/").unwrap();
        assert!(r.matches("mcp__server__tool", None));
        assert!(!r.matches("Read", None));
    }

    #[test]
    fn first_match_wins_in_order() {
        let list = RuleList::parse(&["Bash(rm*)".into(), "Bash".into()]).unwrap();
        let m = list.first_match("Bash", Some("rm -rf x")).unwrap();
        assert_eq!(m.as_str(), "Bash(rm*)");
    }
}
