//! Permission Engine (C2, spec.md §4.2).
//!
//! `classify` is the pure decision function; the Consent Gate (C3, in
//! `crate::consent`) is what actually calls out to the confirmation
//! callback and manages the grant cache on an `ask` decision.

mod grants;
mod rule;

pub use grants::GrantCache;
pub use rule::{PermissionRule, RuleList};

use crate::tool::ToolKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("denied by policy: matched rule `{matched}`")]
    Denied { matched: String },
    #[error("denied by user{}", feedback.as_deref().map(|f| format!(": {f}")).unwrap_or_default())]
    DeniedByUser { feedback: Option<String> },
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

/// The three ordered rule lists a permission policy is built from
/// (spec.md §3 "Permission Rule").
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    pub allow: RuleList,
    pub ask: RuleList,
    pub deny: RuleList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Ask,
    Deny,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub decision: Decision,
    pub matched_rule: Option<String>,
    pub requires_confirmation: bool,
}

/// `classify(tool, params, kind, mode)` (spec.md §4.2).
///
/// `yolo` honors `deny` only; `plan` denies anything that isn't
/// `ReadOnly`/`Think`; otherwise walks `deny` -> `allow` -> `ask`. On no
/// match, the default comes from `kind` (`ReadOnly` allows, else ask).
pub fn classify(
    policy: &PolicyConfig,
    tool_name: &str,
    primary_arg: Option<&str>,
    kind: ToolKind,
    mode: crate::tool::PermissionMode,
) -> Classification {
    use crate::tool::PermissionMode as M;

    if let Some(rule) = policy.deny.first_match(tool_name, primary_arg) {
        return Classification {
            decision: Decision::Deny,
            matched_rule: Some(rule.as_str().to_string()),
            requires_confirmation: false,
        };
    }

    if mode == M::Yolo {
        return Classification {
            decision: Decision::Allow,
            matched_rule: None,
            requires_confirmation: false,
        };
    }

    if mode == M::Plan && !matches!(kind, ToolKind::ReadOnly | ToolKind::Think) {
        return Classification {
            decision: Decision::Deny,
            matched_rule: Some("plan-mode".to_string()),
            requires_confirmation: false,
        };
    }

    if let Some(rule) = policy.allow.first_match(tool_name, primary_arg) {
        return Classification {
            decision: Decision::Allow,
            matched_rule: Some(rule.as_str().to_string()),
            requires_confirmation: false,
        };
    }

    if let Some(rule) = policy.ask.first_match(tool_name, primary_arg) {
        return Classification {
            decision: Decision::Ask,
            matched_rule: Some(rule.as_str().to_string()),
            requires_confirmation: true,
        };
    }

    if kind.default_allows() {
        Classification {
            decision: Decision::Allow,
            matched_rule: None,
            requires_confirmation: false,
        }
    } else {
        Classification {
            decision: Decision::Ask,
            matched_rule: None,
            requires_confirmation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::PermissionMode;

    fn policy() -> PolicyConfig {
        PolicyConfig {
            allow: RuleList::parse(&["Read".into()]).unwrap(),
            ask: RuleList::default(),
            deny: RuleList::parse(&["Bash(rm -rf*)".into()]).unwrap(),
        }
    }

    #[test]
    fn yolo_honors_deny_only() {
        let c = classify(
            &policy(),
            "Bash",
            Some("rm -rf /"),
            ToolKind::Execute,
            PermissionMode::Yolo,
        );
        assert_eq!(c.decision, Decision::Deny);

        let c = classify(
            &policy(),
            "Write",
            None,
            ToolKind::Write,
            PermissionMode::Yolo,
        );
        assert_eq!(c.decision, Decision::Allow);
    }

    #[test]
    fn plan_mode_denies_non_readonly() {
        let c = classify(
            &policy(),
            "Write",
            None,
            ToolKind::Write,
            PermissionMode::Plan,
        );
        assert_eq!(c.decision, Decision::Deny);

        let c = classify(
            &policy(),
            "Read",
            None,
            ToolKind::ReadOnly,
            PermissionMode::Plan,
        );
        assert_eq!(c.decision, Decision::Allow);
    }

    #[test]
    fn deny_checked_before_allow() {
        let mut policy = policy();
        policy.allow = RuleList::parse(&["Bash".into()]).unwrap();
        let c = classify(
            &policy,
            "Bash",
            Some("rm -rf /tmp/x"),
            ToolKind::Execute,
            PermissionMode::Default,
        );
        assert_eq!(c.decision, Decision::Deny);
    }

    #[test]
    fn default_decision_derives_from_kind() {
        let c = classify(
            &PolicyConfig::default(),
            "Grep",
            None,
            ToolKind::ReadOnly,
            PermissionMode::Default,
        );
        assert_eq!(c.decision, Decision::Allow);

        let c = classify(
            &PolicyConfig::default(),
            "Write",
            None,
            ToolKind::Write,
            PermissionMode::Default,
        );
        assert_eq!(c.decision, Decision::Ask);
        assert!(c.requires_confirmation);
    }

    #[test]
    fn unmatched_ask_rule_falls_through_to_kind_default() {
        let c = classify(
            &policy(),
            "Edit",
            None,
            ToolKind::Write,
            PermissionMode::Default,
        );
        assert_eq!(c.decision, Decision::Ask);
    }
}
