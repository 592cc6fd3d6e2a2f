//! Consent Gate (C3, spec.md §4.2 second half).
//!
//! Sits behind an `ask` decision from `permissions::classify`: consults the
//! grant cache, falls back to the confirmation callback, and caches the
//! result per the callback's requested scope. Grounded on the shape of
//! `tools/context.rs::AgentToolContext`'s elicitation channel in the
//! teacher — a confirmation is just another injected async callback.

use crate::permissions::{GrantCache, PermissionError};
use crate::tool::{ConfirmationChannel, ConfirmationRequest, GrantScope, PermissionMode, ToolDefinition};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub struct ConsentGate {
    grants: GrantCache,
}

impl Default for ConsentGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentGate {
    pub fn new() -> Self {
        Self {
            grants: GrantCache::new(),
        }
    }

    pub fn reset_session(&self) {
        self.grants.clear();
    }

    /// Called on a `plan -> default`/`plan -> *` mode transition (Open
    /// Question decision, SPEC_FULL.md §9): grants earned under a more
    /// permissive mode must not silently carry across a trust boundary.
    pub fn on_mode_transition(&self, from: PermissionMode, to: PermissionMode) {
        if from == PermissionMode::Plan && to != PermissionMode::Plan {
            self.grants.clear();
        }
    }

    fn signature(def: &ToolDefinition, params: &Value) -> String {
        match def.signature_extractor {
            Some(f) => format!("{}:{}", def.name, f(params)),
            None => format!("{}:{}", def.name, params),
        }
    }

    fn abstract_rule(def: &ToolDefinition, params: &Value) -> Option<String> {
        def.abstract_rule_extractor.and_then(|f| f(params))
    }

    /// Resolve an `ask` decision. Returns `Ok(())` on approval, or the
    /// appropriate `PermissionError` on denial/cancellation.
    ///
    /// `affected_path`/`workspace_root` scope the `autoEdit` auto-approval
    /// (spec.md §4.2: writes "within the workspace" only) — when either is
    /// absent, or the path falls outside the root, `autoEdit` falls through
    /// to the normal ask flow instead of silently approving.
    #[allow(clippy::too_many_arguments)]
    pub async fn resolve_ask(
        &self,
        def: &ToolDefinition,
        params: &Value,
        mode: PermissionMode,
        message: impl Into<String>,
        confirmation: &Arc<dyn ConfirmationChannel>,
        cancellation: &tokio_util::sync::CancellationToken,
        affected_path: Option<&Path>,
        workspace_root: Option<&Path>,
    ) -> Result<(), PermissionError> {
        let signature = Self::signature(def, params);
        let abstract_rule = Self::abstract_rule(def, params);

        // `autoEdit` silently upgrades file-writing tools, but only within
        // the workspace (spec.md §4.2) — a write outside it still asks.
        if mode == PermissionMode::AutoEdit
            && def.kind == crate::tool::ToolKind::Write
            && matches!((affected_path, workspace_root), (Some(path), Some(root)) if path.starts_with(root))
        {
            return Ok(());
        }

        if self
            .grants
            .check_and_consume(&signature, abstract_rule.as_deref())
        {
            return Ok(());
        }

        let request = ConfirmationRequest::permission(&def.name, params, message);

        let response = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(PermissionError::Cancelled),
            resp = confirmation.confirm(request) => resp,
        };

        if !response.approved {
            return Err(PermissionError::DeniedByUser {
                feedback: response.feedback,
            });
        }

        match response.scope {
            Some(GrantScope::Session) => {
                self.grants
                    .grant_session(&signature, abstract_rule.as_deref());
            }
            Some(GrantScope::Once) | None => {
                self.grants
                    .grant_once(&signature, abstract_rule.as_deref());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ConfirmationResponse, ToolKind};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct Always(bool);

    #[async_trait]
    impl ConfirmationChannel for Always {
        async fn confirm(&self, _req: ConfirmationRequest) -> ConfirmationResponse {
            ConfirmationResponse {
                approved: self.0,
                scope: Some(GrantScope::Session),
                ..Default::default()
            }
        }
    }

    fn def() -> ToolDefinition {
        ToolDefinition::new("Write", ToolKind::Write, json!({}))
    }

    #[tokio::test]
    async fn approval_caches_session_grant() {
        let gate = ConsentGate::new();
        let channel: Arc<dyn ConfirmationChannel> = Arc::new(Always(true));
        let token = CancellationToken::new();
        let d = def();
        let params = json!({"file_path": "a.txt"});

        gate.resolve_ask(&d, &params, PermissionMode::Default, "write?", &channel, &token, None, None)
            .await
            .unwrap();

        // Second call hits the cache; swap in a channel that would deny to prove it.
        let denying: Arc<dyn ConfirmationChannel> = Arc::new(Always(false));
        gate.resolve_ask(&d, &params, PermissionMode::Default, "write?", &denying, &token, None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn denial_surfaces_feedback() {
        let gate = ConsentGate::new();
        let channel: Arc<dyn ConfirmationChannel> = Arc::new(Always(false));
        let token = CancellationToken::new();
        let d = def();
        let err = gate
            .resolve_ask(&d, &json!({}), PermissionMode::Default, "write?", &channel, &token, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::DeniedByUser { .. }));
    }

    #[tokio::test]
    async fn auto_edit_upgrades_write_tools_within_the_workspace_silently() {
        let gate = ConsentGate::new();
        let channel: Arc<dyn ConfirmationChannel> = Arc::new(Always(false));
        let token = CancellationToken::new();
        let d = def();
        let root = std::path::Path::new("/workspace");
        let path = std::path::Path::new("/workspace/a.txt");
        gate.resolve_ask(
            &d,
            &json!({}),
            PermissionMode::AutoEdit,
            "write?",
            &channel,
            &token,
            Some(path),
            Some(root),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn auto_edit_falls_through_to_ask_outside_the_workspace() {
        let gate = ConsentGate::new();
        let channel: Arc<dyn ConfirmationChannel> = Arc::new(Always(false));
        let token = CancellationToken::new();
        let d = def();
        let root = std::path::Path::new("/workspace");
        let path = std::path::Path::new("/etc/passwd");
        let err = gate
            .resolve_ask(
                &d,
                &json!({}),
                PermissionMode::AutoEdit,
                "write?",
                &channel,
                &token,
                Some(path),
                Some(root),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::DeniedByUser { .. }));
    }

    #[test]
    fn plan_to_default_transition_clears_grants() {
        let gate = ConsentGate::new();
        gate.grants.grant_session("Write:a.txt", None);
        gate.on_mode_transition(PermissionMode::Plan, PermissionMode::Default);
        assert!(!gate.grants.check_and_consume("Write:a.txt", None));
    }
}
