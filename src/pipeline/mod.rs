//! Execution Pipeline (C9, spec.md §4.8).
//!
//! The linear 8-stage state machine tying every other component together.
//! Grounded on the shape of `agent/tool_execution.rs::execute_tool_call`
//! (lookup → permission check → snapshot → execute → record) but
//! generalized: that method is agent-specific and inlines its stages;
//! this pipeline is tool-kind-agnostic and exposes each stage as data so
//! it can be driven by any caller (top-level turn or nested subagent).

mod history;

pub use history::{BoundedHistory, HistoryEntry, HistorySink, JsonlFileHistorySink, NullHistorySink};

use crate::consent::ConsentGate;
use crate::errors::ToolCoreError;
use crate::hooks::{HookEngine, HookInput, MatchTarget};
use crate::permissions::{classify, Decision, PolicyConfig};
use crate::registry::ToolRegistry;
use crate::schema::SchemaValidator;
use crate::snapshot::SnapshotStore;
use crate::tool::{ExecutionContext, PermissionMode, ToolKind, ToolResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

pub struct Pipeline {
    pub registry: Arc<ToolRegistry>,
    pub policy: PolicyConfig,
    pub consent: ConsentGate,
    pub hooks: Arc<HookEngine>,
    pub snapshots: Arc<SnapshotStore>,
    pub history: Arc<BoundedHistory>,
    pub history_sink: Arc<dyn HistorySink>,
    validators: Mutex<HashMap<String, Arc<SchemaValidator>>>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: PolicyConfig,
        hooks: Arc<HookEngine>,
        snapshots: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            registry,
            policy,
            consent: ConsentGate::new(),
            hooks,
            snapshots,
            history: Arc::new(BoundedHistory::default()),
            history_sink: Arc::new(NullHistorySink),
            validators: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_history_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history_sink = sink;
        self
    }

    fn validator_for(&self, name: &str, schema: &Value) -> Result<Arc<SchemaValidator>, ToolCoreError> {
        if let Some(v) = self.validators.lock().get(name) {
            return Ok(v.clone());
        }
        let compiled = Arc::new(SchemaValidator::compile(schema)?);
        self.validators.lock().insert(name.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Run the full pipeline for one invocation (spec.md §4.8).
    #[instrument(skip(self, context, raw_params), fields(tool_name = %tool_name))]
    pub async fn run(
        &self,
        tool_name: &str,
        raw_params: Value,
        context: &ExecutionContext,
    ) -> ToolResult {
        let invocation_id = Uuid::new_v4().to_string();
        let start_time = now_rfc3339();

        let result = self.run_stages(&invocation_id, tool_name, raw_params.clone(), context).await;

        let end_time = now_rfc3339();
        let result_value = match &result {
            Ok(tr) => serde_json::to_value(tr).unwrap_or(Value::Null),
            Err(e) => serde_json::to_value(ToolResult::from_core_error(e)).unwrap_or(Value::Null),
        };

        let entry = HistoryEntry {
            invocation_id,
            tool: tool_name.to_string(),
            params: raw_params,
            result: result_value,
            start_time,
            end_time,
            context_subset: serde_json::json!({
                "session_id": &*context.session_id,
                "message_id": &*context.message_id,
            }),
        };
        self.history.push(entry.clone());
        self.history_sink.record(&entry).await;

        match result {
            Ok(tr) => tr,
            Err(e) => ToolResult::from_core_error(&e),
        }
    }

    async fn run_stages(
        &self,
        invocation_id: &str,
        tool_name: &str,
        raw_params: Value,
        context: &ExecutionContext,
    ) -> Result<ToolResult, ToolCoreError> {
        // 1. Discovery.
        let tool = self
            .registry
            .find(tool_name)
            .ok_or_else(|| ToolCoreError::ToolNotFound(tool_name.to_string()))?;
        let def = tool.definition().clone();

        // 2. Validation.
        let validator = self.validator_for(&def.name, &def.parameter_schema)?;
        validator.validate(&raw_params)?;

        // 3. Permission.
        let primary_arg = def.primary_argument(&raw_params).map(str::to_string);
        let classification = classify(
            &self.policy,
            &def.name,
            primary_arg.as_deref(),
            def.kind,
            context.permission_mode,
        );
        let affected_path = tool.affected_path(&raw_params, context);
        match classification.decision {
            Decision::Deny => {
                return Err(ToolCoreError::DeniedByPolicy {
                    matched: classification
                        .matched_rule
                        .unwrap_or_else(|| "kind-default".into()),
                })
            }
            Decision::Ask => {
                self.consent
                    .resolve_ask(
                        &def,
                        &raw_params,
                        context.permission_mode,
                        format!("Allow {}?", def.name),
                        &context.confirmation,
                        &context.cancellation,
                        affected_path.as_deref(),
                        context.workspace_root.as_deref(),
                    )
                    .await?;
            }
            Decision::Allow => {}
        }

        // 4. Pre-Hook.
        let affected_path_str = affected_path
            .as_ref()
            .and_then(|p| p.to_str())
            .map(str::to_string);
        let match_target = MatchTarget {
            tool_name: def.name.as_ref(),
            primary_path: affected_path_str.as_deref(),
            primary_command: primary_arg.as_deref(),
        };
        let hook_base_input = HookInput {
            event: "PreToolUse".into(),
            execution_id: invocation_id.to_string(),
            timestamp: now_rfc3339(),
            project_dir: context
                .workspace_root
                .as_ref()
                .and_then(|p| p.to_str())
                .map(str::to_string),
            session_id: context.session_id.to_string(),
            permission_mode: format!("{:?}", context.permission_mode),
            tool_name: Some(def.name.to_string()),
            tool_use_id: Some(invocation_id.to_string()),
            tool_input: Some(raw_params.clone()),
            tool_response: None,
        };

        let pre_hook = self
            .hooks
            .run_pre_tool(
                invocation_id,
                &match_target,
                hook_base_input,
                raw_params,
                &context.cancellation,
            )
            .await?;

        if let Some(reason) = pre_hook.deny {
            return Err(ToolCoreError::DeniedByHook { reason });
        }

        // In yolo mode, an `ask` from a hook is coerced to allow (spec.md §4.8 step 4).
        if pre_hook.ask && context.permission_mode != PermissionMode::Yolo {
            let modified_affected_path = tool.affected_path(&pre_hook.modified_input, context);
            self.consent
                .resolve_ask(
                    &def,
                    &pre_hook.modified_input,
                    context.permission_mode,
                    format!("Hook requested confirmation for {}", def.name),
                    &context.confirmation,
                    &context.cancellation,
                    modified_affected_path.as_deref(),
                    context.workspace_root.as_deref(),
                )
                .await?;
        }

        let params = pre_hook.modified_input;

        // Cancellation observed before execution aborts with `Cancelled` and
        // skips snapshot creation and execution (spec.md §4.8 cancellation semantics).
        if context.cancellation.is_cancelled() {
            return Err(ToolCoreError::Cancelled);
        }

        // 5. Snapshot.
        if matches!(def.kind, ToolKind::Write) {
            if let Some(path) = tool.affected_path(&params, context) {
                if path.exists() {
                    self.snapshots
                        .snapshot(&context.session_id, &context.message_id, &path, now_rfc3339())
                        .await?;
                }
            }
        }

        // 6. Execute.
        let execute_result = tool.execute(params.clone(), context).await;

        // 7. Post-Hook — runs even on a partial/cancelled result so hooks can
        // log/cleanup; its failures are warnings, never overriding stage 6.
        let (tool_result, execute_err) = match execute_result {
            Ok(tr) => (tr, None),
            Err(e) => (ToolResult::from_core_error(&e), Some(e)),
        };

        let post_hook_input = HookInput {
            event: "PostToolUse".into(),
            execution_id: invocation_id.to_string(),
            timestamp: now_rfc3339(),
            project_dir: context
                .workspace_root
                .as_ref()
                .and_then(|p| p.to_str())
                .map(str::to_string),
            session_id: context.session_id.to_string(),
            permission_mode: format!("{:?}", context.permission_mode),
            tool_name: Some(def.name.to_string()),
            tool_use_id: Some(invocation_id.to_string()),
            tool_input: Some(params),
            tool_response: Some(serde_json::to_value(&tool_result).unwrap_or(Value::Null)),
        };

        let output_value = serde_json::to_value(&tool_result).unwrap_or(Value::Null);
        let post_hook = self
            .hooks
            .run_post_tool(
                invocation_id,
                &match_target,
                post_hook_input,
                output_value,
                &context.cancellation,
            )
            .await;

        let mut final_result = tool_result;
        if let Ok(aggregate) = post_hook {
            if let Some(modified) = aggregate.modified_output {
                if let Ok(modified_result) = serde_json::from_value::<ToolResult>(modified) {
                    final_result = modified_result;
                }
            }
            if !aggregate.additional_context.is_empty() {
                final_result.llm_content.push_str("\n\n");
                final_result.llm_content.push_str(&aggregate.additional_context);
            }
        }
        // else: post-hook failure is a warning (spec.md §4.8); stage 6's
        // result still stands.

        if let Some(e) = execute_err {
            return Err(e);
        }

        Ok(final_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookConfig;
    use crate::permissions::RuleList;
    use crate::tool::{ConfirmationChannel, ConfirmationRequest, ConfirmationResponse, NullProgressSink, Tool, ToolDefinition};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AlwaysApprove;

    #[async_trait]
    impl ConfirmationChannel for AlwaysApprove {
        async fn confirm(&self, _req: ConfirmationRequest) -> ConfirmationResponse {
            ConfirmationResponse {
                approved: true,
                scope: Some(crate::tool::GrantScope::Once),
                ..Default::default()
            }
        }
    }

    struct EchoTool(ToolDefinition);

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.0
        }
        async fn execute(
            &self,
            params: Value,
            _context: &ExecutionContext,
        ) -> Result<ToolResult, ToolCoreError> {
            Ok(ToolResult::ok(params.to_string()))
        }
    }

    fn make_context() -> ExecutionContext {
        ExecutionContext::new(
            "sess-1",
            "msg-1",
            None,
            Arc::new(AlwaysApprove) as Arc<dyn ConfirmationChannel>,
        )
        .with_progress(Arc::new(NullProgressSink))
    }

    #[tokio::test]
    async fn read_only_tool_executes_without_confirmation() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool(ToolDefinition::new(
                "Echo",
                ToolKind::ReadOnly,
                serde_json::json!({"type": "object"}),
            ))))
            .unwrap();

        let pipeline = Pipeline::new(
            Arc::new(registry),
            PolicyConfig::default(),
            Arc::new(HookEngine::new(HookConfig::default())),
            Arc::new(SnapshotStore::new(Default::default())),
        );

        let context = make_context();
        let result = pipeline.run("Echo", serde_json::json!({"x": 1}), &context).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn unknown_tool_reports_tool_not_found() {
        let pipeline = Pipeline::new(
            Arc::new(ToolRegistry::new()),
            PolicyConfig::default(),
            Arc::new(HookEngine::new(HookConfig::default())),
            Arc::new(SnapshotStore::new(Default::default())),
        );
        let context = make_context();
        let result = pipeline.run("Nope", serde_json::json!({}), &context).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().error_type, "ToolNotFound");
    }

    #[tokio::test]
    async fn deny_rule_short_circuits_before_execution() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool(ToolDefinition::new(
                "Bash",
                ToolKind::Execute,
                serde_json::json!({"type": "object"}),
            ))))
            .unwrap();

        let policy = PolicyConfig {
            deny: RuleList::parse(&["Bash".into()]).unwrap(),
            ..Default::default()
        };

        let pipeline = Pipeline::new(
            Arc::new(registry),
            policy,
            Arc::new(HookEngine::new(HookConfig::default())),
            Arc::new(SnapshotStore::new(Default::default())),
        );

        let context = make_context();
        let result = pipeline.run("Bash", serde_json::json!({}), &context).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().error_type, "DeniedByPolicy");
    }

    #[tokio::test]
    async fn history_records_every_invocation() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoTool(ToolDefinition::new(
                "Echo",
                ToolKind::ReadOnly,
                serde_json::json!({"type": "object"}),
            ))))
            .unwrap();

        let pipeline = Pipeline::new(
            Arc::new(registry),
            PolicyConfig::default(),
            Arc::new(HookEngine::new(HookConfig::default())),
            Arc::new(SnapshotStore::new(Default::default())),
        );

        let context = make_context();
        pipeline.run("Echo", serde_json::json!({}), &context).await;
        assert_eq!(pipeline.history.snapshot().len(), 1);
    }
}
