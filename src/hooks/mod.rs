//! Hook Engine (C4, spec.md §4.3).

mod config;
mod exec;
mod matcher;

pub use config::{Hook, HookConfig, HookEvent, Matcher, ScalarOrArray, TimeoutBehavior};
pub use exec::HookInput;
pub use matcher::MatchTarget;

use exec::{run_command_hook, timeout_for, HookRunOutcome, PostHookOutput, PreHookOutput};
use matcher::matcher_fires;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("denied by hook: {reason}")]
    Denied { reason: String },
    #[error("hook timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("failed to run hook: {0}")]
    Spawn(String),
}

impl From<exec::HookExecError> for HookError {
    fn from(e: exec::HookExecError) -> Self {
        match e {
            exec::HookExecError::Spawn(m) => HookError::Spawn(m),
            exec::HookExecError::Cancelled => HookError::Spawn("cancelled".into()),
        }
    }
}

/// Result of running every matching pre-tool hook (spec.md §4.3 aggregation).
#[derive(Debug, Clone)]
pub struct PreToolAggregate {
    pub deny: Option<String>,
    pub ask: bool,
    /// The invocation's params after every hook's `modifiedInput` has been
    /// applied left-to-right.
    pub modified_input: Value,
    pub system_messages: Vec<String>,
}

/// Result of running every matching post-tool hook.
#[derive(Debug, Clone, Default)]
pub struct PostToolAggregate {
    pub additional_context: String,
    pub modified_output: Option<Value>,
    pub system_messages: Vec<String>,
}

#[derive(Default)]
pub struct HookEngine {
    config: HookConfig,
    /// `(tool_use_id, event)` re-entrancy guard (spec.md §4.3).
    seen: Mutex<HashSet<(String, HookEvent)>>,
}

impl HookEngine {
    pub fn new(config: HookConfig) -> Self {
        Self {
            config,
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn mark_seen(&self, tool_use_id: &str, event: HookEvent) -> bool {
        self.seen
            .lock()
            .insert((tool_use_id.to_string(), event))
    }

    fn matching_hooks<'a>(&'a self, event: HookEvent, target: &MatchTarget<'_>) -> Vec<&'a Hook> {
        self.config
            .matchers_for(event)
            .iter()
            .filter(|m| matcher_fires(m, target))
            .flat_map(|m| m.hooks.iter())
            .collect()
    }

    pub async fn run_pre_tool(
        &self,
        tool_use_id: &str,
        target: &MatchTarget<'_>,
        base_input: HookInput,
        params: Value,
        cancellation: &CancellationToken,
    ) -> Result<PreToolAggregate, HookError> {
        if !self.mark_seen(tool_use_id, HookEvent::PreToolUse) {
            return Ok(PreToolAggregate {
                deny: None,
                ask: false,
                modified_input: params,
                system_messages: Vec::new(),
            });
        }

        let hooks = self.matching_hooks(HookEvent::PreToolUse, target);
        let mut aggregate = PreToolAggregate {
            deny: None,
            ask: false,
            modified_input: params,
            system_messages: Vec::new(),
        };

        for hook in hooks {
            let mut input = base_input.clone();
            input.tool_input = Some(aggregate.modified_input.clone());

            let outcome = self.run_one(hook, &input, cancellation).await?;
            match outcome {
                HookRunOutcome::Parsed(v) => {
                    let parsed: PreHookOutput = serde_json::from_value(v).unwrap_or_default();
                    if let Some(msg) = parsed.system_message {
                        aggregate.system_messages.push(msg);
                    }
                    match parsed.decision.as_deref() {
                        Some("deny") => {
                            aggregate.deny =
                                Some(parsed.reason.unwrap_or_else(|| "denied by hook".into()));
                            return Ok(aggregate);
                        }
                        Some("ask") => aggregate.ask = true,
                        _ => {}
                    }
                    if let Some(modified) = parsed.modified_input {
                        aggregate.modified_input = modified;
                    }
                }
                HookRunOutcome::Notice => {}
                HookRunOutcome::NonBlockingError(_reason) => {
                    // non-zero, non-124, non-2: record warning, continue.
                }
                HookRunOutcome::BlockingError(reason) => {
                    aggregate.deny = Some(reason);
                    return Ok(aggregate);
                }
                HookRunOutcome::Timeout(behavior) => match behavior {
                    TimeoutBehavior::Ignore => {}
                    TimeoutBehavior::Deny => {
                        aggregate.deny = Some("hook timed out".into());
                        return Ok(aggregate);
                    }
                    TimeoutBehavior::Ask => aggregate.ask = true,
                },
            }
        }

        Ok(aggregate)
    }

    pub async fn run_post_tool(
        &self,
        tool_use_id: &str,
        target: &MatchTarget<'_>,
        base_input: HookInput,
        output: Value,
        cancellation: &CancellationToken,
    ) -> Result<PostToolAggregate, HookError> {
        if !self.mark_seen(tool_use_id, HookEvent::PostToolUse) {
            return Ok(PostToolAggregate::default());
        }

        let hooks = self.matching_hooks(HookEvent::PostToolUse, target);
        let mut aggregate = PostToolAggregate {
            additional_context: String::new(),
            modified_output: Some(output),
            system_messages: Vec::new(),
        };

        for hook in hooks {
            let mut input = base_input.clone();
            input.tool_response = aggregate.modified_output.clone();

            let outcome = self.run_one(hook, &input, cancellation).await?;
            if let HookRunOutcome::Parsed(v) = outcome {
                let parsed: PostHookOutput = serde_json::from_value(v).unwrap_or_default();
                if let Some(msg) = parsed.system_message {
                    aggregate.system_messages.push(msg);
                }
                if let Some(ctx) = parsed.additional_context {
                    if !aggregate.additional_context.is_empty() {
                        aggregate.additional_context.push('\n');
                    }
                    aggregate.additional_context.push_str(&ctx);
                }
                if let Some(modified) = parsed.modified_output {
                    aggregate.modified_output = Some(modified);
                }
            }
        }

        Ok(aggregate)
    }

    async fn run_one(
        &self,
        hook: &Hook,
        input: &HookInput,
        cancellation: &CancellationToken,
    ) -> Result<HookRunOutcome, HookError> {
        match hook {
            Hook::Command { command, .. } => {
                let (timeout, behavior) = timeout_for(hook);
                let started = std::time::Instant::now();
                match run_command_hook(command, timeout, behavior, input, cancellation).await {
                    Ok(outcome) => Ok(outcome),
                    Err(exec::HookExecError::Cancelled) => Err(HookError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }),
                    Err(e) => Err(e.into()),
                }
            }
            Hook::Prompt { .. } => {
                // Prompt hooks surface a question to the user rather than
                // spawning a process; routed through the Consent Gate by the
                // pipeline, not executed here.
                Ok(HookRunOutcome::Notice)
            }
        }
    }
}
