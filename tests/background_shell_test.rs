//! Background shell scenario (spec.md §8 S5): `Bash(run_in_background=true)`
//! returns immediately with a pollable id, and `TaskOutput` drains its
//! output once the process has exited.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use toolcore::{
    ConfirmationChannel, ConfirmationRequest, ConfirmationResponse, ExecutionContext, HookConfig,
    HookEngine, Pipeline, PolicyConfig, SnapshotStore, SnapshotStoreConfig, ToolRegistry,
};
use toolcore::subagent::{AgentLoopRunner, SubagentScheduler};
use toolcore::subprocess::SubprocessManager;
use toolcore::tools::{ShellTool, TaskOutputTool};
use toolcore::ToolResult;
use toolcore::errors::ToolCoreError;

struct Always;

#[async_trait]
impl ConfirmationChannel for Always {
    async fn confirm(&self, _req: ConfirmationRequest) -> ConfirmationResponse {
        ConfirmationResponse {
            approved: true,
            ..Default::default()
        }
    }
}

struct UnusedRunner;

#[async_trait]
impl AgentLoopRunner for UnusedRunner {
    async fn run(&self, goal: String, _context: ExecutionContext) -> Result<ToolResult, ToolCoreError> {
        Ok(ToolResult::ok(format!("did: {goal}")))
    }
}

#[tokio::test]
async fn s5_backgrounded_command_is_polled_to_completion() {
    let dir = tempdir().unwrap();
    let subprocess = Arc::new(SubprocessManager::new(4));
    let scheduler = Arc::new(SubagentScheduler::new(Arc::new(UnusedRunner), dir.path().to_path_buf(), 5).await);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ShellTool::new(subprocess.clone()))).unwrap();
    registry
        .register(Arc::new(TaskOutputTool::new(scheduler, subprocess.background.clone())))
        .unwrap();

    let hooks = Arc::new(HookEngine::new(HookConfig::default()));
    let snapshots = Arc::new(SnapshotStore::new(SnapshotStoreConfig {
        root_dir: dir.path().join(".snapshots"),
        ..Default::default()
    }));
    let pipeline = Pipeline::new(Arc::new(registry), PolicyConfig::default(), hooks, snapshots);

    let confirmation: Arc<dyn ConfirmationChannel> = Arc::new(Always);
    let ctx = ExecutionContext::new("s1", "m1", Some(dir.path().to_path_buf()), confirmation);

    let started = pipeline
        .run("Bash", json!({"command": "echo background-output", "run_in_background": true}), &ctx)
        .await;
    assert!(started.success, "{:?}", started.error);
    let metadata = started.metadata.expect("background metadata");
    assert_eq!(metadata["background"], true);
    let session_id = metadata["session_id"].as_str().unwrap().to_string();
    assert!(session_id.starts_with("bash_"));

    let polled = pipeline
        .run("TaskOutput", json!({"task_id": session_id, "timeout_secs": 5}), &ctx)
        .await;
    assert!(polled.success, "{:?}", polled.error);
    assert!(polled.llm_content.contains("background-output"));
    assert_eq!(polled.metadata.unwrap()["status"], "exited");
}
