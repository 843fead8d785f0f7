//! The tool engine (§4.5, C3): the single entry point that ties the
//! registry, validator, concurrency controller, and audit log together.

use crate::concurrency::ConcurrencyController;
use crate::registry::ToolRegistry;
use crate::validator;
use async_trait::async_trait;
use conductor_knowledge::{AuditStore, CallOutcome, ToolCallRecord};
use conductor_protocol::{CallerType, DurationMs, ToolEntryKind, ToolError, ToolExecutor, ToolStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

/// Caller context threaded through one `execute` call, for audit attribution.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Who initiated the call.
    pub caller_type: CallerType,
    /// Caller's own identifier.
    pub caller_id: String,
    /// The session this call happened within, if any.
    pub session_id: Option<String>,
    /// The workflow this call happened within, if any.
    pub workflow_id: Option<String>,
    /// The run this call happened within, if any.
    pub run_id: Option<String>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            caller_type: CallerType::WorkflowNode,
            caller_id: String::new(),
            session_id: None,
            workflow_id: None,
            run_id: None,
        }
    }
}

/// Result of one `execute` call (§4.5: "success flag, output, and, on
/// failure, error text and error kind").
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// Whether the call succeeded.
    pub success: bool,
    /// The tool's output, if successful.
    pub output: Option<serde_json::Value>,
    /// Error text, if failed.
    pub error: Option<String>,
    /// Stable error-kind tag, if failed.
    pub error_kind: Option<conductor_protocol::ErrorKind>,
    /// How long the call took end to end.
    pub duration: DurationMs,
}

/// An executor that posts validated params as a JSON body to a fixed URL
/// and returns the decoded JSON response. Used for `ToolEntryKind::Http`.
pub struct HttpToolExecutor {
    client: reqwest::Client,
    url: String,
}

impl HttpToolExecutor {
    /// Build an executor targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let response = self
            .client
            .post(&self.url)
            .json(&params)
            .send()
            .await
            .map_err(|e| ToolError::Other(Box::new(e)))?;
        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!("http status {}", response.status())));
        }
        response.json().await.map_err(|e| ToolError::Other(Box::new(e)))
    }
}

/// Ties together the catalog, parameter validation, per-name concurrency,
/// and audit recording behind one `execute` call (§4.5).
pub struct ToolEngine {
    registry: Arc<ToolRegistry>,
    concurrency: Arc<ConcurrencyController>,
    audit: RwLock<Option<Arc<dyn AuditStore>>>,
    executors: RwLock<HashMap<String, Arc<dyn ToolExecutor>>>,
    lenient_params: bool,
}

impl ToolEngine {
    /// Build an engine over an existing registry and concurrency controller.
    pub fn new(registry: Arc<ToolRegistry>, concurrency: Arc<ConcurrencyController>) -> Self {
        Self { registry, concurrency, audit: RwLock::new(None), executors: RwLock::new(HashMap::new()), lenient_params: false }
    }

    /// Install the audit sink (§4.5 `set_knowledge_store`).
    pub async fn set_knowledge_store(&self, store: Arc<dyn AuditStore>) {
        *self.audit.write().await = Some(store);
    }

    /// Register an executor for a builtin/script handler name.
    pub async fn register_executor(&self, handler: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.executors.write().await.insert(handler.into(), executor);
    }

    async fn resolve_executor(&self, entry: &ToolEntryKind) -> Option<Arc<dyn ToolExecutor>> {
        match entry {
            ToolEntryKind::Http { url } => Some(Arc::new(HttpToolExecutor::new(url.clone()))),
            ToolEntryKind::Builtin { handler } | ToolEntryKind::ScriptA { handler } | ToolEntryKind::ScriptB { handler } => {
                self.executors.read().await.get(handler).cloned()
            }
            _ => None,
        }
    }

    /// Validate, dispatch, measure, and audit one tool call (§4.5 `execute`).
    pub async fn execute(&self, tool_name: &str, params: serde_json::Value, ctx: &CallContext) -> ToolCallOutcome {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!("tool_call", tool_name, trace_id = %trace_id);
        self.execute_inner(tool_name, params, ctx, trace_id).instrument(span).await
    }

    async fn execute_inner(
        &self,
        tool_name: &str,
        params: serde_json::Value,
        ctx: &CallContext,
        trace_id: String,
    ) -> ToolCallOutcome {
        let started = Instant::now();

        let Some(tool) = self.registry.get_by_name(tool_name).await else {
            return self.fail(tool_name, ctx, params, &trace_id, started, ToolError::NotFound(tool_name.to_string())).await;
        };
        if tool.status == ToolStatus::Deprecated {
            return self.fail(tool_name, ctx, params, &trace_id, started, ToolError::Deprecated(tool_name.to_string())).await;
        }

        let filled_params = match validator::validate(&tool.parameters, &params, self.lenient_params) {
            Ok(v) => v,
            Err(issues) => {
                return self
                    .fail(tool_name, ctx, params, &trace_id, started, ToolError::InvalidParams(issues))
                    .await
            }
        };

        let slot = match self.concurrency.acquire(tool_name).await {
            Ok(slot) => slot,
            Err(e) => return self.fail(tool_name, ctx, filled_params, &trace_id, started, e).await,
        };

        let Some(executor) = self.resolve_executor(&tool.entry).await else {
            drop(slot);
            return self
                .fail(tool_name, ctx, filled_params, &trace_id, started, ToolError::ExecutionFailed("no executor registered".into()))
                .await;
        };

        let result = executor.call(filled_params.clone()).await;
        drop(slot);

        match result {
            Ok(output) => {
                self.registry.record_usage(&tool.id).await;
                let duration = DurationMs::from(started.elapsed());
                self.record(tool_name, ctx, filled_params, CallOutcome::Success { output: output.clone() }, duration, &trace_id)
                    .await;
                ToolCallOutcome { success: true, output: Some(output), error: None, error_kind: None, duration }
            }
            Err(e) => self.fail(tool_name, ctx, filled_params, &trace_id, started, e).await,
        }
    }

    async fn fail(
        &self,
        tool_name: &str,
        ctx: &CallContext,
        params: serde_json::Value,
        trace_id: &str,
        started: Instant,
        error: ToolError,
    ) -> ToolCallOutcome {
        let duration = DurationMs::from(started.elapsed());
        let kind = error.kind();
        warn!(tool_name, error = %error, "tool call failed");
        self.record(
            tool_name,
            ctx,
            params,
            CallOutcome::Error { error_kind: format!("{kind:?}"), message: error.to_string() },
            duration,
            trace_id,
        )
        .await;
        ToolCallOutcome { success: false, output: None, error: Some(error.to_string()), error_kind: Some(kind), duration }
    }

    async fn record(
        &self,
        tool_name: &str,
        ctx: &CallContext,
        params: serde_json::Value,
        outcome: CallOutcome,
        duration: DurationMs,
        trace_id: &str,
    ) {
        let Some(audit) = self.audit.read().await.clone() else { return };
        let record = ToolCallRecord {
            tool_name: tool_name.to_string(),
            caller_type: ctx.caller_type.clone(),
            caller_id: ctx.caller_id.clone(),
            session_id: ctx.session_id.clone(),
            workflow_id: ctx.workflow_id.clone(),
            run_id: ctx.run_id.clone(),
            params,
            outcome,
            duration,
            trace_id: trace_id.to_string(),
            timestamp: chrono::Utc::now(),
        };
        audit.record(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ToolManifest;
    use conductor_knowledge::InMemoryAuditStore;

    fn echo_manifest() -> ToolManifest {
        ToolManifest {
            name: "echo".into(),
            version: "1.0.0".into(),
            description: "d".into(),
            category: "util".into(),
            tags: vec![],
            parameters: vec![conductor_protocol::ToolParam {
                name: "text".into(),
                param_type: conductor_protocol::ToolParamType::String,
                required: true,
                default: None,
                enum_values: None,
            }],
            returns: serde_json::Value::Null,
            entry: conductor_protocol::ToolEntryKind::Builtin { handler: "echo_handler".into() },
            concurrency: None,
        }
    }

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn executes_and_records_success() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_manifest()).await;
        let concurrency = Arc::new(ConcurrencyController::new(10, 4));
        let engine = ToolEngine::new(registry, concurrency);
        engine.register_executor("echo_handler", Arc::new(EchoExecutor)).await;
        let audit = Arc::new(InMemoryAuditStore::default());
        engine.set_knowledge_store(audit.clone()).await;

        let outcome = engine
            .execute("echo", serde_json::json!({"text": "hi"}), &CallContext { caller_id: "node-1".into(), ..Default::default() })
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["text"], "hi");

        let calls = audit.get_calls(&conductor_knowledge::CallFilter::default()).await;
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_fails_with_not_found() {
        let registry = Arc::new(ToolRegistry::new());
        let concurrency = Arc::new(ConcurrencyController::new(10, 4));
        let engine = ToolEngine::new(registry, concurrency);
        let outcome = engine.execute("missing", serde_json::json!({}), &CallContext::default()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(conductor_protocol::ErrorKind::ToolNotFound));
    }

    #[tokio::test]
    async fn invalid_params_fail_before_dispatch() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_manifest()).await;
        let concurrency = Arc::new(ConcurrencyController::new(10, 4));
        let engine = ToolEngine::new(registry, concurrency);
        engine.register_executor("echo_handler", Arc::new(EchoExecutor)).await;

        let outcome = engine.execute("echo", serde_json::json!({}), &CallContext::default()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(conductor_protocol::ErrorKind::InvalidRequest));
    }
}
