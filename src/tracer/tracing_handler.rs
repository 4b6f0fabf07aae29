//! Recording callback handler.
//!
//! `TracingCallbackHandler` turns the dispatch stream into structured
//! [`RunTraceEvent`](super::RunTraceEvent) records stored in an
//! [`EventStore`](super::EventStore). It is the handler auto-registered by
//! [`CallbackManager::configure`](crate::callbacks::CallbackManager::configure)
//! when the ambient tracing signal is set, and it is inheritable so every
//! child run in the tree is recorded into the same store.

use super::event_store::EventStore;
use super::run_events::{
    current_timestamp, AgentActionEvent, AgentFinishEvent, RunCategory, RunEndEvent,
    RunErrorEvent, RunStartEvent, TextEvent, TokenEvent,
};
use crate::callbacks::{AgentAction, AgentFinish, CallbackHandler, RunSubject};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

/// Stable identity name of the tracing handler
pub const TRACING_HANDLER_NAME: &str = "tracer";

/// Handler that records every received event into an event store.
///
/// Start instants are tracked per run in internal scratch state so that end
/// and error records carry the run's duration. Duplication via
/// `clone_handler` shares the store (copies keep recording into the same
/// place) but starts with fresh scratch state, so per-run timing never
/// aliases across managers.
pub struct TracingCallbackHandler {
    store: Arc<EventStore>,
    started: Mutex<HashMap<Uuid, Instant>>,
}

impl TracingCallbackHandler {
    /// Create a tracing handler backed by its own empty store
    pub fn new() -> Self {
        Self::with_store(Arc::new(EventStore::default()))
    }

    /// Create a tracing handler recording into an existing store
    pub fn with_store(store: Arc<EventStore>) -> Self {
        Self {
            store,
            started: Mutex::new(HashMap::new()),
        }
    }

    /// The store this handler records into
    pub fn store(&self) -> Arc<EventStore> {
        self.store.clone()
    }

    fn mark_started(&self, run_id: Uuid) {
        self.started.lock().unwrap().insert(run_id, Instant::now());
    }

    /// Elapsed time since the run's start event, if the start was observed
    fn elapsed_ms(&self, run_id: Uuid) -> Option<f64> {
        self.started
            .lock()
            .unwrap()
            .remove(&run_id)
            .map(|started| started.elapsed().as_secs_f64() * 1000.0)
    }

    fn record_start(
        &self,
        category: RunCategory,
        subject: &RunSubject,
        payload: Value,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) {
        self.mark_started(run_id);
        self.store.store(Box::new(RunStartEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            category,
            subject: subject.clone(),
            payload,
        }));
    }

    fn record_end(
        &self,
        category: RunCategory,
        output: Value,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) {
        self.store.store(Box::new(RunEndEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            category,
            output,
            duration_ms: self.elapsed_ms(run_id),
        }));
    }

    fn record_error(
        &self,
        category: RunCategory,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) {
        self.store.store(Box::new(RunErrorEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            category,
            error: error.to_string(),
            duration_ms: self.elapsed_ms(run_id),
        }));
    }
}

impl Default for TracingCallbackHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackHandler for TracingCallbackHandler {
    fn name(&self) -> &str {
        TRACING_HANDLER_NAME
    }

    fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
        Arc::new(Self::with_store(self.store.clone()))
    }

    async fn on_llm_start(
        &self,
        subject: &RunSubject,
        prompts: &[String],
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_start(RunCategory::Llm, subject, json!(prompts), run_id, parent_run_id);
        Ok(())
    }

    async fn on_llm_new_token(
        &self,
        token: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.store.store(Box::new(TokenEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            token: token.to_string(),
        }));
        Ok(())
    }

    async fn on_llm_end(
        &self,
        output: &Value,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_end(RunCategory::Llm, output.clone(), run_id, parent_run_id);
        Ok(())
    }

    async fn on_llm_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_error(RunCategory::Llm, error, run_id, parent_run_id);
        Ok(())
    }

    async fn on_chain_start(
        &self,
        subject: &RunSubject,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_start(RunCategory::Chain, subject, json!(inputs), run_id, parent_run_id);
        Ok(())
    }

    async fn on_chain_end(
        &self,
        outputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_end(RunCategory::Chain, json!(outputs), run_id, parent_run_id);
        Ok(())
    }

    async fn on_chain_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_error(RunCategory::Chain, error, run_id, parent_run_id);
        Ok(())
    }

    async fn on_agent_action(
        &self,
        action: &AgentAction,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.store.store(Box::new(AgentActionEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            action: action.clone(),
        }));
        Ok(())
    }

    async fn on_agent_finish(
        &self,
        finish: &AgentFinish,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.store.store(Box::new(AgentFinishEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            finish: finish.clone(),
        }));
        Ok(())
    }

    async fn on_tool_start(
        &self,
        subject: &RunSubject,
        input: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_start(RunCategory::Tool, subject, json!(input), run_id, parent_run_id);
        Ok(())
    }

    async fn on_tool_end(
        &self,
        output: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_end(RunCategory::Tool, json!(output), run_id, parent_run_id);
        Ok(())
    }

    async fn on_tool_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.record_error(RunCategory::Tool, error, run_id, parent_run_id);
        Ok(())
    }

    async fn on_text(&self, text: &str, run_id: Uuid, parent_run_id: Option<Uuid>) -> Result<()> {
        self.store.store(Box::new(TextEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id,
            text: text.to_string(),
        }));
        Ok(())
    }
}
