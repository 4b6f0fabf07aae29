//! Callback handler contract for run lifecycle events.
//!
//! This module defines the core `CallbackHandler` trait that all observers
//! must implement. Handlers receive lifecycle notifications for the runs they
//! care about and can opt out of whole event categories through suppression
//! flags. Every method has a default no-op implementation, so concrete
//! handlers override only the events they need.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of the operation being observed.
///
/// Carries the name of the model, pipeline, or tool that is running, plus
/// optional free-form metadata supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSubject {
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl RunSubject {
    /// Create a new subject with the given name and no metadata
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry to the subject
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A tool invocation chosen by an agent during a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    /// Name of the tool the agent decided to call
    pub tool: String,
    /// Input the agent is passing to the tool
    pub tool_input: Value,
    /// The agent's reasoning text that led to this action
    pub log: String,
}

/// The final answer produced by an agent at the end of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinish {
    /// The agent's final output values
    pub output: Value,
    /// The agent's reasoning text that led to this answer
    pub log: String,
}

/// Observer of run lifecycle events.
///
/// Handlers are registered on a [`CallbackManager`](super::CallbackManager)
/// and notified of `start`, `token`, `end`, and `error` events for model,
/// pipeline, and tool runs. Each notification carries the run identifier and
/// the parent run identifier (if any), from which observers can reconstruct
/// the run tree.
///
/// Handlers must tolerate being invoked with no ordering guarantee relative
/// to sibling handlers, and must not assume the manager that delivered an
/// event outlives the event itself.
///
/// Errors returned from any lifecycle method are caught and logged by the
/// dispatch fan-out; they never reach the observed operation and never
/// prevent delivery to other handlers.
///
/// # Examples
///
/// ```
/// use runscope::callbacks::{CallbackHandler, RunSubject};
/// use runscope::Result;
/// use async_trait::async_trait;
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// struct PromptLogger;
///
/// #[async_trait]
/// impl CallbackHandler for PromptLogger {
///     fn name(&self) -> &str {
///         "prompt_logger"
///     }
///
///     fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
///         Arc::new(PromptLogger)
///     }
///
///     async fn on_llm_start(
///         &self,
///         subject: &RunSubject,
///         prompts: &[String],
///         _run_id: Uuid,
///         _parent_run_id: Option<Uuid>,
///     ) -> Result<()> {
///         println!("{} called with {} prompts", subject.name, prompts.len());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// Stable identity name for this handler.
    ///
    /// Used by `configure` to avoid double-registering the auto-injected
    /// console and tracer handlers. Names of manually registered handlers
    /// are not required to be unique.
    fn name(&self) -> &str;

    /// Duplicate this handler into an independent copy with the same
    /// configuration.
    ///
    /// Handlers that carry per-run mutable scratch state must return a copy
    /// whose scratch state is fresh, so that managers derived via
    /// [`CallbackManager::copy`](super::CallbackManager::copy) never alias
    /// live state.
    fn clone_handler(&self) -> Arc<dyn CallbackHandler>;

    /// Whether this handler wants model-run events suppressed
    fn ignore_llm(&self) -> bool {
        false
    }

    /// Whether this handler wants pipeline-run events suppressed
    fn ignore_chain(&self) -> bool {
        false
    }

    /// Whether this handler wants tool-run and agent decision events suppressed
    fn ignore_agent(&self) -> bool {
        false
    }

    /// Called when a model run starts
    async fn on_llm_start(
        &self,
        _subject: &RunSubject,
        _prompts: &[String],
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called for each token generated during a streaming model run
    async fn on_llm_new_token(
        &self,
        _token: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a model run completes successfully
    async fn on_llm_end(
        &self,
        _output: &Value,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a model run fails
    async fn on_llm_error(
        &self,
        _error: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a pipeline run starts
    async fn on_chain_start(
        &self,
        _subject: &RunSubject,
        _inputs: &HashMap<String, Value>,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a pipeline run completes successfully
    async fn on_chain_end(
        &self,
        _outputs: &HashMap<String, Value>,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a pipeline run fails
    async fn on_chain_error(
        &self,
        _error: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when an agent chooses a tool to invoke during a pipeline run
    async fn on_agent_action(
        &self,
        _action: &AgentAction,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when an agent produces its final answer during a pipeline run
    async fn on_agent_finish(
        &self,
        _finish: &AgentFinish,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a tool run starts
    async fn on_tool_start(
        &self,
        _subject: &RunSubject,
        _input: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a tool run completes successfully
    async fn on_tool_end(
        &self,
        _output: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called when a tool run fails
    async fn on_tool_error(
        &self,
        _error: &str,
        _run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called for free-text trace output.
    ///
    /// Text events are delivered to every handler regardless of suppression
    /// flags.
    async fn on_text(&self, _text: &str, _run_id: Uuid, _parent_run_id: Option<Uuid>) -> Result<()> {
        Ok(())
    }
}
