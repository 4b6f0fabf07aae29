//! Builder for one-off callback handlers.
//!
//! `HandlerBuilder` produces a handler from a bag of per-event closures,
//! satisfying the capability contract for exactly the events supplied.
//! Useful when a full [`CallbackHandler`](super::CallbackHandler)
//! implementation is more ceremony than an observation warrants.
//!
//! # Examples
//!
//! ```
//! use runscope::callbacks::HandlerBuilder;
//!
//! let handler = HandlerBuilder::new()
//!     .on_llm_new_token(|token, _run_id, _parent| {
//!         print!("{}", token);
//!     })
//!     .build();
//! ```

use super::handler::{AgentAction, AgentFinish, CallbackHandler, RunSubject};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type LlmStartFn = dyn Fn(&RunSubject, &[String], Uuid, Option<Uuid>) + Send + Sync;
type ChainStartFn = dyn Fn(&RunSubject, &HashMap<String, Value>, Uuid, Option<Uuid>) + Send + Sync;
type ToolStartFn = dyn Fn(&RunSubject, &str, Uuid, Option<Uuid>) + Send + Sync;
type ValueFn = dyn Fn(&Value, Uuid, Option<Uuid>) + Send + Sync;
type OutputsFn = dyn Fn(&HashMap<String, Value>, Uuid, Option<Uuid>) + Send + Sync;
type TextFn = dyn Fn(&str, Uuid, Option<Uuid>) + Send + Sync;
type AgentActionFn = dyn Fn(&AgentAction, Uuid, Option<Uuid>) + Send + Sync;
type AgentFinishFn = dyn Fn(&AgentFinish, Uuid, Option<Uuid>) + Send + Sync;

/// Handler assembled from per-event closures
#[derive(Clone, Default)]
struct InlineCallbackHandler {
    name: String,
    ignore_llm: bool,
    ignore_chain: bool,
    ignore_agent: bool,
    llm_start: Option<Arc<LlmStartFn>>,
    llm_new_token: Option<Arc<TextFn>>,
    llm_end: Option<Arc<ValueFn>>,
    llm_error: Option<Arc<TextFn>>,
    chain_start: Option<Arc<ChainStartFn>>,
    chain_end: Option<Arc<OutputsFn>>,
    chain_error: Option<Arc<TextFn>>,
    agent_action: Option<Arc<AgentActionFn>>,
    agent_finish: Option<Arc<AgentFinishFn>>,
    tool_start: Option<Arc<ToolStartFn>>,
    tool_end: Option<Arc<TextFn>>,
    tool_error: Option<Arc<TextFn>>,
    text: Option<Arc<TextFn>>,
}

#[async_trait]
impl CallbackHandler for InlineCallbackHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
        // Closures are shared; the handler holds no per-run state of its own.
        Arc::new(self.clone())
    }

    fn ignore_llm(&self) -> bool {
        self.ignore_llm
    }

    fn ignore_chain(&self) -> bool {
        self.ignore_chain
    }

    fn ignore_agent(&self) -> bool {
        self.ignore_agent
    }

    async fn on_llm_start(
        &self,
        subject: &RunSubject,
        prompts: &[String],
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.llm_start {
            f(subject, prompts, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_llm_new_token(
        &self,
        token: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.llm_new_token {
            f(token, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_llm_end(
        &self,
        output: &Value,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.llm_end {
            f(output, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_llm_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.llm_error {
            f(error, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_chain_start(
        &self,
        subject: &RunSubject,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.chain_start {
            f(subject, inputs, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_chain_end(
        &self,
        outputs: &HashMap<String, Value>,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.chain_end {
            f(outputs, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_chain_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.chain_error {
            f(error, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_agent_action(
        &self,
        action: &AgentAction,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.agent_action {
            f(action, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_agent_finish(
        &self,
        finish: &AgentFinish,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.agent_finish {
            f(finish, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_tool_start(
        &self,
        subject: &RunSubject,
        input: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.tool_start {
            f(subject, input, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_tool_end(
        &self,
        output: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.tool_end {
            f(output, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_tool_error(
        &self,
        error: &str,
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(f) = &self.tool_error {
            f(error, run_id, parent_run_id);
        }
        Ok(())
    }

    async fn on_text(&self, text: &str, run_id: Uuid, parent_run_id: Option<Uuid>) -> Result<()> {
        if let Some(f) = &self.text {
            f(text, run_id, parent_run_id);
        }
        Ok(())
    }
}

/// Fluent builder assembling a handler from per-event closures.
///
/// Events with no closure registered fall through to the contract's no-op
/// defaults.
pub struct HandlerBuilder {
    inner: InlineCallbackHandler,
}

impl Default for HandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerBuilder {
    pub fn new() -> Self {
        Self {
            inner: InlineCallbackHandler {
                name: "inline".to_string(),
                ..Default::default()
            },
        }
    }

    /// Set the handler's stable identity name (default `"inline"`)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Suppress model-run events for the built handler
    pub fn ignore_llm(mut self, ignore: bool) -> Self {
        self.inner.ignore_llm = ignore;
        self
    }

    /// Suppress pipeline-run events for the built handler
    pub fn ignore_chain(mut self, ignore: bool) -> Self {
        self.inner.ignore_chain = ignore;
        self
    }

    /// Suppress tool-run and agent decision events for the built handler
    pub fn ignore_agent(mut self, ignore: bool) -> Self {
        self.inner.ignore_agent = ignore;
        self
    }

    pub fn on_llm_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunSubject, &[String], Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.llm_start = Some(Arc::new(f));
        self
    }

    pub fn on_llm_new_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.llm_new_token = Some(Arc::new(f));
        self
    }

    pub fn on_llm_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.llm_end = Some(Arc::new(f));
        self
    }

    pub fn on_llm_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.llm_error = Some(Arc::new(f));
        self
    }

    pub fn on_chain_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunSubject, &HashMap<String, Value>, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.chain_start = Some(Arc::new(f));
        self
    }

    pub fn on_chain_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&HashMap<String, Value>, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.chain_end = Some(Arc::new(f));
        self
    }

    pub fn on_chain_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.chain_error = Some(Arc::new(f));
        self
    }

    pub fn on_agent_action<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentAction, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.agent_action = Some(Arc::new(f));
        self
    }

    pub fn on_agent_finish<F>(mut self, f: F) -> Self
    where
        F: Fn(&AgentFinish, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.agent_finish = Some(Arc::new(f));
        self
    }

    pub fn on_tool_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunSubject, &str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.tool_start = Some(Arc::new(f));
        self
    }

    pub fn on_tool_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.tool_end = Some(Arc::new(f));
        self
    }

    pub fn on_tool_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.tool_error = Some(Arc::new(f));
        self
    }

    pub fn on_text<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Uuid, Option<Uuid>) + Send + Sync + 'static,
    {
        self.inner.text = Some(Arc::new(f));
        self
    }

    /// Build the handler
    pub fn build(self) -> Arc<dyn CallbackHandler> {
        Arc::new(self.inner)
    }
}
