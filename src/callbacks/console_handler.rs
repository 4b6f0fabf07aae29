//! Console trace handler.
//!
//! Prints one concise line per received event to stdout. Auto-registered by
//! [`CallbackManager::configure`](super::CallbackManager::configure) when the
//! verbose option is set.

use super::handler::{AgentAction, AgentFinish, CallbackHandler, RunSubject};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity name of the console trace handler
pub const CONSOLE_HANDLER_NAME: &str = "console";

/// Handler that prints run lifecycle events to stdout.
///
/// Stateless; duplication is trivial. Output is one line per event carrying
/// the short run identifier, the event kind, and a brief payload preview.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCallbackHandler;

impl ConsoleCallbackHandler {
    pub fn new() -> Self {
        Self
    }

    fn print(&self, run_id: Uuid, event: &str, detail: &str) {
        let short_id = &run_id.to_string()[..8];
        if detail.is_empty() {
            println!("[{}] {}", short_id, event);
        } else {
            println!("[{}] {} {}", short_id, event, detail);
        }
    }
}

/// Shorten a payload preview to keep console lines readable
fn preview(text: &str) -> String {
    const LIMIT: usize = 100;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl CallbackHandler for ConsoleCallbackHandler {
    fn name(&self) -> &str {
        CONSOLE_HANDLER_NAME
    }

    fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
        Arc::new(Self)
    }

    async fn on_llm_start(
        &self,
        subject: &RunSubject,
        prompts: &[String],
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(
            run_id,
            "llm start",
            &format!("'{}' ({} prompts)", subject.name, prompts.len()),
        );
        Ok(())
    }

    async fn on_llm_end(
        &self,
        output: &Value,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "llm end", &preview(&output.to_string()));
        Ok(())
    }

    async fn on_llm_error(
        &self,
        error: &str,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "llm error", &preview(error));
        Ok(())
    }

    async fn on_chain_start(
        &self,
        subject: &RunSubject,
        inputs: &HashMap<String, Value>,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(
            run_id,
            "chain start",
            &format!("'{}' ({} inputs)", subject.name, inputs.len()),
        );
        Ok(())
    }

    async fn on_chain_end(
        &self,
        outputs: &HashMap<String, Value>,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "chain end", &format!("({} outputs)", outputs.len()));
        Ok(())
    }

    async fn on_chain_error(
        &self,
        error: &str,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "chain error", &preview(error));
        Ok(())
    }

    async fn on_agent_action(
        &self,
        action: &AgentAction,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "agent action", &format!("tool '{}'", action.tool));
        Ok(())
    }

    async fn on_agent_finish(
        &self,
        finish: &AgentFinish,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "agent finish", &preview(&finish.output.to_string()));
        Ok(())
    }

    async fn on_tool_start(
        &self,
        subject: &RunSubject,
        input: &str,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(
            run_id,
            "tool start",
            &format!("'{}' input: {}", subject.name, preview(input)),
        );
        Ok(())
    }

    async fn on_tool_end(
        &self,
        output: &str,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "tool end", &preview(output));
        Ok(())
    }

    async fn on_tool_error(
        &self,
        error: &str,
        run_id: Uuid,
        _parent_run_id: Option<Uuid>,
    ) -> Result<()> {
        self.print(run_id, "tool error", &preview(error));
        Ok(())
    }

    async fn on_text(&self, text: &str, run_id: Uuid, _parent_run_id: Option<Uuid>) -> Result<()> {
        self.print(run_id, "text", &preview(text));
        Ok(())
    }
}
