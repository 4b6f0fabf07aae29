//! Per-run event dispatch.
//!
//! This module provides the immutable run context created when a run starts,
//! and the category-specific run managers built on top of it. A run manager
//! is handed to the caller by one of the
//! [`CallbackManager`](super::CallbackManager) start operations; the caller
//! drives the run by invoking the manager's `handle_*` methods and discards
//! the manager after the terminal `end` or `error` event.
//!
//! Every dispatch is a join point: the caller is suspended until every
//! applicable handler invocation has settled. Handler failures are logged and
//! swallowed per handler per event, so observability can never fail the
//! operation it observes.

use super::handler::{AgentAction, AgentFinish, CallbackHandler};
use super::manager::CallbackManager;
use crate::error::RunscopeError;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Log an isolated handler failure to the diagnostic channel
pub(crate) fn log_handler_failure(handler: &dyn CallbackHandler, event: &str, error: &RunscopeError) {
    warn!("Handler '{}' failed on {}: {}", handler.name(), event, error);
}

/// Immutable record binding a run to the handlers observing it.
///
/// The handler lists are snapshots taken when the run started. Mutating the
/// originating [`CallbackManager`](super::CallbackManager) afterwards never
/// changes which handlers an in-flight run notifies; this snapshot-on-create
/// policy is the core's substitute for locking.
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    parent_run_id: Option<Uuid>,
    handlers: Vec<Arc<dyn CallbackHandler>>,
    inheritable_handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl RunContext {
    pub(crate) fn new(
        run_id: Uuid,
        parent_run_id: Option<Uuid>,
        handlers: Vec<Arc<dyn CallbackHandler>>,
        inheritable_handlers: Vec<Arc<dyn CallbackHandler>>,
    ) -> Self {
        Self {
            run_id,
            parent_run_id,
            handlers,
            inheritable_handlers,
        }
    }

    /// Identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Identifier of the parent run, if this run is nested
    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    /// Handlers observing this run
    pub fn handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.handlers
    }

    /// Handlers that propagate to managers derived for child runs
    pub fn inheritable_handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.inheritable_handlers
    }

    /// Deliver a free-text trace event to all handlers.
    ///
    /// Text is always delivered; suppression flags do not apply.
    pub async fn handle_text(&self, text: &str) {
        let futures = self.handlers.iter().map(|handler| async move {
            if let Err(e) = handler.on_text(text, self.run_id, self.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_text", &e);
            }
        });
        join_all(futures).await;
    }
}

/// Run manager for a model call.
///
/// Model calls are leaf operations; they cannot derive child managers.
pub struct LlmRunManager {
    context: RunContext,
}

impl LlmRunManager {
    pub(crate) fn new(context: RunContext) -> Self {
        Self { context }
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id()
    }

    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.context.parent_run_id()
    }

    /// Deliver a free-text trace event to all handlers
    pub async fn handle_text(&self, text: &str) {
        self.context.handle_text(text).await;
    }

    /// Deliver a newly generated token to handlers observing model runs
    pub async fn handle_llm_new_token(&self, token: &str) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_llm()).map(|handler| async move {
            if let Err(e) = handler.on_llm_new_token(token, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_llm_new_token", &e);
            }
        });
        join_all(futures).await;
    }

    /// Deliver the model run's successful completion to handlers observing model runs
    pub async fn handle_llm_end(&self, output: &Value) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_llm()).map(|handler| async move {
            if let Err(e) = handler.on_llm_end(output, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_llm_end", &e);
            }
        });
        join_all(futures).await;
    }

    /// Deliver the model run's failure to handlers observing model runs
    pub async fn handle_llm_error(&self, error: &str) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_llm()).map(|handler| async move {
            if let Err(e) = handler.on_llm_error(error, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_llm_error", &e);
            }
        });
        join_all(futures).await;
    }
}

/// Run manager for a pipeline execution.
///
/// Pipeline runs may spawn nested operations; use [`child`](Self::child) to
/// derive a manager scoped to this run as the parent.
pub struct ChainRunManager {
    context: RunContext,
}

impl ChainRunManager {
    pub(crate) fn new(context: RunContext) -> Self {
        Self { context }
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id()
    }

    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.context.parent_run_id()
    }

    /// Deliver a free-text trace event to all handlers
    pub async fn handle_text(&self, text: &str) {
        self.context.handle_text(text).await;
    }

    /// Deliver the pipeline run's successful completion to handlers observing pipeline runs
    pub async fn handle_chain_end(&self, outputs: &HashMap<String, Value>) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_chain()).map(|handler| async move {
            if let Err(e) = handler.on_chain_end(outputs, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_chain_end", &e);
            }
        });
        join_all(futures).await;
    }

    /// Deliver the pipeline run's failure to handlers observing pipeline runs
    pub async fn handle_chain_error(&self, error: &str) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_chain()).map(|handler| async move {
            if let Err(e) = handler.on_chain_error(error, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_chain_error", &e);
            }
        });
        join_all(futures).await;
    }

    /// Deliver an agent's tool choice to handlers observing agent decisions.
    ///
    /// Agent decision events are raised on the pipeline run; handlers
    /// suppressing either pipeline or agent events do not receive them.
    pub async fn handle_agent_action(&self, action: &AgentAction) {
        let ctx = &self.context;
        let futures = ctx
            .handlers
            .iter()
            .filter(|h| !h.ignore_chain() && !h.ignore_agent())
            .map(|handler| async move {
                if let Err(e) = handler.on_agent_action(action, ctx.run_id, ctx.parent_run_id).await
                {
                    log_handler_failure(handler.as_ref(), "on_agent_action", &e);
                }
            });
        join_all(futures).await;
    }

    /// Deliver an agent's final answer to handlers observing agent decisions
    pub async fn handle_agent_finish(&self, finish: &AgentFinish) {
        let ctx = &self.context;
        let futures = ctx
            .handlers
            .iter()
            .filter(|h| !h.ignore_chain() && !h.ignore_agent())
            .map(|handler| async move {
                if let Err(e) = handler.on_agent_finish(finish, ctx.run_id, ctx.parent_run_id).await
                {
                    log_handler_failure(handler.as_ref(), "on_agent_finish", &e);
                }
            });
        join_all(futures).await;
    }

    /// Derive a manager for runs nested under this pipeline run.
    ///
    /// The returned manager's parent run is this run, and its handler set is
    /// exactly this run's inheritable snapshot, every entry marked
    /// inheritable again so grandchildren keep propagating.
    pub fn child(&self) -> CallbackManager {
        let mut manager = CallbackManager::child_of(self.context.run_id);
        manager.set_handlers(self.context.inheritable_handlers.clone(), true);
        manager
    }
}

/// Run manager for a tool invocation.
pub struct ToolRunManager {
    context: RunContext,
}

impl ToolRunManager {
    pub(crate) fn new(context: RunContext) -> Self {
        Self { context }
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id()
    }

    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.context.parent_run_id()
    }

    /// Deliver a free-text trace event to all handlers
    pub async fn handle_text(&self, text: &str) {
        self.context.handle_text(text).await;
    }

    /// Deliver the tool run's successful completion to handlers observing tool runs
    pub async fn handle_tool_end(&self, output: &str) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_agent()).map(|handler| async move {
            if let Err(e) = handler.on_tool_end(output, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_tool_end", &e);
            }
        });
        join_all(futures).await;
    }

    /// Deliver the tool run's failure to handlers observing tool runs
    pub async fn handle_tool_error(&self, error: &str) {
        let ctx = &self.context;
        let futures = ctx.handlers.iter().filter(|h| !h.ignore_agent()).map(|handler| async move {
            if let Err(e) = handler.on_tool_error(error, ctx.run_id, ctx.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_tool_error", &e);
            }
        });
        join_all(futures).await;
    }

    /// Derive a manager for runs nested under this tool run.
    ///
    /// The returned manager's parent run is this run, and its handler set is
    /// exactly this run's inheritable snapshot, every entry marked
    /// inheritable again.
    pub fn child(&self) -> CallbackManager {
        let mut manager = CallbackManager::child_of(self.context.run_id);
        manager.set_handlers(self.context.inheritable_handlers.clone(), true);
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Handler that records the names of every event it receives
    struct RecordingHandler {
        name: String,
        events: Mutex<Vec<String>>,
        ignore_llm: bool,
        ignore_chain: bool,
        ignore_agent: bool,
    }

    impl RecordingHandler {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                events: Mutex::new(Vec::new()),
                ignore_llm: false,
                ignore_chain: false,
                ignore_agent: false,
            })
        }

        fn with_flags(name: &str, llm: bool, chain: bool, agent: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                events: Mutex::new(Vec::new()),
                ignore_llm: llm,
                ignore_chain: chain,
                ignore_agent: agent,
            })
        }

        fn record(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        fn received(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallbackHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
            Arc::new(Self {
                name: self.name.clone(),
                events: Mutex::new(Vec::new()),
                ignore_llm: self.ignore_llm,
                ignore_chain: self.ignore_chain,
                ignore_agent: self.ignore_agent,
            })
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

        async fn on_llm_new_token(
            &self,
            _token: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("llm_new_token");
            Ok(())
        }

        async fn on_llm_end(
            &self,
            _output: &Value,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("llm_end");
            Ok(())
        }

        async fn on_llm_error(
            &self,
            _error: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("llm_error");
            Ok(())
        }

        async fn on_chain_end(
            &self,
            _outputs: &HashMap<String, Value>,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("chain_end");
            Ok(())
        }

        async fn on_chain_error(
            &self,
            _error: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("chain_error");
            Ok(())
        }

        async fn on_agent_action(
            &self,
            _action: &AgentAction,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("agent_action");
            Ok(())
        }

        async fn on_agent_finish(
            &self,
            _finish: &AgentFinish,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("agent_finish");
            Ok(())
        }

        async fn on_tool_end(
            &self,
            _output: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("tool_end");
            Ok(())
        }

        async fn on_tool_error(
            &self,
            _error: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("tool_error");
            Ok(())
        }

        async fn on_text(
            &self,
            _text: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.record("text");
            Ok(())
        }
    }

    /// Handler that fails on every event it receives
    struct FailingHandler {
        invocations: AtomicUsize,
    }

    impl FailingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                invocations: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CallbackHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
            FailingHandler::new()
        }

        async fn on_llm_new_token(
            &self,
            _token: &str,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Err(RunscopeError::HandlerError("sink unavailable".to_string()))
        }

        async fn on_llm_end(
            &self,
            _output: &Value,
            _run_id: Uuid,
            _parent_run_id: Option<Uuid>,
        ) -> Result<()> {
            Err(RunscopeError::HandlerError("sink unavailable".to_string()))
        }
    }

    fn context_with(handlers: Vec<Arc<dyn CallbackHandler>>) -> RunContext {
        let inheritable = handlers.clone();
        RunContext::new(Uuid::new_v4(), None, handlers, inheritable)
    }

    #[tokio::test]
    async fn test_llm_run_manager_delivers_to_all_handlers() {
        let a = RecordingHandler::new("a");
        let b = RecordingHandler::new("b");
        let manager = LlmRunManager::new(context_with(vec![a.clone(), b.clone()]));

        manager.handle_llm_new_token("tok").await;
        manager.handle_llm_end(&json!("output")).await;

        assert_eq!(a.received(), vec!["llm_new_token", "llm_end"]);
        assert_eq!(b.received(), vec!["llm_new_token", "llm_end"]);
    }

    #[tokio::test]
    async fn test_llm_suppression_respected() {
        let listening = RecordingHandler::new("listening");
        let suppressed = RecordingHandler::with_flags("suppressed", true, false, false);
        let manager =
            LlmRunManager::new(context_with(vec![listening.clone(), suppressed.clone()]));

        manager.handle_llm_new_token("tok").await;
        manager.handle_llm_error("model exploded").await;

        assert_eq!(listening.received(), vec!["llm_new_token", "llm_error"]);
        assert!(suppressed.received().is_empty());
    }

    #[tokio::test]
    async fn test_chain_suppression_blocks_chain_and_agent_events() {
        let listening = RecordingHandler::new("listening");
        let suppressed = RecordingHandler::with_flags("suppressed", false, true, false);
        let manager =
            ChainRunManager::new(context_with(vec![listening.clone(), suppressed.clone()]));

        let action = AgentAction {
            tool: "search".to_string(),
            tool_input: json!("rust"),
            log: "searching".to_string(),
        };
        let finish = AgentFinish {
            output: json!("done"),
            log: "finishing".to_string(),
        };

        manager.handle_agent_action(&action).await;
        manager.handle_agent_finish(&finish).await;
        manager.handle_chain_error("step failed").await;
        manager.handle_chain_end(&HashMap::new()).await;

        assert_eq!(
            listening.received(),
            vec!["agent_action", "agent_finish", "chain_error", "chain_end"]
        );
        assert!(suppressed.received().is_empty());
    }

    #[tokio::test]
    async fn test_agent_suppression_blocks_agent_but_not_chain_events() {
        let handler = RecordingHandler::with_flags("agent_off", false, false, true);
        let manager = ChainRunManager::new(context_with(vec![handler.clone()]));

        let action = AgentAction {
            tool: "search".to_string(),
            tool_input: json!("rust"),
            log: String::new(),
        };

        manager.handle_agent_action(&action).await;
        manager.handle_chain_end(&HashMap::new()).await;

        assert_eq!(handler.received(), vec!["chain_end"]);
    }

    #[tokio::test]
    async fn test_tool_events_gated_by_agent_suppression() {
        let listening = RecordingHandler::new("listening");
        let suppressed = RecordingHandler::with_flags("suppressed", false, false, true);
        let manager =
            ToolRunManager::new(context_with(vec![listening.clone(), suppressed.clone()]));

        manager.handle_tool_end("42").await;
        manager.handle_tool_error("tool broke").await;

        assert_eq!(listening.received(), vec!["tool_end", "tool_error"]);
        assert!(suppressed.received().is_empty());
    }

    #[tokio::test]
    async fn test_text_delivered_regardless_of_suppression() {
        let suppressed = RecordingHandler::with_flags("suppressed", true, true, true);
        let manager = LlmRunManager::new(context_with(vec![suppressed.clone()]));

        manager.handle_text("free text").await;

        assert_eq!(suppressed.received(), vec!["text"]);
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated() {
        let failing = FailingHandler::new();
        let a = RecordingHandler::new("a");
        let b = RecordingHandler::new("b");
        let manager = LlmRunManager::new(context_with(vec![
            a.clone(),
            failing.clone(),
            b.clone(),
        ]));

        manager.handle_llm_new_token("tok").await;

        // The failing handler was invoked, its error swallowed, and both
        // siblings still received the event.
        assert_eq!(failing.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(a.received(), vec!["llm_new_token"]);
        assert_eq!(b.received(), vec!["llm_new_token"]);
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_all_handlers() {
        struct SlowHandler {
            done: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl CallbackHandler for SlowHandler {
            fn name(&self) -> &str {
                "slow"
            }

            fn clone_handler(&self) -> Arc<dyn CallbackHandler> {
                Arc::new(SlowHandler {
                    done: self.done.clone(),
                })
            }

            async fn on_llm_end(
                &self,
                _output: &Value,
                _run_id: Uuid,
                _parent_run_id: Option<Uuid>,
            ) -> Result<()> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let done = Arc::new(AtomicUsize::new(0));
        let handlers: Vec<Arc<dyn CallbackHandler>> = (0..3)
            .map(|_| Arc::new(SlowHandler { done: done.clone() }) as Arc<dyn CallbackHandler>)
            .collect();
        let manager = LlmRunManager::new(context_with(handlers));

        manager.handle_llm_end(&json!("output")).await;

        // Dispatch is a join point: by the time it returns, every handler
        // has settled.
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_child_manager_scoped_to_parent_run() {
        let a = RecordingHandler::new("a");
        let run_id = Uuid::new_v4();
        let context = RunContext::new(
            run_id,
            None,
            vec![a.clone()],
            vec![a.clone()],
        );
        let manager = ChainRunManager::new(context);

        let child = manager.child();
        assert_eq!(child.parent_run_id(), Some(run_id));
        assert_eq!(child.handlers().len(), 1);
        assert_eq!(child.inheritable_handlers().len(), 1);
    }

    #[tokio::test]
    async fn test_child_excludes_non_inheritable_handlers() {
        let inheritable = RecordingHandler::new("inheritable");
        let local = RecordingHandler::new("local");
        let context = RunContext::new(
            Uuid::new_v4(),
            None,
            vec![inheritable.clone(), local.clone()],
            vec![inheritable.clone()],
        );
        let manager = ToolRunManager::new(context);

        let child = manager.child();
        assert_eq!(child.handlers().len(), 1);
        assert_eq!(child.handlers()[0].name(), "inheritable");
    }

    #[tokio::test]
    async fn test_delivers_events_after_terminal_event() {
        // The core does not guard run state: a caller that keeps driving a
        // run after its terminal event still gets delivery. Guarding is the
        // caller's responsibility.
        let a = RecordingHandler::new("a");
        let manager = LlmRunManager::new(context_with(vec![a.clone()]));

        manager.handle_llm_end(&json!("output")).await;
        manager.handle_llm_new_token("late").await;

        assert_eq!(a.received(), vec!["llm_end", "llm_new_token"]);
    }

    #[tokio::test]
    async fn test_run_ids_exposed() {
        let run_id = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let context = RunContext::new(run_id, Some(parent), vec![], vec![]);
        let manager = ToolRunManager::new(context);

        assert_eq!(manager.run_id(), run_id);
        assert_eq!(manager.parent_run_id(), Some(parent));
    }
}
