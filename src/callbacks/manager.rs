//! Top-level callback manager.
//!
//! The `CallbackManager` owns the live set of registered handlers and is the
//! entry point for starting observed runs. Starting a run notifies the
//! applicable handlers, mints a run identifier if the caller did not supply
//! one, and returns the category-specific run manager holding an immutable
//! snapshot of the current handler set.
//!
//! `CallbackManager::configure` resolves the effective handler set for a new
//! top-level operation from caller-supplied handlers, an inherited manager,
//! and ambient verbosity/tracing options.

use super::console_handler::{ConsoleCallbackHandler, CONSOLE_HANDLER_NAME};
use super::handler::{CallbackHandler, RunSubject};
use super::run_manager::{
    log_handler_failure, ChainRunManager, LlmRunManager, RunContext, ToolRunManager,
};
use crate::tracer::{TracingCallbackHandler, TRACING_HANDLER_NAME};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Environment variable that enables the auto-registered tracing handler
pub const TRACING_ENV_VAR: &str = "RUNSCOPE_TRACING";

/// Ambient options consumed by [`CallbackManager::configure`].
///
/// The environment is read once, at the [`from_env`](Self::from_env) call
/// boundary, and injected as a plain value; `configure` itself reads no
/// global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackOptions {
    /// Attach a console trace handler to this operation's direct run tree
    pub verbose: bool,
    /// Attach an inheritable tracing handler recording structured run events
    pub tracing: bool,
}

impl CallbackOptions {
    /// Read the ambient tracing signal from the process environment.
    ///
    /// Tracing is enabled when `RUNSCOPE_TRACING` is set to `1` or `true`
    /// (case-insensitive). Verbosity is a caller decision, not an ambient
    /// one, and defaults to off.
    pub fn from_env() -> Self {
        let tracing = std::env::var(TRACING_ENV_VAR)
            .map(|v| {
                let v = v.trim();
                v == "1" || v.eq_ignore_ascii_case("true")
            })
            .unwrap_or(false);
        Self {
            verbose: false,
            tracing,
        }
    }

    /// Request console tracing for this operation
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Source of inheritable handlers for [`CallbackManager::configure`]
pub enum HandlerSource<'a> {
    /// Reuse an existing manager's current handler set as the inheritable base
    Manager(&'a CallbackManager),
    /// Seed a new manager with this handler list, marked inheritable
    Handlers(Vec<Arc<dyn CallbackHandler>>),
}

/// Mutable registry of callback handlers plus the operations that start runs.
///
/// Two parallel collections are maintained: `handlers` holds every handler
/// active for runs started through this manager, and `inheritable_handlers`
/// holds the subset that propagates to managers derived for child runs.
/// The inheritable set is always a subset of the active set.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
    inheritable_handlers: Vec<Arc<dyn CallbackHandler>>,
    parent_run_id: Option<Uuid>,
}

impl CallbackManager {
    /// Create an empty manager with no parent run
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty manager whose runs are children of the given run
    pub(crate) fn child_of(parent_run_id: Uuid) -> Self {
        Self {
            handlers: Vec::new(),
            inheritable_handlers: Vec::new(),
            parent_run_id: Some(parent_run_id),
        }
    }

    /// Handlers active for runs started through this manager
    pub fn handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.handlers
    }

    /// Handlers that propagate to child-run managers
    pub fn inheritable_handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.inheritable_handlers
    }

    /// Parent run identifier for runs started through this manager, if any
    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    /// Register a handler.
    ///
    /// When `inherit` is true the handler also propagates to managers
    /// derived for child runs.
    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>, inherit: bool) {
        if inherit {
            self.inheritable_handlers.push(handler.clone());
        }
        self.handlers.push(handler);
    }

    /// Remove a handler by identity from both collections
    pub fn remove_handler(&mut self, handler: &Arc<dyn CallbackHandler>) {
        self.handlers.retain(|h| !Arc::ptr_eq(h, handler));
        self.inheritable_handlers.retain(|h| !Arc::ptr_eq(h, handler));
    }

    /// Replace both collections with the given handlers
    pub fn set_handlers(&mut self, handlers: Vec<Arc<dyn CallbackHandler>>, inherit: bool) {
        self.handlers.clear();
        self.inheritable_handlers.clear();
        for handler in handlers {
            self.add_handler(handler, inherit);
        }
    }

    /// Replace both collections with a single inheritable handler
    pub fn set_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.set_handlers(vec![handler], true);
    }

    /// Produce an independent manager with duplicated handlers.
    ///
    /// Every registered handler is duplicated through its
    /// [`clone_handler`](CallbackHandler::clone_handler) operation,
    /// preserving its inheritable marking. Duplicated copies of
    /// `additional_handlers` are appended with the given inheritance flag.
    /// Duplication keeps handler rosters non-aliased across top-level
    /// operations even when handlers carry per-run mutable scratch state.
    pub fn copy(&self, additional_handlers: &[Arc<dyn CallbackHandler>], inherit: bool) -> Self {
        let mut manager = Self {
            handlers: Vec::new(),
            inheritable_handlers: Vec::new(),
            parent_run_id: self.parent_run_id,
        };
        for handler in &self.handlers {
            let inheritable = self.inheritable_handlers.iter().any(|h| Arc::ptr_eq(h, handler));
            manager.add_handler(handler.clone_handler(), inheritable);
        }
        for handler in additional_handlers {
            manager.add_handler(handler.clone_handler(), inherit);
        }
        manager
    }

    /// Start a model run.
    ///
    /// Notifies handlers observing model runs, mints a run identifier when
    /// `run_id` is `None`, and returns the run manager for the new run.
    /// Caller-supplied identifiers are trusted as unique; supply one only
    /// when correlating a run across process boundaries.
    pub async fn start_llm_run(
        &self,
        subject: &RunSubject,
        prompts: &[String],
        run_id: Option<Uuid>,
    ) -> LlmRunManager {
        let run_id = run_id.unwrap_or_else(Uuid::new_v4);
        debug!("Starting llm run {} for '{}'", run_id, subject.name);

        let futures = self.handlers.iter().filter(|h| !h.ignore_llm()).map(|handler| async move {
            if let Err(e) = handler.on_llm_start(subject, prompts, run_id, self.parent_run_id).await
            {
                log_handler_failure(handler.as_ref(), "on_llm_start", &e);
            }
        });
        join_all(futures).await;

        LlmRunManager::new(self.snapshot(run_id))
    }

    /// Start a pipeline run
    pub async fn start_chain_run(
        &self,
        subject: &RunSubject,
        inputs: &HashMap<String, Value>,
        run_id: Option<Uuid>,
    ) -> ChainRunManager {
        let run_id = run_id.unwrap_or_else(Uuid::new_v4);
        debug!("Starting chain run {} for '{}'", run_id, subject.name);

        let futures = self.handlers.iter().filter(|h| !h.ignore_chain()).map(|handler| async move {
            if let Err(e) = handler.on_chain_start(subject, inputs, run_id, self.parent_run_id).await
            {
                log_handler_failure(handler.as_ref(), "on_chain_start", &e);
            }
        });
        join_all(futures).await;

        ChainRunManager::new(self.snapshot(run_id))
    }

    /// Start a tool run
    pub async fn start_tool_run(
        &self,
        subject: &RunSubject,
        input: &str,
        run_id: Option<Uuid>,
    ) -> ToolRunManager {
        let run_id = run_id.unwrap_or_else(Uuid::new_v4);
        debug!("Starting tool run {} for '{}'", run_id, subject.name);

        let futures = self.handlers.iter().filter(|h| !h.ignore_agent()).map(|handler| async move {
            if let Err(e) = handler.on_tool_start(subject, input, run_id, self.parent_run_id).await {
                log_handler_failure(handler.as_ref(), "on_tool_start", &e);
            }
        });
        join_all(futures).await;

        ToolRunManager::new(self.snapshot(run_id))
    }

    /// Snapshot the current handler state for a newly started run
    fn snapshot(&self, run_id: Uuid) -> RunContext {
        RunContext::new(
            run_id,
            self.parent_run_id,
            self.handlers.clone(),
            self.inheritable_handlers.clone(),
        )
    }

    /// Resolve the effective handler set for a new top-level operation.
    ///
    /// Sources are merged in this order:
    ///
    /// 1. `inheritable` seeds the manager — either an existing manager whose
    ///    handler set becomes the inheritable base, or a plain handler list
    ///    registered as inheritable.
    /// 2. `local_handlers` are added through [`copy`](Self::copy) marked
    ///    non-inheritable, so they observe only this operation's direct run
    ///    tree.
    /// 3. When `options.verbose` is set and no registered handler carries
    ///    the console identity, one non-inheritable
    ///    [`ConsoleCallbackHandler`] is added.
    /// 4. When `options.tracing` is set and no registered handler carries
    ///    the tracer identity, one inheritable [`TracingCallbackHandler`]
    ///    is added.
    ///
    /// Returns `None` when no handler source and no triggering option were
    /// supplied — an unset manager means "no observability configured", not
    /// an error.
    pub fn configure(
        inheritable: Option<HandlerSource<'_>>,
        local_handlers: Option<Vec<Arc<dyn CallbackHandler>>>,
        options: &CallbackOptions,
    ) -> Option<CallbackManager> {
        let has_local = local_handlers.is_some();
        let local = local_handlers.unwrap_or_default();

        let mut manager = match inheritable {
            Some(HandlerSource::Manager(existing)) => existing.copy(&local, false),
            Some(HandlerSource::Handlers(handlers)) => {
                let mut seeded = CallbackManager::new();
                seeded.set_handlers(handlers, true);
                seeded.copy(&local, false)
            }
            None => {
                if !has_local && !options.verbose && !options.tracing {
                    return None;
                }
                CallbackManager::new().copy(&local, false)
            }
        };

        if options.verbose && !manager.has_handler_named(CONSOLE_HANDLER_NAME) {
            manager.add_handler(Arc::new(ConsoleCallbackHandler::new()), false);
        }

        if options.tracing && !manager.has_handler_named(TRACING_HANDLER_NAME) {
            manager.add_handler(Arc::new(TracingCallbackHandler::new()), true);
        }

        Some(manager)
    }

    fn has_handler_named(&self, name: &str) -> bool {
        self.handlers.iter().any(|h| h.name() == name)
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &self.handlers.len())
            .field("inheritable_handlers", &self.inheritable_handlers.len())
            .field("parent_run_id", &self.parent_run_id)
            .finish()
    }
}
