//! Run tracking and lifecycle event dispatch.
//!
//! This module is the core of the library: a hierarchical run-tracking and
//! event-dispatch system for observing trees of nested operations — model
//! calls, pipeline stages, and tool invocations.
//!
//! # Architecture
//!
//! - **CallbackHandler**: the observer contract — lifecycle methods with
//!   no-op defaults, per-category suppression flags, a stable identity name,
//!   and a duplication operation
//! - **CallbackManager**: the mutable entry point — owns the registered
//!   handler set, starts runs, and resolves effective handler sets via
//!   `configure`
//! - **Run managers** (`LlmRunManager`, `ChainRunManager`, `ToolRunManager`):
//!   immutable per-run dispatchers created by the manager's start operations,
//!   each exposing only the events meaningful for its run category
//! - **HandlerBuilder**: assembles a one-off handler from per-event closures
//! - **ConsoleCallbackHandler**: prints events to stdout; auto-registered in
//!   verbose mode
//!
//! # Run Trees
//!
//! Every run carries a `Uuid` identifier, minted at start unless the caller
//! supplies one. Pipeline and tool runs can derive a child `CallbackManager`
//! whose runs are linked to them as children, so observers can reconstruct
//! the full call tree from `(run_id, parent_run_id)` pairs. The core itself
//! never materializes the tree.
//!
//! # Failure Isolation
//!
//! Events fan out to all applicable handlers concurrently, and every handler
//! invocation is independently fault-isolated: a failing handler is logged
//! and skipped, other handlers still receive the event, and the dispatch
//! call never fails. A misbehaving observer can degrade observability, never
//! the operation it observes.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use runscope::callbacks::{CallbackManager, CallbackOptions, HandlerSource, RunSubject};
//!
//! let manager = CallbackManager::configure(
//!     None,
//!     Some(vec![my_handler]),
//!     &CallbackOptions::from_env(),
//! );
//!
//! if let Some(manager) = manager {
//!     let run = manager
//!         .start_chain_run(&RunSubject::new("summarize"), &inputs, None)
//!         .await;
//!
//!     // ... drive the pipeline, observing nested calls via run.child() ...
//!
//!     run.handle_chain_end(&outputs).await;
//! }
//! ```

pub mod builder;
pub mod console_handler;
pub mod handler;
pub mod manager;
pub mod run_manager;

// Re-export main types
pub use builder::HandlerBuilder;
pub use console_handler::{ConsoleCallbackHandler, CONSOLE_HANDLER_NAME};
pub use handler::{AgentAction, AgentFinish, CallbackHandler, RunSubject};
pub use manager::{CallbackManager, CallbackOptions, HandlerSource, TRACING_ENV_VAR};
pub use run_manager::{ChainRunManager, LlmRunManager, RunContext, ToolRunManager};
