//! Run recording for observability and debugging
//!
//! This module provides the recording side of the callback system: a handler
//! that turns dispatched lifecycle events into structured records, and the
//! thread-safe store those records live in.
//!
//! # Architecture
//!
//! - **RunTraceEvent**: base trait for all recorded events, carrying a
//!   timestamp, the run identifier, and the parent run identifier
//! - **EventStore**: thread-safe storage with an on-store callback, time and
//!   predicate filtering, and per-run lineage queries
//! - **TracingCallbackHandler**: a [`CallbackHandler`](crate::callbacks::CallbackHandler)
//!   recording every event it receives into a store, stamping end and error
//!   records with run durations
//!
//! # Event Types
//!
//! - **RunStartEvent / RunEndEvent / RunErrorEvent**: run boundaries, tagged
//!   with the run category (llm, chain, tool)
//! - **TokenEvent**: one streamed model token
//! - **AgentActionEvent / AgentFinishEvent**: agent decisions within a
//!   pipeline run
//! - **TextEvent**: free-text trace messages
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use runscope::callbacks::{CallbackManager, RunSubject};
//! use runscope::tracer::TracingCallbackHandler;
//! use std::sync::Arc;
//!
//! let tracer = Arc::new(TracingCallbackHandler::new());
//! let store = tracer.store();
//!
//! let mut manager = CallbackManager::new();
//! manager.add_handler(tracer, true);
//!
//! let run = manager.start_llm_run(&RunSubject::new("gpt-oss"), &prompts, None).await;
//! run.handle_llm_end(&output).await;
//!
//! for summary in store.events_for_run(run.run_id()) {
//!     println!("{}", summary);
//! }
//! ```
//!
//! # Run Identifiers
//!
//! Records carry the `(run_id, parent_run_id)` pair of the run that produced
//! them, so the full call tree of a traced operation can be reconstructed
//! from the store's contents after the fact.

pub mod event_store;
pub mod run_events;
pub mod tracing_handler;

// Re-export main types
pub use event_store::{EventCallback, EventStore};
pub use run_events::{
    AgentActionEvent, AgentFinishEvent, EventFilterFn, RunCategory, RunEndEvent, RunErrorEvent,
    RunStartEvent, RunTraceEvent, TextEvent, TokenEvent,
};
pub use tracing_handler::{TracingCallbackHandler, TRACING_HANDLER_NAME};
