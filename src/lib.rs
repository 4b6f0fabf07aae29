pub mod callbacks;
pub mod error;
pub mod tracer;

pub use error::{Result, RunscopeError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::callbacks::{
        AgentAction, AgentFinish, CallbackHandler, CallbackManager, CallbackOptions,
        ChainRunManager, ConsoleCallbackHandler, HandlerBuilder, HandlerSource, LlmRunManager,
        RunSubject, ToolRunManager,
    };
    pub use crate::error::{Result, RunscopeError};
    pub use crate::tracer::{EventStore, TracingCallbackHandler};
}
