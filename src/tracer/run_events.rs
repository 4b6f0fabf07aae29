//! Structured records of run lifecycle events.
//!
//! This module defines the typed event records produced by the
//! [`TracingCallbackHandler`](super::TracingCallbackHandler) as it observes
//! runs. All records implement the `RunTraceEvent` trait, which provides
//! timestamps, run identifiers, and printable summaries. The run tree is
//! reconstructable from the `(run_id, parent_run_id)` pairs the records
//! carry.

use crate::callbacks::{AgentAction, AgentFinish, RunSubject};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Trait for filtering trace events
///
/// Implement this trait to create custom event filters. This trait is used
/// instead of raw closure types to avoid type complexity warnings.
pub trait EventFilterFn: Send + Sync {
    /// Test whether an event passes the filter
    fn matches(&self, event: &dyn RunTraceEvent) -> bool;
}

impl<F> EventFilterFn for F
where
    F: Fn(&dyn RunTraceEvent) -> bool + Send + Sync,
{
    fn matches(&self, event: &dyn RunTraceEvent) -> bool {
        self(event)
    }
}

/// Category of an observed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunCategory {
    Llm,
    Chain,
    Tool,
}

impl std::fmt::Display for RunCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunCategory::Llm => write!(f, "llm"),
            RunCategory::Chain => write!(f, "chain"),
            RunCategory::Tool => write!(f, "tool"),
        }
    }
}

/// Base trait for all recorded run events
pub trait RunTraceEvent: Send + Sync {
    /// Get the timestamp when the event occurred (Unix timestamp)
    fn timestamp(&self) -> f64;

    /// Get the identifier of the run the event belongs to
    fn run_id(&self) -> Uuid;

    /// Get the identifier of the run's parent, if the run is nested
    fn parent_run_id(&self) -> Option<Uuid>;

    /// Get a formatted string summary of the event
    fn printable_summary(&self) -> String;
}

/// Get current timestamp as Unix timestamp (seconds since epoch)
pub(crate) fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn format_time(timestamp: f64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string()
}

fn short_id(run_id: Uuid) -> String {
    run_id.to_string()[..8].to_string()
}

/// Records the start of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// Category of the run
    pub category: RunCategory,
    /// Identity of the operation being observed
    pub subject: RunSubject,
    /// Category-appropriate start payload: prompts, inputs, or tool input
    pub payload: Value,
}

impl RunTraceEvent for RunStartEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        let mut summary = format!(
            "[{}] {} start {} '{}'",
            format_time(self.timestamp),
            self.category,
            short_id(self.run_id),
            self.subject.name
        );
        if let Some(parent) = self.parent_run_id {
            summary.push_str(&format!(" (parent {})", short_id(parent)));
        }
        summary
    }
}

/// Records the successful completion of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEndEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// Category of the run
    pub category: RunCategory,
    /// Final output of the run
    pub output: Value,
    /// Duration from the run's start event, when the start was observed
    pub duration_ms: Option<f64>,
}

impl RunTraceEvent for RunEndEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        let mut summary = format!(
            "[{}] {} end {}",
            format_time(self.timestamp),
            self.category,
            short_id(self.run_id)
        );
        if let Some(duration) = self.duration_ms {
            summary.push_str(&format!(" ({:.2}ms)", duration));
        }
        summary
    }
}

/// Records the failure of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunErrorEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// Category of the run
    pub category: RunCategory,
    /// Display rendering of the failure
    pub error: String,
    /// Duration from the run's start event, when the start was observed
    pub duration_ms: Option<f64>,
}

impl RunTraceEvent for RunErrorEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        format!(
            "[{}] {} error {}: {}",
            format_time(self.timestamp),
            self.category,
            short_id(self.run_id),
            self.error
        )
    }
}

/// Records a single streamed token from a model run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// The generated token
    pub token: String,
}

impl RunTraceEvent for TokenEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        format!(
            "[{}] token {} {:?}",
            format_time(self.timestamp),
            short_id(self.run_id),
            self.token
        )
    }
}

/// Records an agent choosing a tool during a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentActionEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// The action the agent chose
    pub action: AgentAction,
}

impl RunTraceEvent for AgentActionEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        format!(
            "[{}] agent action {} tool '{}'",
            format_time(self.timestamp),
            short_id(self.run_id),
            self.action.tool
        )
    }
}

/// Records an agent producing its final answer during a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinishEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// The agent's final answer
    pub finish: AgentFinish,
}

impl RunTraceEvent for AgentFinishEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        format!(
            "[{}] agent finish {}",
            format_time(self.timestamp),
            short_id(self.run_id)
        )
    }
}

/// Records a free-text trace message attached to a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEvent {
    /// Timestamp when the event occurred (Unix timestamp)
    pub timestamp: f64,
    /// Identifier of the run
    pub run_id: Uuid,
    /// Identifier of the parent run, if nested
    pub parent_run_id: Option<Uuid>,
    /// The trace text
    pub text: String,
}

impl RunTraceEvent for TextEvent {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    fn printable_summary(&self) -> String {
        format!(
            "[{}] text {} {}",
            format_time(self.timestamp),
            short_id(self.run_id),
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_start_event_summary() {
        let run_id = Uuid::new_v4();
        let event = RunStartEvent {
            timestamp: current_timestamp(),
            run_id,
            parent_run_id: None,
            category: RunCategory::Llm,
            subject: RunSubject::new("gpt-oss"),
            payload: json!(["tell me a joke"]),
        };

        assert_eq!(event.run_id(), run_id);
        assert_eq!(event.parent_run_id(), None);

        let summary = event.printable_summary();
        assert!(summary.contains("llm start"));
        assert!(summary.contains("gpt-oss"));
        assert!(!summary.contains("parent"));
    }

    #[test]
    fn test_run_start_event_summary_with_parent() {
        let parent = Uuid::new_v4();
        let event = RunStartEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: Some(parent),
            category: RunCategory::Tool,
            subject: RunSubject::new("calculator"),
            payload: json!("2+2"),
        };

        let summary = event.printable_summary();
        assert!(summary.contains("tool start"));
        assert!(summary.contains("parent"));
    }

    #[test]
    fn test_run_end_event_summary_with_duration() {
        let event = RunEndEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            category: RunCategory::Chain,
            output: json!({"answer": 4}),
            duration_ms: Some(150.5),
        };

        let summary = event.printable_summary();
        assert!(summary.contains("chain end"));
        assert!(summary.contains("150.5"));
    }

    #[test]
    fn test_run_error_event_summary() {
        let event = RunErrorEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            category: RunCategory::Llm,
            error: "connection refused".to_string(),
            duration_ms: None,
        };

        let summary = event.printable_summary();
        assert!(summary.contains("llm error"));
        assert!(summary.contains("connection refused"));
    }

    #[test]
    fn test_token_event_summary() {
        let event = TokenEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            token: "hello".to_string(),
        };

        let summary = event.printable_summary();
        assert!(summary.contains("token"));
        assert!(summary.contains("hello"));
    }

    #[test]
    fn test_agent_action_event_summary() {
        let event = AgentActionEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            action: AgentAction {
                tool: "search".to_string(),
                tool_input: json!("rust"),
                log: "searching the web".to_string(),
            },
        };

        let summary = event.printable_summary();
        assert!(summary.contains("agent action"));
        assert!(summary.contains("search"));
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = RunEndEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: Some(Uuid::new_v4()),
            category: RunCategory::Tool,
            output: json!("42"),
            duration_ms: Some(25.0),
        };

        let serialized = serde_json::to_string(&event).unwrap();
        assert!(serialized.contains("tool"));

        let roundtrip: RunEndEvent = serde_json::from_str(&serialized).unwrap();
        assert_eq!(roundtrip.run_id, event.run_id);
        assert_eq!(roundtrip.duration_ms, Some(25.0));
    }

    #[test]
    fn test_run_category_display() {
        assert_eq!(RunCategory::Llm.to_string(), "llm");
        assert_eq!(RunCategory::Chain.to_string(), "chain");
        assert_eq!(RunCategory::Tool.to_string(), "tool");
    }

    #[test]
    fn test_event_filter_fn_blanket_impl() {
        let filter = |event: &dyn RunTraceEvent| event.parent_run_id().is_some();

        let root = TextEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            text: "root".to_string(),
        };
        let nested = TextEvent {
            timestamp: current_timestamp(),
            run_id: Uuid::new_v4(),
            parent_run_id: Some(Uuid::new_v4()),
            text: "nested".to_string(),
        };

        assert!(!filter.matches(&root));
        assert!(filter.matches(&nested));
    }
}
