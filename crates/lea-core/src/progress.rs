//! Progress events emitted by the executor.

use crate::table_ref::TableRef;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Terminal status of a node within one run.
///
/// For a given node the executor emits exactly one `Started` followed by
/// exactly one of the terminal variants, never interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Started,
    Done,
    Skipped,
    SkippedUpstream,
    Errored,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeStatus::Started)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Started => write!(f, "started"),
            NodeStatus::Done => write!(f, "done"),
            NodeStatus::Skipped => write!(f, "skipped"),
            NodeStatus::SkippedUpstream => write!(f, "skipped (upstream error)"),
            NodeStatus::Errored => write!(f, "errored"),
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub node: TableRef,
    pub status: NodeStatus,
    /// Wall-clock duration, present on terminal events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    /// Rows written, when the warehouse reported a count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    /// Error text or sample failing rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn started(node: TableRef) -> Self {
        Self {
            node,
            status: NodeStatus::Started,
            duration: None,
            rows: None,
            message: None,
        }
    }

    pub fn terminal(node: TableRef, status: NodeStatus, duration: Duration) -> Self {
        Self {
            node,
            status,
            duration: Some(duration),
            rows: None,
            message: None,
        }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Receiver of progress events.
///
/// Implementations must tolerate concurrent emission from executor workers.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Sink that discards everything. Useful in tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}
