use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Descriptor of a named, timed operation span. The details payload carries
/// structured detail such as the work identity.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOperationDescriptor {
    pub id: Uuid,
    pub display_name: String,
    pub details: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

impl BuildOperationDescriptor {
    pub fn new(display_name: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            details,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    Failure,
}

impl OperationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Failure => "failure",
        }
    }
}

/// An open operation span. Closed exactly once, with or without a structured
/// result attached.
pub trait OperationHandle: Send {
    fn set_result(&mut self, result: serde_json::Value);

    fn close(self: Box<Self>, outcome: OperationOutcome);
}

/// Records structured start/result/completion of pipeline stages. Injected;
/// the engine has no opinion about the backend.
pub trait BuildOperationObserver: Send + Sync {
    fn begin(&self, descriptor: BuildOperationDescriptor) -> Box<dyn OperationHandle>;
}

/// Default sink: reports operations through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl BuildOperationObserver for LoggingObserver {
    fn begin(&self, descriptor: BuildOperationDescriptor) -> Box<dyn OperationHandle> {
        info!(
            operation = %descriptor.display_name,
            id = %descriptor.id,
            details = %descriptor.details,
            "operation started"
        );
        Box::new(LoggingHandle {
            descriptor,
            result: None,
        })
    }
}

struct LoggingHandle {
    descriptor: BuildOperationDescriptor,
    result: Option<serde_json::Value>,
}

impl OperationHandle for LoggingHandle {
    fn set_result(&mut self, result: serde_json::Value) {
        self.result = Some(result);
    }

    fn close(self: Box<Self>, outcome: OperationOutcome) {
        let Self { descriptor, result } = *self;
        let duration_ms = (Utc::now() - descriptor.started_at).num_milliseconds();
        match outcome {
            OperationOutcome::Success => info!(
                operation = %descriptor.display_name,
                id = %descriptor.id,
                duration_ms,
                result = %result.unwrap_or(serde_json::Value::Null),
                "operation completed"
            ),
            OperationOutcome::Failure => error!(
                operation = %descriptor.display_name,
                id = %descriptor.id,
                duration_ms,
                "operation failed"
            ),
        }
    }
}

/// A closed operation, as captured by [`RecordingObserver`].
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub display_name: String,
    pub details: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub outcome: OperationOutcome,
}

/// In-memory sink for tests and tooling: captures every closed operation for
/// later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    records: Arc<Mutex<Vec<OperationRecord>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operations closed so far.
    pub fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().clone()
    }
}

impl BuildOperationObserver for RecordingObserver {
    fn begin(&self, descriptor: BuildOperationDescriptor) -> Box<dyn OperationHandle> {
        Box::new(RecordingHandle {
            descriptor,
            result: None,
            records: Arc::clone(&self.records),
        })
    }
}

struct RecordingHandle {
    descriptor: BuildOperationDescriptor,
    result: Option<serde_json::Value>,
    records: Arc<Mutex<Vec<OperationRecord>>>,
}

impl OperationHandle for RecordingHandle {
    fn set_result(&mut self, result: serde_json::Value) {
        self.result = Some(result);
    }

    fn close(self: Box<Self>, outcome: OperationOutcome) {
        self.records.lock().push(OperationRecord {
            display_name: self.descriptor.display_name,
            details: self.descriptor.details,
            result: self.result,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_observer_captures_result_and_outcome() {
        let observer = RecordingObserver::new();

        let mut handle = observer.begin(BuildOperationDescriptor::new(
            "Execute compile:app",
            json!({"work_id": "compile:app"}),
        ));
        handle.set_result(json!({"execution_reasons": ["changed input X"]}));
        handle.close(OperationOutcome::Success);

        let records = observer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Execute compile:app");
        assert_eq!(records[0].details, json!({"work_id": "compile:app"}));
        assert_eq!(
            records[0].result,
            Some(json!({"execution_reasons": ["changed input X"]}))
        );
        assert_eq!(records[0].outcome, OperationOutcome::Success);
    }

    #[test]
    fn test_operation_closed_without_result_records_none() {
        let observer = RecordingObserver::new();

        let handle = observer.begin(BuildOperationDescriptor::new("Execute doomed", json!({})));
        handle.close(OperationOutcome::Failure);

        let records = observer.records();
        assert_eq!(records[0].result, None);
        assert_eq!(records[0].outcome, OperationOutcome::Failure);
    }

    #[test]
    fn test_descriptors_get_distinct_ids() {
        let a = BuildOperationDescriptor::new("op", serde_json::Value::Null);
        let b = BuildOperationDescriptor::new("op", serde_json::Value::Null);
        assert_ne!(a.id, b.id);
    }
}
