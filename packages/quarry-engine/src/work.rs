use crate::error::Result;
use crate::services::ExecutionContext;
use serde::{Deserialize, Serialize};

/// Identity of a schedulable unit of work. Two submissions with the same
/// unique id are treated as the same work by the caching stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkIdentity {
    unique_id: String,
}

impl WorkIdentity {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }
}

impl std::fmt::Display for WorkIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unique_id)
    }
}

/// Outcome of the up-to-date check over a unit of work's incremental inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpToDateCheck {
    /// Nothing relevant changed; execution can be skipped.
    UpToDate,
    /// Execution is required, for the given human-readable reasons.
    OutOfDate(Vec<String>),
}

/// A schedulable, identity-bearing piece of work the pipeline can execute or
/// skip. Opaque to the engine beyond its identity, its up-to-date check and
/// its `execute` capability.
pub trait UnitOfWork: Send + Sync {
    fn identity(&self) -> &WorkIdentity;

    fn display_name(&self) -> String;

    /// Compare the work's incremental-input description against its previous
    /// execution. The default has no history and always requires execution.
    fn check_up_to_date(&self, _context: &ExecutionContext) -> UpToDateCheck {
        UpToDateCheck::OutOfDate(vec!["no history is available".to_string()])
    }

    fn execute(&self, context: &ExecutionContext) -> Result<serde_json::Value>;
}

/// How a unit of work reached its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOutcome {
    /// The work's `execute` capability ran.
    Executed,
    /// Skipped: the up-to-date check found nothing changed.
    UpToDate,
    /// Replayed from a previously cached execution of the same identity.
    FromCache,
}

impl WorkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOutcome::Executed => "executed",
            WorkOutcome::UpToDate => "up_to_date",
            WorkOutcome::FromCache => "from_cache",
        }
    }
}

impl std::fmt::Display for WorkOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running a unit of work through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkResult {
    pub outcome: WorkOutcome,
    /// Why the work executed (or none, when it was skipped). Reported to
    /// telemetry verbatim.
    pub execution_reasons: Vec<String>,
    pub output: serde_json::Value,
}

impl WorkResult {
    pub fn executed(execution_reasons: Vec<String>, output: serde_json::Value) -> Self {
        Self {
            outcome: WorkOutcome::Executed,
            execution_reasons,
            output,
        }
    }

    pub fn up_to_date() -> Self {
        Self {
            outcome: WorkOutcome::UpToDate,
            execution_reasons: Vec::new(),
            output: serde_json::Value::Null,
        }
    }

    /// The same result, marked as replayed from the cache.
    pub fn reused_from_cache(self) -> Self {
        Self {
            outcome: WorkOutcome::FromCache,
            ..self
        }
    }
}
