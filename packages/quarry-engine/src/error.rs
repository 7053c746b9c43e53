use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error taxonomy.
///
/// The enum is `Clone` on purpose: a calculated value captures the failure of
/// its single calculator invocation and replays the identical error to every
/// concurrent and later caller. Failures are never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `get()` was called before any finalize completed. Programming error.
    #[error("value for {0} has not been calculated yet")]
    NotYetCalculated(String),

    /// A calculator recursively finalized its own container.
    #[error("calculation of {0} refers to itself and can never complete")]
    SelfReference(String),

    /// Capability lookup for an unregistered service. Configuration error,
    /// never retried.
    #[error("no service of type {0} is registered")]
    ServiceNotRegistered(&'static str),

    /// A calculator raised an error.
    #[error("calculation failed: {0}")]
    Calculation(String),

    /// A unit of work raised an error during execution.
    #[error("execution of {work} failed: {message}")]
    WorkExecution { work: String, message: String },
}

impl EngineError {
    pub fn calculation<E: std::fmt::Display>(e: E) -> Self {
        Self::Calculation(e.to_string())
    }

    pub fn work_execution<E: std::fmt::Display>(work: impl Into<String>, e: E) -> Self {
        Self::WorkExecution {
            work: work.into(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_display_name() {
        let err = EngineError::NotYetCalculated("checksum of libA".to_string());
        assert!(err.to_string().contains("checksum of libA"));
    }

    #[test]
    fn test_cloned_error_is_identical() {
        let err = EngineError::calculation("network unreachable");
        let replayed = err.clone();
        assert_eq!(err, replayed);
        assert_eq!(err.to_string(), replayed.to_string());
    }

    #[test]
    fn test_work_execution_helper() {
        let err = EngineError::work_execution("compile :app", "missing source set");
        match &err {
            EngineError::WorkExecution { work, message } => {
                assert_eq!(work, "compile :app");
                assert_eq!(message, "missing source set");
            }
            _ => panic!("Expected WorkExecution"),
        }
    }
}
