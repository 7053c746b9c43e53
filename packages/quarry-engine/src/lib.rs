/*
 * Quarry Engine - Incremental Execution Core
 *
 * The incremental-computation engine of the Quarry build orchestrator.
 *
 * Architecture:
 * - Calculated Values (lazy, thread-safe, at-most-once computation)
 * - Keyed Calculated Value Cache (one computation per key)
 * - Project Lease (reentrant mutual exclusion over mutable project state)
 * - Step Pipeline (skip / cache / instrument / execute, composed once)
 * - Build Operations (pluggable telemetry sink)
 */

// Public modules
pub mod cache;
pub mod calculated;
pub mod engine;
pub mod error;
pub mod factory;
pub mod lease;
pub mod operations;
pub mod services;
pub mod steps;
pub mod work;

// Re-exports
pub use cache::CalculatedValueCache;
pub use calculated::{
    CalculatedValue, ProjectStateCalculator, SupplierBackedCalculator, ValueCalculator,
};
pub use engine::ExecutionEngine;
pub use error::{EngineError, Result};
pub use factory::CalculatedValueFactory;
pub use lease::ProjectLeaseRegistry;
pub use operations::{
    BuildOperationDescriptor, BuildOperationObserver, LoggingObserver, OperationHandle,
    OperationOutcome, OperationRecord, RecordingObserver,
};
pub use services::{ExecutionContext, ServiceRegistry};
pub use steps::{
    BuildOperationStep, CachingStep, ExecuteStep, ExecutionRequest, Step, UpToDateStep,
};
pub use work::{UnitOfWork, UpToDateCheck, WorkIdentity, WorkOutcome, WorkResult};
