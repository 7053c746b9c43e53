use crate::error::Result;
use crate::factory::CalculatedValueFactory;
use crate::operations::BuildOperationObserver;
use crate::services::ExecutionContext;
use crate::steps::{
    BuildOperationStep, CachingStep, ExecuteStep, ExecutionRequest, Step, UpToDateStep,
};
use crate::work::{UnitOfWork, WorkResult};
use std::sync::Arc;

/// Entry point of the step pipeline.
///
/// The chain is assembled once at configuration time and reused for every
/// execution request:
///
/// `BuildOperationStep → UpToDateStep → CachingStep → ExecuteStep`
///
/// so every submission is instrumented, up-to-date work is skipped before
/// the cache is consulted, and everything that does run is executed at most
/// once per identity.
pub struct ExecutionEngine {
    chain: Box<dyn Step>,
}

impl ExecutionEngine {
    pub fn new(factory: &CalculatedValueFactory, observer: Arc<dyn BuildOperationObserver>) -> Self {
        let chain = BuildOperationStep::new(
            observer,
            UpToDateStep::new(CachingStep::new(
                factory.create_cache("unit of work results"),
                ExecuteStep,
            )),
        );
        Self {
            chain: Box::new(chain),
        }
    }

    /// Run a unit of work through the chain.
    pub fn execute(
        &self,
        work: Arc<dyn UnitOfWork>,
        context: &ExecutionContext,
    ) -> Result<WorkResult> {
        self.chain.execute(work, ExecutionRequest::new(context.clone()))
    }
}
