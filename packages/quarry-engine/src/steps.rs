use crate::cache::CalculatedValueCache;
use crate::error::Result;
use crate::operations::{BuildOperationDescriptor, BuildOperationObserver, OperationOutcome};
use crate::services::ExecutionContext;
use crate::work::{UnitOfWork, UpToDateCheck, WorkResult};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Context flowing through the step chain. Stages transform it on the way in
/// (most notably by recording execution reasons) and pass it to their
/// delegate.
#[derive(Clone)]
pub struct ExecutionRequest {
    context: ExecutionContext,
    execution_reasons: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            execution_reasons: Vec::new(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn execution_reasons(&self) -> &[String] {
        &self.execution_reasons
    }

    /// The same request with the given reasons appended.
    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.execution_reasons.extend(reasons);
        self
    }
}

/// One stage of the pipeline. A stage either transforms the request, makes a
/// caching/skip decision (possibly without invoking its delegate), or
/// instruments the call. The chain is composed once at configuration time
/// and reused for every execution request.
///
/// A wrapping stage must preserve an inner failure; it never silently
/// swallows one.
pub trait Step: Send + Sync {
    fn execute(&self, work: Arc<dyn UnitOfWork>, request: ExecutionRequest) -> Result<WorkResult>;
}

/// Terminal stage: performs the real execution of the unit of work.
pub struct ExecuteStep;

impl Step for ExecuteStep {
    fn execute(&self, work: Arc<dyn UnitOfWork>, request: ExecutionRequest) -> Result<WorkResult> {
        debug!(work = %work.identity(), "executing unit of work");
        let output = work.execute(request.context())?;
        Ok(WorkResult::executed(request.execution_reasons, output))
    }
}

/// Skip decision: consults the work's up-to-date check. When nothing
/// changed, short-circuits with an `UpToDate` result without invoking the
/// delegate; otherwise records the out-of-date reasons into the request and
/// delegates.
pub struct UpToDateStep<S> {
    delegate: S,
}

impl<S> UpToDateStep<S> {
    pub fn new(delegate: S) -> Self {
        Self { delegate }
    }
}

impl<S: Step> Step for UpToDateStep<S> {
    fn execute(&self, work: Arc<dyn UnitOfWork>, request: ExecutionRequest) -> Result<WorkResult> {
        match work.check_up_to_date(request.context()) {
            UpToDateCheck::UpToDate => {
                info!(work = %work.identity(), "skipping up-to-date unit of work");
                Ok(WorkResult::up_to_date())
            }
            UpToDateCheck::OutOfDate(reasons) => {
                self.delegate.execute(work, request.with_reasons(reasons))
            }
        }
    }
}

/// Outcome memoization: one calculated value per work identity. Concurrent
/// submissions of the same identity execute once; later submissions replay
/// the stored result marked as coming from the cache. A captured failure is
/// replayed the same way, once per distinct failing unit of work.
pub struct CachingStep<S> {
    results: CalculatedValueCache<String, WorkResult>,
    delegate: Arc<S>,
}

impl<S> CachingStep<S> {
    pub fn new(results: CalculatedValueCache<String, WorkResult>, delegate: S) -> Self {
        Self {
            results,
            delegate: Arc::new(delegate),
        }
    }
}

impl<S: Step + 'static> Step for CachingStep<S> {
    fn execute(&self, work: Arc<dyn UnitOfWork>, request: ExecutionRequest) -> Result<WorkResult> {
        let key = work.identity().unique_id().to_string();
        // The cache cannot tell winner from waiter, so the delegate closure
        // flags the call that actually executed.
        let missed = Arc::new(AtomicBool::new(false));

        let result = {
            let delegate = Arc::clone(&self.delegate);
            let missed = Arc::clone(&missed);
            self.results.compute_if_absent(key, move |_key| {
                missed.store(true, Ordering::Release);
                delegate.execute(Arc::clone(&work), request.clone())
            })?
        };

        if missed.load(Ordering::Acquire) {
            Ok(result)
        } else {
            Ok(result.reused_from_cache())
        }
    }
}

/// Instrumentation: opens a named operation scope carrying the work identity
/// before delegating. On success the execution-reason list is attached to
/// the operation verbatim; on failure the operation is closed as failed and
/// the original error is rethrown unchanged.
pub struct BuildOperationStep<S> {
    observer: Arc<dyn BuildOperationObserver>,
    delegate: S,
}

impl<S> BuildOperationStep<S> {
    pub fn new(observer: Arc<dyn BuildOperationObserver>, delegate: S) -> Self {
        Self { observer, delegate }
    }
}

impl<S: Step> Step for BuildOperationStep<S> {
    fn execute(&self, work: Arc<dyn UnitOfWork>, request: ExecutionRequest) -> Result<WorkResult> {
        let descriptor = BuildOperationDescriptor::new(
            format!("Execute {}", work.display_name()),
            json!({ "work_id": work.identity().unique_id() }),
        );
        let mut operation = self.observer.begin(descriptor);

        match self.delegate.execute(work, request) {
            Ok(result) => {
                operation.set_result(json!({
                    "outcome": result.outcome.as_str(),
                    "execution_reasons": result.execution_reasons,
                }));
                operation.close(OperationOutcome::Success);
                Ok(result)
            }
            Err(error) => {
                operation.close(OperationOutcome::Failure);
                Err(error)
            }
        }
    }
}
