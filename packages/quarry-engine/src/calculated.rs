use crate::error::{EngineError, Result};
use crate::lease::ProjectLeaseRegistry;
use crate::services::ExecutionContext;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use tracing::debug;

/// A computation producing the value of a [`CalculatedValue`].
///
/// A calculator that needs access to the project's mutable state declares it
/// through [`uses_mutable_project_state`](Self::uses_mutable_project_state);
/// the container then runs it under the project lease.
pub trait ValueCalculator<T>: Send {
    fn uses_mutable_project_state(&self) -> bool {
        false
    }

    fn calculate(&self, context: &ExecutionContext) -> Result<T>;
}

impl<T, F> ValueCalculator<T> for F
where
    F: Fn(&ExecutionContext) -> Result<T> + Send,
{
    fn calculate(&self, context: &ExecutionContext) -> Result<T> {
        self(context)
    }
}

/// Wraps a no-dependency computation as a calculator that ignores the
/// context and never takes the project lease.
pub struct SupplierBackedCalculator<F> {
    supplier: F,
}

impl<F> SupplierBackedCalculator<F> {
    pub fn new(supplier: F) -> Self {
        Self { supplier }
    }
}

impl<T, F> ValueCalculator<T> for SupplierBackedCalculator<F>
where
    F: Fn() -> Result<T> + Send,
{
    fn calculate(&self, _context: &ExecutionContext) -> Result<T> {
        (self.supplier)()
    }
}

/// Calculator that declares a need for the project's mutable state; the
/// container acquires the project lease (reentrantly) around it.
pub struct ProjectStateCalculator<F> {
    calculate: F,
}

impl<F> ProjectStateCalculator<F> {
    pub fn new(calculate: F) -> Self {
        Self { calculate }
    }
}

impl<T, F> ValueCalculator<T> for ProjectStateCalculator<F>
where
    F: Fn(&ExecutionContext) -> Result<T> + Send,
{
    fn uses_mutable_project_state(&self) -> bool {
        true
    }

    fn calculate(&self, context: &ExecutionContext) -> Result<T> {
        (self.calculate)(context)
    }
}

/// A lazy, thread-safe, at-most-once-computed holder of a typed result.
///
/// State machine: `Unstarted → Computing → {Success | Failure}`. The terminal
/// states are permanent: a failed container stays failed forever, and a fresh
/// attempt requires a new container. N concurrent calls to
/// [`finalize_if_not_already`](Self::finalize_if_not_already) invoke the
/// calculator exactly once; every caller observes the same terminal outcome,
/// with a happens-before edge from the thread that completed the computation.
pub struct CalculatedValue<T> {
    display_name: String,
    /// Terminal state. Publishing through `OnceLock` gives readers the
    /// required happens-before edge without taking any lock on the fast path.
    result: OnceLock<Result<T>>,
    /// Taken exactly once, by the finalizer that wins the coordination lock.
    calculator: Mutex<Option<Box<dyn ValueCalculator<T>>>>,
    /// Serializes concurrent finalizers of this container.
    coordination: Mutex<()>,
    /// Thread currently running the calculator; used to detect a calculator
    /// that recursively finalizes its own container.
    computing: Mutex<Option<ThreadId>>,
    leases: Option<Arc<ProjectLeaseRegistry>>,
    context: ExecutionContext,
}

impl<T: Clone + Send + Sync + 'static> CalculatedValue<T> {
    /// A dependency-aware container that may need the project lease.
    pub fn new<C: ValueCalculator<T> + 'static>(
        display_name: impl Into<String>,
        calculator: C,
        leases: Arc<ProjectLeaseRegistry>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            result: OnceLock::new(),
            calculator: Mutex::new(Some(Box::new(calculator))),
            coordination: Mutex::new(()),
            computing: Mutex::new(None),
            leases: Some(leases),
            context,
        }
    }

    /// A container born in the `Success` state. Never invokes a calculator
    /// and never locks.
    pub fn new_eager(display_name: impl Into<String>, value: T) -> Self {
        let result = OnceLock::new();
        let _ = result.set(Ok(value));
        Self {
            display_name: display_name.into(),
            result,
            calculator: Mutex::new(None),
            coordination: Mutex::new(()),
            computing: Mutex::new(None),
            leases: None,
            context: ExecutionContext::empty(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether the container has reached a terminal state.
    pub fn is_finalized(&self) -> bool {
        self.result.get().is_some()
    }

    /// Drive the container to a terminal state.
    ///
    /// Fast path: returns immediately, without locking, when the container is
    /// already terminal. Otherwise the coordination lock serializes
    /// concurrent finalizers; the losers block here until the winner has
    /// published the result, then observe it on the double-check. When the
    /// calculator declares a need for mutable project state the project lease
    /// is additionally held (reentrantly) for the duration of the
    /// computation, and the result is stored strictly before the lease is
    /// released.
    ///
    /// Returns an error only when the calling thread's own calculator
    /// re-entered this container (a self-referential value). Calculator
    /// failures are captured into the terminal state and surface from
    /// [`get`](Self::get).
    pub fn finalize_if_not_already(&self) -> Result<()> {
        if self.result.get().is_some() {
            return Ok(());
        }

        if *self.computing.lock() == Some(thread::current().id()) {
            return Err(EngineError::SelfReference(self.display_name.clone()));
        }

        let _coordination = self.coordination.lock();
        if self.result.get().is_some() {
            return Ok(());
        }

        let calculator = match self.calculator.lock().take() {
            Some(calculator) => calculator,
            // Only reachable when a previous finalizer panicked before
            // publishing a result.
            None => {
                return Err(EngineError::Calculation(format!(
                    "a previous attempt to calculate {} did not complete",
                    self.display_name
                )))
            }
        };

        *self.computing.lock() = Some(thread::current().id());
        let _reset = ResetComputing(&self.computing);

        debug!(value = %self.display_name, "calculating");
        let needs_lease = calculator.uses_mutable_project_state();
        let calculate_and_store = || {
            let outcome = calculator.calculate(&self.context);
            if let Err(error) = &outcome {
                debug!(value = %self.display_name, %error, "calculation failed");
            }
            // Published before the lease is released.
            let _ = self.result.set(outcome);
        };
        match (&self.leases, needs_lease) {
            (Some(leases), true) => leases.with_lease(calculate_and_store),
            _ => calculate_and_store(),
        }
        Ok(())
    }

    /// The computed value, or the identical replay of the captured failure.
    /// Fails with [`EngineError::NotYetCalculated`] if no finalize ever
    /// completed.
    pub fn get(&self) -> Result<T> {
        match self.result.get() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(EngineError::NotYetCalculated(self.display_name.clone())),
        }
    }
}

struct ResetComputing<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for ResetComputing<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}
