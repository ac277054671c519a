//! Process-wide plan instance.
//!
//! Build scripts that declare commands from many independent modules can
//! share a single [`Plan`] through this module instead of threading a
//! `&mut Plan` everywhere. The instance is created exactly once with
//! [`init`]; creating it again while one is live is an error, as is any
//! use before initialization. All access goes through one mutex, which
//! also makes the scan-then-append deduplication atomic if authoring
//! code ever runs on multiple threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::Utf8Path;

use crate::error::PlanError;
use crate::plan::Plan;

static INSTANCE: Mutex<Option<Plan>> = Mutex::new(None);

fn lock() -> MutexGuard<'static, Option<Plan>> {
    // The plan has no invariant a panicked closure can leave half-done
    // across the lock, so a poisoned mutex is safe to keep using.
    INSTANCE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create the process-wide plan. Errors if one already exists.
pub fn init(workspace_root: impl AsRef<Utf8Path>) -> Result<(), PlanError> {
    let mut slot = lock();
    if slot.is_some() {
        return Err(PlanError::AlreadyInitialized);
    }
    *slot = Some(Plan::new(workspace_root)?);
    Ok(())
}

/// Run `f` against the process-wide plan.
pub fn with<R>(f: impl FnOnce(&mut Plan) -> Result<R, PlanError>) -> Result<R, PlanError> {
    let mut slot = lock();
    let plan = slot.as_mut().ok_or(PlanError::NotInitialized)?;
    f(plan)
}

/// Tear the instance down and hand the plan back, typically right before
/// serializing it.
pub fn take() -> Result<Plan, PlanError> {
    lock().take().ok_or(PlanError::NotInitialized)
}
