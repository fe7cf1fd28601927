use crate::{BitLayout, Error, Result};

/// Supplies the worker ID a generator stamps into every UID.
///
/// The assigner is called exactly once, when the generator is built. The
/// returned value must be unique among all generators running concurrently
/// with the same layout and epoch, and stable for the process lifetime. How
/// that uniqueness is achieved (a lease table, a config file, the pod
/// ordinal, ...) is up to the implementation.
///
/// Closures returning `Result<u64>` implement this trait:
///
/// ```
/// use uidring::WorkerIdAssigner;
///
/// let from_env = || -> uidring::Result<u64> { Ok(7) };
/// assert_eq!(from_env.assign_worker_id(), Ok(7));
/// ```
pub trait WorkerIdAssigner {
    /// Returns this process's worker ID.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::WorkerIdUnavailable`] when no ID can be
    /// obtained; generator construction then fails.
    fn assign_worker_id(&self) -> Result<u64>;
}

/// A worker ID known up front.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedWorkerId(pub u64);

impl WorkerIdAssigner for FixedWorkerId {
    fn assign_worker_id(&self) -> Result<u64> {
        Ok(self.0)
    }
}

impl<F> WorkerIdAssigner for F
where
    F: Fn() -> Result<u64>,
{
    fn assign_worker_id(&self) -> Result<u64> {
        self()
    }
}

/// Calls the assigner and checks the result fits the layout.
pub(crate) fn checked_worker_id(
    assigner: &impl WorkerIdAssigner,
    layout: &BitLayout,
) -> Result<u64> {
    let worker_id = assigner.assign_worker_id()?;
    if worker_id > layout.max_worker_id() {
        return Err(Error::WorkerIdOutOfRange {
            worker_id,
            max: layout.max_worker_id(),
        });
    }
    Ok(worker_id)
}
