#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(feature = "parking-lot")]
pub use parking_lot::{Mutex, MutexGuard};

/// Locks `$mutex`, propagating poisoning as [`crate::Error::LockPoisoned`]
/// when the std mutex is in use.
macro_rules! lock {
    ($mutex:expr) => {{
        #[cfg(feature = "parking-lot")]
        {
            $mutex.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $mutex.lock()?
        }
    }};
}

pub(crate) use lock;
