mod cached;
mod default;
mod interface;
mod mutex;
mod parsed;
mod sequencer;
#[cfg(test)]
mod tests;

pub use cached::*;
pub use default::*;
pub use interface::*;
pub(crate) use mutex::lock;
#[cfg(not(feature = "parking-lot"))]
pub use mutex::{Mutex, MutexGuard, PoisonError};
#[cfg(feature = "parking-lot")]
pub use mutex::{Mutex, MutexGuard};
pub use parsed::*;
pub use sequencer::*;
