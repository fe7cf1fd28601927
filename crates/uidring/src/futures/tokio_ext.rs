use core::future::Future;

use crate::{Result, TokioSleep, UidGenerator, UidGeneratorAsyncExt};

/// Extension trait for asynchronously generating UIDs using the
/// [`tokio`](https://docs.rs/tokio) async runtime.
///
/// This trait uses [`TokioSleep`] as the sleep provider, so callers don't
/// have to name one.
pub trait UidGeneratorAsyncTokioExt {
    /// Returns a future that resolves to the next UID, sleeping on the Tokio
    /// timer through transient errors.
    ///
    /// # Errors
    ///
    /// Returns any non-transient error from the underlying generator.
    fn get_uid_async(&self) -> impl Future<Output = Result<u64>> + Send;
}

impl<G> UidGeneratorAsyncTokioExt for G
where
    G: UidGenerator + Sync,
{
    fn get_uid_async(&self) -> impl Future<Output = Result<u64>> + Send {
        <Self as UidGeneratorAsyncExt>::try_get_uid_async::<TokioSleep>(self)
    }
}
