use core::{future::Future, time::Duration};

use super::SleepProvider;
use crate::{Error, Result, UidGenerator};

/// How long to back off after a transient error, `None` for errors that are
/// returned to the caller.
fn backoff(err: &Error) -> Option<Duration> {
    match err {
        Error::BufferEmpty => Some(Duration::from_millis(1)),
        Error::ClockRolledBack { seconds_behind } => {
            Some(Duration::from_secs(seconds_behind.unsigned_abs()))
        }
        _ => None,
    }
}

/// Extension trait for asynchronously generating UIDs.
///
/// This trait enables [`UidGenerator`] types to yield UIDs in a
/// `Future`-based context, sleeping through transient failures instead of
/// returning them.
pub trait UidGeneratorAsyncExt {
    /// Returns a future that resolves to the next UID.
    ///
    /// Transient errors are retried: after [`Error::BufferEmpty`] the future
    /// sleeps 1 ms, after [`Error::ClockRolledBack`] it sleeps for the
    /// reported number of seconds. The sleep comes from `S`.
    ///
    /// # Errors
    ///
    /// Any error for which [`Error::is_transient`] is `false`.
    fn try_get_uid_async<S>(&self) -> impl Future<Output = Result<u64>> + Send
    where
        S: SleepProvider;
}

impl<G> UidGeneratorAsyncExt for G
where
    G: UidGenerator + Sync,
{
    fn try_get_uid_async<S>(&self) -> impl Future<Output = Result<u64>> + Send
    where
        S: SleepProvider,
    {
        async move {
            loop {
                let dur = match self.get_uid() {
                    Ok(uid) => return Ok(uid),
                    Err(e) => backoff(&e).ok_or(e)?,
                };
                #[cfg(feature = "tracing")]
                tracing::trace!(?dur, "uid not ready, backing off");
                S::sleep_for(dur).await;
            }
        }
    }
}
