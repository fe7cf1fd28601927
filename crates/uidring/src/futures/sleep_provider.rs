use core::{future::Future, time::Duration};

/// A trait that abstracts over how to sleep for a given [`Duration`] in async
/// contexts.
///
/// This keeps the retry loop in [`UidGeneratorAsyncExt`] independent of the
/// runtime.
///
/// [`UidGeneratorAsyncExt`]: crate::UidGeneratorAsyncExt
pub trait SleepProvider {
    /// The future is `Send` so retrying tasks can move between worker
    /// threads.
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider for use in async applications built on Tokio.
pub struct TokioSleep;

impl SleepProvider for TokioSleep {
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// Ignores the requested duration and yields to the scheduler instead. Retries
/// come back sooner, at the cost of a tighter polling loop while the buffer is
/// being refilled or the clock recovers.
pub struct TokioYield;

impl SleepProvider for TokioYield {
    fn sleep_for(_dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}
