use core::{fmt, time::Duration};
use std::{
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    thread::{self, JoinHandle},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Error, Result, RingBuffer, SystemClock, Take, TimeSource};

/// Mints every UID for one second, in order.
///
/// The cached buffer calls this with strictly increasing seconds, so an
/// implementation never sees the same second twice. An empty batch ends the
/// refill early.
pub trait UidProvider: Send + Sync + 'static {
    /// # Errors
    ///
    /// Any error ends the current refill and is logged. A transient error
    /// (see [`Error::is_transient`]) is retried on the next refill. Any other
    /// error stops refilling for good, and [`CachedIdBuffer::take`] returns
    /// it once the buffer is drained.
    fn provide(&self, second: i64) -> Result<Vec<u64>>;
}

impl<F> UidProvider for F
where
    F: Fn(i64) -> Result<Vec<u64>> + Send + Sync + 'static,
{
    fn provide(&self, second: i64) -> Result<Vec<u64>> {
        self(second)
    }
}

struct Shared {
    ring: RingBuffer,
    provider: Box<dyn UidProvider>,
    running: AtomicBool,
    last_second: AtomicI64,
    shutdown: AtomicBool,
    failure: OnceLock<Error>,
}

/// Clears the single-flight flag even if the provider panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    /// Claims the single-flight flag. Fails while another refill runs, or
    /// for good once the provider failed permanently.
    fn try_start(&self) -> bool {
        self.failure.get().is_none()
            && self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    fn padding(&self) -> usize {
        if !self.try_start() {
            return 0;
        }
        let _running = RunningGuard(&self.running);
        self.fill()
    }

    /// Runs one refill. The caller must hold the single-flight flag.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    fn fill(&self) -> usize {
        #[cfg(feature = "tracing")]
        tracing::debug!(ring = ?self.ring, "padding ring buffer");

        let mut added = 0;
        'fill: loop {
            let second = self.last_second.fetch_add(1, Ordering::AcqRel) + 1;
            let uids = match self.provider.provide(second) {
                Ok(uids) => uids,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(second, error = %e, "uid provider failed, padding stopped");
                    if !e.is_transient() {
                        let _ = self.failure.set(e);
                    }
                    break;
                }
            };
            if uids.is_empty() {
                break;
            }
            for uid in uids {
                if !self.ring.put(uid) {
                    break 'fill;
                }
                added += 1;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(added, ring = ?self.ring, "padding ring buffer finished");
        added
    }

    /// Claims the flag on the calling thread, so concurrent triggers spawn
    /// at most one thread. The spawned thread releases it.
    fn async_padding(self: &Arc<Self>) {
        if !self.try_start() {
            return;
        }
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("uidring-padding".into())
            .spawn(move || {
                let _running = RunningGuard(&shared.running);
                shared.fill();
            });
        if let Err(_e) = spawned {
            self.running.store(false, Ordering::Release);
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, "failed to spawn padding thread");
        }
    }
}

/// A [`RingBuffer`] that refills itself from a [`UidProvider`].
///
/// A [`take`](Self::take) that leaves the buffer under its padding threshold,
/// or finds it empty, starts a refill on a background thread and returns
/// without waiting. At most one refill runs at a time; requests made while
/// one is running are dropped.
///
/// Each refill asks the provider for the second after the last one it
/// requested, so cached seconds are never minted twice.
///
/// Optionally a scheduler thread also pads on a fixed interval (see
/// [`start_scheduled_padding`](Self::start_scheduled_padding)). Dropping
/// the buffer stops and joins it.
///
/// # Example
///
/// ```
/// use uidring::CachedIdBuffer;
///
/// let buffer = CachedIdBuffer::starting_at(8, 50, 0, |second: i64| -> uidring::Result<Vec<u64>> {
///     Ok((0..4).map(|n| second as u64 * 10 + n).collect())
/// })
/// .unwrap();
///
/// assert_eq!(buffer.padding_now(), 7);
/// assert_eq!(buffer.take().unwrap(), 10);
/// assert_eq!(buffer.take().unwrap(), 11);
/// ```
pub struct CachedIdBuffer {
    shared: Arc<Shared>,
    scheduler: Option<JoinHandle<()>>,
}

impl CachedIdBuffer {
    /// Creates an empty buffer whose first refill asks for the second after
    /// the current system time.
    ///
    /// # Errors
    ///
    /// See [`RingBuffer::new`].
    pub fn new(capacity: usize, padding_factor: u8, provider: impl UidProvider) -> Result<Self> {
        Self::starting_at(capacity, padding_factor, SystemClock.current_secs(), provider)
    }

    /// Creates an empty buffer whose first refill asks for `last_second + 1`.
    ///
    /// # Errors
    ///
    /// See [`RingBuffer::new`].
    pub fn starting_at(
        capacity: usize,
        padding_factor: u8,
        last_second: i64,
        provider: impl UidProvider,
    ) -> Result<Self> {
        let ring = RingBuffer::new(capacity, padding_factor)?;
        Ok(Self::from_ring(ring, last_second, provider))
    }

    /// Wraps an existing, usually customized, ring.
    pub fn from_ring(ring: RingBuffer, last_second: i64, provider: impl UidProvider) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring,
                provider: Box::new(provider),
                running: AtomicBool::new(false),
                last_second: AtomicI64::new(last_second),
                shutdown: AtomicBool::new(false),
                failure: OnceLock::new(),
            }),
            scheduler: None,
        }
    }

    /// Appends one UID directly. See [`RingBuffer::put`].
    pub fn put(&self, uid: u64) -> bool {
        self.shared.ring.put(uid)
    }

    /// Takes the oldest cached UID, requesting a background refill when the
    /// buffer runs low.
    ///
    /// # Errors
    ///
    /// [`Error::BufferEmpty`] if nothing is cached right now. A refill has
    /// been requested by the time this returns, so a later retry can
    /// succeed.
    ///
    /// Once the provider has failed with a non-transient error and the
    /// cached UIDs are used up, that error is returned instead and no more
    /// refills run.
    pub fn take(&self) -> Result<u64> {
        match self.shared.ring.take() {
            Take::Ready { uid, needs_padding } => {
                if needs_padding {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(ring = ?self.shared.ring, "reached padding threshold");
                    self.shared.async_padding();
                }
                Ok(uid)
            }
            Take::Empty => {
                if let Some(e) = self.shared.failure.get() {
                    return Err(e.clone());
                }
                self.shared.async_padding();
                Err(Error::BufferEmpty)
            }
        }
    }

    /// Refills on the calling thread until the buffer is full, the provider
    /// fails, or it returns an empty batch.
    ///
    /// Returns the number of UIDs added, `0` if another refill was already
    /// running or the provider has failed permanently.
    pub fn padding_now(&self) -> usize {
        self.shared.padding()
    }

    /// Requests a refill on a background thread and returns immediately.
    pub fn async_padding(&self) {
        self.shared.async_padding();
    }

    /// Starts a thread that pads every `interval` until
    /// [`shutdown`](Self::shutdown) or drop. Calling it again while a
    /// scheduler is running does nothing.
    ///
    /// The thread only holds a weak reference to the buffer.
    ///
    /// # Errors
    ///
    /// [`Error::ThreadSpawn`] if the OS refuses to start the thread.
    pub fn start_scheduled_padding(&mut self, interval: Duration) -> Result<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = thread::Builder::new()
            .name("uidring-scheduler".into())
            .spawn(move || {
                #[cfg(feature = "tracing")]
                tracing::debug!(?interval, "scheduled padding started");
                loop {
                    thread::park_timeout(interval);
                    let Some(shared) = weak.upgrade() else {
                        break;
                    };
                    if shared.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    shared.padding();
                }
                #[cfg(feature = "tracing")]
                tracing::debug!("scheduled padding stopped");
            })
            .map_err(|e| Error::ThreadSpawn(e.to_string()))?;
        self.scheduler = Some(handle);
        Ok(())
    }

    /// Signals the scheduler thread, if any, to exit. It is joined on drop.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = &self.scheduler {
            handle.thread().unpark();
        }
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.shared.ring
    }

    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Unread UIDs at the time of the call.
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    pub fn tail(&self) -> i64 {
        self.shared.ring.tail()
    }

    pub fn cursor(&self) -> i64 {
        self.shared.ring.cursor()
    }

    pub fn padding_threshold(&self) -> usize {
        self.shared.ring.padding_threshold()
    }

    /// Last second handed to the provider.
    pub fn last_second(&self) -> i64 {
        self.shared.last_second.load(Ordering::Acquire)
    }

    /// Whether a refill is running right now.
    pub fn is_padding(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// The non-transient provider error that stopped refilling, if any.
    pub fn failure(&self) -> Option<&Error> {
        self.shared.failure.get()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }
}

impl Drop for CachedIdBuffer {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("scheduled padding thread panicked");
            }
        }
    }
}

impl fmt::Debug for CachedIdBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedIdBuffer")
            .field("ring", &self.shared.ring)
            .field("last_second", &self.last_second())
            .field("padding", &self.is_padding())
            .field("scheduled", &self.is_scheduled())
            .field("failure", &self.failure())
            .finish()
    }
}
