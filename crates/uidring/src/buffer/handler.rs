use crate::RingBuffer;

/// Called when [`RingBuffer::put`] rejects a UID because the buffer is full
/// or the next slot has not been released yet.
///
/// The UID is dropped after the handler returns. Every refill ends with one
/// rejected put, so this is not an error condition on its own.
pub trait RejectedPutHandler: Send + Sync {
    fn reject_put(&self, ring: &RingBuffer, uid: u64);
}

/// Called when [`RingBuffer::take`] finds nothing to read.
///
/// The take still reports the buffer as empty after the handler returns.
pub trait RejectedTakeHandler: Send + Sync {
    fn reject_take(&self, ring: &RingBuffer);
}

/// The default handler for both rejections: logs and moves on.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRejection;

impl RejectedPutHandler for LogRejection {
    fn reject_put(&self, _ring: &RingBuffer, _uid: u64) {
        #[cfg(feature = "tracing")]
        tracing::debug!(uid = _uid, ring = ?_ring, "rejected putting uid into ring buffer");
    }
}

impl RejectedTakeHandler for LogRejection {
    fn reject_take(&self, _ring: &RingBuffer) {
        #[cfg(feature = "tracing")]
        tracing::warn!(ring = ?_ring, "rejected taking uid from empty ring buffer");
    }
}

impl<F> RejectedPutHandler for F
where
    F: Fn(&RingBuffer, u64) + Send + Sync,
{
    fn reject_put(&self, ring: &RingBuffer, uid: u64) {
        self(ring, uid)
    }
}

impl<F> RejectedTakeHandler for F
where
    F: Fn(&RingBuffer) + Send + Sync,
{
    fn reject_take(&self, ring: &RingBuffer) {
        self(ring)
    }
}
