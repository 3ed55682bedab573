//! Cooperative batch processing of large collections.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Hands control back to the executor between batches.
pub trait Yield {
    fn yield_now(&self) -> impl Future<Output = ()>;
}

/// Re-queues the current task once and resumes on the next poll.
///
/// Works on any executor; the default for [`process_batches`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CooperativeYield;

impl Yield for CooperativeYield {
    fn yield_now(&self) -> impl Future<Output = ()> {
        YieldNow { yielded: false }
    }
}

/// Future returned by [`CooperativeYield`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yields through `tokio::task::yield_now`, which also respects tokio's cooperative budget.
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioYield;

#[cfg(feature = "tokio")]
impl Yield for TokioYield {
    fn yield_now(&self) -> impl Future<Output = ()> {
        tokio::task::yield_now()
    }
}

/// Applies `processor` to consecutive slices of `batch_size` items, yielding between slices.
///
/// The concatenated result equals one synchronous pass over `items`. `on_progress` receives
/// `(processed, total)` after every slice. Empty input returns immediately without yielding.
pub async fn process_batches<T, R>(
    items: &[T],
    batch_size: usize,
    mut processor: impl FnMut(&[T]) -> Vec<R>,
    on_progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Vec<R> {
    let result = try_process_batches_with(
        &CooperativeYield,
        items,
        batch_size,
        |batch| Ok::<_, Infallible>(processor(batch)),
        on_progress,
    )
    .await;
    match result {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

/// Like [`process_batches`], but stops at the first processor error and returns it.
pub async fn try_process_batches<T, R, E>(
    items: &[T],
    batch_size: usize,
    processor: impl FnMut(&[T]) -> Result<Vec<R>, E>,
    on_progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<Vec<R>, E> {
    try_process_batches_with(&CooperativeYield, items, batch_size, processor, on_progress).await
}

/// [`try_process_batches`] with an explicit yield primitive.
///
/// A `batch_size` of zero is treated as one.
pub async fn try_process_batches_with<Y, T, R, E>(
    yielder: &Y,
    items: &[T],
    batch_size: usize,
    mut processor: impl FnMut(&[T]) -> Result<Vec<R>, E>,
    mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<Vec<R>, E>
where
    Y: Yield,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let batch_size = batch_size.max(1);
    vtrace!(total, batch_size, "process_batches start");

    let mut out = Vec::with_capacity(total);
    let mut processed = 0usize;
    for batch in items.chunks(batch_size) {
        if processed > 0 {
            yielder.yield_now().await;
        }
        out.extend(processor(batch)?);
        processed += batch.len();
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(processed, total);
        }
    }
    vtrace!(processed, "process_batches done");
    Ok(out)
}
