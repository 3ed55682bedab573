//! Range-level loading on top of the chunk store.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use flowview::IndexRange;
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::{Debouncer, FetchError, PageSource, RangeSet, VirtualDataStore};

type LoadResult = Result<(), FetchError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

struct PendingLoad {
    id: u64,
    range: IndexRange,
    fut: SharedLoad,
}

struct LoaderState {
    loaded: RangeSet,
    failed: RangeSet,
    pending: Vec<PendingLoad>,
    debounce: Debouncer<IndexRange>,
    last_error: Option<FetchError>,
    next_id: u64,
    generation: u64,
    // Store generation the loaded ranges belong to.
    store_generation: u64,
    requests: u64,
}

impl LoaderState {
    fn clear(&mut self) {
        self.generation += 1;
        self.loaded.clear();
        self.failed.clear();
        self.pending.clear();
        self.last_error = None;
    }
}

/// Tracks which index ranges are loaded and issues coalesced, de-duplicated range loads.
///
/// - A request overlapping a load in flight attaches to it; only the part not already loaded
///   or pending is fetched, as one contiguous request.
/// - A failed load leaves previously loaded ranges untouched. Failed ranges are remembered
///   and only re-requested through [`InfiniteLoader::retry_failed`].
/// - Ranges whose chunks the store evicts are forgotten, so they load again on demand.
/// - A store reset (for example through [`DatasetRegistry::invalidate`]) forgets every range
///   and detaches loads in flight.
///
/// [`DatasetRegistry::invalidate`]: crate::DatasetRegistry::invalidate
pub struct InfiniteLoader<T, S> {
    store: VirtualDataStore<T, S>,
    state: Rc<RefCell<LoaderState>>,
}

impl<T, S> Clone for InfiniteLoader<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<T, S> InfiniteLoader<T, S> {
    pub fn new(store: VirtualDataStore<T, S>, debounce_ms: u64) -> Self {
        let store_generation = store.generation();
        Self {
            store,
            state: Rc::new(RefCell::new(LoaderState {
                loaded: RangeSet::new(),
                failed: RangeSet::new(),
                pending: Vec::new(),
                debounce: Debouncer::new(debounce_ms),
                last_error: None,
                next_id: 0,
                generation: 0,
                store_generation,
                requests: 0,
            })),
        }
    }

    pub fn store(&self) -> &VirtualDataStore<T, S> {
        &self.store
    }

    pub fn is_range_loaded(&self, range: IndexRange) -> bool {
        self.sync_store();
        self.state.borrow().loaded.contains(range)
    }

    /// The smallest range covering everything in `range` that is not loaded yet.
    pub fn missing_span(&self, range: IndexRange) -> Option<IndexRange> {
        self.sync_store();
        self.state.borrow().loaded.missing_span(range)
    }

    pub fn is_loading(&self) -> bool {
        self.sync_store();
        !self.state.borrow().pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.sync_store();
        self.state.borrow().pending.len()
    }

    /// Number of range loads issued (attached requests are not counted).
    pub fn request_count(&self) -> u64 {
        self.state.borrow().requests
    }

    /// The most recent failure, cleared by the next successful load.
    pub fn last_error(&self) -> Option<FetchError> {
        self.sync_store();
        self.state.borrow().last_error.clone()
    }

    pub fn failed_ranges(&self) -> Vec<IndexRange> {
        self.sync_store();
        self.state.borrow().failed.iter().collect()
    }

    /// Marks a range as not loaded.
    pub fn forget(&self, range: IndexRange) {
        self.state.borrow_mut().loaded.remove(range);
    }

    /// Records a visible-range change; the load is issued by [`Self::poll_due`] once the
    /// debounce delay has passed without a newer change.
    pub fn on_visible_range(&self, range: IndexRange, now_ms: u64) {
        self.state.borrow_mut().debounce.schedule(range, now_ms);
    }

    pub fn set_debounce_ms(&self, delay_ms: u64) {
        self.state.borrow_mut().debounce.set_delay(delay_ms);
    }

    /// Forgets all loaded, failed and pending ranges. Loads already in flight complete
    /// without updating this loader.
    pub fn reset(&self) {
        let mut st = self.state.borrow_mut();
        st.clear();
        st.store_generation = self.store.generation();
        st.debounce.cancel();
        vdebug!(generation = st.generation, "loader reset");
    }

    /// Brings the loaded set in line with the store: everything is forgotten after a store
    /// reset, evicted chunks otherwise.
    fn sync_store(&self) {
        let store_generation = self.store.generation();
        let evicted = self.store.take_evicted();
        let mut st = self.state.borrow_mut();
        if st.store_generation != store_generation {
            st.clear();
            st.store_generation = store_generation;
            vdebug!(
                store_generation,
                generation = st.generation,
                "store was reset, forgetting loaded ranges"
            );
            return;
        }
        for range in evicted.iter() {
            vtrace!(start = range.start, end = range.end, "forgetting evicted range");
            st.loaded.remove(range);
        }
    }
}

impl<T, S> InfiniteLoader<T, S>
where
    T: Clone + 'static,
    S: PageSource<T> + 'static,
{
    /// Loads `range` unless it is already loaded.
    ///
    /// Loads in flight that overlap `range` are joined instead of duplicated; whatever is
    /// still missing is fetched as a single contiguous request. Resolves with the first
    /// failure of any load it waited on.
    pub fn request_range(&self, range: IndexRange) -> LocalBoxFuture<'static, LoadResult> {
        self.sync_store();
        let mut st = self.state.borrow_mut();
        if range.is_empty() || st.loaded.contains(range) {
            return future::ready(Ok(())).boxed_local();
        }

        let mut covered = st.loaded.clone();
        let mut waits: Vec<SharedLoad> = Vec::new();
        for p in st.pending.iter().filter(|p| p.range.overlaps(&range)) {
            covered.insert(p.range);
            waits.push(p.fut.clone());
        }

        if let Some(span) = covered.missing_span(range) {
            let id = st.next_id;
            st.next_id += 1;
            st.requests += 1;
            let fut = self.spawn_load(id, span, st.generation, st.store_generation);
            st.pending.push(PendingLoad {
                id,
                range: span,
                fut: fut.clone(),
            });
            waits.push(fut);
            vdebug!(start = span.start, end = span.end, "requesting range");
        } else {
            vtrace!(
                start = range.start,
                end = range.end,
                "range already pending, attaching"
            );
        }
        drop(st);

        async move {
            for result in future::join_all(waits).await {
                result?;
            }
            Ok(())
        }
        .boxed_local()
    }

    /// Issues the debounced visible-range load if it is due and not already loaded.
    pub fn poll_due(&self, now_ms: u64) -> Option<LocalBoxFuture<'static, LoadResult>> {
        let range = self.state.borrow_mut().debounce.poll(now_ms)?;
        if self.is_range_loaded(range) {
            return None;
        }
        Some(self.request_range(range))
    }

    /// Re-requests every range that failed. Never called automatically.
    pub fn retry_failed(&self) -> LocalBoxFuture<'static, LoadResult> {
        self.sync_store();
        let failed = std::mem::take(&mut self.state.borrow_mut().failed);
        let loads: Vec<_> = failed.iter().map(|r| self.request_range(r)).collect();
        vdebug!(ranges = loads.len(), "retrying failed ranges");
        async move {
            let mut first_error = None;
            for result in future::join_all(loads).await {
                if let Err(error) = result {
                    first_error.get_or_insert(error);
                }
            }
            first_error.map_or(Ok(()), Err)
        }
        .boxed_local()
    }

    fn spawn_load(
        &self,
        id: u64,
        span: IndexRange,
        generation: u64,
        store_generation: u64,
    ) -> SharedLoad {
        let store = self.store.clone();
        let weak = Rc::downgrade(&self.state);
        async move {
            let fetched = store.get_range(span.start, span.end).await;
            // Chunks fetched across a store reset were discarded, not cached.
            let store_reset = store.generation() != store_generation;
            let size = store.chunk_size();
            let total = store.total();
            let error = fetched.failed.first().map(|f| f.error.clone());
            let done = CompletedLoad {
                id,
                generation,
                store_reset,
                covered: chunk_bounds(span, size, total),
                failed: fetched
                    .failed
                    .iter()
                    .map(|f| chunk_bounds(f.range, size, total))
                    .collect(),
                error: error.clone(),
                evicted: if store_reset {
                    RangeSet::new()
                } else {
                    store.take_evicted()
                },
            };
            finish_load(&weak, done);
            error.map_or(Ok(()), Err)
        }
        .boxed_local()
        .shared()
    }
}

struct CompletedLoad {
    id: u64,
    generation: u64,
    store_reset: bool,
    // The requested span widened to whole chunks.
    covered: IndexRange,
    failed: Vec<IndexRange>,
    error: Option<FetchError>,
    evicted: RangeSet,
}

/// Widens `range` to chunk boundaries, clamped to `total` when known.
fn chunk_bounds(range: IndexRange, chunk_size: usize, total: Option<usize>) -> IndexRange {
    let start = range.start / chunk_size * chunk_size;
    let end = range.end.div_ceil(chunk_size).saturating_mul(chunk_size);
    let widened = IndexRange::new(start, end);
    match total {
        Some(total) => widened.clamp_to(total.max(range.end)),
        None => widened,
    }
}

fn finish_load(weak: &Weak<RefCell<LoaderState>>, done: CompletedLoad) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let mut st = state.borrow_mut();
    st.pending.retain(|p| p.id != done.id);
    if st.generation != done.generation || done.store_reset {
        for range in done.evicted.iter() {
            st.loaded.remove(range);
        }
        vdebug!(
            start = done.covered.start,
            end = done.covered.end,
            "dropping stale range load"
        );
        return;
    }

    let mut ok = RangeSet::new();
    ok.insert(done.covered);
    for &range in &done.failed {
        ok.remove(range);
        st.failed.insert(range);
    }
    for range in ok.iter() {
        st.loaded.insert(range);
        st.failed.remove(range);
    }
    // Chunks evicted while this load ran are no longer cached, even if they were part of it.
    for range in done.evicted.iter() {
        st.loaded.remove(range);
    }

    match done.error {
        Some(error) => {
            vwarn!(
                start = done.covered.start,
                end = done.covered.end,
                failed = done.failed.len(),
                %error,
                "range load failed"
            );
            st.last_error = Some(error);
        }
        None => st.last_error = None,
    }
}
