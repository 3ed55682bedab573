use crate::*;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use flowview::{BodyState, DataAggregator, IndexRange, Key, RowContent, Selector};
use futures::channel::oneshot;
use futures::future::{self, FutureExt};

#[derive(Clone, Debug, PartialEq)]
struct Flow {
    id: usize,
    bytes: u64,
}

fn flow(id: usize) -> Flow {
    Flow {
        id,
        bytes: (id as u64 % 7) * 100,
    }
}

/// A page source over `rows` synthetic flows that records every call and can hold or fail
/// individual pages.
#[derive(Default)]
struct MockSource {
    rows: usize,
    calls: Cell<usize>,
    pages: RefCell<Vec<usize>>,
    failing: RefCell<HashSet<usize>>,
    gates: RefCell<HashMap<usize, oneshot::Receiver<()>>>,
}

impl MockSource {
    fn new(rows: usize) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn fail(&self, page: usize) {
        self.failing.borrow_mut().insert(page);
    }

    fn heal(&self, page: usize) {
        self.failing.borrow_mut().remove(&page);
    }

    /// Holds `page` until the returned sender fires (or is dropped).
    fn gate(&self, page: usize) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(page, rx);
        tx
    }
}

impl PageSource<Flow> for MockSource {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page<Flow>, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.pages.borrow_mut().push(page);
        let gate = self.gates.borrow_mut().remove(&page);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failing.borrow().contains(&page) {
            return Err(FetchError::server(500, "boom"));
        }
        let start = (page - 1).saturating_mul(page_size).min(self.rows);
        let end = (start + page_size).min(self.rows);
        Ok(Page::new(
            (start..end).map(flow).collect(),
            page,
            page_size,
            self.rows,
        ))
    }
}

fn ids(items: &[Flow]) -> Vec<usize> {
    items.iter().map(|f| f.id).collect()
}

fn store(rows: usize, chunk_size: usize, max_cached_chunks: usize) -> VirtualDataStore<Flow, MockSource> {
    VirtualDataStore::new(
        MockSource::new(rows),
        StoreOptions {
            chunk_size,
            max_cached_chunks,
        },
    )
}

fn r(start: usize, end: usize) -> IndexRange {
    IndexRange::new(start, end)
}

#[tokio::test]
async fn concurrent_chunk_requests_share_one_fetch() {
    let s = store(1_000, 10, 10);
    let release = s.source().gate(1);

    let (a, b, ()) = futures::join!(s.get_range(0, 10), s.get_range(2, 8), async {
        let _ = release.send(());
    });

    assert_eq!(s.source().calls.get(), 1);
    assert_eq!(ids(&a.items), (0..10).collect::<Vec<_>>());
    assert_eq!(ids(&b.items), (2..8).collect::<Vec<_>>());
    assert_eq!(s.stats().deduplicated, 1);
    assert_eq!(s.stats().in_flight, 0);
}

#[tokio::test]
async fn get_range_slices_across_chunks_in_order() {
    let s = store(1_000, 10, 10);
    let fetched = s.get_range(7, 33).await;
    assert!(fetched.is_complete());
    assert_eq!(ids(&fetched.items), (7..33).collect::<Vec<_>>());
    assert_eq!(*s.source().pages.borrow(), vec![1, 2, 3, 4]);
    assert_eq!(s.total(), Some(1_000));

    // Fully cached now.
    s.get_range(10, 20).await;
    assert_eq!(s.source().calls.get(), 4);
    assert_eq!(s.stats().hits, 1);
}

#[tokio::test]
async fn get_range_is_clamped_to_the_known_total() {
    let s = store(25, 10, 10);
    s.get_range(0, 5).await;
    let fetched = s.get_range(0, 100).await;
    assert_eq!(ids(&fetched.items), (0..25).collect::<Vec<_>>());
    assert_eq!(s.source().calls.get(), 3);
    assert!(s.get_range(30, 40).await.items.is_empty());
    assert_eq!(s.source().calls.get(), 3);
}

#[tokio::test]
async fn cache_is_bounded_and_evicts_least_recently_used() {
    let s = store(1_000, 10, 3);
    for chunk in 0..4 {
        s.get_range(chunk * 10, chunk * 10 + 10).await;
    }
    assert_eq!(s.stats().cached_chunks, 3);
    assert_eq!(s.stats().evictions, 1);
    assert!(!s.is_chunk_cached(0));
    assert_eq!(s.cached_chunks(), vec![1, 2, 3]);
}

#[tokio::test]
async fn cache_hits_refresh_access_time() {
    let s = store(1_000, 10, 3);
    for chunk in 0..3 {
        s.get_range(chunk * 10, chunk * 10 + 10).await;
    }
    let before = s.last_access(0);
    s.get_range(0, 5).await;
    assert!(s.last_access(0) > before);

    s.get_range(30, 40).await;
    // Chunk 1 is now the oldest access and goes first.
    assert_eq!(s.cached_chunks(), vec![2, 0, 3]);
    assert_eq!(s.stats().evictions, 1);
}

#[tokio::test]
async fn peek_does_not_touch_lru_order() {
    let s = store(1_000, 10, 3);
    s.get_range(0, 20).await;
    assert_eq!(s.peek(3), Some(flow(3)));
    assert_eq!(s.peek(25), None);
    assert_eq!(s.cached_chunks(), vec![0, 1]);
}

#[tokio::test]
async fn failed_chunks_do_not_abort_the_range() {
    let s = store(1_000, 10, 10);
    s.source().fail(2);

    let fetched = s.get_range(5, 25).await;
    assert_eq!(
        ids(&fetched.items),
        (5..10).chain(20..25).collect::<Vec<_>>()
    );
    assert_eq!(
        fetched.failed,
        vec![ChunkFailure {
            chunk_index: 1,
            range: r(10, 20),
            error: FetchError::server(500, "boom"),
        }]
    );
    assert!(matches!(
        fetched.clone().into_result(),
        Err(Error::PartialRange { failed: 1, .. })
    ));
    assert!(!s.is_chunk_cached(1));
    assert_eq!(s.stats().failures, 1);

    s.source().heal(2);
    let fetched = s.get_range(5, 25).await;
    assert_eq!(ids(&fetched.into_result().unwrap()), (5..25).collect::<Vec<_>>());
}

#[tokio::test]
async fn reset_discards_fetches_in_flight() {
    let s = store(1_000, 10, 10);
    let release = s.source().gate(1);

    let mut pending = s.chunk(0);
    assert!(futures::poll!(&mut pending).is_pending());
    s.reset();
    let _ = release.send(());

    let chunk = pending.await.unwrap();
    assert_eq!(chunk.items.len(), 10);
    assert!(!s.is_chunk_cached(0));
    assert_eq!(s.total(), None);
    assert_eq!(s.generation(), 1);
}

#[tokio::test]
async fn vec_source_serves_windows() {
    let s = VirtualDataStore::new(
        VecSource::new((0..45).collect::<Vec<u32>>()),
        StoreOptions {
            chunk_size: 20,
            max_cached_chunks: 2,
        },
    );
    let fetched = s.get_range(15, 45).await;
    assert_eq!(fetched.items, (15..45).collect::<Vec<_>>());
    assert_eq!(s.total(), Some(45));
}

#[test]
fn range_set_merges_splits_and_reports_gaps() {
    let mut set = RangeSet::new();
    set.insert(r(0, 10));
    set.insert(r(20, 30));
    set.insert(r(10, 12));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![r(0, 12), r(20, 30)]);
    assert!(set.contains(r(2, 12)));
    assert!(!set.contains(r(2, 13)));
    assert_eq!(set.missing(r(5, 35)), vec![r(12, 20), r(30, 35)]);
    assert_eq!(set.missing_span(r(5, 35)), Some(r(12, 35)));
    assert_eq!(set.missing_span(r(20, 25)), None);

    set.remove(r(5, 25));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![r(0, 5), r(25, 30)]);
    set.insert(r(3, 27));
    assert_eq!(set.interval_count(), 1);
}

#[tokio::test]
async fn loader_deduplicates_concurrent_requests() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    let (a, b) = futures::join!(
        loader.request_range(r(0, 10)),
        loader.request_range(r(0, 10))
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(loader.store().source().calls.get(), 1);
    assert_eq!(loader.request_count(), 1);
    assert!(loader.is_range_loaded(r(0, 10)));
    assert_eq!(loader.pending_len(), 0);
}

#[tokio::test]
async fn loader_coalesces_missing_subset_into_one_request() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    loader.request_range(r(0, 10)).await.unwrap();
    loader.request_range(r(20, 30)).await.unwrap();
    assert_eq!(loader.request_count(), 2);

    assert_eq!(loader.missing_span(r(0, 40)), Some(r(10, 40)));
    loader.request_range(r(0, 40)).await.unwrap();
    assert_eq!(loader.request_count(), 3);
    // Chunk 2 was cached, so only pages 2 and 4 hit the source.
    assert_eq!(*loader.store().source().pages.borrow(), vec![1, 3, 2, 4]);
    assert!(loader.is_range_loaded(r(0, 40)));

    // Already loaded: no request at all.
    loader.request_range(r(5, 35)).await.unwrap();
    assert_eq!(loader.request_count(), 3);
}

#[tokio::test]
async fn overlapping_request_attaches_and_fetches_only_the_rest() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    let release = loader.store().source().gate(1);

    let first = loader.request_range(r(0, 10));
    let second = loader.request_range(r(5, 20));
    assert_eq!(loader.pending_len(), 2);
    let _ = release.send(());
    let (a, b) = futures::join!(first, second);
    assert!(a.is_ok() && b.is_ok());

    assert_eq!(loader.store().source().calls.get(), 2);
    assert!(loader.is_range_loaded(r(0, 20)));
}

#[tokio::test]
async fn loader_failure_keeps_earlier_loads_and_waits_for_retry() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    loader.request_range(r(0, 10)).await.unwrap();

    loader.store().source().fail(2);
    let err = loader.request_range(r(0, 20)).await.unwrap_err();
    assert_eq!(err, FetchError::server(500, "boom"));
    assert!(loader.is_range_loaded(r(0, 10)));
    assert!(!loader.is_range_loaded(r(10, 20)));
    assert_eq!(loader.failed_ranges(), vec![r(10, 20)]);
    assert_eq!(loader.last_error(), Some(err));

    // Nothing retries on its own.
    assert_eq!(loader.store().source().calls.get(), 2);
    assert_eq!(loader.pending_len(), 0);

    loader.store().source().heal(2);
    loader.retry_failed().await.unwrap();
    assert!(loader.is_range_loaded(r(0, 20)));
    assert!(loader.failed_ranges().is_empty());
    assert_eq!(loader.last_error(), None);
}

#[tokio::test]
async fn evicted_chunks_are_no_longer_loaded() {
    let loader = InfiniteLoader::new(store(1_000, 10, 2), 0);
    for chunk in 0..3 {
        loader
            .request_range(r(chunk * 10, chunk * 10 + 10))
            .await
            .unwrap();
    }
    assert!(!loader.is_range_loaded(r(0, 10)));
    assert!(loader.is_range_loaded(r(10, 30)));

    loader.request_range(r(0, 10)).await.unwrap();
    assert_eq!(loader.store().source().calls.get(), 4);
}

#[tokio::test]
async fn loader_reset_ignores_loads_in_flight() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    let release = loader.store().source().gate(1);
    let mut pending = loader.request_range(r(0, 10));
    assert!(futures::poll!(&mut pending).is_pending());

    loader.reset();
    let _ = release.send(());
    pending.await.unwrap();
    assert!(!loader.is_range_loaded(r(0, 10)));
    assert_eq!(loader.pending_len(), 0);
}

#[tokio::test]
async fn store_reset_forgets_loaded_ranges() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    loader.request_range(r(0, 20)).await.unwrap();
    assert!(loader.is_range_loaded(r(0, 20)));

    loader.store().reset();
    assert!(!loader.is_range_loaded(r(0, 10)));
    assert_eq!(loader.missing_span(r(0, 20)), Some(r(0, 20)));

    loader.request_range(r(0, 10)).await.unwrap();
    assert_eq!(loader.store().source().calls.get(), 3);
    assert!(loader.store().is_chunk_cached(0));
    assert_eq!(loader.store().peek(0), Some(flow(0)));
}

#[tokio::test]
async fn store_reset_during_a_load_leaves_the_range_unloaded() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 0);
    let release = loader.store().source().gate(1);
    let mut pending = loader.request_range(r(0, 10));
    assert!(futures::poll!(&mut pending).is_pending());

    loader.store().reset();
    let _ = release.send(());
    pending.await.unwrap();
    assert!(!loader.store().is_chunk_cached(0));
    assert!(!loader.is_range_loaded(r(0, 10)));
    assert_eq!(loader.pending_len(), 0);

    loader.request_range(r(0, 10)).await.unwrap();
    assert_eq!(loader.store().source().calls.get(), 2);
    assert!(loader.is_range_loaded(r(0, 10)));
}

#[test]
fn debouncer_is_trailing_edge() {
    let mut d = Debouncer::new(50);
    d.schedule("a", 0);
    assert_eq!(d.poll(49), None);
    d.schedule("b", 30);
    assert_eq!(d.due_at(), Some(80));
    assert_eq!(d.poll(79), None);
    assert_eq!(d.poll(80), Some("b"));
    assert_eq!(d.poll(200), None);

    d.schedule("c", 300);
    d.cancel();
    assert!(!d.is_pending());

    d.set_delay(0);
    d.schedule("d", 400);
    assert_eq!(d.poll(400), Some("d"));
}

#[tokio::test]
async fn visible_range_loads_are_debounced() {
    let loader = InfiniteLoader::new(store(1_000, 10, 10), 50);
    loader.on_visible_range(r(0, 10), 0);
    loader.on_visible_range(r(100, 110), 20);
    assert!(loader.poll_due(60).is_none());

    let load = loader.poll_due(70).unwrap();
    load.await.unwrap();
    assert_eq!(*loader.store().source().pages.borrow(), vec![11]);
    assert!(loader.poll_due(1_000).is_none());
}

fn pager(rows: usize, mode: FetchMode, page_size: usize) -> PaginationManager<Flow, MockSource> {
    PaginationManager::new(MockSource::new(rows), mode, page_size)
}

#[tokio::test]
async fn discrete_set_page_keeps_stale_data_until_swap() {
    let p = pager(95, FetchMode::Discrete, 10);
    assert_eq!(p.status(), LoadStatus::Idle);
    p.load().await.unwrap();
    assert_eq!(ids(&p.data()), (0..10).collect::<Vec<_>>());

    let release = p.source().gate(2);
    let mut next = p.set_page(2);
    assert!(futures::poll!(&mut next).is_pending());

    let view = p.view();
    assert_eq!(ids(&view.data), (0..10).collect::<Vec<_>>());
    assert!(view.is_fetching);
    assert!(!view.is_loading);
    assert!(!view.is_empty);

    let _ = release.send(());
    next.await.unwrap();
    assert_eq!(ids(&p.data()), (10..20).collect::<Vec<_>>());
    assert_eq!(p.page(), 2);
    assert_eq!(p.status(), LoadStatus::Loaded);
    let state = p.pagination().unwrap();
    assert_eq!(state.total_pages, 10);
    assert!(state.has_previous_page && state.has_next_page);
}

#[tokio::test]
async fn superseded_page_response_is_dropped() {
    let p = pager(95, FetchMode::Discrete, 10);
    p.load().await.unwrap();

    let release = p.source().gate(2);
    let mut slow = p.set_page(2);
    assert!(futures::poll!(&mut slow).is_pending());
    p.set_page(3).await.unwrap();
    assert_eq!(p.page(), 3);

    let _ = release.send(());
    slow.await.unwrap();
    assert_eq!(p.page(), 3);
    assert_eq!(ids(&p.data()), (20..30).collect::<Vec<_>>());
}

#[tokio::test]
async fn identical_page_requests_share_one_fetch() {
    let p = pager(95, FetchMode::Discrete, 10);
    p.load().await.unwrap();
    let (a, b) = futures::join!(p.set_page(4), p.set_page(4));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(*p.source().pages.borrow(), vec![1, 4]);
}

#[tokio::test]
async fn discrete_navigation() {
    let p = pager(25, FetchMode::Discrete, 10);
    p.previous_page().await.unwrap();
    p.load().await.unwrap();
    p.next_page().await.unwrap();
    p.next_page().await.unwrap();
    assert_eq!(p.page(), 3);
    assert!(!p.has_next_page());
    p.next_page().await.unwrap();
    assert_eq!(p.source().calls.get(), 3);

    p.previous_page().await.unwrap();
    assert_eq!(p.page(), 2);
    // Clamped to the last page.
    p.set_page(99).await.unwrap();
    assert_eq!(p.page(), 3);
    assert_eq!(ids(&p.data()), (20..25).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_page_keeps_data_and_sets_error() {
    let p = pager(95, FetchMode::Discrete, 10);
    p.load().await.unwrap();
    p.source().fail(2);

    assert!(p.set_page(2).await.is_err());
    let view = p.view();
    assert_eq!(view.status, LoadStatus::Error);
    assert_eq!(view.error, Some(FetchError::server(500, "boom")));
    assert_eq!(ids(&view.data), (0..10).collect::<Vec<_>>());
    assert_eq!(p.page(), 1);

    p.refresh().await.unwrap();
    assert_eq!(p.error(), None);
    assert_eq!(p.status(), LoadStatus::Loaded);
}

#[tokio::test]
async fn infinite_load_more_appends_until_the_last_page() {
    let p = pager(25, FetchMode::Infinite, 10);
    for _ in 0..3 {
        p.load_more().await.unwrap();
    }
    assert_eq!(ids(&p.data()), (0..25).collect::<Vec<_>>());
    assert!(!p.has_next_page());
    assert_eq!(p.source().calls.get(), 3);

    p.load_more().await.unwrap();
    p.next_page().await.unwrap();
    assert_eq!(p.source().calls.get(), 3);
    assert_eq!(p.data().len(), 25);
}

#[tokio::test]
async fn infinite_refresh_replaces_accumulated_pages() {
    let p = pager(95, FetchMode::Infinite, 10);
    p.load_more().await.unwrap();
    p.load_more().await.unwrap();
    assert_eq!(p.data().len(), 20);

    p.refresh().await.unwrap();
    assert_eq!(ids(&p.data()), (0..10).collect::<Vec<_>>());
    p.load_more().await.unwrap();
    assert_eq!(*p.source().pages.borrow(), vec![1, 2, 1, 2]);
}

#[tokio::test]
async fn infinite_failed_load_more_is_retried_explicitly() {
    let p = pager(95, FetchMode::Infinite, 10);
    p.load_more().await.unwrap();
    p.source().fail(2);
    assert!(p.load_more().await.is_err());
    assert_eq!(p.data().len(), 10);
    assert!(p.view().error.is_some());

    p.source().heal(2);
    p.load_more().await.unwrap();
    assert_eq!(ids(&p.data()), (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn mode_specific_calls_are_ignored_in_the_other_mode() {
    let discrete = pager(95, FetchMode::Discrete, 10);
    discrete.load_more().await.unwrap();
    assert_eq!(discrete.source().calls.get(), 0);

    let infinite = pager(95, FetchMode::Infinite, 10);
    infinite.set_page(3).await.unwrap();
    assert_eq!(infinite.source().calls.get(), 0);
}

#[tokio::test]
async fn empty_dataset_is_not_an_error() {
    let p = pager(0, FetchMode::Discrete, 10);
    assert!(!p.is_empty());
    p.load().await.unwrap();
    let view = p.view();
    assert!(view.is_empty);
    assert!(view.error.is_none());
    assert!(!view.has_next_page);
}

#[tokio::test]
async fn pagination_feeds_the_aggregator() {
    let agg = Rc::new(RefCell::new(DataAggregator::default()));
    let p = pager(95, FetchMode::Infinite, 10).with_aggregator(Rc::clone(&agg));
    let bytes = Selector::new(|f: &Flow| f.bytes as f64);

    p.load_more().await.unwrap();
    let first = agg.borrow().sum(&bytes);
    p.load_more().await.unwrap();
    assert_eq!(agg.borrow().len(), 20);
    let expected: u64 = (0..20).map(|i| flow(i).bytes).sum();
    assert_eq!(agg.borrow().sum(&bytes), expected as f64);
    assert_ne!(agg.borrow().sum(&bytes), first);

    p.refresh().await.unwrap();
    assert_eq!(agg.borrow().len(), 10);
}

#[tokio::test]
async fn pagination_reset_ignores_responses_in_flight() {
    let p = pager(95, FetchMode::Discrete, 10);
    let release = p.source().gate(1);
    let mut first = p.load();
    assert!(futures::poll!(&mut first).is_pending());
    assert!(p.is_loading());

    p.reset();
    let _ = release.send(());
    first.await.unwrap();
    assert_eq!(p.status(), LoadStatus::Idle);
    assert!(p.data().is_empty());
}

#[tokio::test]
async fn fn_source_adapts_closures() {
    let source = FnSource(|page: usize, size: usize| async move {
        Ok::<_, FetchError>(Page::new(vec![page * 100], page, size, 3))
    });
    let p = PaginationManager::new(source, FetchMode::Infinite, 1);
    for _ in 0..5 {
        p.load_more().await.unwrap();
    }
    assert_eq!(*p.data(), vec![100, 200, 300]);
}

#[tokio::test]
async fn batches_preserve_order_and_report_progress() {
    let items: Vec<u64> = (1..=10_000).collect();
    let mut progress = Vec::new();
    let mut on_progress = |done: usize, total: usize| {
        assert_eq!(total, 10_000);
        progress.push(done);
    };
    let out: Vec<u64> = process_batches(
        &items,
        1_000,
        |batch| batch.iter().map(|x| x * 2).collect(),
        Some(&mut on_progress),
    )
    .await;

    assert_eq!(out, (1..=10_000).map(|x| x * 2).collect::<Vec<_>>());
    assert_eq!(progress.len(), 10);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&10_000));
}

#[tokio::test]
async fn empty_batch_input_resolves_immediately() {
    let items: Vec<u64> = Vec::new();
    let mut calls = 0;
    let mut on_progress = |_: usize, _: usize| calls += 1;
    let out = process_batches(&items, 1_000, |b| b.to_vec(), Some(&mut on_progress));
    let out = futures::poll!(Box::pin(out));
    assert_eq!(out, std::task::Poll::Ready(Vec::new()));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn processor_errors_propagate() {
    let items: Vec<u64> = (1..=10_000).collect();
    let mut progress = Vec::new();
    let mut on_progress = |done: usize, _: usize| progress.push(done);
    let result = try_process_batches(
        &items,
        1_000,
        |batch| {
            if batch.contains(&5_000) {
                Err("bad row")
            } else {
                Ok(batch.to_vec())
            }
        },
        Some(&mut on_progress),
    )
    .await;
    assert_eq!(result, Err("bad row"));
    assert_eq!(progress, vec![1_000, 2_000, 3_000, 4_000]);
}

struct CountingYield(Cell<usize>);

impl Yield for CountingYield {
    fn yield_now(&self) -> impl Future<Output = ()> {
        self.0.set(self.0.get() + 1);
        future::ready(())
    }
}

#[tokio::test]
async fn yields_between_batches_only() {
    let yielder = CountingYield(Cell::new(0));
    let items = [1, 2, 3, 4, 5];
    let out = try_process_batches_with(
        &yielder,
        &items,
        2,
        |b| Ok::<_, ()>(b.to_vec()),
        None,
    )
    .await
    .unwrap();
    assert_eq!(out, items);
    assert_eq!(yielder.0.get(), 2);

    // A zero batch size still makes progress, one item at a time.
    let mut progress = Vec::new();
    let mut on_progress = |done: usize, _: usize| progress.push(done);
    process_batches(&items[..3], 0, |b| b.to_vec(), Some(&mut on_progress)).await;
    assert_eq!(progress, vec![1, 2, 3]);
}

#[tokio::test]
async fn cooperative_yield_returns_to_the_executor_once() {
    let mut y = CooperativeYield.yield_now().boxed_local();
    assert!(futures::poll!(&mut y).is_pending());
    assert!(futures::poll!(&mut y).is_ready());
}

#[test]
fn config_defaults_and_overrides() {
    let config = ViewConfig::from_toml_str("").unwrap();
    assert_eq!(config, ViewConfig::default());
    assert_eq!(config.height, 400);
    assert_eq!(config.item_size, 36);
    assert_eq!(config.overscan, 5);
    assert_eq!(config.chunk_size, 100);
    assert_eq!(config.max_cached_chunks, 10);
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.debounce_ms, 50);
    assert_eq!(config.mode, FetchMode::Discrete);

    let config = ViewConfig::from_toml_str("chunk_size = 200\nmode = \"infinite\"").unwrap();
    assert_eq!(config.chunk_size, 200);
    assert_eq!(config.mode, FetchMode::Infinite);
    assert_eq!(config.page_size, 50);

    let options = config.window_options();
    assert_eq!(options.count, 0);
    assert_eq!(options.overscan, 5);
    assert_eq!(options.initial_viewport, 400);
    assert_eq!(config.store_options().chunk_size, 200);
}

#[test]
fn config_rejects_non_positive_sizes() {
    assert!(matches!(
        ViewConfig::from_toml_str("item_size = 0"),
        Err(ConfigError::InvalidItemSize)
    ));
    assert!(matches!(
        ViewConfig::from_toml_str("chunk_size = 0"),
        Err(ConfigError::InvalidChunkSize)
    ));
    assert!(matches!(
        ViewConfig::from_toml_str("max_cached_chunks = 0"),
        Err(ConfigError::InvalidMaxCachedChunks)
    ));
    assert!(matches!(
        ViewConfig::from_toml_str("height = \"tall\""),
        Err(ConfigError::Parse { .. })
    ));
    let err: Error = ConfigError::InvalidChunkSize.into();
    assert!(err.to_string().contains("chunk_size"));
}

#[tokio::test]
async fn registry_lifecycle() {
    let created = Rc::new(Cell::new(0));
    let mut registry = DatasetRegistry::new(
        StoreOptions {
            chunk_size: 10,
            max_cached_chunks: 4,
        },
        {
            let created = Rc::clone(&created);
            move |_: &&str| {
                created.set(created.get() + 1);
                MockSource::new(100)
            }
        },
    );

    let a = registry.create("alb-a");
    a.store.get_range(0, 10).await;
    a.aggregator.borrow_mut().add([flow(1)]);
    let again = registry.create("alb-a");
    assert!(again.store.is_chunk_cached(0));
    registry.create("alb-b");
    assert_eq!(created.get(), 2);
    assert_eq!(registry.len(), 2);

    assert!(registry.invalidate(&"alb-a"));
    assert!(!a.store.is_chunk_cached(0));
    assert!(a.aggregator.borrow().is_empty());
    assert!(registry.contains(&"alb-a"));

    assert!(registry.dispose(&"alb-a"));
    assert!(registry.get(&"alb-a").is_none());
    assert!(!registry.invalidate(&"alb-a"));
    assert!(!registry.dispose(&"alb-a"));
    assert_eq!(registry.len(), 1);

    registry.create("alb-a");
    assert_eq!(created.get(), 3);
}

#[tokio::test]
async fn dispose_clears_aggregates_held_elsewhere() {
    let mut registry = DatasetRegistry::new(StoreOptions::default(), |_: &u32| MockSource::new(10));
    let dataset = registry.create(7);
    dataset.store.get_range(0, 5).await;
    dataset.aggregator.borrow_mut().add([flow(1), flow(2)]);

    assert!(registry.dispose(&7));
    assert!(dataset.aggregator.borrow().is_empty());
    assert!(!dataset.store.is_chunk_cached(0));
}

fn list_config() -> ViewConfig {
    ViewConfig {
        height: 360,
        item_size: 36,
        overscan: 0,
        chunk_size: 10,
        debounce_ms: 50,
        loading_placeholders: 3,
        ..ViewConfig::default()
    }
}

#[tokio::test]
async fn controller_drives_window_from_the_store() {
    let mut c = ListController::new(&list_config(), MockSource::new(1_000));
    assert_eq!(c.body_state(), BodyState::Loading);
    assert_eq!(c.window().slot_count(), 3);
    assert_eq!(c.skeleton_frame::<String>().rows.len(), 3);

    c.load_visible(0).await.unwrap();
    assert_eq!(c.body_state(), BodyState::Rows);
    assert_eq!(c.window().count(), 1_000);
    assert!(!c.window().has_more());
    assert_eq!(c.window().total_size(), 36_000);
    let frame = c.frame(|f, _| f.id);
    assert_eq!(frame.range, r(0, 10));
    assert_eq!(frame.skeleton_count(), 0);
    assert_eq!(c.store().source().calls.get(), 1);

    // Scrolled to rows that are not cached: skeletons until the debounced load runs.
    c.on_scroll(3_600, 100);
    assert_eq!(c.frame(|f, _| f.id).skeleton_count(), 10);
    assert!(!c.tick(120).await.unwrap());
    assert!(c.tick(150).await.unwrap());
    let frame = c.frame(|f, _| f.id);
    assert_eq!(frame.rows[0].content, RowContent::Item(100));
    assert_eq!(frame.skeleton_count(), 0);

    // A burst of scroll events loads only where scrolling settled.
    c.on_scroll(7_200, 200);
    c.on_scroll(10_800, 210);
    assert!(c.tick(260).await.unwrap());
    assert_eq!(*c.store().source().pages.borrow(), vec![1, 11, 31]);
}

#[tokio::test]
async fn controller_click_and_keyboard_activate_the_same_row() {
    let mut c = ListController::new(&list_config(), MockSource::new(1_000));
    c.load_visible(0).await.unwrap();

    assert_eq!(c.click(4), Some(4));
    assert_eq!(c.selected_item(), Some(flow(4)));
    assert_eq!(c.handle_key(Key::Enter, 10), Some(4));
    assert_eq!(c.handle_key(Key::Space, 10), Some(4));
    assert_eq!(c.handle_key(Key::ArrowDown, 10), None);
    assert_eq!(c.selected_item(), Some(flow(5)));
}

#[tokio::test]
async fn controller_first_load_failure_shows_error_until_retry() {
    let mut c = ListController::new(&list_config(), MockSource::new(1_000));
    c.store().source().fail(1);

    assert!(c.load_visible(0).await.is_err());
    assert_eq!(
        c.body_state(),
        BodyState::Error {
            message: "Server error 500: boom".to_string()
        }
    );
    assert!(c.tick(10_000).await.is_ok());
    assert_eq!(c.store().source().calls.get(), 1);

    c.store().source().heal(1);
    c.retry(20_000).await.unwrap();
    assert_eq!(c.body_state(), BodyState::Rows);
    assert_eq!(c.window().count(), 1_000);
}

#[tokio::test]
async fn controller_empty_dataset() {
    let mut c = ListController::new(&list_config(), MockSource::new(0));
    c.load_visible(0).await.unwrap();
    assert_eq!(c.body_state(), BodyState::Empty);
    assert_eq!(c.empty_message(), "No data");
    assert_eq!(c.window().slot_count(), 0);
}

#[tokio::test]
async fn controller_reset_starts_over() {
    let mut c = ListController::new(&list_config(), MockSource::new(1_000));
    c.load_visible(0).await.unwrap();
    c.on_scroll(3_600, 0);
    c.click(100);

    c.reset();
    assert_eq!(c.window().count(), 0);
    assert!(c.window().has_more());
    assert_eq!(c.window().scroll_offset(), 0);
    assert_eq!(c.window().selected(), None);
    assert_eq!(c.store().total(), None);
    assert_eq!(c.body_state(), BodyState::Loading);

    c.load_visible(0).await.unwrap();
    assert_eq!(c.store().source().calls.get(), 2);
}

#[tokio::test]
async fn controller_recovers_after_its_dataset_is_invalidated() {
    let config = list_config();
    let mut registry = DatasetRegistry::new(config.store_options(), |_: &&str| MockSource::new(1_000));
    let dataset = registry.create("alb-a");
    let mut c = ListController::from_store(config.window_options(), dataset.store.clone(), 50);
    c.load_visible(0).await.unwrap();
    assert_eq!(c.frame(|f, _| f.id).skeleton_count(), 0);

    assert!(registry.invalidate(&"alb-a"));
    assert_eq!(c.frame(|f, _| f.id).skeleton_count(), 10);
    assert_eq!(c.body_state(), BodyState::Loading);

    // Scrolling schedules a load for rows the loader used to consider loaded.
    c.on_scroll(36, 100);
    assert!(c.tick(150).await.unwrap());
    let frame = c.frame(|f, _| f.id);
    assert_eq!(frame.skeleton_count(), 0);
    assert_eq!(frame.rows[0].content, RowContent::Item(1));
    assert_eq!(c.body_state(), BodyState::Rows);

    registry.invalidate(&"alb-a");
    c.load_visible(200).await.unwrap();
    assert_eq!(c.frame(|f, _| f.id).skeleton_count(), 0);
    assert_eq!(c.store().source().calls.get(), 5);
}
