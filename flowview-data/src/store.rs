//! Chunked, LRU-bounded cache over a [`PageSource`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use flowview::IndexRange;
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use hashlink::LinkedHashMap;

use crate::{Error, FetchError, PageSource, RangeSet, Result};

/// A fixed-size contiguous slice of the dataset. Immutable once cached.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk<T> {
    pub index: usize,
    pub items: Vec<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Items per chunk.
    pub chunk_size: usize,
    /// Upper bound on cached chunks.
    pub max_cached_chunks: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_cached_chunks: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests that attached to a fetch already in flight.
    pub deduplicated: u64,
    pub failures: u64,
    pub evictions: u64,
    pub cached_chunks: usize,
    pub in_flight: usize,
}

/// A chunk that could not be loaded during [`VirtualDataStore::get_range`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    /// The part of the requested range this chunk would have served.
    pub range: IndexRange,
    pub error: FetchError,
}

/// Outcome of [`VirtualDataStore::get_range`].
///
/// Partial success: `items` holds, in ascending index order, every requested item whose
/// chunk loaded; `failed` lists the chunks that did not.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeFetch<T> {
    pub items: Vec<T>,
    pub failed: Vec<ChunkFailure>,
}

impl<T> Default for RangeFetch<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> RangeFetch<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All-or-nothing view: any failed chunk turns the whole fetch into an error.
    pub fn into_result(self) -> Result<Vec<T>> {
        let failed = self.failed.len();
        match self.failed.into_iter().next() {
            None => Ok(self.items),
            Some(first) => Err(Error::PartialRange {
                failed,
                source: first.error,
            }),
        }
    }
}

type ChunkResult<T> = std::result::Result<Rc<Chunk<T>>, FetchError>;
type SharedChunk<T> = Shared<LocalBoxFuture<'static, ChunkResult<T>>>;

struct CacheEntry<T> {
    chunk: Rc<Chunk<T>>,
    last_access: u64,
}

struct Inner<T> {
    options: StoreOptions,
    // Oldest access at the front.
    cache: LinkedHashMap<usize, CacheEntry<T>>,
    in_flight: HashMap<usize, SharedChunk<T>>,
    total: Option<usize>,
    clock: u64,
    generation: u64,
    stats: StoreStats,
    evicted: RangeSet,
}

impl<T> Inner<T> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, index: usize) -> Option<Rc<Chunk<T>>> {
        let now = self.tick();
        let entry = self.cache.to_back(&index)?;
        entry.last_access = now;
        Some(Rc::clone(&entry.chunk))
    }

    fn chunk_range(&self, index: usize) -> IndexRange {
        let size = self.options.chunk_size;
        let start = index.saturating_mul(size);
        let range = IndexRange::new(start, start.saturating_add(size));
        match self.total {
            Some(total) => range.clamp_to(total),
            None => range,
        }
    }

    fn insert(&mut self, chunk: Rc<Chunk<T>>) {
        let index = chunk.index;
        let last_access = self.tick();
        let range = self.chunk_range(index);
        self.evicted.remove(range);
        self.cache.insert(index, CacheEntry { chunk, last_access });
        if self.cache.len() > self.options.max_cached_chunks {
            if let Some((oldest, _)) = self.cache.pop_front() {
                vdebug!(chunk = oldest, "evicting least recently used chunk");
                let range = self.chunk_range(oldest);
                self.evicted.insert(range);
                self.stats.evictions += 1;
            }
        }
    }
}

/// Chunked dataset cache.
///
/// Chunk `i` covers items `[i * chunk_size, (i + 1) * chunk_size)` and is fetched as page
/// `i + 1` with `page_size = chunk_size`. At most one fetch per chunk index is in flight;
/// concurrent requests share it. After each insertion that pushes the cache over
/// `max_cached_chunks`, exactly one entry (the least recently accessed) is evicted.
///
/// The store is a cheap handle: clones share the same cache. It is single-threaded and
/// never holds a borrow across an `.await`.
pub struct VirtualDataStore<T, S> {
    source: Rc<S>,
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T, S> Clone for VirtualDataStore<T, S> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, S> VirtualDataStore<T, S> {
    /// Zero sizes are raised to one.
    pub fn new(source: S, options: StoreOptions) -> Self {
        let options = StoreOptions {
            chunk_size: options.chunk_size.max(1),
            max_cached_chunks: options.max_cached_chunks.max(1),
        };
        vdebug!(
            chunk_size = options.chunk_size,
            max_cached_chunks = options.max_cached_chunks,
            "VirtualDataStore::new"
        );
        Self {
            source: Rc::new(source),
            inner: Rc::new(RefCell::new(Inner {
                options,
                cache: LinkedHashMap::new(),
                in_flight: HashMap::new(),
                total: None,
                clock: 0,
                generation: 0,
                stats: StoreStats::default(),
                evicted: RangeSet::new(),
            })),
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.inner.borrow().options
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.borrow().options.chunk_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Total item count as last reported by the source, once any chunk has loaded.
    pub fn total(&self) -> Option<usize> {
        self.inner.borrow().total
    }

    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.borrow();
        StoreStats {
            cached_chunks: inner.cache.len(),
            in_flight: inner.in_flight.len(),
            ..inner.stats
        }
    }

    pub fn is_chunk_cached(&self, index: usize) -> bool {
        self.inner.borrow().cache.contains_key(&index)
    }

    /// Cached chunk indexes, least recently accessed first.
    pub fn cached_chunks(&self) -> Vec<usize> {
        self.inner.borrow().cache.keys().copied().collect()
    }

    /// Last access tick of a cached chunk.
    pub fn last_access(&self, index: usize) -> Option<u64> {
        self.inner.borrow().cache.get(&index).map(|e| e.last_access)
    }

    /// Whether every item of `range` sits in a cached chunk.
    pub fn is_range_cached(&self, range: IndexRange) -> bool {
        let inner = self.inner.borrow();
        let range = match inner.total {
            Some(total) => range.clamp_to(total),
            None => range,
        };
        if range.is_empty() {
            return inner.total.is_some();
        }
        let size = inner.options.chunk_size;
        (range.start / size..=(range.end - 1) / size).all(|i| inner.cache.contains_key(&i))
    }

    /// Drains the item ranges evicted since the last call.
    pub fn take_evicted(&self) -> RangeSet {
        std::mem::take(&mut self.inner.borrow_mut().evicted)
    }

    /// Drops every cached chunk and detaches fetches in flight; their results are discarded.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.generation += 1;
        inner.cache.clear();
        inner.in_flight.clear();
        inner.evicted.clear();
        inner.total = None;
        inner.stats = StoreStats::default();
        vdebug!(generation = inner.generation, "store reset");
    }
}

impl<T: Clone, S> VirtualDataStore<T, S> {
    /// Reads a cached item without loading and without touching LRU order.
    pub fn peek(&self, index: usize) -> Option<T> {
        let inner = self.inner.borrow();
        let size = inner.options.chunk_size;
        let entry = inner.cache.get(&(index / size))?;
        entry.chunk.items.get(index % size).cloned()
    }
}

impl<T, S> VirtualDataStore<T, S>
where
    T: Clone + 'static,
    S: PageSource<T> + 'static,
{
    /// Loads (or reuses) one chunk.
    ///
    /// Cache hits refresh the chunk's access time. A chunk already being fetched is not
    /// fetched again; the returned future attaches to the pending one.
    pub fn chunk(&self, index: usize) -> LocalBoxFuture<'static, ChunkResult<T>> {
        let mut inner = self.inner.borrow_mut();
        if let Some(chunk) = inner.touch(index) {
            inner.stats.hits += 1;
            vtrace!(chunk = index, "chunk hit");
            return future::ready(Ok(chunk)).boxed_local();
        }
        if let Some(pending) = inner.in_flight.get(&index) {
            let pending = pending.clone();
            inner.stats.deduplicated += 1;
            vtrace!(chunk = index, "attached to in-flight chunk");
            return pending.boxed_local();
        }

        inner.stats.misses += 1;
        let generation = inner.generation;
        let chunk_size = inner.options.chunk_size;
        let source = Rc::clone(&self.source);
        let weak = Rc::downgrade(&self.inner);
        vdebug!(chunk = index, page = index + 1, "fetching chunk");

        let fetch = async move {
            let result = source.fetch_page(index + 1, chunk_size).await;
            complete_chunk(&weak, generation, index, result)
        }
        .boxed_local()
        .shared();
        inner.in_flight.insert(index, fetch.clone());
        fetch.boxed_local()
    }

    /// Returns the items `[start, end)`, loading missing chunks concurrently.
    ///
    /// The range is clamped to the known total. Chunks that fail are reported in
    /// [`RangeFetch::failed`] and do not prevent the other chunks from being returned.
    pub async fn get_range(&self, start: usize, end: usize) -> RangeFetch<T> {
        let requested = IndexRange::new(start, end);
        let range = match self.total() {
            Some(total) => requested.clamp_to(total),
            None => requested,
        };
        if range.is_empty() {
            return RangeFetch::default();
        }

        let size = self.chunk_size();
        let first = range.start / size;
        let last = (range.end - 1) / size;
        let results = future::join_all((first..=last).map(|i| self.chunk(i))).await;

        let mut out = RangeFetch {
            items: Vec::with_capacity(range.len()),
            failed: Vec::new(),
        };
        for (index, result) in (first..=last).zip(results) {
            let base = index * size;
            match result {
                Ok(chunk) => {
                    let lo = range.start.saturating_sub(base);
                    let hi = (range.end - base).min(chunk.items.len());
                    if lo < hi {
                        out.items.extend_from_slice(&chunk.items[lo..hi]);
                    }
                }
                Err(error) => out.failed.push(ChunkFailure {
                    chunk_index: index,
                    range: IndexRange::new(base, base + size).intersect(&range),
                    error,
                }),
            }
        }
        if !out.failed.is_empty() {
            vdebug!(
                start,
                end,
                failed = out.failed.len(),
                "get_range finished with failures"
            );
        }
        out
    }
}

fn complete_chunk<T>(
    weak: &Weak<RefCell<Inner<T>>>,
    generation: u64,
    index: usize,
    result: std::result::Result<crate::Page<T>, FetchError>,
) -> ChunkResult<T> {
    let result = result.map(|page| {
        (
            page.pagination.total,
            Rc::new(Chunk {
                index,
                items: page.data,
            }),
        )
    });
    let Some(inner) = weak.upgrade() else {
        return result.map(|(_, chunk)| chunk);
    };
    let mut inner = inner.borrow_mut();
    if inner.generation != generation {
        vdebug!(chunk = index, "dropping chunk from a previous generation");
        return result.map(|(_, chunk)| chunk);
    }
    inner.in_flight.remove(&index);
    match result {
        Ok((total, chunk)) => {
            inner.total = Some(total);
            inner.insert(Rc::clone(&chunk));
            Ok(chunk)
        }
        Err(error) => {
            inner.stats.failures += 1;
            vdebug!(chunk = index, %error, "chunk fetch failed");
            Err(error)
        }
    }
}
