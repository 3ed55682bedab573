//! Data loading for the `flowview` windowed renderer.
//!
//! The `flowview` crate decides which rows are on screen; this crate gets them there:
//!
//! - [`VirtualDataStore`]: a chunked cache over a [`PageSource`] with one fetch per chunk
//!   in flight and single-entry LRU eviction
//! - [`InfiniteLoader`]: tracks loaded index ranges and issues coalesced, de-duplicated
//!   range loads, debounced on scroll
//! - [`PaginationManager`]: discrete pages or an append-only infinite list, stale while
//!   revalidating
//! - [`process_batches`]: cooperative batch transforms behind an injectable [`Yield`]
//! - [`DatasetRegistry`]: explicit create/invalidate/dispose lifecycle per query key
//! - [`ListController`]: wires a window, a loader and a store together for adapters
//!
//! Everything here is single-threaded (`Rc`/`RefCell`) and executor-agnostic: futures are
//! plain `LocalBoxFuture`s that any local executor can drive.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod batch;
mod config;
mod controller;
mod debounce;
mod error;
mod loader;
mod pagination;
mod range_set;
mod registry;
mod source;
mod store;

#[cfg(test)]
mod tests;

#[cfg(feature = "tokio")]
pub use batch::TokioYield;
pub use batch::{
    CooperativeYield, Yield, YieldNow, process_batches, try_process_batches,
    try_process_batches_with,
};
pub use config::ViewConfig;
pub use controller::ListController;
pub use debounce::Debouncer;
pub use error::{ConfigError, Error, FetchError, Result};
pub use loader::InfiniteLoader;
pub use pagination::{FetchMode, LoadStatus, PaginationManager, PaginationView};
pub use range_set::RangeSet;
pub use registry::{Dataset, DatasetRegistry};
pub use source::{FnSource, Page, PageSource, PaginationState, VecSource};
pub use store::{Chunk, ChunkFailure, RangeFetch, StoreOptions, StoreStats, VirtualDataStore};
