//! Headless windowed rendering for very large tables.
//!
//! This crate holds the synchronous half of the flow-log viewer core:
//! - [`Window`]: given scroll offset, viewport size and item sizes (fixed, or estimated and
//!   measured), computes the overscanned range of slots to materialize and the total scroll
//!   extent, including trailing loading placeholders.
//! - [`render_list`] / [`render_table`]: project rows (through [`ColumnDef`]s for tables) into
//!   a [`Frame`] of positioned rows, with skeletons for rows that are not loaded yet.
//! - [`BodyState`]: picks exactly one of loading / error / empty / rows.
//! - [`DataAggregator`]: memoized count/sum/average/min/max/percentile/group-by that is
//!   invalidated in full whenever the collection changes.
//!
//! It is UI-agnostic. The data loading side (chunk cache, pagination, infinite loading) lives
//! in the `flowview-data` crate.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod aggregate;
mod column;
mod fenwick;
mod input;
mod key;
mod options;
mod render;
mod types;
mod window;


pub use aggregate::{AggregateOp, DataAggregator, Groups, KeySelector, Selector};
pub use column::{CellRenderer, CellValue, ColumnDef, ColumnWidth, TextAlign};
pub use input::Key;
pub use options::{ItemSize, OnActivate, OnRangeChange, WindowOptions};
pub use render::{
    BodyState, Frame, HeaderCell, RenderedRow, RowContent, TableBody, TableFrame, render_list,
    render_skeleton, render_table,
};
pub use types::{Align, IndexRange, ItemKey, LoadRange, ScrollDirection, VirtualItem};
pub use window::Window;

#[doc(hidden)]
pub use key::KeyCacheKey;
