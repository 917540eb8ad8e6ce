//! Paged B+-tree index implementation for persistent on-disk indexes.
//!
//! This crate provides the page-based B+-tree used to back primary and
//! secondary indexes: a `HeadPage` of metadata at page 0, `LeafPage`s
//! holding the actual records as a chain of MVCC versions, `BranchPage`s
//! routing descent, and `OverflowPage` runs for values too large to inline.
//! It builds on `buffer`'s pool/divide/storage machinery via the
//! `CachedPage`/`DivisiblePage` trait seam in `page.rs`.

pub mod garbage;
pub mod head_page;
pub mod overflow_page;
pub mod page;
pub mod record;
pub mod tree;

pub use garbage::GarbageOwner;
pub use head_page::{HeadPage, HeadPageLayout, IndexType, FILE_VERSION};
pub use overflow_page::OverflowPage;
pub use page::{BranchPage, LeafPage, SearchResult};
pub use record::{BranchRecord, LeafRecord, LeafVersion, RawRecord};
pub use tree::IndexTree;

#[cfg(test)]
mod tests;
