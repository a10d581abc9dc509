//! Disk-resident R-Tree stored as fixed-size pages in a single file.
//!
//! - Page 0 holds the tree header; nodes live in chains of linked pages
//! - Only the root stays in memory; every other node is read on demand
//! - Quadratic node splitting with a minimum occupancy guarantee

pub mod rtree_types;
pub mod rtree_constants;
pub mod rtree_config;
pub mod rtree_codec;
pub mod rtree_storage;
pub mod rtree_node;
pub mod rtree_store;
mod integrity;
mod rtree_impl;

pub use rtree_types::{
    SpatialError, SpatialResult, RTreeStats, IntegrityReport, Entry, NodeKind, TreeHeader,
    PageId,
};
pub use rtree_constants::{NO_PAGE, DEFAULT_PAGE_SIZE, DEFAULT_MAX_ENTRIES, DEFAULT_MIN_ENTRIES};
pub use rtree_config::RTreeConfig;
pub use rtree_node::{Node, NodeStore, Split};
pub use rtree_storage::PagedStorage;
pub use rtree_store::TreeStore;
pub use rtree_impl::DiskRTree;
