//! # Paged R-Tree
//!
//! A disk-resident R-Tree that indexes axis-aligned rectangles together with
//! an opaque `i32` pointer and answers rectangle intersection queries.
//!
//! ## Features
//!
//! - **Single File**: Nodes are spread over fixed-size pages, header at page 0
//! - **Out of Core**: Only the root is kept in memory
//! - **Persistent**: An index survives process restarts and is reopened with [`DiskRTree::load`]
//! - **Instrumented**: Per-session disk I/O and node access counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paged_rtree::{DiskRTree, Rectangle};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = DiskRTree::create("places.rtree", 4096, 50, 20)?;
//!
//! tree.insert(&Rectangle::new(0.0, 0.0, 10.0, 10.0), 1)?;
//! tree.insert(&Rectangle::new(20.0, 20.0, 30.0, 30.0), 2)?;
//!
//! let hits = tree.query_mbr(&Rectangle::new(5.0, 5.0, 15.0, 15.0))?;
//! assert_eq!(hits, vec![1]);
//!
//! tree.close()?;
//! let tree = DiskRTree::load("places.rtree")?;
//! assert_eq!(tree.tree_size(), 1);
//! # Ok(())
//! # }
//! ```

pub mod disk_rtree;
pub mod rectangle;
pub mod spatial_index;

pub use disk_rtree::{
    DiskRTree, IntegrityReport, RTreeConfig, RTreeStats, SpatialError, SpatialResult,
};
pub use rectangle::Rectangle;
pub use spatial_index::SpatialIndex;
