//! SpatialIndex trait definition.

use crate::disk_rtree::{DiskRTree, SpatialResult};
use crate::rectangle::Rectangle;

/// Programmatic surface of a rectangle index.
///
/// Pointers are opaque to the index: they are stored with their rectangle
/// and handed back by queries.
pub trait SpatialIndex: Send + Sync {
    /// Adds a rectangle with its record pointer.
    fn insert(&self, rect: &Rectangle, pointer: i32) -> SpatialResult<()>;

    /// Finds the pointers of all rectangles intersecting `rect`.
    fn query_mbr(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>>;

    /// Finds the pointers of all rectangles lying inside `rect`.
    fn query_contained(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>>;

    /// Number of nodes persisted by the index.
    fn tree_size(&self) -> i32;

    /// Disk operations performed in this session.
    fn disk_io(&self) -> u64;

    /// Nodes read from disk in this session.
    fn nodes_accessed(&self) -> u64;

    /// Closes the index, flushing pending writes.
    fn close(&self) -> SpatialResult<()>;
}

impl SpatialIndex for DiskRTree {
    fn insert(&self, rect: &Rectangle, pointer: i32) -> SpatialResult<()> {
        DiskRTree::insert(self, rect, pointer)
    }

    fn query_mbr(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>> {
        DiskRTree::query_mbr(self, rect)
    }

    fn query_contained(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>> {
        DiskRTree::query_contained(self, rect)
    }

    fn tree_size(&self) -> i32 {
        DiskRTree::tree_size(self)
    }

    fn disk_io(&self) -> u64 {
        DiskRTree::disk_io(self)
    }

    fn nodes_accessed(&self) -> u64 {
        DiskRTree::nodes_accessed(self)
    }

    fn close(&self) -> SpatialResult<()> {
        DiskRTree::close(self)
    }
}
