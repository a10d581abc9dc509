//! Constants for the paged R-Tree file format.

use super::rtree_types::PageId;

/// Page id sentinel: "no page assigned yet" for nodes, "end of chain" for page links,
/// "empty tree" for the root id.
pub const NO_PAGE: PageId = -1;

/// Page 0 always holds the tree header.
pub const HEADER_PAGE: PageId = 0;

/// Value stored in the reserved root page offset slot of the header.
pub const ROOT_PAGE_OFFSET: i32 = 1;

/// First page handed out by the allocator.
pub const FIRST_DATA_PAGE: PageId = 1;

/// Bytes reserved at the start of every chained page: next page id + bytes used.
pub const PAGE_LINK_SIZE: usize = 2 * std::mem::size_of::<i32>();

/// Encoded size of the tree header (seven `i32` fields, no padding).
pub const HEADER_SIZE: usize = 7 * std::mem::size_of::<i32>();

/// Encoded size of a rectangle (four `f64` bounds).
pub const RECT_SIZE: usize = 4 * std::mem::size_of::<f64>();

/// Encoded size of an entry pointer.
pub const POINTER_SIZE: usize = std::mem::size_of::<i32>();

/// Default page size in bytes
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default maximum number of entries per node
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default minimum number of entries per non-root node (40% of max)
pub const DEFAULT_MIN_ENTRIES: usize = 20;
