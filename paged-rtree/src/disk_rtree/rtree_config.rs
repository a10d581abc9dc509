//! R-Tree configuration module.
//!
//! Page size and node capacity bounds are fixed when an index is created and
//! shared by every node in the tree.

use super::rtree_constants::{
    DEFAULT_MAX_ENTRIES, DEFAULT_MIN_ENTRIES, DEFAULT_PAGE_SIZE, HEADER_SIZE, PAGE_LINK_SIZE,
};
use super::rtree_types::{SpatialError, SpatialResult};

/// Creation-time parameters of a paged R-Tree.
///
/// # Example
///
/// ```rust
/// use paged_rtree::RTreeConfig;
///
/// let config = RTreeConfig::default()
///     .with_page_size(1024)
///     .with_max_entries(16)
///     .with_min_entries(6);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RTreeConfig {
    page_size: usize,
    max_entries: usize,
    min_entries: usize,
}

impl RTreeConfig {
    /// Creates a configuration with explicit values. Call [`validate`](Self::validate)
    /// before using it.
    #[inline]
    pub fn new(page_size: usize, max_entries: usize, min_entries: usize) -> Self {
        Self {
            page_size,
            max_entries,
            min_entries,
        }
    }

    /// Returns the page size in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the maximum number of entries per node.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns the minimum number of entries per non-root node.
    #[inline]
    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    /// Payload bytes available in each page after the link header.
    #[inline]
    pub fn page_payload(&self) -> usize {
        self.page_size.saturating_sub(PAGE_LINK_SIZE)
    }

    /// Sets the page size in bytes.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the maximum number of entries per node.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets the minimum number of entries per non-root node.
    /// Builder-style method for chaining.
    #[inline]
    pub fn with_min_entries(mut self, min_entries: usize) -> Self {
        self.min_entries = min_entries;
        self
    }

    /// Validates the configuration.
    ///
    /// Every page, page 0 included, must hold the whole tree header. Twice the
    /// minimum must not exceed `max_entries + 1`, otherwise an overflowing node
    /// cannot be split into two halves that both reach the minimum.
    pub fn validate(&self) -> SpatialResult<()> {
        if self.page_size < HEADER_SIZE {
            return Err(SpatialError::InvalidConfig(format!(
                "page size must be at least {} bytes, got {}",
                HEADER_SIZE, self.page_size
            )));
        }
        if self.page_size > i32::MAX as usize || self.max_entries >= i32::MAX as usize {
            return Err(SpatialError::InvalidConfig(
                "page size and entry bounds must fit in a 32-bit integer".into(),
            ));
        }
        if self.max_entries < 2 {
            return Err(SpatialError::InvalidConfig(format!(
                "max entries must be at least 2, got {}",
                self.max_entries
            )));
        }
        if self.min_entries == 0 || 2 * self.min_entries > self.max_entries + 1 {
            return Err(SpatialError::InvalidConfig(format!(
                "min entries must be between 1 and {}, got {}",
                (self.max_entries + 1) / 2,
                self.min_entries
            )));
        }
        Ok(())
    }
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_MAX_ENTRIES, DEFAULT_MIN_ENTRIES)
    }
}
