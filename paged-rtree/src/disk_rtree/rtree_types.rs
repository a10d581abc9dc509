//! Core types and data structures for the paged R-Tree.
//!
//! This module defines the fundamental types used throughout the R-Tree:
//! - Error types and result types
//! - Entries and node kinds
//! - The tree header persisted at page 0
//! - Statistics and integrity reports

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::rectangle::Rectangle;

use super::rtree_config::RTreeConfig;
use super::rtree_constants::{FIRST_DATA_PAGE, HEADER_SIZE, NO_PAGE, ROOT_PAGE_OFFSET};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted index file: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Tree is closed")]
    Closed,
}

impl From<bincode::error::EncodeError> for SpatialError {
    fn from(err: bincode::error::EncodeError) -> Self {
        SpatialError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for SpatialError {
    fn from(err: bincode::error::DecodeError) -> Self {
        SpatialError::Serialization(err.to_string())
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;

/// Page ID - index of a fixed-size page in the backing file
pub type PageId = i32;

// ============================================================================
// Entries and Node Kinds
// ============================================================================

/// A (rectangle, pointer) pair stored in a node.
///
/// In a leaf the pointer identifies an external record; in an internal node
/// it is the page id of a child node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub rect: Rectangle,
    pub pointer: i32,
}

impl Entry {
    pub fn new(rect: Rectangle, pointer: i32) -> Self {
        Self { rect, pointer }
    }
}

/// Node kinds in the R-Tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Entries point at child nodes
    Internal,
    /// Entries point at external records
    Leaf,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Leaf)
    }
}

// ============================================================================
// Tree Header
// ============================================================================

/// Tree metadata stored at page 0.
///
/// Field order is the on-disk order; every field is a fixed-width `i32`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeHeader {
    pub root_page_offset: i32,
    /// Number of nodes ever persisted
    pub tree_size: i32,
    /// Page id of the current root, `NO_PAGE` when the tree is empty
    pub root_id: PageId,
    pub page_size: i32,
    pub max_entries: i32,
    pub min_entries: i32,
    /// Next page the allocator hands out
    pub next_page: PageId,
}

impl TreeHeader {
    /// Header for a freshly created, empty tree. The config must already be validated.
    pub fn new(config: &RTreeConfig) -> Self {
        Self {
            root_page_offset: ROOT_PAGE_OFFSET,
            tree_size: 0,
            root_id: NO_PAGE,
            page_size: config.page_size() as i32,
            max_entries: config.max_entries() as i32,
            min_entries: config.min_entries() as i32,
            next_page: FIRST_DATA_PAGE,
        }
    }

    /// Rebuilds the creation-time configuration from the stored header.
    pub fn config(&self) -> RTreeConfig {
        RTreeConfig::new(
            self.page_size as usize,
            self.max_entries as usize,
            self.min_entries as usize,
        )
    }

    /// Checks that a header read from disk describes a usable tree.
    pub fn validate(&self) -> SpatialResult<()> {
        if self.page_size < HEADER_SIZE as i32 {
            return Err(SpatialError::Corrupted(format!(
                "page size {} cannot hold the header",
                self.page_size
            )));
        }
        if self.max_entries < 2
            || self.min_entries < 1
            || 2 * self.min_entries as i64 > self.max_entries as i64 + 1
        {
            return Err(SpatialError::Corrupted(format!(
                "invalid entry bounds (min {}, max {})",
                self.min_entries, self.max_entries
            )));
        }
        if self.next_page < FIRST_DATA_PAGE || self.tree_size < 0 {
            return Err(SpatialError::Corrupted(format!(
                "invalid allocation state (next page {}, tree size {})",
                self.next_page, self.tree_size
            )));
        }
        if self.root_id != NO_PAGE && !(FIRST_DATA_PAGE..self.next_page).contains(&self.root_id) {
            return Err(SpatialError::Corrupted(format!(
                "root page {} outside allocated range",
                self.root_id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of tree metadata and per-session instrumentation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTreeStats {
    pub tree_size: i32,
    pub root_id: PageId,
    pub next_page: PageId,
    pub page_size: usize,
    pub max_entries: usize,
    pub min_entries: usize,
    /// Page reads and writes (header included) since create/load
    pub disk_io: u64,
    /// Nodes materialized from disk since create/load
    pub nodes_accessed: u64,
}

/// Result of a structural integrity check
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Nodes reachable from the root
    pub nodes_checked: u64,
    pub leaf_nodes: u64,
    /// Entries stored in leaves
    pub entries: u64,
    /// Pages visited across all node chains
    pub pages_checked: u64,
    /// Number of levels, 0 for an empty tree
    pub height: u32,
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            nodes_checked: 0,
            leaf_nodes: 0,
            entries: 0,
            pages_checked: 0,
            height: 0,
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        log::error!("{}", message);
        self.is_valid = false;
        self.errors.push(message);
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}
