//! DiskRTree implementation.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::rectangle::Rectangle;

use super::integrity;
use super::rtree_config::RTreeConfig;
use super::rtree_constants::NO_PAGE;
use super::rtree_node::{Node, NodeStore};
use super::rtree_store::TreeStore;
use super::rtree_types::{IntegrityReport, PageId, RTreeStats, SpatialError, SpatialResult};

/// A paged R-Tree stored in a single file.
///
/// The root node is the only node kept in memory; every other node is read
/// from disk when a call needs it and dropped afterwards. All state sits
/// behind one lock, so a handle can be shared between threads and calls run
/// one at a time.
pub struct DiskRTree {
    inner: Mutex<TreeState>,
    path: PathBuf,
}

struct TreeState {
    root: Option<Node>,
    store: TreeStore,
    closed: bool,
}

impl TreeState {
    fn check_closed(&self) -> SpatialResult<()> {
        if self.closed {
            return Err(SpatialError::Closed);
        }
        Ok(())
    }
}

impl DiskRTree {
    /// Creates an empty tree at `path`, truncating any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        page_size: usize,
        max_entries: usize,
        min_entries: usize,
    ) -> SpatialResult<Self> {
        Self::create_with_config(path, &RTreeConfig::new(page_size, max_entries, min_entries))
    }

    /// Creates an empty tree at `path` with the given configuration.
    pub fn create_with_config(path: impl AsRef<Path>, config: &RTreeConfig) -> SpatialResult<Self> {
        let path = path.as_ref();
        let mut store = TreeStore::create(path, config)?;
        store.reset_counters();

        log::debug!(
            "created rtree at {} (page size {}, entries {}..={})",
            path.display(),
            config.page_size(),
            config.min_entries(),
            config.max_entries()
        );

        Ok(Self {
            inner: Mutex::new(TreeState {
                root: None,
                store,
                closed: false,
            }),
            path: path.to_path_buf(),
        })
    }

    /// Opens a tree previously created at `path`.
    ///
    /// The configuration comes from the stored header. The root node, if any,
    /// is read eagerly. Instrumentation counters start at zero.
    pub fn load(path: impl AsRef<Path>) -> SpatialResult<Self> {
        let path = path.as_ref();
        let mut store = TreeStore::open(path)?;

        let root_id = store.header().root_id;
        let root = if root_id == NO_PAGE {
            None
        } else {
            Some(store.load_node(root_id)?)
        };
        store.reset_counters();

        log::debug!(
            "loaded rtree from {} (root {}, {} nodes)",
            path.display(),
            root_id,
            store.header().tree_size
        );

        Ok(Self {
            inner: Mutex::new(TreeState {
                root,
                store,
                closed: false,
            }),
            path: path.to_path_buf(),
        })
    }

    /// Inserts a rectangle with its record pointer.
    ///
    /// When the root splits, a new internal root referencing the old root and
    /// its sibling is written and recorded in the header.
    pub fn insert(&self, rect: &Rectangle, pointer: i32) -> SpatialResult<()> {
        if !rect.is_valid() {
            return Err(SpatialError::InvalidOperation(format!(
                "cannot index invalid rectangle {}",
                rect
            )));
        }

        let mut guard = self.inner.lock();
        guard.check_closed()?;
        let TreeState { root, store, .. } = &mut *guard;
        let config = store.config();

        let node = root.get_or_insert_with(|| {
            Node::new_leaf(config.max_entries(), config.min_entries())
        });

        if let Some(split) = node.insert(*rect, pointer, store)? {
            let mut new_root = Node::new_internal(config.max_entries(), config.min_entries());
            new_root.add_entry(node.bounding_rect(), node.id())?;
            new_root.add_entry(split.bounding_rect, split.page_id)?;
            store.save_node(&mut new_root)?;

            log::debug!(
                "root {} split off {}, promoted new root {}",
                node.id(),
                split.page_id,
                new_root.id()
            );
            *node = new_root;
        }

        store.set_root(node.id())
    }

    /// Returns the pointers of all entries whose rectangle intersects `rect`,
    /// depth first in entry order. An empty tree yields an empty result.
    pub fn query_mbr(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>> {
        self.search(rect, |root, results, store| root.query(rect, results, store))
    }

    /// Returns the pointers of all entries whose rectangle lies inside `rect`.
    pub fn query_contained(&self, rect: &Rectangle) -> SpatialResult<Vec<i32>> {
        self.search(rect, |root, results, store| {
            root.query_contained(rect, results, store)
        })
    }

    fn search<F>(&self, rect: &Rectangle, visit: F) -> SpatialResult<Vec<i32>>
    where
        F: FnOnce(&Node, &mut Vec<i32>, &mut TreeStore) -> SpatialResult<()>,
    {
        let mut guard = self.inner.lock();
        guard.check_closed()?;

        let mut results = Vec::new();
        let root_id = guard.store.header().root_id;
        if root_id == NO_PAGE || !rect.is_valid() {
            return Ok(results);
        }

        // The root is read back from disk like every other node.
        let root = guard.store.load_node(root_id)?;
        visit(&root, &mut results, &mut guard.store)?;
        Ok(results)
    }

    /// Number of nodes persisted so far.
    pub fn tree_size(&self) -> i32 {
        self.inner.lock().store.header().tree_size
    }

    /// Page id of the root, `-1` for an empty tree.
    pub fn root_id(&self) -> PageId {
        self.inner.lock().store.header().root_id
    }

    /// Page reads and writes in this session.
    pub fn disk_io(&self) -> u64 {
        self.inner.lock().store.disk_io()
    }

    /// Nodes read from disk in this session.
    pub fn nodes_accessed(&self) -> u64 {
        self.inner.lock().store.nodes_accessed()
    }

    pub fn config(&self) -> RTreeConfig {
        self.inner.lock().store.config()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of metadata and counters. Performs no I/O.
    pub fn stats(&self) -> RTreeStats {
        let guard = self.inner.lock();
        let header = guard.store.header();

        RTreeStats {
            tree_size: header.tree_size,
            root_id: header.root_id,
            next_page: header.next_page,
            page_size: header.page_size as usize,
            max_entries: header.max_entries as usize,
            min_entries: header.min_entries as usize,
            disk_io: guard.store.disk_io(),
            nodes_accessed: guard.store.nodes_accessed(),
        }
    }

    /// Walks the stored tree and reports every structural problem found.
    pub fn check_integrity(&self) -> SpatialResult<IntegrityReport> {
        let mut guard = self.inner.lock();
        guard.check_closed()?;
        integrity::check_integrity(&mut guard.store)
    }

    /// Forces written pages to stable storage.
    pub fn sync(&self) -> SpatialResult<()> {
        let mut guard = self.inner.lock();
        guard.check_closed()?;
        guard.store.sync()
    }

    /// Syncs and closes the tree. Later calls fail with [`SpatialError::Closed`].
    pub fn close(&self) -> SpatialResult<()> {
        let mut guard = self.inner.lock();
        guard.check_closed()?;
        guard.store.sync()?;
        guard.closed = true;
        guard.root = None;
        log::debug!("closed rtree at {}", self.path.display());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Drop for DiskRTree {
    fn drop(&mut self) {
        let state = self.inner.get_mut();
        if !state.closed {
            if let Err(e) = state.store.sync() {
                log::warn!("failed to sync rtree at {} on drop: {}", self.path.display(), e);
            }
        }
    }
}
