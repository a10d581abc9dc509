//! Node persistence on top of [`PagedStorage`].
//!
//! [`TreeStore`] owns the storage and the tree header. It maps nodes to page
//! chains, keeps `tree_size` and `next_page` in the header current, and counts
//! node materializations.

use std::path::Path;

use super::rtree_codec::{decode_node, encode_node};
use super::rtree_config::RTreeConfig;
use super::rtree_constants::NO_PAGE;
use super::rtree_node::{Node, NodeStore};
use super::rtree_storage::PagedStorage;
use super::rtree_types::{PageId, SpatialError, SpatialResult, TreeHeader};

pub struct TreeStore {
    storage: PagedStorage,
    header: TreeHeader,
    nodes_accessed: u64,
}

impl TreeStore {
    /// Creates the backing file and writes the header of an empty tree.
    pub fn create(path: &Path, config: &RTreeConfig) -> SpatialResult<Self> {
        config.validate()?;

        let mut storage = PagedStorage::create(path, config.page_size())?;
        let header = TreeHeader::new(config);
        storage.write_header(&header)?;

        Ok(Self {
            storage,
            header,
            nodes_accessed: 0,
        })
    }

    /// Opens an existing backing file.
    pub fn open(path: &Path) -> SpatialResult<Self> {
        let (storage, header) = PagedStorage::open(path)?;
        Ok(Self {
            storage,
            header,
            nodes_accessed: 0,
        })
    }

    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    pub fn config(&self) -> RTreeConfig {
        self.header.config()
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn disk_io(&self) -> u64 {
        self.storage.disk_io()
    }

    pub fn nodes_accessed(&self) -> u64 {
        self.nodes_accessed
    }

    /// Zeroes the per-session counters.
    pub fn reset_counters(&mut self) {
        self.storage.reset_disk_io();
        self.nodes_accessed = 0;
    }

    /// Records `root_id` as the root, writing the header only if it changed.
    pub fn set_root(&mut self, root_id: PageId) -> SpatialResult<()> {
        if self.header.root_id != root_id {
            log::debug!("root moved from page {} to {}", self.header.root_id, root_id);
            self.header.root_id = root_id;
            self.storage.write_header(&self.header)?;
        }
        Ok(())
    }

    /// Page ids of the chain holding the node at `page_id`.
    pub fn chain_pages(&mut self, page_id: PageId) -> SpatialResult<Vec<PageId>> {
        self.storage.chain_pages(page_id, self.header.next_page)
    }

    pub fn sync(&mut self) -> SpatialResult<()> {
        self.storage.sync()
    }
}

impl NodeStore for TreeStore {
    /// Writes the node's image to its page chain.
    ///
    /// A node without a page gets a new chain and counts towards `tree_size`.
    /// The header is rewritten after the chain whenever `tree_size` or
    /// `next_page` moved, so it never refers to pages that were not written.
    fn save_node(&mut self, node: &mut Node) -> SpatialResult<()> {
        if node.is_overflowing() {
            let message = format!(
                "node {} persisted with {} entries (max {})",
                node.id(),
                node.len(),
                node.max_entries()
            );
            log::error!("{}", message);
            return Err(SpatialError::InvariantViolation(message));
        }

        let image = encode_node(node)?;
        let is_new = node.id() == NO_PAGE;
        let next_page = self.header.next_page;

        let head = self.storage.write_chain(&mut self.header, node.id(), &image)?;
        if is_new {
            node.set_id(head);
            self.header.tree_size += 1;
        }

        if is_new || self.header.next_page != next_page {
            self.storage.write_header(&self.header)?;
        }
        Ok(())
    }

    fn load_node(&mut self, page_id: PageId) -> SpatialResult<Node> {
        let image = self.storage.read_chain(page_id, self.header.next_page)?;
        let node = decode_node(
            &image,
            page_id,
            self.header.max_entries as usize,
            self.header.min_entries as usize,
        )?;
        self.nodes_accessed += 1;
        Ok(node)
    }
}
