//! Structural integrity checking.
//!
//! Walks every node reachable from the root as stored on disk and verifies
//! the tree invariants: all leaves at one depth, occupancy bounds, cached
//! bounding rectangles, parent entries matching their children, and well
//! formed page chains. Findings are collected in an [`IntegrityReport`]
//! rather than returned as errors, so one pass reports every problem.

use std::collections::HashSet;

use crate::rectangle::Rectangle;

use super::rtree_constants::NO_PAGE;
use super::rtree_node::NodeStore;
use super::rtree_store::TreeStore;
use super::rtree_types::{IntegrityReport, PageId, SpatialResult};

struct Pending {
    page_id: PageId,
    depth: u32,
    /// Rectangle the parent entry records for this node
    parent_rect: Option<Rectangle>,
}

pub fn check_integrity(store: &mut TreeStore) -> SpatialResult<IntegrityReport> {
    let mut report = IntegrityReport::new();
    let header = store.header().clone();

    if let Err(e) = header.validate() {
        report.fail(format!("invalid header: {}", e));
        return Ok(report);
    }
    if header.root_id == NO_PAGE {
        if header.tree_size != 0 {
            report.fail(format!(
                "empty tree records {} persisted nodes",
                header.tree_size
            ));
        }
        return Ok(report);
    }

    let max_entries = header.max_entries as usize;
    let min_entries = header.min_entries as usize;
    let mut leaf_depth: Option<u32> = None;
    let mut seen = HashSet::new();
    let mut stack = vec![Pending {
        page_id: header.root_id,
        depth: 0,
        parent_rect: None,
    }];

    while let Some(Pending {
        page_id,
        depth,
        parent_rect,
    }) = stack.pop()
    {
        if !seen.insert(page_id) {
            report.fail(format!("page {} is referenced more than once", page_id));
            continue;
        }

        match store.chain_pages(page_id) {
            Ok(pages) => report.pages_checked += pages.len() as u64,
            Err(e) => {
                report.fail(format!("node {}: broken page chain: {}", page_id, e));
                continue;
            }
        }

        let node = match store.load_node(page_id) {
            Ok(node) => node,
            Err(e) => {
                report.fail(format!("node {}: unreadable: {}", page_id, e));
                continue;
            }
        };
        report.nodes_checked += 1;

        let is_root = parent_rect.is_none();
        let lower = if is_root { 1 } else { min_entries };
        if node.len() < lower || node.len() > max_entries {
            report.fail(format!(
                "node {} holds {} entries, expected {}..={}",
                page_id,
                node.len(),
                lower,
                max_entries
            ));
        }

        let expected = Rectangle::bounding(node.entries().iter().map(|e| &e.rect));
        if node.bounding_rect() != expected {
            report.fail(format!(
                "node {} caches bounding rect {} but its entries span {}",
                page_id,
                node.bounding_rect(),
                expected
            ));
        }
        if let Some(parent_rect) = parent_rect {
            if parent_rect != node.bounding_rect() {
                report.fail(format!(
                    "parent entry for node {} records {} but the node spans {}",
                    page_id,
                    parent_rect,
                    node.bounding_rect()
                ));
            }
        }

        if node.is_leaf() {
            report.leaf_nodes += 1;
            report.entries += node.len() as u64;
            match leaf_depth {
                None => leaf_depth = Some(depth),
                Some(d) if d != depth => report.fail(format!(
                    "leaf {} at depth {}, other leaves at depth {}",
                    page_id, depth, d
                )),
                Some(_) => {}
            }
        } else {
            // Reverse so children are visited in entry order.
            for entry in node.entries().iter().rev() {
                stack.push(Pending {
                    page_id: entry.pointer,
                    depth: depth + 1,
                    parent_rect: Some(entry.rect),
                });
            }
        }
    }

    report.height = leaf_depth.map_or(0, |d| d + 1);
    if report.nodes_checked != header.tree_size as u64 {
        report.fail(format!(
            "{} nodes reachable from the root, header records {}",
            report.nodes_checked, header.tree_size
        ));
    }

    log::debug!(
        "integrity check: {} nodes, {} pages, height {}, valid: {}",
        report.nodes_checked,
        report.pages_checked,
        report.height,
        report.is_valid
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_rtree::rtree_config::RTreeConfig;
    use crate::disk_rtree::rtree_node::Node;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> TreeStore {
        TreeStore::create(&dir.join("integrity.rtree"), &RTreeConfig::new(128, 4, 2)).unwrap()
    }

    fn leaf(store: &mut TreeStore, rects: &[(f64, f64)]) -> Node {
        let mut node = Node::new_leaf(4, 2);
        for (i, (x, y)) in rects.iter().enumerate() {
            node.add_entry(Rectangle::new(*x, *y, x + 1.0, y + 1.0), i as i32).unwrap();
        }
        store.save_node(&mut node).unwrap();
        node
    }

    #[test]
    fn test_empty_tree_is_valid() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let report = check_integrity(&mut store).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.nodes_checked, 0);
        assert_eq!(report.height, 0);
    }

    #[test]
    fn test_two_level_tree_is_valid() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let left = leaf(&mut store, &[(0.0, 0.0), (1.0, 1.0)]);
        let right = leaf(&mut store, &[(10.0, 0.0), (11.0, 1.0), (12.0, 2.0)]);

        let mut root = Node::new_internal(4, 2);
        root.add_entry(left.bounding_rect(), left.id()).unwrap();
        root.add_entry(right.bounding_rect(), right.id()).unwrap();
        store.save_node(&mut root).unwrap();
        store.set_root(root.id()).unwrap();

        let report = check_integrity(&mut store).unwrap();
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(report.nodes_checked, 3);
        assert_eq!(report.leaf_nodes, 2);
        assert_eq!(report.entries, 5);
        assert_eq!(report.height, 2);
        assert!(report.pages_checked >= 3);
    }

    #[test]
    fn test_detects_stale_parent_rect_and_underfull_leaf() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let left = leaf(&mut store, &[(0.0, 0.0)]);
        let right = leaf(&mut store, &[(10.0, 0.0), (11.0, 1.0)]);

        let mut root = Node::new_internal(4, 2);
        root.add_entry(Rectangle::new(0.0, 0.0, 0.5, 0.5), left.id()).unwrap();
        root.add_entry(right.bounding_rect(), right.id()).unwrap();
        store.save_node(&mut root).unwrap();
        store.set_root(root.id()).unwrap();

        let report = check_integrity(&mut store).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_detects_unbalanced_leaves() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let a = leaf(&mut store, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = leaf(&mut store, &[(5.0, 0.0), (6.0, 0.0)]);
        let c = leaf(&mut store, &[(20.0, 0.0), (21.0, 0.0)]);

        let mut inner = Node::new_internal(4, 2);
        inner.add_entry(a.bounding_rect(), a.id()).unwrap();
        inner.add_entry(b.bounding_rect(), b.id()).unwrap();
        store.save_node(&mut inner).unwrap();

        let mut root = Node::new_internal(4, 2);
        root.add_entry(inner.bounding_rect(), inner.id()).unwrap();
        root.add_entry(c.bounding_rect(), c.id()).unwrap();
        store.save_node(&mut root).unwrap();
        store.set_root(root.id()).unwrap();

        let report = check_integrity(&mut store).unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("depth")));
    }

    #[test]
    fn test_detects_unreachable_nodes() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let root = leaf(&mut store, &[(0.0, 0.0)]);
        leaf(&mut store, &[(5.0, 0.0)]);
        store.set_root(root.id()).unwrap();

        let report = check_integrity(&mut store).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.nodes_checked, 1);
    }
}
