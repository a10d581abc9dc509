//! In-memory R-Tree nodes.
//!
//! A [`Node`] is either a leaf (entries point at external records) or an
//! internal node (entries point at child pages). Both kinds share the entry
//! buffer, the cached bounding rectangle and the split algorithm; insert and
//! query dispatch on [`NodeKind`].
//!
//! Nodes never hold references to other nodes. Descending into a child goes
//! through a [`NodeStore`], which materializes a freshly owned copy from disk;
//! every change is written back through the same store before the call that
//! made it returns.

use crate::rectangle::Rectangle;

use super::rtree_constants::NO_PAGE;
use super::rtree_types::{Entry, NodeKind, PageId, SpatialError, SpatialResult};

/// Persistence seam used by nodes while inserting and querying.
pub trait NodeStore {
    /// Writes `node`, assigning it a page on first write.
    fn save_node(&mut self, node: &mut Node) -> SpatialResult<()>;

    /// Reads the node stored at `page_id`.
    fn load_node(&mut self, page_id: PageId) -> SpatialResult<Node>;
}

/// A node split off an overflowing node, already persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub page_id: PageId,
    pub bounding_rect: Rectangle,
}

/// One R-Tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: PageId,
    kind: NodeKind,
    max_entries: usize,
    min_entries: usize,
    /// At most `max_entries + 1` entries; the extra slot holds the overflow
    /// entry until the node is split.
    entries: Vec<Entry>,
    bounding_rect: Rectangle,
}

impl Node {
    /// Creates an empty node without a page.
    pub fn new(kind: NodeKind, max_entries: usize, min_entries: usize) -> Self {
        Self {
            id: NO_PAGE,
            kind,
            max_entries,
            min_entries,
            entries: Vec::with_capacity(max_entries + 1),
            bounding_rect: Rectangle::empty(),
        }
    }

    pub fn new_leaf(max_entries: usize, min_entries: usize) -> Self {
        Self::new(NodeKind::Leaf, max_entries, min_entries)
    }

    pub fn new_internal(max_entries: usize, min_entries: usize) -> Self {
        Self::new(NodeKind::Internal, max_entries, min_entries)
    }

    /// Reassembles a node read from disk. The bounding rectangle is taken as stored.
    pub(crate) fn from_parts(
        kind: NodeKind,
        id: PageId,
        max_entries: usize,
        min_entries: usize,
        bounding_rect: Rectangle,
        mut entries: Vec<Entry>,
    ) -> Self {
        entries.reserve((max_entries + 1).saturating_sub(entries.len()));
        Self {
            id,
            kind,
            max_entries,
            min_entries,
            entries,
            bounding_rect,
        }
    }

    /// Page id, `NO_PAGE` until the node is first written.
    pub fn id(&self) -> PageId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: PageId) {
        self.id = id;
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    /// Union of all entry rectangles, `Rectangle::empty()` for an empty node.
    pub fn bounding_rect(&self) -> Rectangle {
        self.bounding_rect
    }

    /// True in the transient state between an insert and the split that resolves it.
    pub fn is_overflowing(&self) -> bool {
        self.entries.len() > self.max_entries
    }

    /// Appends an entry and grows the bounding rectangle.
    ///
    /// Capacity is left to the caller, who checks [`is_overflowing`](Self::is_overflowing)
    /// afterwards; only a node that already holds the overflow entry is refused.
    pub fn add_entry(&mut self, rect: Rectangle, pointer: i32) -> SpatialResult<()> {
        if self.entries.len() > self.max_entries {
            return Err(invariant(format!(
                "node {} already holds {} entries (max {})",
                self.id,
                self.entries.len(),
                self.max_entries
            )));
        }
        self.entries.push(Entry::new(rect, pointer));
        self.bounding_rect = self.bounding_rect.union(&rect);
        Ok(())
    }

    fn recompute_bounding_rect(&mut self) {
        self.bounding_rect = Rectangle::bounding(self.entries.iter().map(|e| &e.rect));
    }

    /// Inserts an entry into the subtree rooted at this node.
    ///
    /// Leaves absorb the entry directly. Internal nodes descend into the
    /// child needing the least enlargement and adopt any node split off
    /// below. Returns the persisted sibling if this node overflowed and was
    /// split, `None` once this node has been persisted as is.
    pub fn insert<S: NodeStore + ?Sized>(
        &mut self,
        rect: Rectangle,
        pointer: i32,
        store: &mut S,
    ) -> SpatialResult<Option<Split>> {
        match self.kind {
            NodeKind::Leaf => self.add_entry(rect, pointer)?,
            NodeKind::Internal => {
                let idx = self.choose_subtree(&rect)?;
                let mut child = store.load_node(self.entries[idx].pointer)?;
                let split = child.insert(rect, pointer, store)?;

                self.entries[idx].rect = child.bounding_rect();
                self.recompute_bounding_rect();
                if let Some(split) = split {
                    self.add_entry(split.bounding_rect, split.page_id)?;
                }
            }
        }

        if self.is_overflowing() {
            return self.split(store).map(Some);
        }

        store.save_node(self)?;
        Ok(None)
    }

    /// Index of the child whose rectangle needs the least area enlargement
    /// to cover `rect`. Ties go to the smaller area, then to the earlier entry.
    fn choose_subtree(&self, rect: &Rectangle) -> SpatialResult<usize> {
        if self.entries.is_empty() {
            return Err(invariant(format!(
                "internal node {} has no children to descend into",
                self.id
            )));
        }

        let mut best_idx = 0;
        let mut best_enlargement = f64::INFINITY;
        let mut best_area = f64::INFINITY;

        for (i, entry) in self.entries.iter().enumerate() {
            let enlargement = entry.rect.enlargement(rect);
            let area = entry.rect.area();

            if enlargement < best_enlargement
                || (enlargement == best_enlargement && area < best_area)
            {
                best_enlargement = enlargement;
                best_area = area;
                best_idx = i;
            }
        }
        Ok(best_idx)
    }

    /// Splits an overflowing node.
    ///
    /// The `max_entries + 1` entries are redistributed between this node and
    /// a new sibling of the same kind so that both hold at least
    /// `min_entries`. The sibling is written to fresh pages, this node to its
    /// own page chain.
    pub fn split<S: NodeStore + ?Sized>(&mut self, store: &mut S) -> SpatialResult<Split> {
        if !self.is_overflowing() {
            return Err(invariant(format!(
                "split of node {} with {} entries (max {})",
                self.id,
                self.entries.len(),
                self.max_entries
            )));
        }

        let entries = std::mem::take(&mut self.entries);
        let (keep, moved) = quadratic_partition(entries, self.min_entries);
        log::trace!(
            "splitting node {} into {} + {} entries",
            self.id,
            keep.len(),
            moved.len()
        );

        self.entries = keep;
        self.entries.reserve((self.max_entries + 1).saturating_sub(self.entries.len()));
        self.recompute_bounding_rect();

        let mut sibling = Node::new(self.kind, self.max_entries, self.min_entries);
        sibling.entries.extend(moved);
        sibling.recompute_bounding_rect();

        store.save_node(&mut sibling)?;
        store.save_node(self)?;

        Ok(Split {
            page_id: sibling.id,
            bounding_rect: sibling.bounding_rect,
        })
    }

    /// Appends the pointers of all leaf entries intersecting `rect`, depth
    /// first in entry order.
    pub fn query<S: NodeStore + ?Sized>(
        &self,
        rect: &Rectangle,
        results: &mut Vec<i32>,
        store: &mut S,
    ) -> SpatialResult<()> {
        self.search(rect, &|entry: &Rectangle| entry.intersects(rect), results, store)
    }

    /// Appends the pointers of all leaf entries lying entirely inside `rect`.
    pub fn query_contained<S: NodeStore + ?Sized>(
        &self,
        rect: &Rectangle,
        results: &mut Vec<i32>,
        store: &mut S,
    ) -> SpatialResult<()> {
        self.search(rect, &|entry: &Rectangle| rect.contains(entry), results, store)
    }

    fn search<S, F>(
        &self,
        rect: &Rectangle,
        accept: &F,
        results: &mut Vec<i32>,
        store: &mut S,
    ) -> SpatialResult<()>
    where
        S: NodeStore + ?Sized,
        F: Fn(&Rectangle) -> bool,
    {
        if !self.bounding_rect.intersects(rect) {
            return Ok(());
        }

        match self.kind {
            NodeKind::Leaf => {
                for entry in &self.entries {
                    if accept(&entry.rect) {
                        results.push(entry.pointer);
                    }
                }
            }
            NodeKind::Internal => {
                for entry in &self.entries {
                    // A contained entry may sit in a child that only partially
                    // intersects the query, so descend on intersection.
                    if entry.rect.intersects(rect) {
                        let child = store.load_node(entry.pointer)?;
                        child.search(rect, accept, results, store)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn invariant(message: String) -> SpatialError {
    log::error!("{}", message);
    SpatialError::InvariantViolation(message)
}

/// Guttman's quadratic split.
///
/// Seeds are the pair wasting the most area when grouped together. Remaining
/// entries are assigned one at a time, most decisive first, to the group whose
/// rectangle grows least. Once a group needs every remaining entry to reach
/// `min_entries`, it receives all of them.
fn quadratic_partition(entries: Vec<Entry>, min_entries: usize) -> (Vec<Entry>, Vec<Entry>) {
    let (seed_a, seed_b) = pick_seeds(&entries);

    let mut group_a = Vec::with_capacity(entries.len());
    let mut group_b = Vec::with_capacity(entries.len());
    let mut remaining = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        if i == seed_a {
            group_a.push(entry);
        } else if i == seed_b {
            group_b.push(entry);
        } else {
            remaining.push(entry);
        }
    }

    let mut rect_a = group_a[0].rect;
    let mut rect_b = group_b[0].rect;

    while !remaining.is_empty() {
        if group_a.len() + remaining.len() <= min_entries {
            group_a.append(&mut remaining);
            break;
        }
        if group_b.len() + remaining.len() <= min_entries {
            group_b.append(&mut remaining);
            break;
        }

        let (idx, grow_a, grow_b) = pick_next(&remaining, &rect_a, &rect_b);
        let entry = remaining.remove(idx);

        let to_a = if grow_a != grow_b {
            grow_a < grow_b
        } else if rect_a.area() != rect_b.area() {
            rect_a.area() < rect_b.area()
        } else {
            group_a.len() <= group_b.len()
        };

        if to_a {
            rect_a = rect_a.union(&entry.rect);
            group_a.push(entry);
        } else {
            rect_b = rect_b.union(&entry.rect);
            group_b.push(entry);
        }
    }

    (group_a, group_b)
}

fn pick_seeds(entries: &[Entry]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut worst = f64::NEG_INFINITY;

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let a = &entries[i].rect;
            let b = &entries[j].rect;
            let waste = a.union(b).area() - a.area() - b.area();
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }
    seeds
}

/// Remaining entry with the strongest preference for one group, with the
/// enlargement each group would need to take it.
fn pick_next(remaining: &[Entry], rect_a: &Rectangle, rect_b: &Rectangle) -> (usize, f64, f64) {
    let mut best = (0, 0.0, 0.0);
    let mut best_diff = f64::NEG_INFINITY;

    for (i, entry) in remaining.iter().enumerate() {
        let grow_a = rect_a.enlargement(&entry.rect);
        let grow_b = rect_b.enlargement(&entry.rect);
        let diff = (grow_a - grow_b).abs();
        if diff > best_diff {
            best_diff = diff;
            best = (i, grow_a, grow_b);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Node store keeping encoded pages in memory.
    #[derive(Default)]
    struct MemoryStore {
        nodes: HashMap<PageId, Node>,
        next_page: PageId,
        saves: usize,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                next_page: 1,
                ..Default::default()
            }
        }
    }

    impl NodeStore for MemoryStore {
        fn save_node(&mut self, node: &mut Node) -> SpatialResult<()> {
            if node.id() == NO_PAGE {
                node.set_id(self.next_page);
                self.next_page += 1;
            }
            self.saves += 1;
            self.nodes.insert(node.id(), node.clone());
            Ok(())
        }

        fn load_node(&mut self, page_id: PageId) -> SpatialResult<Node> {
            self.nodes
                .get(&page_id)
                .cloned()
                .ok_or_else(|| SpatialError::Corrupted(format!("no page {}", page_id)))
        }
    }

    fn rect(i: i32) -> Rectangle {
        let x = i as f64 * 3.0;
        Rectangle::new(x, 0.0, x + 1.0, 1.0)
    }

    fn pointers(node: &Node) -> Vec<i32> {
        let mut p: Vec<i32> = node.entries().iter().map(|e| e.pointer).collect();
        p.sort();
        p
    }

    fn assert_bounding_invariant(node: &Node) {
        let expected = Rectangle::bounding(node.entries().iter().map(|e| &e.rect));
        assert_eq!(node.bounding_rect(), expected);
    }

    #[test]
    fn test_new_node_is_empty_and_unassigned() {
        let node = Node::new_leaf(4, 2);
        assert_eq!(node.id(), NO_PAGE);
        assert!(node.is_empty());
        assert!(node.is_leaf());
        assert!(!node.bounding_rect().is_valid());
        assert!(!Node::new_internal(4, 2).is_leaf());
    }

    #[test]
    fn test_add_entry_grows_bounding_rect() {
        let mut node = Node::new_leaf(4, 2);
        node.add_entry(Rectangle::new(0.0, 0.0, 1.0, 1.0), 1).unwrap();
        node.add_entry(Rectangle::new(5.0, -1.0, 6.0, 0.5), 2).unwrap();
        assert_eq!(node.len(), 2);
        assert_eq!(node.bounding_rect(), Rectangle::new(0.0, -1.0, 6.0, 1.0));
    }

    #[test]
    fn test_add_entry_allows_one_overflow_entry_only() {
        let mut node = Node::new_leaf(2, 1);
        for i in 0..3 {
            node.add_entry(rect(i), i).unwrap();
        }
        assert!(node.is_overflowing());
        let result = node.add_entry(rect(3), 3);
        assert!(matches!(result, Err(SpatialError::InvariantViolation(_))));
        assert_eq!(node.len(), 3);
    }

    #[test]
    fn test_split_without_overflow_is_rejected() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(4, 2);
        node.add_entry(rect(0), 0).unwrap();
        let result = node.split(&mut store);
        assert!(matches!(result, Err(SpatialError::InvariantViolation(_))));
        assert_eq!(store.saves, 0);
    }

    #[test]
    fn test_split_partitions_entries() {
        for (max, min) in [(4, 2), (5, 2), (5, 3), (6, 3), (7, 4), (9, 1), (10, 5)] {
            let mut store = MemoryStore::new();
            let mut node = Node::new_leaf(max, min);
            for i in 0..=(max as i32) {
                node.add_entry(rect(i), i).unwrap();
            }

            let split = node.split(&mut store).unwrap();
            let sibling = store.load_node(split.page_id).unwrap();

            for half in [&node, &sibling] {
                assert!(half.len() >= min && half.len() <= max, "max {} min {}", max, min);
                assert_bounding_invariant(half);
                assert!(half.is_leaf());
            }
            assert_eq!(split.bounding_rect, sibling.bounding_rect());

            let mut all = pointers(&node);
            all.extend(pointers(&sibling));
            all.sort();
            assert_eq!(all, (0..=(max as i32)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_split_with_min_at_half_of_overflow_is_even() {
        let layouts: [fn(i32) -> Rectangle; 3] = [
            rect,
            |i| Rectangle::new(0.0, i as f64, 1.0, i as f64 + 1.0),
            // one far outlier pulls the seeds apart
            |i| {
                let x = if i == 5 { 1000.0 } else { i as f64 * 0.1 };
                Rectangle::new(x, 0.0, x + 1.0, 1.0)
            },
        ];
        for layout in layouts {
            let mut store = MemoryStore::new();
            let mut node = Node::new_leaf(5, 3);
            for i in 0..6 {
                node.add_entry(layout(i), i).unwrap();
            }

            let split = node.split(&mut store).unwrap();
            let sibling = store.load_node(split.page_id).unwrap();
            assert_eq!((node.len(), sibling.len()), (3, 3));
            assert_bounding_invariant(&node);
            assert_bounding_invariant(&sibling);
        }
    }

    #[test]
    fn test_split_keeps_internal_kind_and_persists_both() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_internal(4, 2);
        for i in 0..5 {
            node.add_entry(rect(i), 100 + i).unwrap();
        }
        let split = node.split(&mut store).unwrap();

        assert_ne!(node.id(), NO_PAGE);
        assert_ne!(split.page_id, node.id());
        assert_eq!(store.saves, 2);
        assert_eq!(store.load_node(split.page_id).unwrap().kind(), NodeKind::Internal);
        assert_eq!(store.load_node(node.id()).unwrap(), node);
    }

    #[test]
    fn test_split_separates_clusters() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(4, 2);
        node.add_entry(Rectangle::new(0.0, 0.0, 1.0, 1.0), 1).unwrap();
        node.add_entry(Rectangle::new(100.0, 100.0, 101.0, 101.0), 2).unwrap();
        node.add_entry(Rectangle::new(0.5, 0.5, 1.5, 1.5), 3).unwrap();
        node.add_entry(Rectangle::new(100.5, 100.5, 101.5, 101.5), 4).unwrap();
        node.add_entry(Rectangle::new(1.0, 0.0, 2.0, 1.0), 5).unwrap();

        let split = node.split(&mut store).unwrap();
        let sibling = store.load_node(split.page_id).unwrap();

        let mut groups = [pointers(&node), pointers(&sibling)];
        groups.sort();
        assert_eq!(groups, [vec![1, 3, 5], vec![2, 4]]);
    }

    #[test]
    fn test_leaf_insert_persists_without_split() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(4, 2);
        assert_eq!(node.insert(rect(0), 7, &mut store).unwrap(), None);
        assert_eq!(node.id(), 1);
        assert_eq!(store.load_node(1).unwrap().entries()[0].pointer, 7);
    }

    #[test]
    fn test_leaf_insert_splits_on_overflow() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(4, 2);
        for i in 0..4 {
            assert!(node.insert(rect(i), i, &mut store).unwrap().is_none());
        }
        let split = node.insert(rect(4), 4, &mut store).unwrap();
        assert!(split.is_some());
        assert!(!node.is_overflowing());
    }

    #[test]
    fn test_internal_insert_descends_and_adopts_split() {
        let mut store = MemoryStore::new();
        let mut left = Node::new_leaf(4, 2);
        let mut right = Node::new_leaf(4, 2);
        for i in 0..2 {
            left.add_entry(rect(i), i).unwrap();
            right.add_entry(rect(10 + i), 10 + i).unwrap();
        }
        store.save_node(&mut left).unwrap();
        store.save_node(&mut right).unwrap();

        let mut root = Node::new_internal(4, 2);
        root.add_entry(left.bounding_rect(), left.id()).unwrap();
        root.add_entry(right.bounding_rect(), right.id()).unwrap();

        // Lands in the right leaf: no enlargement there.
        root.insert(rect(11), 99, &mut store).unwrap();
        assert_eq!(store.load_node(right.id()).unwrap().len(), 3);

        // Fill the left leaf until it splits and the root adopts the sibling.
        for i in 2..5 {
            assert!(root.insert(rect(i), i, &mut store).unwrap().is_none());
        }
        assert_eq!(root.len(), 3);
        assert_bounding_invariant(&root);
        for entry in root.entries() {
            let child = store.load_node(entry.pointer).unwrap();
            assert_eq!(entry.rect, child.bounding_rect());
            assert!(child.len() >= 2);
        }
    }

    #[test]
    fn test_internal_insert_on_empty_node_is_rejected() {
        let mut store = MemoryStore::new();
        let mut root = Node::new_internal(4, 2);
        let result = root.insert(rect(0), 0, &mut store);
        assert!(matches!(result, Err(SpatialError::InvariantViolation(_))));
    }

    #[test]
    fn test_choose_subtree_prefers_least_enlargement_then_area() {
        let mut node = Node::new_internal(4, 2);
        node.add_entry(Rectangle::new(0.0, 0.0, 10.0, 10.0), 1).unwrap();
        node.add_entry(Rectangle::new(0.0, 0.0, 2.0, 2.0), 2).unwrap();
        node.add_entry(Rectangle::new(20.0, 20.0, 21.0, 21.0), 3).unwrap();

        // Both first entries contain the point; the smaller one wins.
        assert_eq!(node.choose_subtree(&Rectangle::new(1.0, 1.0, 1.0, 1.0)).unwrap(), 1);
        // Only the third needs no growth.
        assert_eq!(node.choose_subtree(&Rectangle::new(20.5, 20.5, 20.5, 20.5)).unwrap(), 2);
    }

    #[test]
    fn test_leaf_query_examines_every_entry() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(8, 2);
        for i in 0..6 {
            node.add_entry(Rectangle::new(0.0, 0.0, 1.0, 1.0), i).unwrap();
        }
        let mut results = Vec::new();
        node.query(&Rectangle::new(0.5, 0.5, 0.6, 0.6), &mut results, &mut store)
            .unwrap();
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_query_contained_filters_partial_overlap() {
        let mut store = MemoryStore::new();
        let mut node = Node::new_leaf(4, 2);
        node.add_entry(Rectangle::new(0.0, 0.0, 1.0, 1.0), 1).unwrap();
        node.add_entry(Rectangle::new(0.5, 0.5, 3.0, 3.0), 2).unwrap();

        let query = Rectangle::new(0.0, 0.0, 2.0, 2.0);
        let mut intersecting = Vec::new();
        node.query(&query, &mut intersecting, &mut store).unwrap();
        let mut contained = Vec::new();
        node.query_contained(&query, &mut contained, &mut store).unwrap();

        assert_eq!(intersecting, vec![1, 2]);
        assert_eq!(contained, vec![1]);
    }
}
