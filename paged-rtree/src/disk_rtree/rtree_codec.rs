//! Node byte image encoding.
//!
//! A node is stored as one contiguous image, split across a page chain by the
//! storage layer:
//!
//! ```text
//! Field             Size
//! ----------------  -----------
//! is_leaf           1  (bool)
//! count             4  (i32)
//! bounding rect     32 (4 x f64)
//! rects[count]      32 each
//! pointers[count]   4 each (i32)
//! ```
//!
//! Rectangles and pointers are stored as two parallel arrays rather than
//! interleaved. Everything is little-endian, fixed-width (bincode legacy).

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::rectangle::Rectangle;

use super::rtree_constants::{POINTER_SIZE, RECT_SIZE};
use super::rtree_node::Node;
use super::rtree_types::{Entry, NodeKind, PageId, SpatialError, SpatialResult};

const KIND_SIZE: usize = 1;
const COUNT_SIZE: usize = std::mem::size_of::<i32>();

/// Size of the image of a node holding `count` entries.
pub fn encoded_len(count: usize) -> usize {
    KIND_SIZE + COUNT_SIZE + RECT_SIZE + count * (RECT_SIZE + POINTER_SIZE)
}

fn encode_field<T: Serialize, W: Write>(value: &T, dst: &mut W) -> SpatialResult<()> {
    bincode::serde::encode_into_std_write(value, dst, bincode::config::legacy())?;
    Ok(())
}

fn decode_field<T: DeserializeOwned, R: Read>(src: &mut R) -> SpatialResult<T> {
    Ok(bincode::serde::decode_from_std_read(src, bincode::config::legacy())?)
}

/// Encodes a node into its byte image.
pub fn encode_node(node: &Node) -> SpatialResult<Vec<u8>> {
    let count = i32::try_from(node.len()).map_err(|_| {
        SpatialError::InvariantViolation(format!("node holds {} entries", node.len()))
    })?;

    let mut image = Vec::with_capacity(encoded_len(node.len()));
    encode_field(&node.is_leaf(), &mut image)?;
    encode_field(&count, &mut image)?;
    encode_field(&node.bounding_rect(), &mut image)?;
    for entry in node.entries() {
        encode_field(&entry.rect, &mut image)?;
    }
    for entry in node.entries() {
        encode_field(&entry.pointer, &mut image)?;
    }
    Ok(image)
}

/// Decodes a node image read from `page_id`.
///
/// The count must not exceed `max_entries` (persisted nodes are never
/// overflowing) and the image must be exactly as long as the count implies.
pub fn decode_node(
    image: &[u8],
    page_id: PageId,
    max_entries: usize,
    min_entries: usize,
) -> SpatialResult<Node> {
    if image.len() < encoded_len(0) {
        return Err(SpatialError::Corrupted(format!(
            "node image at page {} is {} bytes, shorter than the fixed prefix",
            page_id,
            image.len()
        )));
    }

    let mut src = image;
    let is_leaf: bool = decode_field(&mut src)?;
    let count: i32 = decode_field(&mut src)?;
    if count < 0 || count as usize > max_entries {
        return Err(SpatialError::Corrupted(format!(
            "node at page {} claims {} entries (max {})",
            page_id, count, max_entries
        )));
    }
    let count = count as usize;
    if image.len() != encoded_len(count) {
        return Err(SpatialError::Corrupted(format!(
            "node at page {} is {} bytes, expected {} for {} entries",
            page_id,
            image.len(),
            encoded_len(count),
            count
        )));
    }

    let bounding_rect: Rectangle = decode_field(&mut src)?;
    let mut rects = Vec::with_capacity(count);
    for _ in 0..count {
        rects.push(decode_field::<Rectangle, _>(&mut src)?);
    }
    let mut entries = Vec::with_capacity(count + 1);
    for rect in rects {
        let pointer: i32 = decode_field(&mut src)?;
        entries.push(Entry::new(rect, pointer));
    }

    let kind = if is_leaf {
        NodeKind::Leaf
    } else {
        NodeKind::Internal
    };
    Ok(Node::from_parts(
        kind,
        page_id,
        max_entries,
        min_entries,
        bounding_rect,
        entries,
    ))
}
