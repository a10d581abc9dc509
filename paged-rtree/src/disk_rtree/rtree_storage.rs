//! Disk storage layer for the paged R-Tree.
//!
//! The backing file is a sequence of fixed-size pages. Page 0 holds the
//! [`TreeHeader`]; every other page starts with a link header (next page id,
//! payload bytes used) followed by payload. A node image longer than one
//! page's payload is spread over a chain of linked pages ending in `NO_PAGE`.
//!
//! Pages are read and written one at a time with a seek followed by a single
//! read or write. There is no page cache: every call goes to the file and is
//! counted in [`PagedStorage::disk_io`].

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::rtree_constants::{FIRST_DATA_PAGE, HEADER_PAGE, HEADER_SIZE, NO_PAGE, PAGE_LINK_SIZE};
use super::rtree_types::{PageId, SpatialError, SpatialResult, TreeHeader};

/// Link header at the start of every chain page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PageLink {
    next_page: PageId,
    bytes_used: i32,
}

/// One page of a chain as read from disk.
struct PageFrame {
    id: PageId,
    link: PageLink,
    payload: Vec<u8>,
}

/// Reads and writes pages and page chains of one index file.
pub struct PagedStorage {
    file: File,
    path: PathBuf,
    page_size: usize,
    disk_io: u64,
}

impl PagedStorage {
    /// Creates (or truncates) the backing file.
    pub fn create(path: &Path, page_size: usize) -> SpatialResult<Self> {
        if page_size < HEADER_SIZE {
            return Err(SpatialError::InvalidConfig(format!(
                "page size {} cannot hold the {}-byte header",
                page_size, HEADER_SIZE
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
            disk_io: 0,
        })
    }

    /// Opens an existing backing file and reads its header.
    ///
    /// The page size is taken from the header, so it is read before anything else.
    pub fn open(path: &Path) -> SpatialResult<(Self, TreeHeader)> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut storage = Self {
            file,
            path: path.to_path_buf(),
            page_size: HEADER_SIZE,
            disk_io: 0,
        };

        let header = storage.read_header()?;
        header.validate()?;

        // page 0 is always written as a full page
        let file_len = storage.file.metadata()?.len();
        if header.page_size as u64 > file_len {
            log::error!(
                "header page size {} exceeds file length {}",
                header.page_size,
                file_len
            );
            return Err(SpatialError::Corrupted(format!(
                "page size {} exceeds file length {}",
                header.page_size, file_len
            )));
        }

        storage.page_size = header.page_size as usize;
        Ok((storage, header))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Payload bytes available in one chain page.
    pub fn page_payload(&self) -> usize {
        self.page_size - PAGE_LINK_SIZE
    }

    /// Page reads and writes since creation or the last reset.
    pub fn disk_io(&self) -> u64 {
        self.disk_io
    }

    pub fn reset_disk_io(&mut self) {
        self.disk_io = 0;
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id as u64 * self.page_size as u64
    }

    fn read_header(&mut self) -> SpatialResult<TreeHeader> {
        let mut buffer = [0u8; HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut buffer).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                SpatialError::Corrupted("file too short to hold a header".into())
            }
            _ => SpatialError::Io(e),
        })?;
        self.disk_io += 1;

        let (header, _) = bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())?;
        Ok(header)
    }

    /// Writes the header to page 0, zero-padded to a full page.
    pub fn write_header(&mut self, header: &TreeHeader) -> SpatialResult<()> {
        let mut padded = bincode::serde::encode_to_vec(header, bincode::config::legacy())?;
        padded.resize(self.page_size, 0);

        self.file.seek(SeekFrom::Start(self.page_offset(HEADER_PAGE)))?;
        self.file.write_all(&padded)?;
        self.file.flush()?;
        self.disk_io += 1;
        Ok(())
    }

    /// Hands out the next unused page id. Pages are never reused.
    pub fn allocate_page(header: &mut TreeHeader) -> SpatialResult<PageId> {
        let page_id = header.next_page;
        header.next_page = page_id.checked_add(1).ok_or_else(|| {
            SpatialError::InvalidOperation("page id space exhausted".into())
        })?;
        Ok(page_id)
    }

    /// Number of pages needed for an image of `len` bytes.
    pub fn pages_for(&self, len: usize) -> usize {
        len.div_ceil(self.page_payload()).max(1)
    }

    /// Writes `image` to the chain starting at `head`, allocating a new chain
    /// when `head` is `NO_PAGE`, and returns the head page id.
    ///
    /// An existing chain is reused page for page and only extended when the
    /// image outgrows it. If the image got smaller the chain is cut after the
    /// last page still needed; the pages beyond it are left unreferenced.
    pub fn write_chain(
        &mut self,
        header: &mut TreeHeader,
        head: PageId,
        image: &[u8],
    ) -> SpatialResult<PageId> {
        let needed = self.pages_for(image.len());

        let mut pages = if head == NO_PAGE {
            Vec::with_capacity(needed)
        } else {
            self.chain_pages(head, header.next_page)?
        };
        pages.truncate(needed);
        while pages.len() < needed {
            pages.push(Self::allocate_page(header)?);
        }

        let payload = self.page_payload();
        for (i, chunk) in image.chunks(payload).enumerate() {
            let next_page = pages.get(i + 1).copied().unwrap_or(NO_PAGE);
            self.write_page(pages[i], next_page, chunk)?;
        }
        if image.is_empty() {
            self.write_page(pages[0], NO_PAGE, &[])?;
        }

        log::trace!("wrote {} bytes to chain {:?}", image.len(), pages);
        Ok(pages[0])
    }

    /// Reads the chain starting at `head` and returns the concatenated payload.
    ///
    /// `next_page` bounds valid page ids; links outside `[1, next_page)` and
    /// links back into the chain are reported as corruption.
    pub fn read_chain(&mut self, head: PageId, next_page: PageId) -> SpatialResult<Vec<u8>> {
        let mut frames = Vec::new();
        let mut visited = HashSet::new();
        let mut current = head;

        while current != NO_PAGE {
            self.check_link(current, next_page, &mut visited)?;
            let frame = self.read_page(current)?;
            current = frame.link.next_page;
            frames.push(frame);
        }

        let total = frames.iter().map(|f| f.payload.len()).sum();
        let mut image = Vec::with_capacity(total);
        for frame in &frames {
            image.extend_from_slice(&frame.payload);
        }

        log::trace!(
            "read {} bytes from chain {:?}",
            image.len(),
            frames.iter().map(|f| f.id).collect::<Vec<_>>()
        );
        Ok(image)
    }

    /// Page ids of the chain starting at `head`, in link order.
    ///
    /// Only the link headers are read; each still counts as one page read.
    pub fn chain_pages(&mut self, head: PageId, next_page: PageId) -> SpatialResult<Vec<PageId>> {
        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut current = head;

        while current != NO_PAGE {
            self.check_link(current, next_page, &mut visited)?;
            let link = self.read_link(current)?;
            pages.push(current);
            current = link.next_page;
        }
        Ok(pages)
    }

    fn check_link(
        &self,
        page_id: PageId,
        next_page: PageId,
        visited: &mut HashSet<PageId>,
    ) -> SpatialResult<()> {
        if !(FIRST_DATA_PAGE..next_page).contains(&page_id) {
            log::error!("chain link to unallocated page {}", page_id);
            return Err(SpatialError::Corrupted(format!(
                "chain references page {} outside allocated range [{}, {})",
                page_id, FIRST_DATA_PAGE, next_page
            )));
        }
        if !visited.insert(page_id) {
            log::error!("chain loops back to page {}", page_id);
            return Err(SpatialError::Corrupted(format!(
                "chain loops back to page {}",
                page_id
            )));
        }
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId) -> SpatialResult<PageFrame> {
        let mut buffer = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.read_exact(&mut buffer)?;
        self.disk_io += 1;

        let link = self.decode_link(page_id, &buffer)?;
        let payload = buffer[PAGE_LINK_SIZE..PAGE_LINK_SIZE + link.bytes_used as usize].to_vec();

        Ok(PageFrame {
            id: page_id,
            link,
            payload,
        })
    }

    fn read_link(&mut self, page_id: PageId) -> SpatialResult<PageLink> {
        let mut buffer = [0u8; PAGE_LINK_SIZE];
        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.read_exact(&mut buffer)?;
        self.disk_io += 1;

        self.decode_link(page_id, &buffer)
    }

    fn decode_link(&self, page_id: PageId, buffer: &[u8]) -> SpatialResult<PageLink> {
        let (link, _): (PageLink, usize) =
            bincode::serde::decode_from_slice(buffer, bincode::config::legacy())?;
        if link.bytes_used < 0 || link.bytes_used as usize > self.page_payload() {
            log::error!("page {} claims {} payload bytes", page_id, link.bytes_used);
            return Err(SpatialError::Corrupted(format!(
                "page {} claims {} payload bytes (capacity {})",
                page_id,
                link.bytes_used,
                self.page_payload()
            )));
        }
        Ok(link)
    }

    fn write_page(&mut self, page_id: PageId, next_page: PageId, payload: &[u8]) -> SpatialResult<()> {
        if page_id == HEADER_PAGE {
            return Err(SpatialError::InvalidOperation(
                "page 0 is reserved for the header".into(),
            ));
        }

        let link = PageLink {
            next_page,
            bytes_used: payload.len() as i32,
        };
        let mut page = bincode::serde::encode_to_vec(link, bincode::config::legacy())?;
        page.extend_from_slice(payload);
        page.resize(self.page_size, 0);

        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.write_all(&page)?;
        self.file.flush()?;
        self.disk_io += 1;
        Ok(())
    }

    /// Forces written pages to stable storage.
    pub fn sync(&mut self) -> SpatialResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
