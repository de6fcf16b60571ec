use anyhow::{Error, Result};

use super::node::{INDEX_FLAG, LEAF_FLAG};
use crate::common::{PageNo, Rid, SlotNo};
use crate::storage::file_manager::{FileManager, PageFile};
use crate::storage::page::PageBuffer;

/// Walks a serialized B+-tree over a key range, yielding the rids of the
/// qualifying entries in key order. Opening (and resetting) reads the
/// header page and descends to the leaf holding the low key; the scan
/// then moves through the contiguous leaf pages until a key exceeds the
/// high bound or the last leaf is exhausted.
pub struct IndexCursor {
    file: PageFile,
    low: Option<i32>,
    high: Option<i32>,
    page: PageBuffer,
    leaf_count: u32,
    current_leaf: PageNo,
    entries_left: usize,
    rids_left: usize,
    exhausted: bool,
}

impl IndexCursor {
    pub fn open(
        file_manager: &FileManager,
        index_file: &str,
        low: Option<i32>,
        high: Option<i32>,
    ) -> Result<Self> {
        let file = file_manager.open_read(index_file)?;
        let mut cursor = Self {
            file,
            low,
            high,
            page: PageBuffer::new(),
            leaf_count: 0,
            current_leaf: 0,
            entries_left: 0,
            rids_left: 0,
            exhausted: true,
        };
        cursor.reset()?;
        Ok(cursor)
    }

    /// Reloads the header and re-descends to the low key.
    pub fn reset(&mut self) -> Result<()> {
        self.file.read_page(0, &mut self.page)?;
        let root = self.page.read_i32() as PageNo;
        self.leaf_count = self.page.read_i32() as u32;
        // The third header word, the tree order, is metadata the scan
        // never needs: node type is read from each page's flag word.

        self.entries_left = 0;
        self.rids_left = 0;
        self.exhausted = self.leaf_count == 0;
        if self.exhausted {
            return Ok(());
        }

        let leaf = match self.low {
            // Unbounded scans start at the leftmost leaf, which is page 1
            // by construction.
            None => 1,
            Some(low) => self.descend(root, low)?,
        };
        self.load_leaf(leaf)
    }

    fn descend(&mut self, mut page_no: PageNo, low: i32) -> Result<PageNo> {
        loop {
            self.file.read_page(page_no, &mut self.page)?;
            match self.page.read_i32() {
                LEAF_FLAG => return Ok(page_no),
                INDEX_FLAG => {
                    let num_keys = self.page.read_i32() as usize;
                    let keys = (0..num_keys)
                        .map(|_| self.page.read_i32())
                        .collect::<Vec<i32>>();
                    // Separator i is the first key under child i + 1, so
                    // the child to follow is the number of separators <= low.
                    let child = keys.partition_point(|key| *key <= low);
                    self.page.seek_word(2 + num_keys + child);
                    page_no = self.page.read_i32() as PageNo;
                }
                flag => {
                    return Err(Error::msg(format!(
                        "Page {} of index file has invalid node flag {}",
                        page_no, flag
                    )))
                }
            }
        }
    }

    fn load_leaf(&mut self, page_no: PageNo) -> Result<()> {
        self.file.read_page(page_no, &mut self.page)?;
        let flag = self.page.read_i32();
        if flag != LEAF_FLAG {
            return Err(Error::msg(format!(
                "Expected a leaf at page {} of index file, found node flag {}",
                page_no, flag
            )));
        }
        self.entries_left = self.page.read_i32() as usize;
        self.rids_left = 0;
        self.current_leaf = page_no;
        Ok(())
    }

    /// The next rid of the range, across entries and leaves.
    pub fn next_rid(&mut self) -> Result<Option<Rid>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            if self.rids_left > 0 {
                let page_no = self.page.read_i32() as PageNo;
                let slot = self.page.read_i32() as SlotNo;
                self.rids_left -= 1;
                return Ok(Some((page_no, slot)));
            }
            if self.entries_left == 0 {
                // Leaves sit on pages 1..=leaf_count in key order.
                if self.current_leaf >= self.leaf_count {
                    self.exhausted = true;
                    return Ok(None);
                }
                self.load_leaf(self.current_leaf + 1)?;
                continue;
            }
            let key = self.page.read_i32();
            let rid_count = self.page.read_i32() as usize;
            self.entries_left -= 1;
            if let Some(low) = self.low {
                if key < low {
                    self.page.skip_words(2 * rid_count);
                    continue;
                }
            }
            if let Some(high) = self.high {
                if key > high {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
            self.rids_left = rid_count;
        }
    }
}
