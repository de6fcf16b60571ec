use anyhow::{Error, Result};

use crate::common::{PageNo, Rid, DATA_PAGE_HEADER_WORDS, PAGE_WORDS};
use crate::storage::file_manager::{FileManager, PageFile};
use crate::storage::page::PageBuffer;
use crate::tuple::Tuple;

fn tuples_per_page(arity: usize) -> usize {
    (PAGE_WORDS - DATA_PAGE_HEADER_WORDS) / arity
}

/// Sequential reader over one paged relation file. Pages are loaded on
/// demand into a single buffer; the reader also supports absolute
/// repositioning to a rid, which index scans use to resolve entries.
pub struct TupleReader {
    file: PageFile,
    arity: usize,
    page: PageBuffer,
    page_no: Option<PageNo>,
    tuples_in_page: usize,
    slot: usize,
}

impl TupleReader {
    pub fn open(file_manager: &FileManager, relation: &str, arity: usize) -> Result<Self> {
        if arity == 0 || tuples_per_page(arity) == 0 {
            return Err(Error::msg(format!(
                "Cannot open {}: {} columns do not fit a page",
                relation, arity
            )));
        }
        let file = file_manager.open_read(relation)?;
        Ok(Self {
            file,
            arity,
            page: PageBuffer::new(),
            page_no: None,
            tuples_in_page: 0,
            slot: 0,
        })
    }

    fn load_page(&mut self, page_no: PageNo) -> Result<()> {
        self.file.read_page(page_no, &mut self.page)?;
        let arity = self.page.read_i32();
        if arity as usize != self.arity {
            return Err(Error::msg(format!(
                "Page {} declares {} attributes, expected {}",
                page_no, arity, self.arity
            )));
        }
        self.tuples_in_page = self.page.read_i32() as usize;
        self.page_no = Some(page_no);
        self.slot = 0;
        Ok(())
    }

    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        Ok(self.next_tuple_with_rid()?.map(|(tuple, _)| tuple))
    }

    /// Like `next_tuple`, but also reports where the tuple lives. Used
    /// while scanning a relation for index construction.
    pub fn next_tuple_with_rid(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            match self.page_no {
                None => {
                    if self.file.page_count() == 0 {
                        return Ok(None);
                    }
                    self.load_page(0)?;
                }
                Some(page_no) => {
                    if self.slot < self.tuples_in_page {
                        let rid = (page_no, self.slot as u32);
                        let tuple = self.read_slot(self.slot);
                        self.slot += 1;
                        return Ok(Some((tuple, rid)));
                    }
                    if page_no + 1 >= self.file.page_count() {
                        return Ok(None);
                    }
                    self.load_page(page_no + 1)?;
                }
            }
        }
    }

    fn read_slot(&mut self, slot: usize) -> Tuple {
        self.page
            .seek_word(DATA_PAGE_HEADER_WORDS + slot * self.arity);
        let values = (0..self.arity).map(|_| self.page.read_i32()).collect();
        Tuple::new(values)
    }

    /// Rewinds to the first tuple of the relation.
    pub fn rewind(&mut self) {
        self.page_no = None;
        self.tuples_in_page = 0;
        self.slot = 0;
    }

    /// Absolute positional reset: the next `next_tuple` call returns the
    /// tuple stored at `rid`.
    pub fn seek(&mut self, rid: Rid) -> Result<()> {
        let (page_no, slot) = rid;
        if self.page_no != Some(page_no) {
            self.load_page(page_no)?;
        }
        if slot as usize >= self.tuples_in_page {
            return Err(Error::msg(format!(
                "Slot {} is out of range for page {}, which holds {} tuples",
                slot, page_no, self.tuples_in_page
            )));
        }
        self.slot = slot as usize;
        Ok(())
    }
}

/// Appends tuples to a paged relation file, flushing a page whenever it
/// fills up. The file is created empty (or truncated) on construction;
/// `close` flushes a trailing partial page.
pub struct TupleWriter<'a> {
    file_manager: &'a FileManager,
    relation: String,
    arity: usize,
    capacity: usize,
    page: PageBuffer,
    tuples_in_page: usize,
}

impl<'a> TupleWriter<'a> {
    pub fn create(file_manager: &'a FileManager, relation: &str, arity: usize) -> Result<Self> {
        let capacity = if arity == 0 { 0 } else { tuples_per_page(arity) };
        if capacity == 0 {
            return Err(Error::msg(format!(
                "Cannot create {}: {} columns do not fit a page",
                relation, arity
            )));
        }
        file_manager.create_or_truncate(relation)?;
        Ok(Self {
            file_manager,
            relation: relation.to_owned(),
            arity,
            capacity,
            page: PageBuffer::new(),
            tuples_in_page: 0,
        })
    }

    pub fn write_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        if tuple.arity() != self.arity {
            return Err(Error::msg(format!(
                "Attempted to write a tuple with {} values into {}, which has {} columns",
                tuple.arity(),
                self.relation,
                self.arity
            )));
        }
        self.page
            .seek_word(DATA_PAGE_HEADER_WORDS + self.tuples_in_page * self.arity);
        for value in tuple.values() {
            self.page.write_i32(*value);
        }
        self.tuples_in_page += 1;
        if self.tuples_in_page == self.capacity {
            self.flush_page()?;
        }
        Ok(())
    }

    fn flush_page(&mut self) -> Result<()> {
        self.page.rewind();
        self.page.write_i32(self.arity as i32);
        self.page.write_i32(self.tuples_in_page as i32);
        self.file_manager.append_page(&self.relation, &self.page)?;
        self.page.zero();
        self.tuples_in_page = 0;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        if self.tuples_in_page > 0 {
            self.flush_page()?;
        }
        Ok(())
    }
}
