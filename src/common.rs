pub type PageNo = u32;
pub type SlotNo = u32;

/// Location of a tuple inside a paged relation file: (page, slot).
/// A rid is only valid against the file layout it was derived from;
/// rewriting a relation (e.g. when clustering it) invalidates older rids.
pub type Rid = (PageNo, SlotNo);

pub const PAGE_SIZE: usize = 4096;
pub const WORD_SIZE: usize = std::mem::size_of::<i32>();
pub const PAGE_WORDS: usize = PAGE_SIZE / WORD_SIZE;

/// A data page starts with two header words: attribute count and tuple count.
pub const DATA_PAGE_HEADER_WORDS: usize = 2;

/// The schema file inside a data directory; every other file in the
/// directory is a paged relation or index file.
pub const SCHEMA_FILE_NAME: &str = "schema.txt";
