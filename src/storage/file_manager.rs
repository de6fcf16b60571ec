use std::fs::{File, OpenOptions};
use std::os::unix::prelude::FileExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Error, Result};
use dashmap::mapref::one::Ref;
use dashmap::DashMap;

use crate::common::{PageNo, PAGE_SIZE, SCHEMA_FILE_NAME};
use crate::storage::page::PageBuffer;

/// FileManager takes care of reading and writing the pages of relation and
/// index files. It assumes that all of them live inside a single directory,
/// the data directory, where each relation or index is a single file of
/// fixed-size pages, with its name used as the filename.
pub struct FileManager {
    data_directory: PathBuf,
    files: DashMap<String, FileHandle>,
}

impl FileManager {
    /// Creates a new FileManager over a data directory, opening every
    /// paged file found inside it. The schema file is not paged and is
    /// skipped.
    pub fn new(data_directory: impl Into<PathBuf>) -> Result<Self> {
        let data_directory = data_directory.into();
        if !data_directory.is_dir() {
            return Err(Error::msg(format!(
                "Could not create file manager. {} is not a directory",
                data_directory.display()
            )));
        }

        let files = DashMap::new();
        let content = data_directory.read_dir().with_context(|| {
            format!(
                "Could not read files in data directory {}",
                data_directory.display()
            )
        })?;

        for entry in content {
            let entry = entry.with_context(|| {
                format!(
                    "Could not read entry in data directory {}",
                    data_directory.display()
                )
            })?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            if name == SCHEMA_FILE_NAME {
                continue;
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(entry.path())
                .with_context(|| format!("Could not open paged file {}", name))?;
            let size = file
                .metadata()
                .with_context(|| format!("Could not read size of paged file {}", name))?
                .len();
            if size % PAGE_SIZE as u64 != 0 {
                return Err(Error::msg(format!(
                    "Boundary check for file {} failed. {} is not divisable by page size {}",
                    name, size, PAGE_SIZE
                )));
            }

            files.insert(name, FileHandle::new(file, size));
        }

        Ok(Self {
            data_directory,
            files,
        })
    }

    fn get_file(&self, name: &str) -> Result<Ref<String, FileHandle>> {
        self.files
            .get(name)
            .ok_or_else(|| Error::msg(format!("No paged file named {}", name)))
    }

    /// Creates a fresh empty paged file, truncating any previous content.
    pub fn create_or_truncate(&self, name: &str) -> Result<()> {
        if let Some(handle) = self.files.get(name) {
            handle.truncate()?;
            return Ok(());
        }

        let path = self.data_directory.join(name);
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("Failed to create paged file {}", name))?;

        self.files.insert(name.to_owned(), FileHandle::new(file, 0));
        Ok(())
    }

    /// Appends a page to a file and returns its page number.
    pub fn append_page(&self, name: &str, page: &PageBuffer) -> Result<PageNo> {
        let file = self.get_file(name)?;
        file.append_page(page.bytes())
    }

    /// Returns an independent positional read handle for a paged file,
    /// with the page count captured at open time.
    pub fn open_read(&self, name: &str) -> Result<PageFile> {
        let handle = self.get_file(name)?;
        let file = handle
            .file
            .try_clone()
            .with_context(|| format!("Could not open read handle for paged file {}", name))?;
        Ok(PageFile {
            name: name.to_owned(),
            file,
            page_count: handle.page_count(),
        })
    }
}

/// A read-only view of one paged file, used by scan cursors. The page
/// count is a snapshot: pages appended after `open_read` are not visible.
pub struct PageFile {
    name: String,
    file: File,
    page_count: PageNo,
}

impl PageFile {
    pub fn page_count(&self) -> PageNo {
        self.page_count
    }

    /// Reads the given page into the buffer and rewinds its cursor.
    pub fn read_page(&self, page_no: PageNo, page: &mut PageBuffer) -> Result<()> {
        if page_no >= self.page_count {
            return Err(Error::msg(format!(
                "Attempted to read page {} of file {}, which has only {} pages",
                page_no, self.name, self.page_count
            )));
        }
        let offset = page_no as u64 * PAGE_SIZE as u64;
        self.file
            .read_exact_at(page.bytes_mut(), offset)
            .with_context(|| {
                format!(
                    "Could not read page {} of file {}",
                    page_no, self.name
                )
            })?;
        page.rewind();
        Ok(())
    }
}

struct FileHandle {
    file: File,
    filesize: AtomicU64,
}

impl FileHandle {
    fn new(file: File, filesize: u64) -> Self {
        Self {
            file,
            filesize: AtomicU64::new(filesize),
        }
    }

    fn page_count(&self) -> PageNo {
        (self.filesize.load(Ordering::Relaxed) / PAGE_SIZE as u64) as PageNo
    }

    fn append_page(&self, data: &[u8]) -> Result<PageNo> {
        let offset = self.filesize.fetch_add(PAGE_SIZE as u64, Ordering::Relaxed);
        self.file
            .write_all_at(data, offset)
            .with_context(|| format!("Failed to write page at offset {}", offset))?;
        self.file
            .sync_all()
            .with_context(|| format!("Failed to sync page written at offset {}", offset))?;
        Ok((offset / PAGE_SIZE as u64) as PageNo)
    }

    fn truncate(&self) -> Result<()> {
        self.file
            .set_len(0)
            .with_context(|| "Failed to truncate paged file".to_string())?;
        self.filesize.store(0, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::FileManager;
    use crate::common::SCHEMA_FILE_NAME;
    use crate::storage::page::PageBuffer;

    #[test]
    fn basic_test() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        file_manager.create_or_truncate("Sailors")?;

        let mut page = PageBuffer::new();
        page.write_i32(42);
        let page_no = file_manager.append_page("Sailors", &page)?;
        assert_eq!(page_no, 0);

        let reader = file_manager.open_read("Sailors")?;
        assert_eq!(reader.page_count(), 1);

        let mut read_back = PageBuffer::new();
        reader.read_page(0, &mut read_back)?;
        assert_eq!(read_back.read_i32(), 42);
        assert!(reader.read_page(1, &mut read_back).is_err());

        Ok(())
    }

    #[test]
    fn truncate_resets_page_count() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        file_manager.create_or_truncate("Sailors")?;

        let page = PageBuffer::new();
        file_manager.append_page("Sailors", &page)?;
        file_manager.append_page("Sailors", &page)?;
        assert_eq!(file_manager.open_read("Sailors")?.page_count(), 2);

        file_manager.create_or_truncate("Sailors")?;
        assert_eq!(file_manager.open_read("Sailors")?.page_count(), 0);

        Ok(())
    }

    #[test]
    fn schema_file_is_not_a_paged_file() -> Result<()> {
        let data_dir = tempdir()?;
        fs::write(data_dir.path().join(SCHEMA_FILE_NAME), "Sailors A B C\n")?;

        let file_manager = FileManager::new(data_dir.path())?;
        assert!(file_manager.open_read(SCHEMA_FILE_NAME).is_err());

        Ok(())
    }
}
