use std::cmp::Ordering;

use anyhow::{Context, Error, Result};
use tempfile::TempDir;

use super::{Executor, SortExecutor};
use crate::catalog::schema::Schema;
use crate::common::{PAGE_SIZE, WORD_SIZE};
use crate::storage::file_manager::FileManager;
use crate::storage::tuple_file::{TupleReader, TupleWriter};
use crate::tuple::ordering::SortKey;
use crate::tuple::Tuple;

/// Bounded-memory sort: the child is drained into sorted runs that fit
/// the page budget, the runs are merged (in rounds, when there are more
/// of them than the merge fan-in can take at once) and the final merge is
/// streamed on demand. Run files live in a private temp directory that
/// disappears with the executor.
pub struct ExternalSortExecutor {
    schema: Schema,
    key: SortKey,
    _temp_dir: TempDir,
    temp_files: FileManager,
    runs: Vec<String>,
    merge: Vec<RunCursor>,
    next_index: usize,
}

struct RunCursor {
    reader: TupleReader,
    head: Option<Tuple>,
}

impl ExternalSortExecutor {
    pub fn new(
        mut child: Box<dyn Executor + '_>,
        keys: &[usize],
        buffer_pages: usize,
    ) -> Result<Self> {
        let schema = child.schema().clone();
        let arity = schema.arity();
        let key = SortKey::new(keys, arity);

        let run_capacity = if arity == 0 {
            0
        } else {
            (buffer_pages * PAGE_SIZE) / (WORD_SIZE * arity)
        };
        if run_capacity == 0 {
            return Err(Error::msg(format!(
                "External sort buffer of {} pages cannot hold a single tuple",
                buffer_pages
            )));
        }

        let temp_dir = tempfile::tempdir().with_context(|| {
            "Could not create temporary directory for external sort runs".to_string()
        })?;
        let temp_files = FileManager::new(temp_dir.path())?;

        // Run generation: one sorted, fully materialized run at a time.
        let mut runs = vec![];
        let mut next_run = 0usize;
        let mut exhausted = false;
        while !exhausted {
            let mut buffer = Vec::with_capacity(run_capacity);
            while buffer.len() < run_capacity {
                match child.next().transpose()? {
                    Some(tuple) => buffer.push(tuple),
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            if buffer.is_empty() {
                break;
            }
            buffer.sort_by(|a, b| key.compare(a, b));

            let name = format!("run.{}", next_run);
            next_run += 1;
            let mut writer = TupleWriter::create(&temp_files, &name, arity)?;
            for tuple in &buffer {
                writer.write_tuple(tuple)?;
            }
            writer.close()?;
            runs.push(name);
        }

        // Reduce the run count until one merge pass over all remaining
        // runs fits the reader budget.
        let fan_in = buffer_pages.saturating_sub(1).max(2);
        while runs.len() > fan_in {
            let mut merged = vec![];
            for chunk in runs.chunks(fan_in) {
                if chunk.len() == 1 {
                    merged.push(chunk[0].clone());
                    continue;
                }
                let name = format!("run.{}", next_run);
                next_run += 1;
                merge_runs(&temp_files, &key, arity, chunk, &name)?;
                merged.push(name);
            }
            runs = merged;
        }

        let merge = open_cursors(&temp_files, &runs, arity)?;
        Ok(Self {
            schema,
            key,
            _temp_dir: temp_dir,
            temp_files,
            runs,
            merge,
            next_index: 0,
        })
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let tuple = take_smallest(&mut self.merge, &self.key)?;
        if tuple.is_some() {
            self.next_index += 1;
        }
        Ok(tuple)
    }
}

/// Picks the smallest head tuple across the run cursors (ties go to the
/// lowest run index), refilling the winning cursor from its reader.
fn take_smallest(cursors: &mut [RunCursor], key: &SortKey) -> Result<Option<Tuple>> {
    let mut smallest: Option<usize> = None;
    for idx in 0..cursors.len() {
        let Some(head) = &cursors[idx].head else {
            continue;
        };
        match smallest {
            None => smallest = Some(idx),
            Some(prev) => {
                if let Some(prev_head) = &cursors[prev].head {
                    if key.compare(head, prev_head) == Ordering::Less {
                        smallest = Some(idx);
                    }
                }
            }
        }
    }
    let Some(idx) = smallest else {
        return Ok(None);
    };
    let tuple = cursors[idx].head.take();
    cursors[idx].head = cursors[idx].reader.next_tuple()?;
    Ok(tuple)
}

fn open_cursors(temp_files: &FileManager, runs: &[String], arity: usize) -> Result<Vec<RunCursor>> {
    runs.iter()
        .map(|name| {
            let mut reader = TupleReader::open(temp_files, name, arity)?;
            let head = reader.next_tuple()?;
            Ok(RunCursor { reader, head })
        })
        .collect()
}

/// One merge round: streams the given runs into a fresh, larger run.
fn merge_runs(
    temp_files: &FileManager,
    key: &SortKey,
    arity: usize,
    inputs: &[String],
    output: &str,
) -> Result<()> {
    let mut cursors = open_cursors(temp_files, inputs, arity)?;
    let mut writer = TupleWriter::create(temp_files, output, arity)?;
    while let Some(tuple) = take_smallest(&mut cursors, key)? {
        writer.write_tuple(&tuple)?;
    }
    writer.close()
}

impl Executor for ExternalSortExecutor {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.merge = open_cursors(&self.temp_files, &self.runs, self.schema.arity())?;
        self.next_index = 0;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl SortExecutor for ExternalSortExecutor {
    fn rewind_to(&mut self, index: usize) -> Result<()> {
        if index < self.next_index {
            self.rewind()?;
        }
        while self.next_index < index {
            if self.fetch_next()?.is_none() {
                return Err(Error::msg(format!(
                    "Cannot reposition sorted stream to index {}, it ended at {}",
                    index, self.next_index
                )));
            }
        }
        Ok(())
    }
}
