use anyhow::{Error, Result};

use super::Executor;
use crate::catalog::schema::Schema;
use crate::index::cursor::IndexCursor;
use crate::storage::tuple_file::TupleReader;
use crate::tuple::Tuple;

/// Range scan through a B+-tree index. A non-clustered scan resolves
/// every qualifying rid individually; a clustered scan seeks once to the
/// first qualifying rid and then reads the (physically sorted) relation
/// sequentially until a key passes the high bound.
pub struct IndexScanExecutor {
    cursor: IndexCursor,
    reader: TupleReader,
    key_column: usize,
    clustered: bool,
    high: Option<i32>,
    positioned: bool,
    schema: Schema,
}

impl IndexScanExecutor {
    pub fn new(
        cursor: IndexCursor,
        reader: TupleReader,
        key_column: usize,
        clustered: bool,
        high: Option<i32>,
        schema: Schema,
    ) -> Self {
        Self {
            cursor,
            reader,
            key_column,
            clustered,
            high,
            positioned: false,
            schema,
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.clustered {
            if !self.positioned {
                let Some(rid) = self.cursor.next_rid()? else {
                    return Ok(None);
                };
                self.reader.seek(rid)?;
                self.positioned = true;
            }
            let Some(tuple) = self.reader.next_tuple()? else {
                return Ok(None);
            };
            if let Some(high) = self.high {
                if tuple.value(self.key_column) > high {
                    return Ok(None);
                }
            }
            Ok(Some(tuple))
        } else {
            let Some(rid) = self.cursor.next_rid()? else {
                return Ok(None);
            };
            self.reader.seek(rid)?;
            match self.reader.next_tuple()? {
                Some(tuple) => Ok(Some(tuple)),
                None => Err(Error::msg(format!(
                    "Index entry points at missing record ({}, {})",
                    rid.0, rid.1
                ))),
            }
        }
    }
}

impl Executor for IndexScanExecutor {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.reset()?;
        self.reader.rewind();
        self.positioned = false;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
