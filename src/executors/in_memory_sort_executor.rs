use anyhow::{Error, Result};

use super::{Executor, SortExecutor};
use crate::catalog::schema::Schema;
use crate::tuple::ordering::SortKey;
use crate::tuple::Tuple;

/// Materializes the whole child at construction, sorts it once and then
/// iterates over the sorted vector. Repositioning is just moving the
/// cursor.
pub struct InMemorySortExecutor {
    tuples: Vec<Tuple>,
    cursor: usize,
    schema: Schema,
}

impl InMemorySortExecutor {
    pub fn new(mut child: Box<dyn Executor + '_>, keys: &[usize]) -> Result<Self> {
        let schema = child.schema().clone();
        let key = SortKey::new(keys, schema.arity());

        let mut tuples = vec![];
        while let Some(tuple) = child.next().transpose()? {
            tuples.push(tuple);
        }
        tuples.sort_by(|a, b| key.compare(a, b));

        Ok(Self {
            tuples,
            cursor: 0,
            schema,
        })
    }
}

impl Executor for InMemorySortExecutor {
    fn next(&mut self) -> Option<Result<Tuple>> {
        let tuple = self.tuples.get(self.cursor)?;
        self.cursor += 1;
        Some(Ok(tuple.clone()))
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl SortExecutor for InMemorySortExecutor {
    fn rewind_to(&mut self, index: usize) -> Result<()> {
        if index > self.tuples.len() {
            return Err(Error::msg(format!(
                "Cannot reposition sorted stream to index {}, it only holds {} tuples",
                index,
                self.tuples.len()
            )));
        }
        self.cursor = index;
        Ok(())
    }
}
