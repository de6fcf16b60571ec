use std::collections::HashSet;

use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::tuple::Tuple;

/// Emits a tuple the first time its value sequence is seen and suppresses
/// exact repeats. The seen-set makes this correct for unsorted input at a
/// memory cost linear in the number of distinct tuples; plans that sort
/// first simply keep the set small in a different way.
pub struct DistinctExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    seen: HashSet<Tuple>,
}

impl<'a> DistinctExecutor<'a> {
    pub fn new(child: Box<dyn Executor + 'a>) -> Self {
        Self {
            child,
            seen: HashSet::new(),
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while let Some(tuple) = self.child.next().transpose()? {
            if self.seen.insert(tuple.clone()) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl<'a> Executor for DistinctExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.seen.clear();
        self.child.rewind()
    }

    fn schema(&self) -> &Schema {
        self.child.schema()
    }
}
