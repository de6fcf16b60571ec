use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::tuple::Tuple;

/// A stream with a schema and no tuples, for plan branches the planner
/// proved empty.
pub struct EmptyExecutor {
    output_schema: Schema,
}

impl EmptyExecutor {
    pub fn new(output_schema: Schema) -> Self {
        Self { output_schema }
    }
}

impl Executor for EmptyExecutor {
    fn next(&mut self) -> Option<Result<Tuple>> {
        None
    }

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.output_schema
    }
}
