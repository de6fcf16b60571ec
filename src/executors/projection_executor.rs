use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::tuple::Tuple;

/// Extracts the requested columns, in the requested order, into a fresh
/// tuple. Dropped columns are gone for good, so the planner places
/// projections above every operator that still needs them.
pub struct ProjectionExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    columns: Vec<usize>,
    output_schema: Schema,
}

impl<'a> ProjectionExecutor<'a> {
    pub fn new(child: Box<dyn Executor + 'a>, columns: Vec<usize>, output_schema: Schema) -> Self {
        Self {
            child,
            columns,
            output_schema,
        }
    }
}

impl<'a> Executor for ProjectionExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.child.next().map(|tuple| {
            tuple.map(|tuple| {
                let values = self
                    .columns
                    .iter()
                    .map(|&column| tuple.value(column))
                    .collect();
                Tuple::new(values)
            })
        })
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()
    }

    fn schema(&self) -> &Schema {
        &self.output_schema
    }
}
