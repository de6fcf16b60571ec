use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::tuple::Tuple;

/// Tuple-at-a-time nested loop join: for each left tuple, the entire right
/// child is streamed and rewound. Produces the unfiltered cross product;
/// join predicates live in an enclosing filter.
pub struct NestedLoopJoinExecutor<'a> {
    left: Box<dyn Executor + 'a>,
    right: Box<dyn Executor + 'a>,
    left_tuple: Option<Tuple>,
    reverse: bool,
    schema: Schema,
}

impl<'a> NestedLoopJoinExecutor<'a> {
    pub fn new(
        left: Box<dyn Executor + 'a>,
        right: Box<dyn Executor + 'a>,
        reverse: bool,
        schema: Schema,
    ) -> Self {
        Self {
            left,
            right,
            left_tuple: None,
            reverse,
            schema,
        }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.left_tuple.is_none() {
            self.left_tuple = self.left.next().transpose()?;
            self.right.rewind()?;
        }
        while let Some(ref left_tuple) = self.left_tuple {
            if let Some(right_tuple) = self.right.next().transpose()? {
                let joined = if self.reverse {
                    right_tuple.concat(left_tuple)
                } else {
                    left_tuple.concat(&right_tuple)
                };
                return Ok(Some(joined));
            }
            self.left_tuple = self.left.next().transpose()?;
            self.right.rewind()?;
        }
        Ok(None)
    }
}

impl<'a> Executor for NestedLoopJoinExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.left_tuple = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
