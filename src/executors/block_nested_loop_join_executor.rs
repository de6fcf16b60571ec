use anyhow::{Error, Result};

use super::Executor;
use crate::catalog::schema::Schema;
use crate::common::{PAGE_SIZE, WORD_SIZE};
use crate::tuple::Tuple;

/// Nested loop join over blocks of the left relation. A block holds as
/// many left tuples as fit the page budget; the right child is streamed
/// once per block, crossing every buffered left tuple with each right
/// tuple before the right cursor advances. Memory stays bounded to one
/// block plus a single right tuple.
pub struct BlockNestedLoopJoinExecutor<'a> {
    left: Box<dyn Executor + 'a>,
    right: Box<dyn Executor + 'a>,
    block: Vec<Tuple>,
    block_capacity: usize,
    block_pos: usize,
    right_tuple: Option<Tuple>,
    reverse: bool,
    schema: Schema,
}

impl<'a> BlockNestedLoopJoinExecutor<'a> {
    pub fn new(
        left: Box<dyn Executor + 'a>,
        right: Box<dyn Executor + 'a>,
        buffer_pages: usize,
        reverse: bool,
        schema: Schema,
    ) -> Result<Self> {
        let left_width = WORD_SIZE * left.schema().arity();
        let block_capacity = if left_width == 0 {
            0
        } else {
            (buffer_pages * PAGE_SIZE) / left_width
        };
        if block_capacity == 0 {
            return Err(Error::msg(format!(
                "Block nested loop join buffer of {} pages cannot hold a single left tuple",
                buffer_pages
            )));
        }
        Ok(Self {
            left,
            right,
            block: Vec::new(),
            block_capacity,
            block_pos: 0,
            right_tuple: None,
            reverse,
            schema,
        })
    }

    fn load_block(&mut self) -> Result<()> {
        self.block.clear();
        self.block_pos = 0;
        while self.block.len() < self.block_capacity {
            match self.left.next().transpose()? {
                Some(tuple) => self.block.push(tuple),
                None => break,
            }
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        loop {
            let Some(right_tuple) = &self.right_tuple else {
                // The current block (if any) has seen the whole right
                // side; start over with the next one.
                self.load_block()?;
                if self.block.is_empty() {
                    return Ok(None);
                }
                self.right.rewind()?;
                self.right_tuple = self.right.next().transpose()?;
                if self.right_tuple.is_none() {
                    return Ok(None);
                }
                continue;
            };
            if self.block_pos < self.block.len() {
                let left_tuple = &self.block[self.block_pos];
                self.block_pos += 1;
                let joined = if self.reverse {
                    right_tuple.concat(left_tuple)
                } else {
                    left_tuple.concat(right_tuple)
                };
                return Ok(Some(joined));
            }
            self.block_pos = 0;
            self.right_tuple = self.right.next().transpose()?;
        }
    }
}

impl<'a> Executor for BlockNestedLoopJoinExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.block.clear();
        self.block_pos = 0;
        self.right_tuple = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::Result;
    use rand::Rng;
    use tempfile::tempdir;

    use crate::catalog::schema::Schema;
    use crate::executors::{Executor, ExecutorFactory};
    use crate::planner::physical_plan::{Expr, JoinAlgorithm, PhysicalPlan};
    use crate::storage::file_manager::FileManager;
    use crate::storage::tuple_file::TupleWriter;
    use crate::tuple::Tuple;

    fn write_relation(file_manager: &FileManager, relation: &str, rows: &[Vec<i32>]) -> Result<()> {
        let arity = rows.first().map(|row| row.len()).unwrap_or(1);
        let mut writer = TupleWriter::create(file_manager, relation, arity)?;
        for row in rows {
            writer.write_tuple(&Tuple::new(row.clone()))?;
        }
        writer.close()
    }

    fn scan_plan(table: &str, columns: &[&str]) -> PhysicalPlan {
        PhysicalPlan::SequentialScan {
            table: table.to_owned(),
            output_schema: Schema::qualified(table, columns),
        }
    }

    fn equality_join_plan(algorithm: JoinAlgorithm) -> PhysicalPlan {
        let left = scan_plan("Left", &["Id", "A"]);
        let right = scan_plan("Right", &["Id", "B"]);
        let output_schema = left.schema().concat(right.schema());
        PhysicalPlan::Filter {
            predicate: Expr::column_eq(0, 2),
            child: Box::new(PhysicalPlan::Join {
                algorithm,
                left: Box::new(left),
                right: Box::new(right),
                reverse: false,
                output_schema,
            }),
        }
    }

    fn collect_multiset(
        file_manager: &FileManager,
        plan: PhysicalPlan,
    ) -> Result<HashMap<Tuple, usize>> {
        let factory = ExecutorFactory::new(file_manager);
        let mut executor = factory.create_executor(plan)?;
        let mut result = HashMap::new();
        while let Some(tuple) = executor.next() {
            *result.entry(tuple?).or_insert(0) += 1;
        }
        Ok(result)
    }

    #[test]
    fn matches_tuple_nested_loop_for_any_buffer_budget() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;

        let mut rng = rand::thread_rng();
        let left = (0..700)
            .map(|i| vec![rng.gen_range(0..40), i])
            .collect::<Vec<_>>();
        let right = (0..300)
            .map(|i| vec![rng.gen_range(0..40), -i])
            .collect::<Vec<_>>();
        write_relation(&file_manager, "Left", &left)?;
        write_relation(&file_manager, "Right", &right)?;

        let reference = collect_multiset(
            &file_manager,
            equality_join_plan(JoinAlgorithm::TupleNestedLoop),
        )?;
        assert!(!reference.is_empty());

        // One page forces many blocks; 64 pages hold the whole left side.
        for buffer_pages in [1, 64] {
            let result = collect_multiset(
                &file_manager,
                equality_join_plan(JoinAlgorithm::BlockNestedLoop { buffer_pages }),
            )?;
            assert_eq!(result, reference);
        }

        Ok(())
    }

    #[test]
    fn rewind_restarts_the_join() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(&file_manager, "Left", &[vec![1, 1], vec![2, 2]])?;
        write_relation(&file_manager, "Right", &[vec![1, 10], vec![2, 20]])?;

        let factory = ExecutorFactory::new(&file_manager);
        let mut executor =
            factory.create_executor(equality_join_plan(JoinAlgorithm::BlockNestedLoop {
                buffer_pages: 1,
            }))?;

        let mut first_pass = vec![];
        while let Some(tuple) = executor.next() {
            first_pass.push(tuple?);
        }
        assert_eq!(first_pass.len(), 2);

        executor.rewind()?;
        let mut second_pass = vec![];
        while let Some(tuple) = executor.next() {
            second_pass.push(tuple?);
        }
        assert_eq!(second_pass, first_pass);

        Ok(())
    }

    #[test]
    fn empty_sides_produce_no_output() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(&file_manager, "Left", &[vec![1, 1]])?;
        write_relation(&file_manager, "Right", &[])?;

        let factory = ExecutorFactory::new(&file_manager);
        let mut executor =
            factory.create_executor(equality_join_plan(JoinAlgorithm::BlockNestedLoop {
                buffer_pages: 1,
            }))?;
        assert!(executor.next().is_none());

        Ok(())
    }
}
