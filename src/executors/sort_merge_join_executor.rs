use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;

use super::{Executor, SortExecutor};
use crate::catalog::schema::Schema;
use crate::tuple::Tuple;

/// Merge join over children sorted ascending on the join columns. Equal
/// keys on both sides must produce their full Cartesian product; instead
/// of buffering a whole right-side group, the executor remembers where
/// each group started and replays the sorted right stream from that
/// logical position whenever the left side advances within a duplicate
/// key run.
pub struct SortMergeJoinExecutor<'a> {
    left: Box<dyn Executor + 'a>,
    right: Box<dyn SortExecutor + 'a>,
    left_key: usize,
    right_key: usize,
    left_tuple: Option<Tuple>,
    right_tuple: Option<Tuple>,
    /// Number of tuples pulled from the right child so far; the current
    /// right tuple sits at logical index `right_index - 1`.
    right_index: usize,
    /// Join key value to the logical right index where its group starts.
    replay: HashMap<i32, usize>,
    started: bool,
    reverse: bool,
    schema: Schema,
}

impl<'a> SortMergeJoinExecutor<'a> {
    pub fn new(
        left: Box<dyn Executor + 'a>,
        right: Box<dyn SortExecutor + 'a>,
        left_key: usize,
        right_key: usize,
        reverse: bool,
        schema: Schema,
    ) -> Self {
        Self {
            left,
            right,
            left_key,
            right_key,
            left_tuple: None,
            right_tuple: None,
            right_index: 0,
            replay: HashMap::new(),
            started: false,
            reverse,
            schema,
        }
    }

    fn advance_left(&mut self) -> Result<()> {
        self.left_tuple = self.left.next().transpose()?;
        let key = match &self.left_tuple {
            Some(tuple) => tuple.value(self.left_key),
            None => return Ok(()),
        };
        if let Some(&position) = self.replay.get(&key) {
            self.right.rewind_to(position)?;
            self.right_index = position;
            self.advance_right()?;
        }
        Ok(())
    }

    fn advance_right(&mut self) -> Result<()> {
        self.right_tuple = self.right.next().transpose()?;
        if self.right_tuple.is_some() {
            self.right_index += 1;
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if !self.started {
            self.started = true;
            self.advance_left()?;
            self.advance_right()?;
        }
        loop {
            let Some(left_tuple) = &self.left_tuple else {
                return Ok(None);
            };
            let left_key = left_tuple.value(self.left_key);
            let Some(right_tuple) = &self.right_tuple else {
                // Right side exhausted under the current left tuple; the
                // next left tuple may still replay an earlier group.
                self.advance_left()?;
                if self.right_tuple.is_none() {
                    return Ok(None);
                }
                continue;
            };
            match left_key.cmp(&right_tuple.value(self.right_key)) {
                Ordering::Less => self.advance_left()?,
                Ordering::Greater => self.advance_right()?,
                Ordering::Equal => {
                    let joined = if self.reverse {
                        right_tuple.concat(left_tuple)
                    } else {
                        left_tuple.concat(right_tuple)
                    };
                    self.replay.entry(left_key).or_insert(self.right_index - 1);
                    self.advance_right()?;
                    return Ok(Some(joined));
                }
            }
        }
    }
}

impl<'a> Executor for SortMergeJoinExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.left_tuple = None;
        self.right_tuple = None;
        self.right_index = 0;
        self.replay.clear();
        self.started = false;
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
    use crate::planner::physical_plan::{
        BinaryOperator, Expr, JoinAlgorithm, PhysicalPlan, SortStrategy,
    };
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

    fn sorted(plan: PhysicalPlan, key: usize) -> PhysicalPlan {
        PhysicalPlan::Sort {
            keys: vec![key],
            strategy: SortStrategy::InMemory,
            child: Box::new(plan),
        }
    }

    fn merge_join_plan(left: PhysicalPlan, right: PhysicalPlan, key: usize) -> PhysicalPlan {
        let output_schema = left.schema().concat(right.schema());
        PhysicalPlan::Join {
            algorithm: JoinAlgorithm::SortMerge {
                left_key: key,
                right_key: key,
            },
            left: Box::new(sorted(left, key)),
            right: Box::new(sorted(right, key)),
            reverse: false,
            output_schema,
        }
    }

    fn collect(file_manager: &FileManager, plan: PhysicalPlan) -> Result<Vec<Tuple>> {
        let factory = ExecutorFactory::new(file_manager);
        let mut executor = factory.create_executor(plan)?;
        let mut result = vec![];
        while let Some(tuple) = executor.next() {
            result.push(tuple?);
        }
        Ok(result)
    }

    #[test]
    fn replays_duplicate_key_groups() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        let rows = vec![vec![1, 10], vec![1, 20], vec![2, 30]];
        write_relation(&file_manager, "R", &rows)?;

        let plan = merge_join_plan(scan_plan("R", &["a", "b"]), scan_plan("R", &["a", "b"]), 0);
        let result = collect(&file_manager, plan)?;

        assert_eq!(
            result,
            vec![
                Tuple::new(vec![1, 10, 1, 10]),
                Tuple::new(vec![1, 10, 1, 20]),
                Tuple::new(vec![1, 20, 1, 10]),
                Tuple::new(vec![1, 20, 1, 20]),
                Tuple::new(vec![2, 30, 2, 30]),
            ]
        );

        Ok(())
    }

    #[test]
    fn rewind_reproduces_the_stream() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(
            &file_manager,
            "R",
            &[vec![3, 1], vec![1, 2], vec![1, 3], vec![2, 4]],
        )?;

        let plan = merge_join_plan(scan_plan("R", &["a", "b"]), scan_plan("R", &["a", "b"]), 0);
        let factory = ExecutorFactory::new(&file_manager);
        let mut executor = factory.create_executor(plan)?;

        let mut first_pass = vec![];
        while let Some(tuple) = executor.next() {
            first_pass.push(tuple?);
        }
        assert_eq!(first_pass.len(), 6);

        executor.rewind()?;
        let mut second_pass = vec![];
        while let Some(tuple) = executor.next() {
            second_pass.push(tuple?);
        }
        assert_eq!(second_pass, first_pass);

        Ok(())
    }

    #[test]
    fn matches_nested_loop_join_output() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;

        let mut rng = rand::thread_rng();
        let left = (0..400)
            .map(|i| vec![rng.gen_range(0..30), i])
            .collect::<Vec<_>>();
        let right = (0..250)
            .map(|i| vec![rng.gen_range(0..30), -i])
            .collect::<Vec<_>>();
        write_relation(&file_manager, "Left", &left)?;
        write_relation(&file_manager, "Right", &right)?;

        let left_plan = scan_plan("Left", &["Id", "A"]);
        let right_plan = scan_plan("Right", &["Id", "B"]);
        let output_schema = left_plan.schema().concat(right_plan.schema());
        let nested_loop = PhysicalPlan::Filter {
            predicate: Expr::column_eq(0, 2),
            child: Box::new(PhysicalPlan::Join {
                algorithm: JoinAlgorithm::TupleNestedLoop,
                left: Box::new(scan_plan("Left", &["Id", "A"])),
                right: Box::new(scan_plan("Right", &["Id", "B"])),
                reverse: false,
                output_schema,
            }),
        };
        let merge = merge_join_plan(left_plan, right_plan, 0);

        let mut reference: HashMap<Tuple, usize> = HashMap::new();
        for tuple in collect(&file_manager, nested_loop)? {
            *reference.entry(tuple).or_insert(0) += 1;
        }
        let mut result: HashMap<Tuple, usize> = HashMap::new();
        for tuple in collect(&file_manager, merge)? {
            *result.entry(tuple).or_insert(0) += 1;
        }
        assert_eq!(result, reference);

        Ok(())
    }

    #[test]
    fn range_restricted_self_join_scenario() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(
            &file_manager,
            "R",
            &[vec![1, 10], vec![1, 20], vec![2, 30], vec![3, 40]],
        )?;

        // Restrict both sides to a in [1, 2] and merge join on a.
        let restricted = |table: &str| PhysicalPlan::Filter {
            predicate: Expr::and(
                Expr::comparison(0, BinaryOperator::GreaterEq, 1),
                Expr::comparison(0, BinaryOperator::LessEq, 2),
            ),
            child: Box::new(scan_plan(table, &["a", "b"])),
        };
        let plan = merge_join_plan(restricted("R"), restricted("R"), 0);
        let result = collect(&file_manager, plan)?;

        assert_eq!(
            result,
            vec![
                Tuple::new(vec![1, 10, 1, 10]),
                Tuple::new(vec![1, 10, 1, 20]),
                Tuple::new(vec![1, 20, 1, 10]),
                Tuple::new(vec![1, 20, 1, 20]),
                Tuple::new(vec![2, 30, 2, 30]),
            ]
        );

        Ok(())
    }

    #[test]
    fn unsorted_right_child_is_rejected() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(&file_manager, "R", &[vec![1, 10]])?;

        let left = scan_plan("R", &["a", "b"]);
        let right = scan_plan("R", &["a", "b"]);
        let output_schema = left.schema().concat(right.schema());
        let plan = PhysicalPlan::Join {
            algorithm: JoinAlgorithm::SortMerge {
                left_key: 0,
                right_key: 0,
            },
            left: Box::new(sorted(left, 0)),
            right: Box::new(right),
            reverse: false,
            output_schema,
        };

        let factory = ExecutorFactory::new(&file_manager);
        assert!(factory.create_executor(plan).is_err());

        Ok(())
    }
}
