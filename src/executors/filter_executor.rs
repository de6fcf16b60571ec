use anyhow::Result;

use super::Executor;
use crate::catalog::schema::Schema;
use crate::planner::physical_plan::Expr;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

pub struct FilterExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    predicate: Expr,
}

impl<'a> FilterExecutor<'a> {
    pub fn new(child: Box<dyn Executor + 'a>, predicate: Expr) -> Self {
        Self { child, predicate }
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while let Some(tuple) = self.child.next().transpose()? {
            if let Value::Boolean(true) = self.predicate.evaluate(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl<'a> Executor for FilterExecutor<'a> {
    fn next(&mut self) -> Option<Result<Tuple>> {
        self.fetch_next().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()
    }

    fn schema(&self) -> &Schema {
        self.child.schema()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::catalog::schema::Schema;
    use crate::executors::{Executor, ExecutorFactory};
    use crate::planner::physical_plan::{BinaryOperator, Expr, PhysicalPlan};
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

    #[test]
    fn keeps_only_satisfying_tuples() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        let rows = (1..=9).map(|i| vec![i, i * 10]).collect::<Vec<_>>();
        write_relation(&file_manager, "Numbers", &rows)?;

        // A % 2 = 0 and B > 20
        let predicate = Expr::and(
            Expr::Binary {
                left: Box::new(Expr::Binary {
                    left: Box::new(Expr::ColumnReference { col_idx: 0 }),
                    op: BinaryOperator::Modulo,
                    right: Box::new(Expr::Literal(2)),
                }),
                op: BinaryOperator::Eq,
                right: Box::new(Expr::Literal(0)),
            },
            Expr::comparison(1, BinaryOperator::Greater, 20),
        );
        let plan = PhysicalPlan::Filter {
            predicate,
            child: Box::new(scan_plan("Numbers", &["A", "B"])),
        };

        let factory = ExecutorFactory::new(&file_manager);
        let mut executor = factory.create_executor(plan)?;

        let mut result = vec![];
        while let Some(tuple) = executor.next() {
            result.push(tuple?.value(0));
        }
        assert_eq!(result, vec![4, 6, 8]);

        executor.rewind()?;
        assert_eq!(executor.next().unwrap()?, Tuple::new(vec![4, 40]));

        Ok(())
    }

    #[test]
    fn unknown_predicate_column_is_rejected_at_construction() -> Result<()> {
        let data_dir = tempdir()?;
        let file_manager = FileManager::new(data_dir.path())?;
        write_relation(&file_manager, "Numbers", &[vec![1, 2]])?;

        let plan = PhysicalPlan::Filter {
            predicate: Expr::comparison(5, BinaryOperator::Eq, 1),
            child: Box::new(scan_plan("Numbers", &["A", "B"])),
        };

        let factory = ExecutorFactory::new(&file_manager);
        assert!(factory.create_executor(plan).is_err());

        Ok(())
    }
}
