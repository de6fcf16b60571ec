use anyhow::{Error, Result};

use self::block_nested_loop_join_executor::BlockNestedLoopJoinExecutor;
use self::distinct_executor::DistinctExecutor;
use self::empty_executor::EmptyExecutor;
use self::external_sort_executor::ExternalSortExecutor;
use self::filter_executor::FilterExecutor;
use self::in_memory_sort_executor::InMemorySortExecutor;
use self::index_scan_executor::IndexScanExecutor;
use self::nested_loop_join_executor::NestedLoopJoinExecutor;
use self::projection_executor::ProjectionExecutor;
use self::seq_scan_executor::SeqScanExecutor;
use self::sort_merge_join_executor::SortMergeJoinExecutor;
use crate::catalog::schema::Schema;
use crate::index::cursor::IndexCursor;
use crate::index::{index_file_name, resolve_key_column};
use crate::planner::physical_plan::{JoinAlgorithm, PhysicalPlan, SortStrategy};
use crate::storage::file_manager::FileManager;
use crate::storage::tuple_file::TupleReader;
use crate::tuple::Tuple;

pub mod block_nested_loop_join_executor;
pub mod distinct_executor;
pub mod empty_executor;
pub mod external_sort_executor;
pub mod filter_executor;
pub mod in_memory_sort_executor;
pub mod index_scan_executor;
pub mod nested_loop_join_executor;
pub mod projection_executor;
pub mod seq_scan_executor;
pub mod sort_merge_join_executor;

pub trait Executor {
    fn schema(&self) -> &Schema;
    fn next(&mut self) -> Option<Result<Tuple>>;
    fn rewind(&mut self) -> Result<()>;
}

/// A sorted stream that can additionally be repositioned to an absolute
/// logical output index. Sort-merge join uses this to replay the right
/// side over duplicate join-key groups.
pub trait SortExecutor: Executor {
    fn rewind_to(&mut self, index: usize) -> Result<()>;
}

pub struct ExecutorFactory<'a> {
    file_manager: &'a FileManager,
}

impl<'a> ExecutorFactory<'a> {
    pub fn new(file_manager: &'a FileManager) -> Self {
        Self { file_manager }
    }

    pub fn create_executor(&self, plan: PhysicalPlan) -> Result<Box<dyn Executor + 'a>> {
        match plan {
            PhysicalPlan::SequentialScan {
                table,
                output_schema,
            } => {
                let reader = TupleReader::open(self.file_manager, &table, output_schema.arity())?;
                Ok(Box::new(SeqScanExecutor::new(reader, output_schema)))
            }
            PhysicalPlan::IndexScan {
                table,
                attribute,
                clustered,
                low,
                high,
                output_schema,
            } => Ok(Box::new(self.create_index_scan(
                &table,
                &attribute,
                clustered,
                low,
                high,
                output_schema,
            )?)),
            PhysicalPlan::Filter { predicate, child } => {
                let child = self.create_executor(*child)?;
                predicate.validate(child.schema())?;
                Ok(Box::new(FilterExecutor::new(child, predicate)))
            }
            PhysicalPlan::Projection {
                columns,
                child,
                output_schema,
            } => {
                let child = self.create_executor(*child)?;
                for &column in &columns {
                    validate_column(child.schema(), column, "Projection")?;
                }
                if columns.len() != output_schema.arity() {
                    return Err(Error::msg(format!(
                        "Projection extracts {} columns, but its output schema has {}",
                        columns.len(),
                        output_schema.arity()
                    )));
                }
                Ok(Box::new(ProjectionExecutor::new(
                    child,
                    columns,
                    output_schema,
                )))
            }
            PhysicalPlan::Distinct { child } => {
                Ok(Box::new(DistinctExecutor::new(self.create_executor(*child)?)))
            }
            PhysicalPlan::Sort {
                keys,
                strategy,
                child,
            } => match strategy {
                SortStrategy::InMemory => {
                    Ok(Box::new(self.create_in_memory_sort(&keys, *child)?))
                }
                SortStrategy::External { buffer_pages } => {
                    Ok(Box::new(self.create_external_sort(&keys, buffer_pages, *child)?))
                }
            },
            PhysicalPlan::Join {
                algorithm,
                left,
                right,
                reverse,
                output_schema,
            } => self.create_join(algorithm, *left, *right, reverse, output_schema),
            PhysicalPlan::Empty { output_schema } => Ok(Box::new(EmptyExecutor::new(output_schema))),
        }
    }

    fn create_join(
        &self,
        algorithm: JoinAlgorithm,
        left: PhysicalPlan,
        right: PhysicalPlan,
        reverse: bool,
        output_schema: Schema,
    ) -> Result<Box<dyn Executor + 'a>> {
        if left.schema().arity() + right.schema().arity() != output_schema.arity() {
            return Err(Error::msg(format!(
                "Join output schema has {} columns, but its children produce {}",
                output_schema.arity(),
                left.schema().arity() + right.schema().arity()
            )));
        }
        match algorithm {
            JoinAlgorithm::TupleNestedLoop => {
                let left = self.create_executor(left)?;
                let right = self.create_executor(right)?;
                Ok(Box::new(NestedLoopJoinExecutor::new(
                    left,
                    right,
                    reverse,
                    output_schema,
                )))
            }
            JoinAlgorithm::BlockNestedLoop { buffer_pages } => {
                let left = self.create_executor(left)?;
                let right = self.create_executor(right)?;
                Ok(Box::new(BlockNestedLoopJoinExecutor::new(
                    left,
                    right,
                    buffer_pages,
                    reverse,
                    output_schema,
                )?))
            }
            JoinAlgorithm::SortMerge {
                left_key,
                right_key,
            } => {
                validate_column(left.schema(), left_key, "Sort-merge join")?;
                validate_column(right.schema(), right_key, "Sort-merge join")?;
                let left = self.create_executor(left)?;
                let right = match right {
                    PhysicalPlan::Sort {
                        keys,
                        strategy,
                        child,
                    } => self.create_sort_executor(&keys, strategy, *child)?,
                    _ => {
                        return Err(Error::msg(
                            "Sort-merge join requires its right child to be a sort",
                        ))
                    }
                };
                Ok(Box::new(SortMergeJoinExecutor::new(
                    left,
                    right,
                    left_key,
                    right_key,
                    reverse,
                    output_schema,
                )))
            }
        }
    }

    fn create_sort_executor(
        &self,
        keys: &[usize],
        strategy: SortStrategy,
        child: PhysicalPlan,
    ) -> Result<Box<dyn SortExecutor + 'a>> {
        match strategy {
            SortStrategy::InMemory => Ok(Box::new(self.create_in_memory_sort(keys, child)?)),
            SortStrategy::External { buffer_pages } => {
                Ok(Box::new(self.create_external_sort(keys, buffer_pages, child)?))
            }
        }
    }

    fn create_in_memory_sort(
        &self,
        keys: &[usize],
        child: PhysicalPlan,
    ) -> Result<InMemorySortExecutor> {
        let child = self.create_executor(child)?;
        for &key in keys {
            validate_column(child.schema(), key, "Sort")?;
        }
        InMemorySortExecutor::new(child, keys)
    }

    fn create_external_sort(
        &self,
        keys: &[usize],
        buffer_pages: usize,
        child: PhysicalPlan,
    ) -> Result<ExternalSortExecutor> {
        let child = self.create_executor(child)?;
        for &key in keys {
            validate_column(child.schema(), key, "Sort")?;
        }
        ExternalSortExecutor::new(child, keys, buffer_pages)
    }

    fn create_index_scan(
        &self,
        table: &str,
        attribute: &str,
        clustered: bool,
        low: Option<i32>,
        high: Option<i32>,
        output_schema: Schema,
    ) -> Result<IndexScanExecutor> {
        let key_column = resolve_key_column(&output_schema, table, attribute)?;
        let index_file = index_file_name(table, attribute);
        let cursor = IndexCursor::open(self.file_manager, &index_file, low, high)?;
        let reader = TupleReader::open(self.file_manager, table, output_schema.arity())?;
        Ok(IndexScanExecutor::new(
            cursor,
            reader,
            key_column,
            clustered,
            high,
            output_schema,
        ))
    }
}

fn validate_column(schema: &Schema, column: usize, what: &str) -> Result<()> {
    if column >= schema.arity() {
        Err(Error::msg(format!(
            "{} references column {}, but the input only has {} columns",
            what,
            column,
            schema.arity()
        )))
    } else {
        Ok(())
    }
}
