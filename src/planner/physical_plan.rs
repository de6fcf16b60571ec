use anyhow::{Error, Result};

use crate::catalog::schema::Schema;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
}

/// A predicate or scalar expression over one input tuple: integer
/// arithmetic, comparisons and conjunctions, evaluated by a direct tree
/// walk. Operands are always defined integers, so there is no
/// three-valued logic.
#[derive(Debug, PartialEq)]
pub enum Expr {
    ColumnReference { col_idx: usize },
    Literal(i32),
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn evaluate(&self, tuple: &Tuple) -> Value {
        match self {
            Expr::ColumnReference { col_idx } => Value::Integer(tuple.value(*col_idx)),
            Expr::Literal(val) => Value::Integer(*val),
            Expr::Binary { left, op, right } => {
                let left = left.evaluate(tuple);
                let right = right.evaluate(tuple);
                left.evaluate_binary_expression(&right, *op)
            }
        }
    }

    /// Checks that every column reference resolves in the given schema.
    /// Executor construction rejects invalid expressions before any tuple
    /// is pulled.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match self {
            Expr::ColumnReference { col_idx } => {
                if *col_idx >= schema.arity() {
                    Err(Error::msg(format!(
                        "Expression references column {}, but the input only has {} columns",
                        col_idx,
                        schema.arity()
                    )))
                } else {
                    Ok(())
                }
            }
            Expr::Literal(_) => Ok(()),
            Expr::Binary { left, right, .. } => {
                left.validate(schema)?;
                right.validate(schema)
            }
        }
    }

    /// Convenience constructor for the common comparison shape.
    pub fn comparison(left_column: usize, op: BinaryOperator, literal: i32) -> Expr {
        Expr::Binary {
            left: Box::new(Expr::ColumnReference {
                col_idx: left_column,
            }),
            op,
            right: Box::new(Expr::Literal(literal)),
        }
    }

    /// Convenience constructor for an equality between two columns.
    pub fn column_eq(left_column: usize, right_column: usize) -> Expr {
        Expr::Binary {
            left: Box::new(Expr::ColumnReference {
                col_idx: left_column,
            }),
            op: BinaryOperator::Eq,
            right: Box::new(Expr::ColumnReference {
                col_idx: right_column,
            }),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op: BinaryOperator::And,
            right: Box::new(right),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SortStrategy {
    InMemory,
    External { buffer_pages: usize },
}

#[derive(Debug, PartialEq)]
pub enum JoinAlgorithm {
    TupleNestedLoop,
    BlockNestedLoop {
        buffer_pages: usize,
    },
    /// Requires both children sorted ascending on the join columns; the
    /// planner inserts the sorts and extracts the equality column pair.
    SortMerge {
        left_key: usize,
        right_key: usize,
    },
}

#[derive(Debug, PartialEq)]
pub enum PhysicalPlan {
    SequentialScan {
        table: String,
        output_schema: Schema,
    },
    IndexScan {
        table: String,
        attribute: String,
        clustered: bool,
        low: Option<i32>,
        high: Option<i32>,
        output_schema: Schema,
    },
    Filter {
        predicate: Expr,
        child: Box<PhysicalPlan>,
    },
    Projection {
        columns: Vec<usize>,
        child: Box<PhysicalPlan>,
        output_schema: Schema,
    },
    Distinct {
        child: Box<PhysicalPlan>,
    },
    Sort {
        keys: Vec<usize>,
        strategy: SortStrategy,
        child: Box<PhysicalPlan>,
    },
    Join {
        algorithm: JoinAlgorithm,
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        /// Emit right columns before left columns, for plans whose join
        /// order was swapped relative to the requested output order.
        reverse: bool,
        output_schema: Schema,
    },
    Empty {
        output_schema: Schema,
    },
}

impl PhysicalPlan {
    pub fn schema(&self) -> &Schema {
        match self {
            Self::SequentialScan { output_schema, .. } => output_schema,
            Self::IndexScan { output_schema, .. } => output_schema,
            Self::Filter { child, .. } => child.schema(),
            Self::Projection { output_schema, .. } => output_schema,
            Self::Distinct { child } => child.schema(),
            Self::Sort { child, .. } => child.schema(),
            Self::Join { output_schema, .. } => output_schema,
            Self::Empty { output_schema } => output_schema,
        }
    }
}
