use crate::planner::physical_plan::BinaryOperator;

/// Result of evaluating a predicate expression. Tuples only hold integers;
/// booleans arise from comparisons and conjunctions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i32),
    Boolean(bool),
}

impl Value {
    pub fn evaluate_binary_expression(&self, other: &Value, op: BinaryOperator) -> Value {
        match op {
            BinaryOperator::Plus => Value::Integer(self.as_i32() + other.as_i32()),
            BinaryOperator::Minus => Value::Integer(self.as_i32() - other.as_i32()),
            BinaryOperator::Multiply => Value::Integer(self.as_i32() * other.as_i32()),
            BinaryOperator::Divide => Value::Integer(self.as_i32() / other.as_i32()),
            BinaryOperator::Modulo => Value::Integer(self.as_i32() % other.as_i32()),
            BinaryOperator::Eq => Value::Boolean(self.as_i32() == other.as_i32()),
            BinaryOperator::NotEq => Value::Boolean(self.as_i32() != other.as_i32()),
            BinaryOperator::Less => Value::Boolean(self.as_i32() < other.as_i32()),
            BinaryOperator::LessEq => Value::Boolean(self.as_i32() <= other.as_i32()),
            BinaryOperator::Greater => Value::Boolean(self.as_i32() > other.as_i32()),
            BinaryOperator::GreaterEq => Value::Boolean(self.as_i32() >= other.as_i32()),
            BinaryOperator::And => Value::Boolean(self.as_bool() && other.as_bool()),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Integer(val) => *val,
            _ => unreachable!(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(val) => *val,
            _ => unreachable!(),
        }
    }
}
