//! Physical plan types consumed by the execution engine. Plan trees are
//! built by an external planner with join order, algorithm choices and
//! schemas already bound; the engine dispatches on the tree exactly once,
//! when executors are constructed.

pub mod physical_plan;
