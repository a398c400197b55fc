/// Query composition module
///
/// Typed condition primitives, condition combinators, the query description
/// they produce, and the planner/executor that evaluates descriptions in memory.
/// Query description types
#[allow(missing_docs)]
pub mod ast;
/// Condition combinators
#[allow(missing_docs)]
pub mod condition;
/// Query executor
#[allow(missing_docs)]
pub mod executor;
/// Typed fields and condition primitives
#[allow(missing_docs)]
pub mod field;
/// Query planner
#[allow(missing_docs)]
pub mod planner;
/// Field resolution against entity metadata
pub mod validate;

// Re-export main types
pub use ast::*;
pub use condition::{Condition, ConditionBuilder, SearchCondition};
pub use executor::{ExecutionContext, Executor, TableData};
pub use field::{Expression, Expressions, Field, Reference, Selectable};
pub use planner::{PhysicalOperator, PhysicalPlan, Planner};
pub use validate::Scope;
