//! Condition combinators.
//!
//! A [`Condition`] wraps an optional boolean expression. The absent condition
//! means "no constraint" and is the identity element of both `and` and `or`,
//! so optional filters compose without branching at the call site:
//!
//! ```
//! use sift_core::query::{Condition, Field};
//!
//! const AGE: Field<i64> = Field::new("member", "age");
//! const USERNAME: Field<String> = Field::new("member", "username");
//!
//! let username: Option<String> = None;
//! let condition = USERNAME.eq(username).and(AGE.goe(Some(20)));
//! assert_eq!(condition.to_string(), "member.age >= 20");
//! ```

use super::ast::{Expr, LogicalOp};
use std::fmt;

/// A composable, possibly absent, boolean condition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition(Option<Expr>);

impl Condition {
    /// The absent condition (matches everything).
    pub const fn absent() -> Self {
        Condition(None)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn expr(&self) -> Option<&Expr> {
        self.0.as_ref()
    }

    pub fn into_expr(self) -> Option<Expr> {
        self.0
    }

    /// Conjunction; an absent side contributes nothing.
    pub fn and(self, other: impl Into<Condition>) -> Condition {
        self.combine(LogicalOp::And, other.into())
    }

    /// Disjunction; an absent side contributes nothing.
    pub fn or(self, other: impl Into<Condition>) -> Condition {
        self.combine(LogicalOp::Or, other.into())
    }

    /// Negation; the absent condition stays absent.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Condition {
        Condition(self.0.map(|expr| Expr::Not(Box::new(expr))))
    }

    /// Conjunction of every present condition.
    pub fn all<I, C>(conditions: I) -> Condition
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        conditions
            .into_iter()
            .fold(Condition::absent(), |acc, c| acc.and(c))
    }

    /// Disjunction of every present condition.
    pub fn any<I, C>(conditions: I) -> Condition
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        conditions
            .into_iter()
            .fold(Condition::absent(), |acc, c| acc.or(c))
    }

    fn combine(self, op: LogicalOp, other: Condition) -> Condition {
        match (self.0, other.0) {
            (Some(left), Some(right)) => Condition(Some(Expr::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })),
            (Some(expr), None) | (None, Some(expr)) => Condition(Some(expr)),
            (None, None) => Condition(None),
        }
    }
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Condition(Some(expr))
    }
}

impl From<Option<Expr>> for Condition {
    fn from(expr: Option<Expr>) -> Self {
        Condition(expr)
    }
}

impl From<Option<Condition>> for Condition {
    fn from(condition: Option<Condition>) -> Self {
        condition.unwrap_or_default()
    }
}

impl From<&Condition> for Condition {
    fn from(condition: &Condition) -> Self {
        condition.clone()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(expr) => write!(f, "{}", expr),
            None => write!(f, "<always>"),
        }
    }
}

/// Accumulating condition builder.
///
/// Starts empty (always true). Each call combines the supplied condition with
/// what has been accumulated so far; absent conditions are no-op appends.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    current: Condition,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, condition: impl Into<Condition>) -> &mut Self {
        let current = std::mem::take(&mut self.current);
        self.current = current.and(condition);
        self
    }

    pub fn or(&mut self, condition: impl Into<Condition>) -> &mut Self {
        let current = std::mem::take(&mut self.current);
        self.current = current.or(condition);
        self
    }

    pub fn and_not(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.and(condition.into().not())
    }

    /// Whether anything has been accumulated.
    pub fn has_value(&self) -> bool {
        self.current.is_present()
    }

    pub fn build(&self) -> Condition {
        self.current.clone()
    }
}

impl From<ConditionBuilder> for Condition {
    fn from(builder: ConditionBuilder) -> Self {
        builder.current
    }
}

impl From<&ConditionBuilder> for Condition {
    fn from(builder: &ConditionBuilder) -> Self {
        builder.build()
    }
}

/// A value object of optional filter fields that composes into one condition.
///
/// Unset fields must contribute nothing: an all-unset search condition builds
/// the absent condition.
pub trait SearchCondition {
    fn build_condition(&self) -> Condition;
}

impl SearchCondition for Condition {
    fn build_condition(&self) -> Condition {
        self.clone()
    }
}
