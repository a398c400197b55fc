//! Query description types
//!
//! A `Query` is the structured, store-independent description handed to a
//! `DataSource`: selected items, base entity, joins, filter, grouping,
//! ordering and pagination. `Update` describes a bulk assignment.

use crate::value::{CompareOp, Value};
use std::borrow::Cow;
use std::fmt;

/// A field addressed through an entity path (alias)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub path: Cow<'static, str>,
    pub name: Cow<'static, str>,
}

impl FieldRef {
    pub const fn new(path: &'static str, name: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            name: Cow::Borrowed(name),
        }
    }

    /// Same field addressed through another alias.
    pub fn rooted_at(&self, path: &EntityPath) -> Self {
        Self {
            path: path.alias.clone(),
            name: self.name.clone(),
        }
    }
}

/// An entity appearing in a query under an alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityPath {
    pub entity: Cow<'static, str>,
    pub alias: Cow<'static, str>,
}

impl EntityPath {
    /// Entity addressed by its own name.
    pub const fn new(entity: &'static str) -> Self {
        Self {
            entity: Cow::Borrowed(entity),
            alias: Cow::Borrowed(entity),
        }
    }

    /// The same entity under another alias (self joins, subqueries).
    pub fn aliased(&self, alias: impl Into<Cow<'static, str>>) -> Self {
        Self {
            entity: self.entity.clone(),
            alias: alias.into(),
        }
    }
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Kinds of string matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
}

/// Value-producing expression: columns, literals, aggregates
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Column(FieldRef),
    Literal(Value),
    /// Scalar subquery; must yield at most one row with one column
    Subquery(Box<Query>),
    /// `arg` of `None` means `COUNT(*)`
    Aggregate {
        function: AggregateFunction,
        arg: Option<Box<ValueExpr>>,
    },
    Concat(Vec<ValueExpr>),
    /// String rendering of a value
    StringValue(Box<ValueExpr>),
}

impl ValueExpr {
    pub fn contains_aggregate(&self) -> bool {
        match self {
            ValueExpr::Aggregate { .. } => true,
            ValueExpr::Concat(parts) => parts.iter().any(ValueExpr::contains_aggregate),
            ValueExpr::StringValue(inner) => inner.contains_aggregate(),
            ValueExpr::Column(_) | ValueExpr::Literal(_) | ValueExpr::Subquery(_) => false,
        }
    }
}

/// Boolean expression used by filters, join-time predicates and `having`
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        left: ValueExpr,
        op: CompareOp,
        right: ValueExpr,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Text {
        expr: ValueExpr,
        mode: TextMatch,
        needle: String,
    },
    In {
        expr: ValueExpr,
        values: Vec<Value>,
    },
    InSubquery {
        expr: ValueExpr,
        subquery: Box<Query>,
    },
    /// Inclusive on both ends
    Between {
        expr: ValueExpr,
        low: ValueExpr,
        high: ValueExpr,
    },
    IsNull(ValueExpr),
    IsNotNull(ValueExpr),
}

impl Expr {
    pub fn and(self, other: Expr) -> Expr {
        Expr::Logical {
            left: Box::new(self),
            op: LogicalOp::And,
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Logical {
            left: Box::new(self),
            op: LogicalOp::Or,
            right: Box::new(other),
        }
    }

    /// Value expressions this condition reads, nested conditions included.
    pub fn operands(&self) -> Vec<&ValueExpr> {
        let mut out = Vec::new();
        self.collect_operands(&mut out);
        out
    }

    fn collect_operands<'a>(&'a self, out: &mut Vec<&'a ValueExpr>) {
        match self {
            Expr::Compare { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Expr::Logical { left, right, .. } => {
                left.collect_operands(out);
                right.collect_operands(out);
            }
            Expr::Not(inner) => inner.collect_operands(out),
            Expr::Text { expr, .. }
            | Expr::In { expr, .. }
            | Expr::InSubquery { expr, .. }
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr) => out.push(expr),
            Expr::Between { expr, low, high } => {
                out.push(expr);
                out.push(low);
                out.push(high);
            }
        }
    }

    /// Number of leaf predicates.
    pub fn leaf_count(&self) -> usize {
        match self {
            Expr::Logical { left, right, .. } => left.leaf_count() + right.leaf_count(),
            Expr::Not(inner) => inner.leaf_count(),
            _ => 1,
        }
    }
}

/// An item in the select list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: ValueExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: ValueExpr) -> Self {
        Self { expr, alias: None }
    }

    /// Label of the output column: alias, otherwise the rendered expression.
    pub fn label(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expr.to_string(),
        }
    }

    /// Attribute name used by property-assignment projections: alias, then
    /// the bare field name, then the rendered expression.
    pub fn attribute_name(&self) -> String {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => alias.clone(),
            (None, ValueExpr::Column(field)) => field.name.to_string(),
            (None, expr) => expr.to_string(),
        }
    }
}

/// Types of joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// Equality between a reference attribute and the target's key
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRelation {
    pub local: FieldRef,
    pub foreign: FieldRef,
}

/// JOIN clause
///
/// `on` is the join-time predicate: for a left join it only decides which
/// joined rows attach, never which base rows survive. The overall filter
/// lives in `Query::filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub target: EntityPath,
    pub relation: Option<JoinRelation>,
    pub on: Option<Expr>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Placement of nulls in a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrdering {
    /// Nulls sort as larger than any value: last ascending, first descending
    #[default]
    Default,
    First,
    Last,
}

/// An ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub expr: ValueExpr,
    pub direction: Direction,
    pub nulls: NullOrdering,
}

impl OrderSpec {
    pub fn asc(expr: ValueExpr) -> Self {
        Self {
            expr,
            direction: Direction::Asc,
            nulls: NullOrdering::Default,
        }
    }

    pub fn desc(expr: ValueExpr) -> Self {
        Self {
            expr,
            direction: Direction::Desc,
            nulls: NullOrdering::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrdering::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrdering::Last;
        self
    }
}

/// A complete query description
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: Vec<SelectItem>,
    pub from: EntityPath,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<ValueExpr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderSpec>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    /// An empty description over `from`.
    pub fn new(from: EntityPath) -> Self {
        Self {
            select: Vec::new(),
            from,
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    pub fn select(mut self, items: impl IntoIterator<Item = SelectItem>) -> Self {
        self.select.extend(items);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// ANDs `expr` into the filter.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(current) => current.and(expr),
            None => expr,
        });
        self
    }

    pub fn group_by(mut self, keys: impl IntoIterator<Item = ValueExpr>) -> Self {
        self.group_by.extend(keys);
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(match self.having.take() {
            Some(current) => current.and(expr),
            None => expr,
        });
        self
    }

    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order_by.push(spec);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || self.select.iter().any(|i| i.expr.contains_aggregate())
    }

    /// Counting query over the same base, joins and filter, without ordering
    /// or pagination. Only meaningful for ungrouped queries.
    pub fn count_query(&self) -> Query {
        Query {
            select: vec![SelectItem::new(ValueExpr::Aggregate {
                function: AggregateFunction::Count,
                arg: None,
            })],
            from: self.from.clone(),
            joins: self.joins.clone(),
            filter: self.filter.clone(),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }
}

/// A single `field = value` assignment of a bulk update
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: FieldRef,
    pub value: Value,
}

/// A bulk update description
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub entity: EntityPath,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expr>,
}

// Display implementations for logging and error messages

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.path, self.name)
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity == self.alias {
            write!(f, "{}", self.entity)
        } else {
            write!(f, "{} {}", self.entity, self.alias)
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "count"),
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Avg => write!(f, "avg"),
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "{}", other),
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Column(field) => write!(f, "{}", field),
            ValueExpr::Literal(value) => write_literal(f, value),
            ValueExpr::Subquery(query) => write!(f, "({})", query),
            ValueExpr::Aggregate { function, arg } => match arg {
                Some(arg) => write!(f, "{}({})", function, arg),
                None => write!(f, "{}(*)", function),
            },
            ValueExpr::Concat(parts) => {
                write!(f, "concat(")?;
                write_list(f, parts)?;
                write!(f, ")")
            }
            ValueExpr::StringValue(inner) => write!(f, "str({})", inner),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Logical { left, op, right } => {
                let op = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                write!(f, "({} {} {})", left, op, right)
            }
            Expr::Not(inner) => write!(f, "not ({})", inner),
            Expr::Text { expr, mode, needle } => match mode {
                TextMatch::Contains => write!(f, "{} like '%{}%'", expr, needle),
                TextMatch::StartsWith => write!(f, "{} like '{}%'", expr, needle),
                TextMatch::EndsWith => write!(f, "{} like '%{}'", expr, needle),
            },
            Expr::In { expr, values } => {
                write!(f, "{} in (", expr)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_literal(f, value)?;
                }
                write!(f, ")")
            }
            Expr::InSubquery { expr, subquery } => write!(f, "{} in ({})", expr, subquery),
            Expr::Between { expr, low, high } => {
                write!(f, "{} between {} and {}", expr, low, high)
            }
            Expr::IsNull(expr) => write!(f, "{} is null", expr),
            Expr::IsNotNull(expr) => write!(f, "{} is not null", expr),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(ref alias) = self.alias {
            write!(f, " as {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            JoinKind::Inner => "inner join",
            JoinKind::Left => "left join",
        };
        write!(f, "{} {}", kind, self.target)?;
        let mut keyword = "on";
        if let Some(ref relation) = self.relation {
            write!(f, " on {} = {}", relation.local, relation.foreign)?;
            keyword = "and";
        }
        if let Some(ref on) = self.on {
            write!(f, " {} {}", keyword, on)?;
        }
        Ok(())
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{} {}", self.expr, direction)?;
        match self.nulls {
            NullOrdering::Default => Ok(()),
            NullOrdering::First => write!(f, " nulls first"),
            NullOrdering::Last => write!(f, " nulls last"),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select ")?;
        if self.select.is_empty() {
            write!(f, "*")?;
        } else {
            write_list(f, &self.select)?;
        }
        write!(f, " from {}", self.from)?;
        for join in &self.joins {
            write!(f, " {}", join)?;
        }
        if let Some(ref filter) = self.filter {
            write!(f, " where {}", filter)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " group by ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(ref having) = self.having {
            write!(f, " having {}", having)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " order by ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " offset {}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "update {} set ", self.entity)?;
        for (i, assignment) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = ", assignment.field)?;
            write_literal(f, &assignment.value)?;
        }
        if let Some(ref filter) = self.filter {
            write!(f, " where {}", filter)?;
        }
        Ok(())
    }
}
