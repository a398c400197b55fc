/// Query executor
///
/// Executes physical plans over in-memory entity rows. Comparisons follow
/// three-valued logic: a predicate over a null is unknown, and only rows whose
/// filter is known to be true survive.
use super::ast::*;
use super::planner::{PhysicalOperator, PhysicalPlan, Planner};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::schema::Schema;
use crate::value::{CompareOp, Value, ValueKind};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Stored rows keyed by entity name; values follow the entity's field order
pub type TableData = HashMap<String, Vec<Vec<Value>>>;

/// Right-hand row count at which joins on a relation switch to hashing
const HASH_JOIN_THRESHOLD: usize = 100;

/// Column of an intermediate relation: entity alias and field name
#[derive(Debug, Clone, PartialEq)]
struct Slot {
    path: String,
    name: String,
}

/// Intermediate joined rows
#[derive(Debug, Clone)]
struct Relation {
    layout: Vec<Slot>,
    rows: Vec<Vec<Value>>,
}

/// Rows partitioned into groups; every row is its own group in plain queries
#[derive(Debug, Clone)]
struct Grouped {
    layout: Vec<Slot>,
    groups: Vec<Vec<Vec<Value>>>,
}

/// Query execution context
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub schema: &'a Schema,
    pub tables: &'a TableData,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a new execution context
    pub fn new(schema: &'a Schema, tables: &'a TableData) -> Self {
        Self { schema, tables }
    }
}

/// Query executor
pub struct Executor<'a> {
    context: ExecutionContext<'a>,
}

impl<'a> Executor<'a> {
    /// Create new executor
    pub fn new(context: ExecutionContext<'a>) -> Self {
        Self { context }
    }

    /// Bind subqueries, plan and execute a query description.
    pub fn run(&self, query: &Query) -> Result<Vec<Row>> {
        let bound = self.bind_query(query)?;
        let plan = Planner::new().plan(&bound)?;
        debug!(plan = %plan, "executing plan");
        self.execute(&plan)
    }

    /// Execute a physical plan
    pub fn execute(&self, plan: &PhysicalPlan) -> Result<Vec<Row>> {
        match &plan.root {
            PhysicalOperator::Project { input, items } => {
                let grouped = self.execute_groups(input)?;
                self.project(&grouped, items)
            }
            other => {
                let grouped = self.execute_groups(other)?;
                self.project(&grouped, &[])
            }
        }
    }

    /// Indices of the rows of `update.entity` matched by its filter.
    pub fn matching_rows(&self, update: &Update) -> Result<Vec<usize>> {
        let filter = update
            .filter
            .as_ref()
            .map(|expr| self.bind_expr(expr))
            .transpose()?;
        let relation = self.scan(&update.entity)?;

        let mut matched = Vec::new();
        for (index, row) in relation.rows.iter().enumerate() {
            let keep = match filter {
                Some(ref expr) => self.condition(&relation.layout, std::slice::from_ref(row), expr)?,
                None => Some(true),
            };
            if keep == Some(true) {
                matched.push(index);
            }
        }
        Ok(matched)
    }

    // Subquery binding: uncorrelated subqueries run once, before planning

    fn bind_query(&self, query: &Query) -> Result<Query> {
        let mut bound = query.clone();
        for item in &mut bound.select {
            item.expr = self.bind_value(&item.expr)?;
        }
        for join in &mut bound.joins {
            if let Some(ref on) = join.on {
                join.on = Some(self.bind_expr(on)?);
            }
        }
        if let Some(ref filter) = query.filter {
            bound.filter = Some(self.bind_expr(filter)?);
        }
        for key in &mut bound.group_by {
            *key = self.bind_value(key)?;
        }
        if let Some(ref having) = query.having {
            bound.having = Some(self.bind_expr(having)?);
        }
        for spec in &mut bound.order_by {
            spec.expr = self.bind_value(&spec.expr)?;
        }
        Ok(bound)
    }

    fn bind_expr(&self, expr: &Expr) -> Result<Expr> {
        Ok(match expr {
            Expr::Compare { left, op, right } => Expr::Compare {
                left: self.bind_value(left)?,
                op: *op,
                right: self.bind_value(right)?,
            },
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.bind_expr(left)?),
                op: *op,
                right: Box::new(self.bind_expr(right)?),
            },
            Expr::Not(inner) => Expr::Not(Box::new(self.bind_expr(inner)?)),
            Expr::Text { expr, mode, needle } => Expr::Text {
                expr: self.bind_value(expr)?,
                mode: *mode,
                needle: needle.clone(),
            },
            Expr::In { expr, values } => Expr::In {
                expr: self.bind_value(expr)?,
                values: values.clone(),
            },
            Expr::InSubquery { expr, subquery } => {
                let rows = self.run(subquery)?;
                let values = rows
                    .into_iter()
                    .map(single_column)
                    .collect::<Result<Vec<_>>>()?;
                trace!(values = values.len(), "bound in-subquery");
                Expr::In {
                    expr: self.bind_value(expr)?,
                    values,
                }
            }
            Expr::Between { expr, low, high } => Expr::Between {
                expr: self.bind_value(expr)?,
                low: self.bind_value(low)?,
                high: self.bind_value(high)?,
            },
            Expr::IsNull(expr) => Expr::IsNull(self.bind_value(expr)?),
            Expr::IsNotNull(expr) => Expr::IsNotNull(self.bind_value(expr)?),
        })
    }

    fn bind_value(&self, expr: &ValueExpr) -> Result<ValueExpr> {
        Ok(match expr {
            ValueExpr::Subquery(query) => {
                let mut rows = self.run(query)?;
                match rows.len() {
                    0 => ValueExpr::Literal(Value::Null),
                    1 => ValueExpr::Literal(single_column(rows.remove(0))?),
                    found => return Err(Error::AmbiguousResult { found }),
                }
            }
            ValueExpr::Aggregate { function, arg } => ValueExpr::Aggregate {
                function: *function,
                arg: match arg {
                    Some(arg) => Some(Box::new(self.bind_value(arg)?)),
                    None => None,
                },
            },
            ValueExpr::Concat(parts) => ValueExpr::Concat(
                parts
                    .iter()
                    .map(|p| self.bind_value(p))
                    .collect::<Result<_>>()?,
            ),
            ValueExpr::StringValue(inner) => {
                ValueExpr::StringValue(Box::new(self.bind_value(inner)?))
            }
            ValueExpr::Column(_) | ValueExpr::Literal(_) => expr.clone(),
        })
    }

    // Relational operators

    fn execute_relation(&self, op: &PhysicalOperator) -> Result<Relation> {
        match op {
            PhysicalOperator::Scan { path } => self.scan(path),
            PhysicalOperator::Join {
                left,
                right,
                kind,
                relation,
                on,
            } => self.execute_join(left, right, *kind, relation.as_ref(), on.as_ref()),
            PhysicalOperator::Filter { input, condition } => self.execute_filter(input, condition),
            other => Err(Error::InvalidQuery(format!(
                "operator `{}` does not produce rows",
                other
            ))),
        }
    }

    fn scan(&self, path: &EntityPath) -> Result<Relation> {
        let meta = self.context.schema.entity(&path.entity)?;
        let layout = meta
            .fields()
            .iter()
            .map(|field| Slot {
                path: path.alias.to_string(),
                name: field.name.clone(),
            })
            .collect();
        let rows = self
            .context
            .tables
            .get(meta.name())
            .cloned()
            .unwrap_or_default();
        Ok(Relation { layout, rows })
    }

    fn execute_filter(&self, input: &PhysicalOperator, condition: &Expr) -> Result<Relation> {
        let relation = self.execute_relation(input)?;

        let mut rows = Vec::with_capacity(relation.rows.len());
        for row in relation.rows {
            if self.condition(&relation.layout, std::slice::from_ref(&row), condition)? == Some(true)
            {
                rows.push(row);
            }
        }

        Ok(Relation {
            layout: relation.layout,
            rows,
        })
    }

    fn execute_join(
        &self,
        left: &PhysicalOperator,
        right: &PhysicalOperator,
        kind: JoinKind,
        relation: Option<&JoinRelation>,
        on: Option<&Expr>,
    ) -> Result<Relation> {
        let left = self.execute_relation(left)?;
        let right = self.execute_relation(right)?;

        let mut layout = left.layout.clone();
        layout.extend(right.layout.iter().cloned());

        let keys = match relation {
            Some(relation) => Some((
                lookup(&left.layout, &relation.local)?,
                lookup(&right.layout, &relation.foreign)?,
            )),
            None => None,
        };

        // Choose join algorithm based on dataset size
        let rows = match keys {
            Some(keys) if right.rows.len() >= HASH_JOIN_THRESHOLD => {
                trace!(right = right.rows.len(), "hash join");
                self.hash_join(&layout, &left, &right, kind, keys, on)?
            }
            _ => {
                trace!(right = right.rows.len(), "nested loop join");
                self.nested_loop_join(&layout, &left, &right, kind, keys, on)?
            }
        };

        Ok(Relation { layout, rows })
    }

    /// Nested loop join - simple but works for small datasets
    fn nested_loop_join(
        &self,
        layout: &[Slot],
        left: &Relation,
        right: &Relation,
        kind: JoinKind,
        keys: Option<(usize, usize)>,
        on: Option<&Expr>,
    ) -> Result<Vec<Vec<Value>>> {
        let mut result = Vec::new();

        for l_row in &left.rows {
            let mut matched = false;
            for r_row in &right.rows {
                if let Some((local, foreign)) = keys {
                    if l_row[local].compare(&r_row[foreign], CompareOp::Eq) != Some(true) {
                        continue;
                    }
                }
                let merged = [merge_rows(l_row, r_row)];
                if self.join_predicate(layout, &merged, on)? {
                    result.extend(merged);
                    matched = true;
                }
            }
            if !matched && kind == JoinKind::Left {
                result.push(merge_rows_with_null(l_row, right.layout.len()));
            }
        }

        Ok(result)
    }

    /// Hash join on the relation keys - efficient for larger datasets
    fn hash_join(
        &self,
        layout: &[Slot],
        left: &Relation,
        right: &Relation,
        kind: JoinKind,
        (local, foreign): (usize, usize),
        on: Option<&Expr>,
    ) -> Result<Vec<Vec<Value>>> {
        // Build hash table from right side (build phase)
        let mut hash_table: HashMap<Vec<u8>, Vec<&Vec<Value>>> = HashMap::new();
        for r_row in &right.rows {
            if !joinable(&r_row[foreign]) {
                continue;
            }
            hash_table
                .entry(r_row[foreign].to_key_bytes())
                .or_default()
                .push(r_row);
        }

        let mut result = Vec::new();
        for l_row in &left.rows {
            let mut matched = false;
            if joinable(&l_row[local]) {
                if let Some(candidates) = hash_table.get(&l_row[local].to_key_bytes()) {
                    for r_row in candidates {
                        let merged = [merge_rows(l_row, r_row)];
                        if self.join_predicate(layout, &merged, on)? {
                            result.extend(merged);
                            matched = true;
                        }
                    }
                }
            }
            if !matched && kind == JoinKind::Left {
                result.push(merge_rows_with_null(l_row, right.layout.len()));
            }
        }

        Ok(result)
    }

    fn join_predicate(&self, layout: &[Slot], row: &[Vec<Value>], on: Option<&Expr>) -> Result<bool> {
        match on {
            Some(expr) => Ok(self.condition(layout, row, expr)? == Some(true)),
            None => Ok(true),
        }
    }

    // Group operators

    fn execute_groups(&self, op: &PhysicalOperator) -> Result<Grouped> {
        match op {
            PhysicalOperator::GroupBy {
                input,
                keys,
                having,
            } => {
                let relation = self.execute_relation(input)?;
                let grouped = self.group_by(relation, keys)?;
                self.apply_having(grouped, having.as_ref())
            }
            PhysicalOperator::Aggregate { input, having } => {
                let relation = self.execute_relation(input)?;
                let grouped = Grouped {
                    layout: relation.layout,
                    groups: vec![relation.rows],
                };
                self.apply_having(grouped, having.as_ref())
            }
            PhysicalOperator::Sort { input, keys } => {
                let grouped = self.execute_groups(input)?;
                self.sort(grouped, keys)
            }
            PhysicalOperator::Limit {
                input,
                offset,
                count,
            } => {
                let mut grouped = self.execute_groups(input)?;
                grouped.groups = grouped
                    .groups
                    .into_iter()
                    .skip(*offset)
                    .take(count.unwrap_or(usize::MAX))
                    .collect();
                Ok(grouped)
            }
            PhysicalOperator::Project { .. } => Err(Error::InvalidQuery(
                "projection must be the root of a plan".to_string(),
            )),
            relational => {
                let relation = self.execute_relation(relational)?;
                Ok(Grouped {
                    layout: relation.layout,
                    groups: relation.rows.into_iter().map(|row| vec![row]).collect(),
                })
            }
        }
    }

    fn group_by(&self, relation: Relation, keys: &[ValueExpr]) -> Result<Grouped> {
        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut groups: Vec<Vec<Vec<Value>>> = Vec::new();

        for row in relation.rows {
            let mut key = Vec::new();
            for expr in keys {
                let value = self.value(&relation.layout, std::slice::from_ref(&row), expr)?;
                let bytes = value.to_key_bytes();
                key.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                key.extend_from_slice(&bytes);
            }
            match index.get(&key) {
                Some(&slot) => groups[slot].push(row),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![row]);
                }
            }
        }

        trace!(groups = groups.len(), "grouped rows");
        Ok(Grouped {
            layout: relation.layout,
            groups,
        })
    }

    fn apply_having(&self, grouped: Grouped, having: Option<&Expr>) -> Result<Grouped> {
        let Some(having) = having else {
            return Ok(grouped);
        };
        let mut groups = Vec::with_capacity(grouped.groups.len());
        for group in grouped.groups {
            if self.condition(&grouped.layout, &group, having)? == Some(true) {
                groups.push(group);
            }
        }
        Ok(Grouped {
            layout: grouped.layout,
            groups,
        })
    }

    fn sort(&self, grouped: Grouped, keys: &[OrderSpec]) -> Result<Grouped> {
        let mut keyed = Vec::with_capacity(grouped.groups.len());
        for group in grouped.groups {
            let values = keys
                .iter()
                .map(|spec| self.value(&grouped.layout, &group, &spec.expr))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((values, group));
        }

        // stable: ties keep scan order
        keyed.sort_by(|(a, _), (b, _)| {
            for (spec, (a, b)) in keys.iter().zip(a.iter().zip(b.iter())) {
                let ordering = compare_sort_keys(a, b, spec);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(Grouped {
            layout: grouped.layout,
            groups: keyed.into_iter().map(|(_, group)| group).collect(),
        })
    }

    fn project(&self, grouped: &Grouped, items: &[SelectItem]) -> Result<Vec<Row>> {
        if items.is_empty() {
            let labels: Vec<String> = grouped
                .layout
                .iter()
                .map(|slot| format!("{}.{}", slot.path, slot.name))
                .collect();
            return Ok(grouped
                .groups
                .iter()
                .filter_map(|group| group.first())
                .map(|row| Row::new(labels.clone(), row.clone()))
                .collect());
        }

        let labels: Vec<String> = items.iter().map(SelectItem::label).collect();
        grouped
            .groups
            .iter()
            .map(|group| {
                let values = items
                    .iter()
                    .map(|item| self.value(&grouped.layout, group, &item.expr))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Row::new(labels.clone(), values))
            })
            .collect()
    }

    // Expression evaluation over a group of rows; scalar expressions read the
    // first row, aggregates fold over all of them.

    fn condition(&self, layout: &[Slot], group: &[Vec<Value>], expr: &Expr) -> Result<Option<bool>> {
        Ok(match expr {
            Expr::Compare { left, op, right } => {
                let left = self.value(layout, group, left)?;
                let right = self.value(layout, group, right)?;
                left.compare(&right, *op)
            }
            Expr::Logical { left, op, right } => {
                let left = self.condition(layout, group, left)?;
                let right = self.condition(layout, group, right)?;
                match op {
                    LogicalOp::And => match (left, right) {
                        (Some(false), _) | (_, Some(false)) => Some(false),
                        (Some(true), Some(true)) => Some(true),
                        _ => None,
                    },
                    LogicalOp::Or => match (left, right) {
                        (Some(true), _) | (_, Some(true)) => Some(true),
                        (Some(false), Some(false)) => Some(false),
                        _ => None,
                    },
                }
            }
            Expr::Not(inner) => self.condition(layout, group, inner)?.map(|b| !b),
            Expr::Text { expr, mode, needle } => match self.value(layout, group, expr)? {
                Value::String(s) => Some(match mode {
                    TextMatch::Contains => s.contains(needle.as_str()),
                    TextMatch::StartsWith => s.starts_with(needle.as_str()),
                    TextMatch::EndsWith => s.ends_with(needle.as_str()),
                }),
                _ => None,
            },
            Expr::In { expr, values } => {
                let value = self.value(layout, group, expr)?;
                if value.is_null() {
                    None
                } else if values
                    .iter()
                    .any(|v| value.compare(v, CompareOp::Eq) == Some(true))
                {
                    Some(true)
                } else if values.iter().any(Value::is_null) {
                    None
                } else {
                    Some(false)
                }
            }
            Expr::InSubquery { .. } => {
                return Err(Error::InvalidQuery(
                    "subquery reached the executor unbound".to_string(),
                ))
            }
            Expr::Between { expr, low, high } => {
                let value = self.value(layout, group, expr)?;
                let low = value.compare(&self.value(layout, group, low)?, CompareOp::Ge);
                let high = value.compare(&self.value(layout, group, high)?, CompareOp::Le);
                match (low, high) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
            Expr::IsNull(expr) => Some(self.value(layout, group, expr)?.is_null()),
            Expr::IsNotNull(expr) => Some(!self.value(layout, group, expr)?.is_null()),
        })
    }

    fn value(&self, layout: &[Slot], group: &[Vec<Value>], expr: &ValueExpr) -> Result<Value> {
        match expr {
            ValueExpr::Column(field) => {
                let index = lookup(layout, field)?;
                Ok(group
                    .first()
                    .map_or(Value::Null, |row| row[index].clone()))
            }
            ValueExpr::Literal(value) => Ok(value.clone()),
            ValueExpr::Subquery(_) => Err(Error::InvalidQuery(
                "subquery reached the executor unbound".to_string(),
            )),
            ValueExpr::Aggregate { function, arg } => {
                self.aggregate(layout, group, *function, arg.as_deref())
            }
            ValueExpr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    match self.value(layout, group, part)? {
                        Value::Null => return Ok(Value::Null),
                        value => out.push_str(&value.to_string()),
                    }
                }
                Ok(Value::String(out))
            }
            ValueExpr::StringValue(inner) => Ok(match self.value(layout, group, inner)? {
                Value::Null => Value::Null,
                value => Value::String(value.to_string()),
            }),
        }
    }

    fn aggregate(
        &self,
        layout: &[Slot],
        group: &[Vec<Value>],
        function: AggregateFunction,
        arg: Option<&ValueExpr>,
    ) -> Result<Value> {
        let Some(arg) = arg else {
            return Ok(Value::Integer(group.len() as i64));
        };

        // nulls never take part in an aggregate
        let mut values = Vec::with_capacity(group.len());
        for row in group {
            let value = self.value(layout, std::slice::from_ref(row), arg)?;
            if !value.is_null() {
                values.push(value);
            }
        }

        match function {
            AggregateFunction::Count => Ok(Value::Integer(values.len() as i64)),
            _ if values.is_empty() => Ok(Value::Null),
            AggregateFunction::Sum => sum(&values),
            AggregateFunction::Avg => {
                let mut total = 0.0;
                for value in &values {
                    total += numeric(value)?;
                }
                Ok(Value::Float(total / values.len() as f64))
            }
            AggregateFunction::Min => Ok(values
                .into_iter()
                .min_by(|a, b| a.sort_cmp(b))
                .unwrap_or(Value::Null)),
            AggregateFunction::Max => Ok(values
                .into_iter()
                .max_by(|a, b| a.sort_cmp(b))
                .unwrap_or(Value::Null)),
        }
    }
}

/// Assignment check shared by validation and execution of bulk updates.
pub fn coerce_assignment(kind: ValueKind, nullable: bool, value: &Value) -> Option<Value> {
    match (kind, value) {
        (_, Value::Null) if nullable => Some(Value::Null),
        (ValueKind::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
        (kind, value) if value.kind() == Some(kind) => Some(value.clone()),
        _ => None,
    }
}

// null and NaN keys never equal anything, themselves included
fn joinable(key: &Value) -> bool {
    key.compare(key, CompareOp::Eq) == Some(true)
}

fn lookup(layout: &[Slot], field: &FieldRef) -> Result<usize> {
    layout
        .iter()
        .position(|slot| slot.path == field.path && slot.name == field.name)
        .ok_or_else(|| Error::UnresolvedField {
            path: field.path.to_string(),
            field: field.name.to_string(),
        })
}

fn single_column(row: Row) -> Result<Value> {
    let (labels, mut values) = row.into_parts();
    if values.len() != 1 {
        return Err(Error::ShapeMismatch(format!(
            "subquery must select exactly one column, found {}",
            labels.len()
        )));
    }
    Ok(values.remove(0))
}

fn numeric(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::InvalidQuery(format!("cannot aggregate non-numeric value `{}`", value)))
}

fn sum(values: &[Value]) -> Result<Value> {
    if values.iter().all(|v| matches!(v, Value::Integer(_))) {
        let mut total: i64 = 0;
        for value in values {
            if let Value::Integer(i) = value {
                total = total
                    .checked_add(*i)
                    .ok_or_else(|| Error::InvalidQuery("integer overflow in sum".to_string()))?;
            }
        }
        return Ok(Value::Integer(total));
    }
    let mut total = 0.0;
    for value in values {
        total += numeric(value)?;
    }
    Ok(Value::Float(total))
}

/// Null placement: by default nulls sort as larger than any value, so they
/// come last ascending and first descending. Explicit placement ignores the
/// direction.
fn compare_sort_keys(a: &Value, b: &Value, spec: &OrderSpec) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) | (false, true) => {
            let null_larger = if a.is_null() {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            match spec.nulls {
                NullOrdering::Last => null_larger,
                NullOrdering::First => null_larger.reverse(),
                NullOrdering::Default => match spec.direction {
                    Direction::Asc => null_larger,
                    Direction::Desc => null_larger.reverse(),
                },
            }
        }
        (false, false) => {
            let ordering = a.sort_cmp(b);
            match spec.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        }
    }
}

/// Merge two rows into one
fn merge_rows(left: &[Value], right: &[Value]) -> Vec<Value> {
    let mut values = Vec::with_capacity(left.len() + right.len());
    values.extend_from_slice(left);
    values.extend_from_slice(right);
    values
}

/// Merge left row with NULL values for right side
fn merge_rows_with_null(left: &[Value], right_col_count: usize) -> Vec<Value> {
    let mut values = left.to_vec();
    values.resize(left.len() + right_col_count, Value::Null);
    values
}
