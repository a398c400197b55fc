/// Query planner
///
/// Converts a query description into a tree of physical operators for the
/// in-memory executor.
use super::ast::*;
use crate::error::{Error, Result};
use std::fmt;

/// Physical query plan
#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    pub root: PhysicalOperator,
}

/// Physical operators for query execution
#[derive(Debug, Clone)]
pub enum PhysicalOperator {
    /// Full scan of an entity's rows
    Scan { path: EntityPath },
    /// Join on the reference relation and/or a join-time predicate
    Join {
        left: Box<PhysicalOperator>,
        right: Box<PhysicalOperator>,
        kind: JoinKind,
        relation: Option<JoinRelation>,
        on: Option<Expr>,
    },
    /// Filter rows based on predicate
    Filter {
        input: Box<PhysicalOperator>,
        condition: Expr,
    },
    /// Partition rows by key, then filter groups by `having`
    GroupBy {
        input: Box<PhysicalOperator>,
        keys: Vec<ValueExpr>,
        having: Option<Expr>,
    },
    /// Collapse all rows into a single group
    Aggregate {
        input: Box<PhysicalOperator>,
        having: Option<Expr>,
    },
    /// Sort rows (or groups)
    Sort {
        input: Box<PhysicalOperator>,
        keys: Vec<OrderSpec>,
    },
    /// Skip `offset` and keep at most `count`
    Limit {
        input: Box<PhysicalOperator>,
        offset: usize,
        count: Option<usize>,
    },
    /// Evaluate the select list
    Project {
        input: Box<PhysicalOperator>,
        items: Vec<SelectItem>,
    },
}

/// Query planner
#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    /// Create a new planner
    pub fn new() -> Self {
        Self
    }

    /// Plan a query
    ///
    /// Scalar and `in` subqueries must already be bound to literals.
    pub fn plan(&self, query: &Query) -> Result<PhysicalPlan> {
        let mut plan = self.plan_entity_access(query);

        if let Some(ref filter) = query.filter {
            plan = PhysicalOperator::Filter {
                input: Box::new(plan),
                condition: filter.clone(),
            };
        }

        let mut order_by = query.order_by.clone();

        if !query.group_by.is_empty() {
            self.check_grouped(query)?;
            plan = PhysicalOperator::GroupBy {
                input: Box::new(plan),
                keys: query.group_by.clone(),
                having: query.having.clone(),
            };
            // groups come out in key order unless asked otherwise
            if order_by.is_empty() {
                order_by = query.group_by.iter().cloned().map(OrderSpec::asc).collect();
            }
        } else if query.is_aggregate() || query.having.is_some() {
            self.check_grouped(query)?;
            plan = PhysicalOperator::Aggregate {
                input: Box::new(plan),
                having: query.having.clone(),
            };
        }

        if !order_by.is_empty() {
            plan = PhysicalOperator::Sort {
                input: Box::new(plan),
                keys: order_by,
            };
        }

        if query.offset.is_some() || query.limit.is_some() {
            plan = PhysicalOperator::Limit {
                input: Box::new(plan),
                offset: query.offset.unwrap_or(0),
                count: query.limit,
            };
        }

        plan = PhysicalOperator::Project {
            input: Box::new(plan),
            items: query.select.clone(),
        };

        Ok(PhysicalPlan { root: plan })
    }

    fn plan_entity_access(&self, query: &Query) -> PhysicalOperator {
        let mut plan = PhysicalOperator::Scan {
            path: query.from.clone(),
        };

        for join in &query.joins {
            plan = PhysicalOperator::Join {
                left: Box::new(plan),
                right: Box::new(PhysicalOperator::Scan {
                    path: join.target.clone(),
                }),
                kind: join.kind,
                relation: join.relation.clone(),
                on: join.on.clone(),
            };
        }

        plan
    }

    /// Selected, filtered and ordered expressions of an aggregate query must
    /// be group keys or aggregates, or be built from them.
    fn check_grouped(&self, query: &Query) -> Result<()> {
        for item in &query.select {
            check_grouped_expr(&item.expr, &query.group_by)?;
        }
        if let Some(ref having) = query.having {
            for operand in having.operands() {
                check_grouped_expr(operand, &query.group_by)?;
            }
        }
        for spec in &query.order_by {
            check_grouped_expr(&spec.expr, &query.group_by)?;
        }
        Ok(())
    }
}

fn check_grouped_expr(expr: &ValueExpr, keys: &[ValueExpr]) -> Result<()> {
    if keys.contains(expr) {
        return Ok(());
    }
    match expr {
        ValueExpr::Column(field) => Err(Error::InvalidQuery(format!(
            "`{}` must appear in group by or inside an aggregate",
            field
        ))),
        ValueExpr::Concat(parts) => parts.iter().try_for_each(|p| check_grouped_expr(p, keys)),
        ValueExpr::StringValue(inner) => check_grouped_expr(inner, keys),
        ValueExpr::Literal(_) | ValueExpr::Subquery(_) | ValueExpr::Aggregate { .. } => Ok(()),
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
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

impl fmt::Display for PhysicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalOperator::Scan { path } => write!(f, "Scan({})", path),
            PhysicalOperator::Join {
                left, right, kind, ..
            } => {
                let kind = match kind {
                    JoinKind::Inner => "Inner",
                    JoinKind::Left => "Left",
                };
                write!(f, "{}Join({} x {})", kind, left, right)
            }
            PhysicalOperator::Filter { input, condition } => {
                write!(f, "Filter({}) -> {}", condition, input)
            }
            PhysicalOperator::GroupBy {
                input,
                keys,
                having,
            } => {
                write!(f, "GroupBy(")?;
                write_list(f, keys)?;
                if let Some(h) = having {
                    write!(f, " HAVING {}", h)?;
                }
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::Aggregate { input, having } => {
                write!(f, "Aggregate(")?;
                if let Some(h) = having {
                    write!(f, "HAVING {}", h)?;
                }
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::Sort { input, keys } => {
                write!(f, "Sort(")?;
                write_list(f, keys)?;
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::Limit {
                input,
                offset,
                count,
            } => match count {
                Some(count) => write!(f, "Limit({}, {}) -> {}", count, offset, input),
                None => write!(f, "Limit(all, {}) -> {}", offset, input),
            },
            PhysicalOperator::Project { input, items } => {
                write!(f, "Project(")?;
                write_list(f, items)?;
                write!(f, ") -> {}", input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CompareOp, Value};

    const MEMBER: EntityPath = EntityPath::new("member");
    const AGE: FieldRef = FieldRef::new("member", "age");
    const TEAM_NAME: FieldRef = FieldRef::new("team", "name");

    fn age_column() -> SelectItem {
        SelectItem::new(ValueExpr::Column(AGE))
    }

    #[test]
    fn test_simple_plan() {
        let query = Query::new(MEMBER).select([age_column()]);
        let plan = Planner::new().plan(&query).unwrap();

        // Should have Project -> Scan
        match plan.root {
            PhysicalOperator::Project { input, .. } => match *input {
                PhysicalOperator::Scan { .. } => {}
                _ => panic!("Expected Scan"),
            },
            _ => panic!("Expected Project"),
        }
    }

    #[test]
    fn test_filter_plan() {
        let query = Query::new(MEMBER).select([age_column()]).filter(Expr::Compare {
            left: ValueExpr::Column(AGE),
            op: CompareOp::Gt,
            right: ValueExpr::Literal(Value::Integer(18)),
        });
        let plan = Planner::new().plan(&query).unwrap();

        match plan.root {
            PhysicalOperator::Project { input, .. } => match *input {
                PhysicalOperator::Filter { .. } => {}
                _ => panic!("Expected Filter"),
            },
            _ => panic!("Expected Project"),
        }
    }

    #[test]
    fn test_sort_and_limit_plan() {
        let query = Query::new(MEMBER)
            .select([age_column()])
            .order_by(OrderSpec::desc(ValueExpr::Column(AGE)))
            .offset(1);
        let plan = Planner::new().plan(&query).unwrap();

        assert_eq!(
            plan.to_string(),
            "Project(member.age) -> Limit(all, 1) -> Sort(member.age desc) -> Scan(member)"
        );
    }

    #[test]
    fn test_group_by_orders_by_key() {
        let query = Query::new(MEMBER)
            .select([
                SelectItem::new(ValueExpr::Column(TEAM_NAME)),
                SelectItem::new(ValueExpr::Aggregate {
                    function: AggregateFunction::Avg,
                    arg: Some(Box::new(ValueExpr::Column(AGE))),
                }),
            ])
            .group_by([ValueExpr::Column(TEAM_NAME)]);
        let plan = Planner::new().plan(&query).unwrap();

        let plan_str = plan.to_string();
        assert!(plan_str.contains("Sort(team.name asc) -> GroupBy(team.name)"));
    }

    #[test]
    fn test_ungrouped_column_is_rejected() {
        let query = Query::new(MEMBER)
            .select([
                age_column(),
                SelectItem::new(ValueExpr::Aggregate {
                    function: AggregateFunction::Count,
                    arg: None,
                }),
            ])
            .group_by([ValueExpr::Column(TEAM_NAME)]);

        assert!(matches!(
            Planner::new().plan(&query),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_ungrouped_column_in_having_is_rejected() {
        let count = ValueExpr::Aggregate {
            function: AggregateFunction::Count,
            arg: None,
        };
        let query = Query::new(MEMBER)
            .select([
                SelectItem::new(ValueExpr::Column(TEAM_NAME)),
                SelectItem::new(count.clone()),
            ])
            .group_by([ValueExpr::Column(TEAM_NAME)])
            .having(
                Expr::Compare {
                    left: count,
                    op: CompareOp::Ge,
                    right: ValueExpr::Literal(Value::Integer(1)),
                }
                .and(Expr::Compare {
                    left: ValueExpr::Column(AGE),
                    op: CompareOp::Ge,
                    right: ValueExpr::Literal(Value::Integer(25)),
                }),
            );

        assert!(matches!(
            Planner::new().plan(&query),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_aggregate_without_group_by() {
        let query = Query::new(MEMBER).count_query();
        let plan = Planner::new().plan(&query).unwrap();
        assert_eq!(plan.to_string(), "Project(count(*)) -> Aggregate() -> Scan(member)");
    }
}
