//! Select query builder and fetch modes.

use crate::config::QueryConfig;
use crate::page::{Page, Pageable};
use sift_core::query::{
    Condition, EntityPath, Join, JoinKind, OrderSpec, Query, Reference, SearchCondition,
    Selectable, ValueExpr,
};
use sift_core::{DataSource, Error, Projection, Result, Row};
use std::time::Instant;
use tracing::{debug, warn};

/// A query under construction, bound to a data source and a projection.
///
/// Builder methods take and return the query by value. Fetch methods borrow
/// it, so the same query can be counted and then fetched.
pub struct SelectQuery<'a, S: ?Sized, P> {
    source: &'a S,
    config: QueryConfig,
    projection: P,
    from: Option<EntityPath>,
    joins: Vec<Join>,
    filter: Condition,
    group_by: Vec<ValueExpr>,
    having: Condition,
    order_by: Vec<OrderSpec>,
    offset: Option<usize>,
    limit: Option<usize>,
    // builder misuse, reported when the query is run
    deferred: Option<String>,
}

impl<'a, S, P> SelectQuery<'a, S, P>
where
    S: DataSource + ?Sized,
    P: Projection,
{
    pub(crate) fn new(source: &'a S, config: QueryConfig, projection: P) -> Self {
        Self {
            source,
            config,
            projection,
            from: None,
            joins: Vec::new(),
            filter: Condition::absent(),
            group_by: Vec::new(),
            having: Condition::absent(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
            deferred: None,
        }
    }

    /// Sets the base entity.
    pub fn from(mut self, path: EntityPath) -> Self {
        self.from = Some(path);
        self
    }

    /// Inner join along a reference.
    pub fn join(self, reference: &Reference) -> Self {
        self.push_join(JoinKind::Inner, reference)
    }

    /// Left join along a reference; unmatched base rows are kept with nulls.
    pub fn left_join(self, reference: &Reference) -> Self {
        self.push_join(JoinKind::Left, reference)
    }

    /// Inner join of an unrelated entity on an arbitrary condition.
    pub fn join_on(self, target: EntityPath, condition: impl Into<Condition>) -> Self {
        self.push_theta_join(JoinKind::Inner, target, condition.into())
    }

    /// Left join of an unrelated entity on an arbitrary condition.
    pub fn left_join_on(self, target: EntityPath, condition: impl Into<Condition>) -> Self {
        self.push_theta_join(JoinKind::Left, target, condition.into())
    }

    /// Adds a join-time predicate to the most recent join.
    ///
    /// For a left join this only decides which joined rows attach; base rows
    /// are never removed by it.
    pub fn on(mut self, condition: impl Into<Condition>) -> Self {
        match self.joins.last_mut() {
            Some(join) => {
                join.on = Condition::from(join.on.take()).and(condition).into_expr();
            }
            None if self.deferred.is_none() => {
                self.deferred = Some("`on` without a preceding join".to_string());
            }
            None => {}
        }
        self
    }

    /// ANDs a condition into the filter. Absent conditions change nothing.
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.filter = self.filter.and(condition);
        self
    }

    /// ANDs every condition into the filter, skipping absent ones.
    pub fn filter_all<I, C>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        self.filter(Condition::all(conditions))
    }

    /// Adds a grouping key.
    pub fn group_by(mut self, key: &impl Selectable) -> Self {
        self.group_by.push(key.select_item().expr);
        self
    }

    /// ANDs a condition over aggregates into the group filter.
    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.having = self.having.and(condition);
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

    fn push_join(mut self, kind: JoinKind, reference: &Reference) -> Self {
        self.joins.push(Join {
            kind,
            target: reference.target().clone(),
            relation: Some(reference.relation()),
            on: None,
        });
        self
    }

    fn push_theta_join(mut self, kind: JoinKind, target: EntityPath, on: Condition) -> Self {
        self.joins.push(Join {
            kind,
            target,
            relation: None,
            on: on.into_expr(),
        });
        self
    }

    /// The query description this builder stands for.
    pub fn to_query(&self) -> Result<Query> {
        if let Some(ref message) = self.deferred {
            return Err(Error::InvalidQuery(message.clone()));
        }
        let from = self
            .from
            .clone()
            .ok_or_else(|| Error::InvalidQuery("query has no `from` entity".to_string()))?;

        let mut query = Query::new(from).select(self.projection.select_items());
        query.joins = self.joins.clone();
        query.filter = self.filter.expr().cloned();
        query.group_by = self.group_by.clone();
        query.having = self.having.expr().cloned();
        query.order_by = self.order_by.clone();
        query.offset = self.offset;
        query.limit = self.limit;
        Ok(query)
    }

    /// Every result, in order.
    pub fn fetch(&self) -> Result<Vec<P::Output>> {
        let query = self.to_query()?;
        self.load(&query)
    }

    /// The single result, `None` when nothing matches.
    ///
    /// More than one match is an error reporting how many rows were found.
    pub fn fetch_one(&self) -> Result<Option<P::Output>> {
        let query = self.to_query()?;
        let mut results = self.load(&query)?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            found => Err(Error::AmbiguousResult { found }),
        }
    }

    /// The first result in order, `None` when nothing matches.
    pub fn fetch_first(&self) -> Result<Option<P::Output>> {
        let mut query = self.to_query()?;
        query.limit = Some(query.limit.map_or(1, |limit| limit.min(1)));
        Ok(self.load(&query)?.into_iter().next())
    }

    /// Number of results the query yields, ignoring offset and limit.
    pub fn fetch_count(&self) -> Result<u64> {
        let query = self.to_query()?;
        self.count_of(query)
    }

    /// One page of results and the total across all pages.
    ///
    /// Page sizes above the configured maximum are clamped.
    pub fn fetch_page(&self, pageable: Pageable) -> Result<Page<P::Output>> {
        let limit = if pageable.limit > self.config.max_page_size {
            warn!(
                requested = pageable.limit,
                max = self.config.max_page_size,
                "page size clamped"
            );
            self.config.max_page_size
        } else {
            pageable.limit
        };

        let mut query = self.to_query()?;
        let total = self.count_of(query.clone())?;
        query.offset = Some(pageable.offset);
        query.limit = Some(limit);
        let content = self.load(&query)?;

        Ok(Page {
            content,
            total,
            offset: pageable.offset,
            limit,
        })
    }

    /// Results matching a search condition on top of this query's filter.
    pub fn search(self, condition: &impl SearchCondition) -> Result<Vec<P::Output>> {
        self.filter(condition.build_condition()).fetch()
    }

    /// One page of results matching a search condition.
    pub fn search_page(
        self,
        condition: &impl SearchCondition,
        pageable: Pageable,
    ) -> Result<Page<P::Output>> {
        self.filter(condition.build_condition()).fetch_page(pageable)
    }

    /// Number of results matching a search condition.
    pub fn count(self, condition: &impl SearchCondition) -> Result<u64> {
        self.filter(condition.build_condition()).fetch_count()
    }

    fn count_of(&self, mut query: Query) -> Result<u64> {
        query.offset = None;
        query.limit = None;
        query.order_by.clear();

        if query.is_aggregate() || query.having.is_some() {
            // one result per group, or a single row for a plain aggregate
            query.validate(self.source.schema())?;
            return Ok(self.execute(&query)?.len() as u64);
        }

        let count = query.count_query();
        count.validate(self.source.schema())?;
        let rows = self.execute(&count)?;
        let total = match rows.first() {
            Some(row) => row.get_at::<i64>(0)?.unwrap_or(0),
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    fn load(&self, query: &Query) -> Result<Vec<P::Output>> {
        {
            let scope = query.validate(self.source.schema())?;
            self.projection.validate(&scope)?;
        }

        self.execute(query)?
            .into_iter()
            .map(|row| self.projection.project(&mut row.into_columns()))
            .collect()
    }

    fn execute(&self, query: &Query) -> Result<Vec<Row>> {
        let started = Instant::now();
        let rows = self.source.execute_query(query)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if self.config.log_statements {
            debug!(statement = %query, rows = rows.len(), elapsed_ms, "executed query");
        }
        if let Some(threshold) = self.config.slow_query_threshold_ms {
            if elapsed_ms >= threshold {
                warn!(statement = %query, elapsed_ms, threshold, "slow query");
            }
        }
        Ok(rows)
    }
}
