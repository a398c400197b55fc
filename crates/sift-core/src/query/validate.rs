//! Composition-time resolution of field references.
//!
//! Every field a query mentions must resolve through an alias in scope to an
//! attribute of a known entity. Failures surface here, before any data source
//! sees the description.

use super::ast::*;
use super::executor::coerce_assignment;
use crate::error::{Error, Result};
use crate::schema::{FieldMeta, Schema};
use std::collections::HashMap;

/// Aliases visible to a query, mapped to their entities
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    schema: &'a Schema,
    aliases: HashMap<String, String>,
}

impl<'a> Scope<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            aliases: HashMap::new(),
        }
    }

    fn bind(&mut self, path: &EntityPath) -> Result<()> {
        self.schema.entity(&path.entity)?;
        if self
            .aliases
            .insert(path.alias.to_string(), path.entity.to_string())
            .is_some()
        {
            return Err(Error::InvalidQuery(format!(
                "alias `{}` is bound more than once",
                path.alias
            )));
        }
        Ok(())
    }

    /// Schema the scope resolves against.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Resolves a field through its alias.
    pub fn resolve(&self, field: &FieldRef) -> Result<&'a FieldMeta> {
        let schema = self.schema;
        match self.aliases.get(field.path.as_ref()) {
            Some(entity) => schema.resolve(&field.path, entity, &field.name),
            None => Err(Error::UnresolvedField {
                path: field.path.to_string(),
                field: field.name.to_string(),
            }),
        }
    }

    fn value(&self, expr: &ValueExpr) -> Result<()> {
        match expr {
            ValueExpr::Column(field) => self.resolve(field).map(|_| ()),
            ValueExpr::Literal(_) => Ok(()),
            ValueExpr::Subquery(query) => query.validate(self.schema).map(|_| ()),
            ValueExpr::Aggregate { arg, .. } => match arg {
                Some(arg) if arg.contains_aggregate() => Err(Error::InvalidQuery(format!(
                    "nested aggregate in `{}`",
                    expr
                ))),
                Some(arg) => self.value(arg),
                None => Ok(()),
            },
            ValueExpr::Concat(parts) => parts.iter().try_for_each(|p| self.value(p)),
            ValueExpr::StringValue(inner) => self.value(inner),
        }
    }

    fn condition(&self, expr: &Expr, allow_aggregates: bool) -> Result<()> {
        let check = |value: &ValueExpr| -> Result<()> {
            if !allow_aggregates && value.contains_aggregate() {
                return Err(Error::InvalidQuery(format!(
                    "aggregate `{}` is only allowed in select, having and order by",
                    value
                )));
            }
            self.value(value)
        };

        match expr {
            Expr::Compare { left, right, .. } => {
                check(left)?;
                check(right)
            }
            Expr::Logical { left, right, .. } => {
                self.condition(left, allow_aggregates)?;
                self.condition(right, allow_aggregates)
            }
            Expr::Not(inner) => self.condition(inner, allow_aggregates),
            Expr::Text { expr, .. } | Expr::In { expr, .. } => check(expr),
            Expr::InSubquery { expr, subquery } => {
                check(expr)?;
                subquery.validate(self.schema)?;
                if subquery.select.len() != 1 {
                    return Err(Error::ShapeMismatch(format!(
                        "subquery must select exactly one column, found {}",
                        subquery.select.len()
                    )));
                }
                Ok(())
            }
            Expr::Between { expr, low, high } => {
                check(expr)?;
                check(low)?;
                check(high)
            }
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => check(expr),
        }
    }
}

impl Query {
    /// Resolves every field reference against `schema`.
    ///
    /// Subqueries are checked in their own scope; they may not refer to the
    /// outer query's aliases.
    pub fn validate<'a>(&self, schema: &'a Schema) -> Result<Scope<'a>> {
        let mut scope = Scope::new(schema);
        scope.bind(&self.from)?;

        for join in &self.joins {
            scope.bind(&join.target)?;
            if let Some(ref relation) = join.relation {
                let local = scope.resolve(&relation.local)?;
                let foreign = scope.resolve(&relation.foreign)?;
                if local.kind != foreign.kind {
                    return Err(Error::InvalidQuery(format!(
                        "cannot join `{}` ({}) to `{}` ({})",
                        relation.local, local.kind, relation.foreign, foreign.kind
                    )));
                }
            }
            if let Some(ref on) = join.on {
                scope.condition(on, false)?;
            }
        }

        for item in &self.select {
            scope.value(&item.expr)?;
        }
        if let Some(ref filter) = self.filter {
            scope.condition(filter, false)?;
        }
        for key in &self.group_by {
            if key.contains_aggregate() {
                return Err(Error::InvalidQuery(format!("cannot group by `{}`", key)));
            }
            scope.value(key)?;
        }
        if let Some(ref having) = self.having {
            scope.condition(having, true)?;
        }
        for spec in &self.order_by {
            scope.value(&spec.expr)?;
        }

        Ok(scope)
    }
}

impl Update {
    /// Resolves assigned fields and the filter, and checks assigned values
    /// against the declared attribute types.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        let mut scope = Scope::new(schema);
        scope.bind(&self.entity)?;

        if self.assignments.is_empty() {
            return Err(Error::InvalidQuery("update without assignments".to_string()));
        }

        let meta = schema.entity(&self.entity.entity)?;
        for assignment in &self.assignments {
            let field = scope.resolve(&assignment.field)?;
            if field.name == meta.id_field() {
                return Err(Error::InvalidQuery(format!(
                    "identifier `{}` cannot be assigned",
                    assignment.field
                )));
            }
            if coerce_assignment(field.kind, field.nullable, &assignment.value).is_none() {
                return Err(Error::ShapeMismatch(format!(
                    "cannot assign `{}` to `{}` of type {}",
                    assignment.value, assignment.field, field.kind
                )));
            }
        }

        if let Some(ref filter) = self.filter {
            scope.condition(filter, false)?;
        }
        Ok(())
    }
}
