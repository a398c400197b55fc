//! Typed field references and the condition primitives built on them.
//!
//! Every primitive that takes a value accepts anything convertible into
//! `Option<T>` and returns the absent [`Condition`] when the value is unset.
//! Unset never means "compare against null".

use super::ast::{
    AggregateFunction, Assignment, EntityPath, Expr, FieldRef, JoinRelation, OrderSpec, Query,
    SelectItem, TextMatch, ValueExpr,
};
use super::condition::Condition;
use crate::value::{CompareOp, FieldType, Value, ValueKind};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

/// A typed reference to an entity attribute
pub struct Field<T> {
    reference: FieldRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.reference).finish()
    }
}

impl<T> Field<T> {
    pub const fn new(entity: &'static str, name: &'static str) -> Self {
        Self {
            reference: FieldRef::new(entity, name),
            _marker: PhantomData,
        }
    }

    /// The same attribute addressed through `path` (an aliased entity).
    pub fn of(&self, path: &EntityPath) -> Self {
        Self {
            reference: self.reference.rooted_at(path),
            _marker: PhantomData,
        }
    }

    pub fn reference(&self) -> &FieldRef {
        &self.reference
    }

    pub fn expr(&self) -> ValueExpr {
        ValueExpr::Column(self.reference.clone())
    }
}

impl<T: FieldType> Field<T> {
    fn compare(&self, op: CompareOp, value: impl Into<Option<T>>) -> Condition {
        match value.into() {
            Some(value) => Expr::Compare {
                left: self.expr(),
                op,
                right: ValueExpr::Literal(value.into()),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    pub fn eq(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    /// Greater than or equal.
    pub fn goe(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    /// Less than or equal.
    pub fn loe(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Le, value)
    }

    /// Inclusive range; each bound is optional on its own.
    pub fn between(&self, low: impl Into<Option<T>>, high: impl Into<Option<T>>) -> Condition {
        match (low.into(), high.into()) {
            (Some(low), Some(high)) => Expr::Between {
                expr: self.expr(),
                low: ValueExpr::Literal(low.into()),
                high: ValueExpr::Literal(high.into()),
            }
            .into(),
            (low, high) => self.goe(low).and(self.loe(high)),
        }
    }

    /// Membership in a value list. A present but empty list matches nothing.
    pub fn is_in(&self, values: impl Into<Option<Vec<T>>>) -> Condition {
        match values.into() {
            Some(values) => Expr::In {
                expr: self.expr(),
                values: values.into_iter().map(Into::into).collect(),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    /// Membership in the single-column result of `subquery`.
    pub fn in_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        match subquery.into() {
            Some(subquery) => Expr::InSubquery {
                expr: self.expr(),
                subquery: Box::new(subquery),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    fn compare_subquery(&self, op: CompareOp, subquery: impl Into<Option<Query>>) -> Condition {
        match subquery.into() {
            Some(subquery) => Expr::Compare {
                left: self.expr(),
                op,
                right: ValueExpr::Subquery(Box::new(subquery)),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    /// Equality against a scalar subquery.
    pub fn eq_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        self.compare_subquery(CompareOp::Eq, subquery)
    }

    pub fn goe_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        self.compare_subquery(CompareOp::Ge, subquery)
    }

    pub fn gt_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        self.compare_subquery(CompareOp::Gt, subquery)
    }

    pub fn loe_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        self.compare_subquery(CompareOp::Le, subquery)
    }

    pub fn lt_subquery(&self, subquery: impl Into<Option<Query>>) -> Condition {
        self.compare_subquery(CompareOp::Lt, subquery)
    }

    /// Column-to-column equality, typically for theta joins.
    pub fn eq_field(&self, other: &Field<T>) -> Condition {
        Expr::Compare {
            left: self.expr(),
            op: CompareOp::Eq,
            right: other.expr(),
        }
        .into()
    }

    pub fn is_null(&self) -> Condition {
        Expr::IsNull(self.expr()).into()
    }

    pub fn is_not_null(&self) -> Condition {
        Expr::IsNotNull(self.expr()).into()
    }

    /// Bulk-update assignment; `None` assigns null.
    pub fn assign(&self, value: impl Into<Option<T>>) -> Assignment {
        Assignment {
            field: self.reference.clone(),
            value: value.into().map_or(Value::Null, Into::into),
        }
    }

    pub fn asc(&self) -> OrderSpec {
        OrderSpec::asc(self.expr())
    }

    pub fn desc(&self) -> OrderSpec {
        OrderSpec::desc(self.expr())
    }

    /// Selected under another output name.
    pub fn as_(&self, alias: impl Into<String>) -> Expression<T> {
        Expression::from_field(self).alias(alias)
    }

    /// Number of non-null values.
    pub fn count(&self) -> Expression<i64> {
        Expression::aggregate(AggregateFunction::Count, self.expr(), None)
    }

    pub fn sum(&self) -> Expression<T> {
        Expression::aggregate(AggregateFunction::Sum, self.expr(), Some(T::KIND))
    }

    pub fn avg(&self) -> Expression<f64> {
        Expression::aggregate(AggregateFunction::Avg, self.expr(), None)
    }

    pub fn min(&self) -> Expression<T> {
        Expression::aggregate(AggregateFunction::Min, self.expr(), Some(T::KIND))
    }

    pub fn max(&self) -> Expression<T> {
        Expression::aggregate(AggregateFunction::Max, self.expr(), Some(T::KIND))
    }

    pub fn string_value(&self) -> Expression<String> {
        Expression::new(ValueExpr::StringValue(Box::new(self.expr())))
    }
}

impl Field<String> {
    fn text(&self, mode: TextMatch, needle: Option<&str>) -> Condition {
        match needle {
            Some(needle) => Expr::Text {
                expr: self.expr(),
                mode,
                needle: needle.to_string(),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    pub fn contains<'v>(&self, needle: impl Into<Option<&'v str>>) -> Condition {
        self.text(TextMatch::Contains, needle.into())
    }

    pub fn starts_with<'v>(&self, prefix: impl Into<Option<&'v str>>) -> Condition {
        self.text(TextMatch::StartsWith, prefix.into())
    }

    pub fn ends_with<'v>(&self, suffix: impl Into<Option<&'v str>>) -> Condition {
        self.text(TextMatch::EndsWith, suffix.into())
    }

    pub fn concat(&self, other: impl Into<Expression<String>>) -> Expression<String> {
        Expression::from_field(self).concat(other)
    }
}

/// A typed selectable expression: a field, aggregate, constant or concatenation
pub struct Expression<T> {
    item: SelectItem,
    kind: Option<ValueKind>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            kind: self.kind,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.item).finish()
    }
}

impl<T> Expression<T> {
    pub fn new(expr: ValueExpr) -> Self {
        Self {
            item: SelectItem::new(expr),
            kind: None,
            _marker: PhantomData,
        }
    }

    fn aggregate(function: AggregateFunction, arg: ValueExpr, kind: Option<ValueKind>) -> Self {
        Self {
            item: SelectItem::new(ValueExpr::Aggregate {
                function,
                arg: Some(Box::new(arg)),
            }),
            kind,
            _marker: PhantomData,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.item.alias = Some(alias.into());
        self
    }

    pub fn asc(&self) -> OrderSpec {
        OrderSpec::asc(self.item.expr.clone())
    }

    pub fn desc(&self) -> OrderSpec {
        OrderSpec::desc(self.item.expr.clone())
    }
}

impl<T: FieldType> Expression<T> {
    fn from_field(field: &Field<T>) -> Self {
        Self {
            item: SelectItem::new(field.expr()),
            kind: Some(T::KIND),
            _marker: PhantomData,
        }
    }

    /// Comparison against the expression's value, e.g. in `having`.
    pub fn compare(&self, op: CompareOp, value: impl Into<Option<T>>) -> Condition {
        match value.into() {
            Some(value) => Expr::Compare {
                left: self.item.expr.clone(),
                op,
                right: ValueExpr::Literal(value.into()),
            }
            .into(),
            None => Condition::absent(),
        }
    }

    pub fn goe(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Ge, value)
    }

    pub fn gt(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    pub fn loe(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Le, value)
    }

    pub fn lt(&self, value: impl Into<Option<T>>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }
}

impl Expression<String> {
    pub fn concat(self, other: impl Into<Expression<String>>) -> Expression<String> {
        let other = other.into().item.expr;
        let mut parts = match self.item.expr {
            ValueExpr::Concat(parts) => parts,
            expr => vec![expr],
        };
        parts.push(other);
        Expression::new(ValueExpr::Concat(parts))
    }
}

impl From<&str> for Expression<String> {
    fn from(value: &str) -> Self {
        Expressions::constant(value.to_string())
    }
}

impl<T: FieldType> From<Field<T>> for Expression<T> {
    fn from(field: Field<T>) -> Self {
        Expression::from_field(&field)
    }
}

impl<T: FieldType> From<&Field<T>> for Expression<T> {
    fn from(field: &Field<T>) -> Self {
        Expression::from_field(field)
    }
}

/// Factory for expressions that are not tied to a field
pub struct Expressions;

impl Expressions {
    /// A constant column.
    pub fn constant<T: FieldType>(value: T) -> Expression<T> {
        Expression {
            item: SelectItem::new(ValueExpr::Literal(value.into())),
            kind: Some(T::KIND),
            _marker: PhantomData,
        }
    }

    /// Number of rows, `count(*)`.
    pub fn count_all() -> Expression<i64> {
        Expression::new(ValueExpr::Aggregate {
            function: AggregateFunction::Count,
            arg: None,
        })
    }
}

/// Something that can appear in a select list and be read back typed
pub trait Selectable {
    type Output;

    fn select_item(&self) -> SelectItem;

    /// The entity attribute behind this item and its declared type, if it is a plain column.
    fn declared_field(&self) -> Option<(FieldRef, ValueKind)> {
        None
    }
}

impl<T: FieldType> Selectable for Field<T> {
    type Output = T;

    fn select_item(&self) -> SelectItem {
        SelectItem::new(self.expr())
    }

    fn declared_field(&self) -> Option<(FieldRef, ValueKind)> {
        Some((self.reference.clone(), T::KIND))
    }
}

impl<T> Selectable for Expression<T> {
    type Output = T;

    fn select_item(&self) -> SelectItem {
        self.item.clone()
    }

    fn declared_field(&self) -> Option<(FieldRef, ValueKind)> {
        match (&self.item.expr, self.kind) {
            (ValueExpr::Column(field), Some(kind)) => Some((field.clone(), kind)),
            _ => None,
        }
    }
}

/// A many-to-one reference from one entity to another
#[derive(Debug, Clone)]
pub struct Reference {
    local: FieldRef,
    target: EntityPath,
    foreign: Cow<'static, str>,
}

impl Reference {
    /// `entity.field` references `target.target_field`.
    pub const fn new(
        entity: &'static str,
        field: &'static str,
        target: &'static str,
        target_field: &'static str,
    ) -> Self {
        Self {
            local: FieldRef::new(entity, field),
            target: EntityPath::new(target),
            foreign: Cow::Borrowed(target_field),
        }
    }

    pub fn target(&self) -> &EntityPath {
        &self.target
    }

    pub fn local(&self) -> &FieldRef {
        &self.local
    }

    /// The reference with its target joined under `alias`.
    pub fn to_alias(&self, alias: impl Into<Cow<'static, str>>) -> Self {
        Self {
            local: self.local.clone(),
            target: self.target.aliased(alias),
            foreign: self.foreign.clone(),
        }
    }

    /// The reference leaving from an aliased source entity.
    pub fn from_alias(&self, path: &EntityPath) -> Self {
        Self {
            local: self.local.rooted_at(path),
            target: self.target.clone(),
            foreign: self.foreign.clone(),
        }
    }

    pub fn relation(&self) -> JoinRelation {
        JoinRelation {
            local: self.local.clone(),
            foreign: FieldRef {
                path: self.target.alias.clone(),
                name: self.foreign.clone(),
            },
        }
    }

    /// Rows whose reference points at `key`.
    ///
    /// Reverse collections ("members of a team") are derived on read with this
    /// condition rather than stored as back-pointers.
    pub fn referencing(&self, key: impl Into<Value>) -> Condition {
        match key.into() {
            Value::Null => Condition::absent(),
            key => Expr::Compare {
                left: ValueExpr::Column(self.local.clone()),
                op: CompareOp::Eq,
                right: ValueExpr::Literal(key),
            }
            .into(),
        }
    }
}
