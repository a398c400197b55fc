//! Projection mapper.
//!
//! A [`Projection`] declares the select items a query needs and decodes each
//! result row into its output type. Rows are consumed column by column, so
//! projections compose: a pair of projections reads its first member's columns,
//! then its second's.

use crate::error::{Error, Result};
use crate::query::{
    EntityPath, Expression, Field, FieldRef, Scope, SelectItem, Selectable, ValueExpr,
};
use crate::row::{Columns, Row};
use crate::value::{FieldType, FromValue, Value, ValueKind};
use std::any::type_name;
use std::marker::PhantomData;

/// Output shape of a query
pub trait Projection {
    type Output;

    /// Items to select, in the order `project` consumes them.
    fn select_items(&self) -> Vec<SelectItem>;

    /// Checks declared field types against the entity metadata in `scope`.
    fn validate(&self, _scope: &Scope<'_>) -> Result<()> {
        Ok(())
    }

    /// Decodes this projection's columns from the cursor.
    fn project(&self, columns: &mut Columns) -> Result<Self::Output>;
}

/// Target of a property-assignment projection
pub trait Settable {
    /// Assigns `value` to the attribute named `attribute`.
    ///
    /// Implementations return [`Error::unknown_attribute`] for names they do
    /// not have.
    fn set(&mut self, attribute: &str, value: Value) -> Result<()>;
}

/// Target of a positional (constructor) projection
pub trait FromColumns: Sized {
    fn from_columns(columns: &mut Columns) -> Result<Self>;
}

/// A mapped entity: its path, its stored columns in order, and how to build it
pub trait Entity: FromColumns {
    fn path() -> EntityPath;

    fn columns() -> Vec<FieldRef>;
}

fn check_declared(scope: &Scope<'_>, field: &FieldRef, kind: ValueKind) -> Result<()> {
    let meta = scope.resolve(field)?;
    if meta.kind != kind {
        return Err(Error::ShapeMismatch(format!(
            "`{}` is declared {} but is read as {}",
            field, meta.kind, kind
        )));
    }
    Ok(())
}

/// Factory for the projection strategies
pub struct Projections;

impl Projections {
    /// Property assignment: each column is assigned to the attribute named by
    /// its alias, or by its field name when it has none.
    pub fn bean<T, I>(items: I) -> Bean<T>
    where
        T: Default + Settable,
        I: IntoIterator,
        I::Item: Into<SelectItem>,
    {
        Bean {
            items: items.into_iter().map(Into::into).collect(),
            _marker: PhantomData,
        }
    }

    /// Positional construction; the target reads the columns in select order.
    pub fn constructor<T, I>(items: I) -> Constructor<T>
    where
        T: FromColumns,
        I: IntoIterator,
        I::Item: Into<SelectItem>,
    {
        Constructor {
            items: items.into_iter().map(Into::into).collect(),
            _marker: PhantomData,
        }
    }

    /// Typed tuple of selectables bound to a builder.
    ///
    /// Arity and Rust types are fixed at compile time; declared field types
    /// are checked against the schema before the query runs.
    pub fn compiled<C, F, T>(columns: C, build: F) -> Compiled<C, F, T>
    where
        C: ColumnSet,
        F: Fn(C::Values) -> T,
    {
        Compiled {
            columns,
            build,
            _marker: PhantomData,
        }
    }

    /// Untyped rows read by selectable or position.
    pub fn tuple<I>(items: I) -> Tuple
    where
        I: IntoIterator,
        I::Item: Into<SelectItem>,
    {
        Tuple {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Whole entities at their own path.
    pub fn entity<E: Entity>() -> EntityProjection<E> {
        Self::entity_at(E::path())
    }

    /// Whole entities joined under an alias.
    pub fn entity_at<E: Entity>(path: EntityPath) -> EntityProjection<E> {
        EntityProjection {
            path,
            _marker: PhantomData,
        }
    }

    /// `None` instead of a value when every column is null (unmatched left join).
    pub fn optional<P: Projection>(inner: P) -> Optional<P> {
        Optional(inner)
    }
}

impl<T: FieldType> From<Field<T>> for SelectItem {
    fn from(field: Field<T>) -> Self {
        field.select_item()
    }
}

impl<T: FieldType> From<&Field<T>> for SelectItem {
    fn from(field: &Field<T>) -> Self {
        field.select_item()
    }
}

impl<T> From<Expression<T>> for SelectItem {
    fn from(expr: Expression<T>) -> Self {
        expr.select_item()
    }
}

impl<T> From<&Expression<T>> for SelectItem {
    fn from(expr: &Expression<T>) -> Self {
        expr.select_item()
    }
}

/// Property-assignment projection
#[derive(Debug, Clone)]
pub struct Bean<T> {
    items: Vec<SelectItem>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default + Settable> Projection for Bean<T> {
    type Output = T;

    fn select_items(&self) -> Vec<SelectItem> {
        self.items.clone()
    }

    fn project(&self, columns: &mut Columns) -> Result<T> {
        let mut target = T::default();
        for item in &self.items {
            let (_, value) = columns.next_column()?;
            target.set(&item.attribute_name(), value)?;
        }
        Ok(target)
    }
}

/// Positional projection
#[derive(Debug, Clone)]
pub struct Constructor<T> {
    items: Vec<SelectItem>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromColumns> Projection for Constructor<T> {
    type Output = T;

    fn select_items(&self) -> Vec<SelectItem> {
        self.items.clone()
    }

    fn project(&self, columns: &mut Columns) -> Result<T> {
        let expected = self.items.len();
        let mut own = columns.split_off(expected)?;
        let target = T::from_columns(&mut own)?;
        if own.remaining() > 0 {
            return Err(Error::ShapeMismatch(format!(
                "`{}` read {} of {} selected columns",
                type_name::<T>(),
                expected - own.remaining(),
                expected
            )));
        }
        Ok(target)
    }
}

/// A fixed tuple of selectables for [`Projections::compiled`]
pub trait ColumnSet {
    /// One `Option` per column, null decoding to `None`
    type Values;

    fn column_items(&self) -> Vec<SelectItem>;

    fn declared_fields(&self) -> Vec<(FieldRef, ValueKind)>;

    fn read(&self, columns: &mut Columns) -> Result<Self::Values>;
}

macro_rules! impl_column_set {
    ($($name:ident),+) => {
        impl<$($name),+> ColumnSet for ($($name,)+)
        where
            $($name: Selectable, $name::Output: FromValue,)+
        {
            type Values = ($(Option<$name::Output>,)+);

            #[allow(non_snake_case)]
            fn column_items(&self) -> Vec<SelectItem> {
                let ($($name,)+) = self;
                vec![$($name.select_item()),+]
            }

            #[allow(non_snake_case)]
            fn declared_fields(&self) -> Vec<(FieldRef, ValueKind)> {
                let ($($name,)+) = self;
                [$($name.declared_field()),+].into_iter().flatten().collect()
            }

            fn read(&self, columns: &mut Columns) -> Result<Self::Values> {
                Ok(($(columns.next_value::<$name::Output>()?,)+))
            }
        }
    };
}

impl_column_set!(A);
impl_column_set!(A, B);
impl_column_set!(A, B, C);
impl_column_set!(A, B, C, D);
impl_column_set!(A, B, C, D, E);
impl_column_set!(A, B, C, D, E, F);

/// Compiled projection
pub struct Compiled<C, F, T> {
    columns: C,
    build: F,
    _marker: PhantomData<fn() -> T>,
}

impl<C, F, T> Projection for Compiled<C, F, T>
where
    C: ColumnSet,
    F: Fn(C::Values) -> T,
{
    type Output = T;

    fn select_items(&self) -> Vec<SelectItem> {
        self.columns.column_items()
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        for (field, kind) in self.columns.declared_fields() {
            check_declared(scope, &field, kind)?;
        }
        Ok(())
    }

    fn project(&self, columns: &mut Columns) -> Result<T> {
        let values = self.columns.read(columns)?;
        Ok((self.build)(values))
    }
}

/// Untyped row projection
#[derive(Debug, Clone)]
pub struct Tuple {
    items: Vec<SelectItem>,
}

impl Projection for Tuple {
    type Output = Row;

    fn select_items(&self) -> Vec<SelectItem> {
        self.items.clone()
    }

    fn project(&self, columns: &mut Columns) -> Result<Row> {
        let mut labels = Vec::with_capacity(self.items.len());
        let mut values = Vec::with_capacity(self.items.len());
        for _ in &self.items {
            let (label, value) = columns.next_column()?;
            labels.push(label);
            values.push(value);
        }
        Ok(Row::new(labels, values))
    }
}

/// Whole-entity projection
#[derive(Debug, Clone)]
pub struct EntityProjection<E> {
    path: EntityPath,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Projection for EntityProjection<E> {
    type Output = E;

    fn select_items(&self) -> Vec<SelectItem> {
        E::columns()
            .iter()
            .map(|field| SelectItem::new(ValueExpr::Column(field.rooted_at(&self.path))))
            .collect()
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        let entity = scope.schema().entity(&self.path.entity)?;
        if entity.name() != E::path().entity {
            return Err(Error::ShapeMismatch(format!(
                "`{}` cannot be read from `{}`",
                type_name::<E>(),
                self.path
            )));
        }
        Ok(())
    }

    fn project(&self, columns: &mut Columns) -> Result<E> {
        let mut own = columns.split_off(E::columns().len())?;
        E::from_columns(&mut own)
    }
}

/// Projection that yields `None` when all of its columns are null
#[derive(Debug, Clone)]
pub struct Optional<P>(P);

impl<P: Projection> Projection for Optional<P> {
    type Output = Option<P::Output>;

    fn select_items(&self) -> Vec<SelectItem> {
        self.0.select_items()
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        self.0.validate(scope)
    }

    fn project(&self, columns: &mut Columns) -> Result<Self::Output> {
        let mut own = columns.split_off(self.0.select_items().len())?;
        if own.all_null() {
            return Ok(None);
        }
        self.0.project(&mut own).map(Some)
    }
}

impl<T: FieldType> Projection for Field<T> {
    type Output = Option<T>;

    fn select_items(&self) -> Vec<SelectItem> {
        vec![self.select_item()]
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        check_declared(scope, self.reference(), T::KIND)
    }

    fn project(&self, columns: &mut Columns) -> Result<Option<T>> {
        columns.next_value()
    }
}

impl<T: FromValue> Projection for Expression<T> {
    type Output = Option<T>;

    fn select_items(&self) -> Vec<SelectItem> {
        vec![self.select_item()]
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        match self.declared_field() {
            Some((field, kind)) => check_declared(scope, &field, kind),
            None => Ok(()),
        }
    }

    fn project(&self, columns: &mut Columns) -> Result<Option<T>> {
        columns.next_value()
    }
}

impl<A: Projection, B: Projection> Projection for (A, B) {
    type Output = (A::Output, B::Output);

    fn select_items(&self) -> Vec<SelectItem> {
        let mut items = self.0.select_items();
        items.extend(self.1.select_items());
        items
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        self.0.validate(scope)?;
        self.1.validate(scope)
    }

    fn project(&self, columns: &mut Columns) -> Result<Self::Output> {
        Ok((self.0.project(columns)?, self.1.project(columns)?))
    }
}

impl<A: Projection, B: Projection, C: Projection> Projection for (A, B, C) {
    type Output = (A::Output, B::Output, C::Output);

    fn select_items(&self) -> Vec<SelectItem> {
        let mut items = self.0.select_items();
        items.extend(self.1.select_items());
        items.extend(self.2.select_items());
        items
    }

    fn validate(&self, scope: &Scope<'_>) -> Result<()> {
        self.0.validate(scope)?;
        self.1.validate(scope)?;
        self.2.validate(scope)
    }

    fn project(&self, columns: &mut Columns) -> Result<Self::Output> {
        Ok((
            self.0.project(columns)?,
            self.1.project(columns)?,
            self.2.project(columns)?,
        ))
    }
}
