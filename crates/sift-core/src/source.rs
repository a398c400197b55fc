//! Data sources.
//!
//! [`DataSource`] is the seam to the relational store: it receives fully
//! resolved query descriptions and returns rows. [`MemoryDataSource`] evaluates
//! descriptions over in-memory tables.

use crate::error::{Error, Result};
use crate::query::executor::{coerce_assignment, ExecutionContext, Executor, TableData};
use crate::query::{Query, Update};
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, trace};

/// A relational store that executes query descriptions
pub trait DataSource {
    /// Entity metadata every field reference is resolved against.
    fn schema(&self) -> &Schema;

    /// Runs a query; one row per result, labelled by select item.
    fn execute_query(&self, query: &Query) -> Result<Vec<Row>>;

    /// Runs a bulk update and returns the number of affected rows.
    fn execute_update(&self, update: &Update) -> Result<u64>;
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn schema(&self) -> &Schema {
        (**self).schema()
    }

    fn execute_query(&self, query: &Query) -> Result<Vec<Row>> {
        (**self).execute_query(query)
    }

    fn execute_update(&self, update: &Update) -> Result<u64> {
        (**self).execute_update(update)
    }
}

#[derive(Debug, Default)]
struct Tables {
    rows: TableData,
    sequences: HashMap<String, i64>,
}

/// In-memory relational evaluator.
///
/// Queries take a read lock; a bulk update takes the write lock for its whole
/// duration, so it applies to all matched rows or none.
#[derive(Debug)]
pub struct MemoryDataSource {
    schema: Schema,
    tables: RwLock<Tables>,
}

impl MemoryDataSource {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Inserts a row given as `(field, value)` pairs and returns its identifier.
    ///
    /// Missing attributes are null. The identifier is generated when not
    /// supplied.
    pub fn insert<I, K>(&self, entity: &str, values: I) -> Result<i64>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let meta = self.schema.entity(entity)?;
        let mut row = vec![Value::Null; meta.fields().len()];

        for (name, value) in values {
            let name = name.as_ref();
            let index = meta.column_index(name).ok_or_else(|| Error::UnresolvedField {
                path: entity.to_string(),
                field: name.to_string(),
            })?;
            let field = &meta.fields()[index];
            row[index] = coerce_assignment(field.kind, true, &value).ok_or_else(|| {
                Error::ShapeMismatch(format!(
                    "cannot store `{}` in `{}.{}` of type {}",
                    value, entity, name, field.kind
                ))
            })?;
        }

        let mut tables = self.tables.write().map_err(|_| Error::LockPoisoned)?;
        let id_index = meta.column_index(meta.id_field()).unwrap_or(0);
        let last = tables.sequences.get(meta.name()).copied().unwrap_or(0);
        let id = match row[id_index] {
            Value::Integer(id) => id,
            _ => {
                row[id_index] = Value::Integer(last + 1);
                last + 1
            }
        };

        if let Some((field, _)) = meta
            .fields()
            .iter()
            .zip(&row)
            .find(|(field, value)| !field.nullable && value.is_null())
        {
            return Err(Error::ShapeMismatch(format!(
                "`{}.{}` requires a value",
                entity, field.name
            )));
        }

        let rows = tables.rows.entry(meta.name().to_string()).or_default();
        if rows.iter().any(|existing| existing[id_index] == row[id_index]) {
            return Err(Error::InvalidQuery(format!(
                "duplicate identifier {} for `{}`",
                id, entity
            )));
        }
        rows.push(row);
        // only accepted rows advance the sequence
        tables
            .sequences
            .insert(meta.name().to_string(), last.max(id));
        trace!(entity, id, "inserted row");
        Ok(id)
    }

    /// Number of stored rows of `entity`.
    pub fn len(&self, entity: &str) -> Result<usize> {
        let tables = self.tables.read().map_err(|_| Error::LockPoisoned)?;
        Ok(tables.rows.get(entity).map_or(0, Vec::len))
    }
}

impl DataSource for MemoryDataSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn execute_query(&self, query: &Query) -> Result<Vec<Row>> {
        let tables = self.tables.read().map_err(|_| Error::LockPoisoned)?;
        let executor = Executor::new(ExecutionContext::new(&self.schema, &tables.rows));
        executor.run(query)
    }

    fn execute_update(&self, update: &Update) -> Result<u64> {
        let meta = self.schema.entity(&update.entity.entity)?;

        let mut assignments = Vec::with_capacity(update.assignments.len());
        for assignment in &update.assignments {
            let index = meta
                .column_index(&assignment.field.name)
                .ok_or_else(|| Error::UnresolvedField {
                    path: assignment.field.path.to_string(),
                    field: assignment.field.name.to_string(),
                })?;
            let field = &meta.fields()[index];
            let value = coerce_assignment(field.kind, field.nullable, &assignment.value)
                .ok_or_else(|| {
                    Error::ShapeMismatch(format!(
                        "cannot assign `{}` to `{}`",
                        assignment.value, assignment.field
                    ))
                })?;
            assignments.push((index, value));
        }

        let mut tables = self.tables.write().map_err(|_| Error::LockPoisoned)?;
        let matched = {
            let executor = Executor::new(ExecutionContext::new(&self.schema, &tables.rows));
            executor.matching_rows(update)?
        };

        if let Some(rows) = tables.rows.get_mut(meta.name()) {
            for &row in &matched {
                for (index, value) in &assignments {
                    rows[row][*index] = value.clone();
                }
            }
        }

        debug!(entity = %update.entity, affected = matched.len(), "applied bulk update");
        Ok(matched.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EntityPath, Field, Selectable};
    use crate::schema::EntityMeta;
    use crate::value::ValueKind;

    const MEMBER: EntityPath = EntityPath::new("member");
    const USERNAME: Field<String> = Field::new("member", "username");
    const AGE: Field<i64> = Field::new("member", "age");

    fn source() -> MemoryDataSource {
        MemoryDataSource::new(
            Schema::new().with_entity(
                EntityMeta::new("member")
                    .required("username", ValueKind::String)
                    .field("age", ValueKind::Integer),
            ),
        )
    }

    #[test]
    fn test_insert_generates_identifiers() {
        let source = source();
        let a = source
            .insert("member", [("username", Value::from("A")), ("age", Value::from(10))])
            .unwrap();
        let b = source
            .insert("member", [("username", Value::from("B"))])
            .unwrap();
        assert_eq!((a, b), (1, 2));

        let explicit = source
            .insert("member", [("id", Value::from(10)), ("username", Value::from("C"))])
            .unwrap();
        assert_eq!(explicit, 10);
        let next = source
            .insert("member", [("username", Value::from("D"))])
            .unwrap();
        assert_eq!(next, 11);
        assert_eq!(source.len("member").unwrap(), 4);
    }

    #[test]
    fn test_insert_checks_shape() {
        let source = source();
        assert!(matches!(
            source.insert("member", [("age", Value::from(10))]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            source.insert("member", [("username", Value::from(10))]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            source.insert("member", [("nickname", Value::from("x"))]),
            Err(Error::UnresolvedField { .. })
        ));
        assert_eq!(source.len("member").unwrap(), 0);
    }

    #[test]
    fn test_rejected_insert_keeps_sequence() {
        let source = source();
        source
            .insert("member", [("username", Value::from("A"))])
            .unwrap();

        // missing required username
        assert!(source.insert("member", [("age", Value::from(10))]).is_err());
        // duplicate identifier
        assert!(source
            .insert("member", [("id", Value::from(1)), ("username", Value::from("B"))])
            .is_err());

        let next = source
            .insert("member", [("username", Value::from("C"))])
            .unwrap();
        assert_eq!(next, 2);
        assert_eq!(source.len("member").unwrap(), 2);
    }

    #[test]
    fn test_bulk_update() {
        let source = source();
        source
            .insert("member", [("username", Value::from("A")), ("age", Value::from(10))])
            .unwrap();
        source
            .insert("member", [("username", Value::from("B")), ("age", Value::from(30))])
            .unwrap();

        let update = Update {
            entity: MEMBER,
            assignments: vec![USERNAME.assign("X".to_string())],
            filter: AGE.lt(28).into_expr(),
        };
        assert_eq!(source.execute_update(&update).unwrap(), 1);

        let mut query = Query::new(MEMBER).select([USERNAME.select_item()]);
        query.order_by.push(AGE.asc());
        let names: Vec<Value> = source
            .execute_query(&query)
            .unwrap()
            .into_iter()
            .map(|row| row.values()[0].clone())
            .collect();
        assert_eq!(names, vec![Value::from("X"), Value::from("B")]);
    }
}
