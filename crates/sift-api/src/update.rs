//! Bulk update builder.

use sift_core::query::{Assignment, Condition, EntityPath, Field, Update};
use sift_core::{DataSource, FieldType, Result};
use tracing::info;

/// A bulk update under construction.
///
/// The update is applied directly in the data source. Entities loaded before
/// it runs keep their old attribute values; reload them to observe the change.
pub struct UpdateClause<'a, S: ?Sized> {
    source: &'a S,
    entity: EntityPath,
    assignments: Vec<Assignment>,
    filter: Condition,
}

impl<'a, S: DataSource + ?Sized> UpdateClause<'a, S> {
    pub(crate) fn new(source: &'a S, entity: EntityPath) -> Self {
        Self {
            source,
            entity,
            assignments: Vec::new(),
            filter: Condition::absent(),
        }
    }

    /// Assigns `value` to `field`; `None` assigns null.
    pub fn set<T: FieldType>(mut self, field: &Field<T>, value: impl Into<Option<T>>) -> Self {
        self.assignments.push(field.assign(value));
        self
    }

    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Restricts the update to rows matching `condition`; absent updates all rows.
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.filter = self.filter.and(condition);
        self
    }

    /// Validates and applies the update, returning the number of affected rows.
    pub fn execute(self) -> Result<u64> {
        let update = Update {
            entity: self.entity,
            assignments: self.assignments,
            filter: self.filter.into_expr(),
        };
        update.validate(self.source.schema())?;

        let affected = self.source.execute_update(&update)?;
        info!(
            entity = %update.entity,
            affected,
            "bulk update applied; previously loaded entities are stale"
        );
        Ok(affected)
    }
}
