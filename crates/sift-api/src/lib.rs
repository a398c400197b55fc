//! # Sift
//!
//! Type-safe dynamic query composition over a relational data source.
//!
//! Conditions are built from typed field paths and compose as values: an
//! unset search input yields the absent condition, which drops out of any
//! combination. Projections map result rows onto your own types, and the
//! [`QueryFactory`] runs the composed query in one of several fetch modes.
//!
//! ## Quick Start
//!
//! ```rust
//! use sift::query::{EntityPath, Field};
//! use sift::{EntityMeta, MemoryDataSource, QueryFactory, Schema, Value, ValueKind};
//!
//! const MEMBER: EntityPath = EntityPath::new("member");
//! const USERNAME: Field<String> = Field::new("member", "username");
//! const AGE: Field<i64> = Field::new("member", "age");
//!
//! fn main() -> Result<(), sift::Error> {
//!     let schema = Schema::new().with_entity(
//!         EntityMeta::new("member")
//!             .required("username", ValueKind::String)
//!             .field("age", ValueKind::Integer),
//!     );
//!     let source = MemoryDataSource::new(schema);
//!     source.insert("member", [("username", Value::from("member1")), ("age", Value::from(10))])?;
//!     source.insert("member", [("username", Value::from("member2")), ("age", Value::from(20))])?;
//!
//!     let factory = QueryFactory::new(&source);
//!     let min_age: Option<i64> = Some(15);
//!     let names = factory
//!         .select(USERNAME)
//!         .from(MEMBER)
//!         .filter(AGE.goe(min_age))
//!         .fetch()?;
//!     assert_eq!(names, vec![Some("member2".to_string())]);
//!     Ok(())
//! }
//! ```
//!
//! ## Fetch Modes
//!
//! - `fetch`: every result
//! - `fetch_one`: exactly one or none; more is [`Error::AmbiguousResult`]
//! - `fetch_first`: the first result in order
//! - `fetch_count`: the number of results
//! - `fetch_page`: one page plus the total count

#![warn(clippy::all)]

pub mod config;
pub mod logging;
pub mod page;
mod select;
mod update;

pub use config::QueryConfig;
pub use page::{Page, Pageable};
pub use select::SelectQuery;
pub use update::UpdateClause;

// Re-export core types
pub use sift_core::query;
pub use sift_core::{
    Bean, ColumnSet, Columns, Compiled, Constructor, DataSource, Entity, EntityMeta,
    EntityProjection, Error, FieldMeta, FieldType, FromColumns, FromValue, MemoryDataSource,
    Optional, Projection, Projections, Result, Row, Schema, Settable, Tuple, Value, ValueKind,
};

use sift_core::query::{Assignment, Condition, EntityPath};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point for composing and running queries against a data source.
///
/// The factory is cheap to create and holds no query state; every `select`
/// starts an independent query.
///
/// # Examples
///
/// ```rust
/// use sift::query::{EntityPath, Field};
/// use sift::{EntityMeta, MemoryDataSource, QueryFactory, Schema, ValueKind};
///
/// const MEMBER: EntityPath = EntityPath::new("member");
/// const AGE: Field<i64> = Field::new("member", "age");
///
/// let source = MemoryDataSource::new(
///     Schema::new().with_entity(EntityMeta::new("member").field("age", ValueKind::Integer)),
/// );
/// let factory = QueryFactory::new(&source);
/// assert_eq!(factory.select(AGE).from(MEMBER).fetch_count()?, 0);
/// # Ok::<(), sift::Error>(())
/// ```
pub struct QueryFactory<'a, S: ?Sized> {
    source: &'a S,
    config: QueryConfig,
}

impl<'a, S: DataSource + ?Sized> QueryFactory<'a, S> {
    /// Creates a factory with the default configuration.
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            config: QueryConfig::default(),
        }
    }

    /// Replaces the configuration after validating it.
    pub fn with_config(mut self, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    /// Starts a query producing `projection`'s output per result.
    pub fn select<P: Projection>(&self, projection: P) -> SelectQuery<'a, S, P> {
        SelectQuery::new(self.source, self.config.clone(), projection)
    }

    /// Starts a query over an entity's own path, producing whole entities.
    pub fn select_from<E: Entity>(&self) -> SelectQuery<'a, S, EntityProjection<E>> {
        self.select(Projections::entity::<E>()).from(E::path())
    }

    /// Starts a bulk update of `entity`.
    pub fn update(&self, entity: EntityPath) -> UpdateClause<'a, S> {
        UpdateClause::new(self.source, entity)
    }

    /// Applies one assignment to every row matching `condition`.
    ///
    /// The entity is the one the assigned field belongs to. Returns the number
    /// of affected rows.
    pub fn bulk_update(
        &self,
        assignment: Assignment,
        condition: impl Into<Condition>,
    ) -> Result<u64> {
        let path = assignment.field.path.clone();
        let entity = EntityPath {
            entity: path.clone(),
            alias: path,
        };
        self.update(entity)
            .assign(assignment)
            .filter(condition)
            .execute()
    }
}
