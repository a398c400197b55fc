//! # Sift Core
//!
//! Core types for Sift: typed condition composition, query descriptions,
//! projections, and the data source seam.
//!
//! Conditions are values. An unset search input produces the absent
//! [`Condition`](query::Condition), which contributes nothing when combined,
//! so a search over optional inputs is written as one expression:
//!
//! ```
//! use sift_core::query::{Condition, Field};
//!
//! const TEAM_NAME: Field<String> = Field::new("team", "name");
//! const AGE: Field<i64> = Field::new("member", "age");
//!
//! let team: Option<String> = Some("teamB".to_string());
//! let age_goe: Option<i64> = None;
//!
//! let condition = Condition::all([TEAM_NAME.eq(team), AGE.goe(age_goe)]);
//! assert_eq!(condition.to_string(), "team.name = 'teamB'");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
#[allow(missing_docs)]
pub mod projection;
pub mod query;
#[allow(missing_docs)]
pub mod row;
#[allow(missing_docs)]
pub mod schema;
#[allow(missing_docs)]
pub mod source;
#[allow(missing_docs)]
pub mod value;

pub use error::{Error, Result};
pub use projection::{
    Bean, ColumnSet, Compiled, Constructor, Entity, EntityProjection, FromColumns, Optional,
    Projection, Projections, Settable, Tuple,
};
pub use row::{Columns, Row};
pub use schema::{EntityMeta, FieldMeta, Schema};
pub use source::{DataSource, MemoryDataSource};
pub use value::{CompareOp, FieldType, FromValue, Value, ValueKind};
