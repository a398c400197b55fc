//! Entity metadata.
//!
//! The schema is fixed and known before any query is composed. Every field
//! reference in a query description is resolved against it before the
//! description reaches a data source.

use crate::error::{Error, Result};
use crate::value::ValueKind;
use std::collections::BTreeMap;

/// Metadata of a single entity attribute
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub kind: ValueKind,
    pub nullable: bool,
}

/// Metadata of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMeta {
    name: String,
    id_field: String,
    fields: Vec<FieldMeta>,
}

impl EntityMeta {
    /// Creates entity metadata with an integer `id` identifier field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: "id".to_string(),
            fields: vec![FieldMeta {
                name: "id".to_string(),
                kind: ValueKind::Integer,
                nullable: false,
            }],
        }
    }

    /// Renames the identifier field.
    pub fn with_id(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields[0].name = name.clone();
        self.id_field = name;
        self
    }

    /// Adds a nullable attribute.
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(FieldMeta {
            name: name.into(),
            kind,
            nullable: true,
        });
        self
    }

    /// Adds a non-nullable attribute.
    pub fn required(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push(FieldMeta {
            name: name.into(),
            kind,
            nullable: false,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Attributes in storage order, identifier first.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field_meta(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Registry of entity metadata
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, EntityMeta>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity, replacing any previous entity of the same name.
    pub fn with_entity(mut self, meta: EntityMeta) -> Self {
        self.register(meta);
        self
    }

    pub fn register(&mut self, meta: EntityMeta) {
        self.entities.insert(meta.name.clone(), meta);
    }

    pub fn entity(&self, name: &str) -> Result<&EntityMeta> {
        self.entities
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Resolves `field` on `entity`; `path` is the alias used in the query and
    /// only appears in the error.
    pub fn resolve(&self, path: &str, entity: &str, field: &str) -> Result<&FieldMeta> {
        self.entity(entity)?
            .field_meta(field)
            .ok_or_else(|| Error::UnresolvedField {
                path: path.to_string(),
                field: field.to_string(),
            })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.values()
    }
}
