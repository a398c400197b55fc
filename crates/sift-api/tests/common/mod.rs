// Common fixtures for query integration tests
#![allow(dead_code)]

use serde::Deserialize;
use sift::query::{Condition, EntityPath, Field, FieldRef, Reference, SearchCondition};
use sift::{
    Columns, Entity, EntityMeta, Error, FromColumns, FromValue, MemoryDataSource, Result, Schema,
    Settable, Value, ValueKind,
};

pub const MEMBER: EntityPath = EntityPath::new("member");
pub const TEAM: EntityPath = EntityPath::new("team");

pub const MEMBER_ID: Field<i64> = Field::new("member", "id");
pub const USERNAME: Field<String> = Field::new("member", "username");
pub const AGE: Field<i64> = Field::new("member", "age");
pub const MEMBER_TEAM_ID: Field<i64> = Field::new("member", "team_id");

pub const TEAM_ID: Field<i64> = Field::new("team", "id");
pub const TEAM_NAME: Field<String> = Field::new("team", "name");

pub const MEMBER_TEAM: Reference = Reference::new("member", "team_id", "team", "id");

pub fn schema() -> Schema {
    Schema::new()
        .with_entity(EntityMeta::new("team").required("name", ValueKind::String))
        .with_entity(
            EntityMeta::new("member")
                .field("username", ValueKind::String)
                .field("age", ValueKind::Integer)
                .field("team_id", ValueKind::Integer),
        )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
}

impl FromColumns for Member {
    fn from_columns(columns: &mut Columns) -> Result<Self> {
        Ok(Member {
            id: columns.required()?,
            username: columns.next_value()?,
            age: columns.next_value()?,
            team_id: columns.next_value()?,
        })
    }
}

impl Entity for Member {
    fn path() -> EntityPath {
        MEMBER
    }

    fn columns() -> Vec<FieldRef> {
        vec![
            MEMBER_ID.reference().clone(),
            USERNAME.reference().clone(),
            AGE.reference().clone(),
            MEMBER_TEAM_ID.reference().clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl FromColumns for Team {
    fn from_columns(columns: &mut Columns) -> Result<Self> {
        Ok(Team {
            id: columns.required()?,
            name: columns.required()?,
        })
    }
}

impl Entity for Team {
    fn path() -> EntityPath {
        TEAM
    }

    fn columns() -> Vec<FieldRef> {
        vec![TEAM_ID.reference().clone(), TEAM_NAME.reference().clone()]
    }
}

/// Optional member filters, as received from a search form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSearchCondition {
    pub username: Option<String>,
    pub team_name: Option<String>,
    pub age_goe: Option<i64>,
    pub age_loe: Option<i64>,
}

impl SearchCondition for MemberSearchCondition {
    fn build_condition(&self) -> Condition {
        Condition::all([
            USERNAME.eq(self.username.clone()),
            TEAM_NAME.eq(self.team_name.clone()),
            AGE.goe(self.age_goe),
            AGE.loe(self.age_loe),
        ])
    }
}

/// Read through both property assignment and position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberDto {
    pub username: Option<String>,
    pub age: Option<i64>,
}

impl Settable for MemberDto {
    fn set(&mut self, attribute: &str, value: Value) -> Result<()> {
        match attribute {
            "username" => self.username = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            other => return Err(Error::unknown_attribute("MemberDto", other)),
        }
        Ok(())
    }
}

impl FromColumns for MemberDto {
    fn from_columns(columns: &mut Columns) -> Result<Self> {
        Ok(MemberDto {
            username: columns.next_value()?,
            age: columns.next_value()?,
        })
    }
}

/// Attribute names differ from the entity's field names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDto {
    pub name: Option<String>,
    pub age: Option<i64>,
}

impl Settable for UserDto {
    fn set(&mut self, attribute: &str, value: Value) -> Result<()> {
        match attribute {
            "name" => self.name = FromValue::from_value(value)?,
            "age" => self.age = FromValue::from_value(value)?,
            other => return Err(Error::unknown_attribute("UserDto", other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberTeamDto {
    pub member_id: i64,
    pub username: Option<String>,
    pub age: Option<i64>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
}

impl FromColumns for MemberTeamDto {
    fn from_columns(columns: &mut Columns) -> Result<Self> {
        Ok(MemberTeamDto {
            member_id: columns.required()?,
            username: columns.next_value()?,
            age: columns.next_value()?,
            team_id: columns.next_value()?,
            team_name: columns.next_value()?,
        })
    }
}

pub fn insert_team(source: &MemoryDataSource, name: &str) -> i64 {
    source
        .insert("team", [("name", Value::from(name))])
        .expect("Failed to insert team")
}

pub fn insert_member(
    source: &MemoryDataSource,
    username: Option<&str>,
    age: i64,
    team: Option<i64>,
) -> i64 {
    let username = username.map_or(Value::Null, Value::from);
    let team = team.map_or(Value::Null, Value::from);
    source
        .insert(
            "member",
            [
                ("username", username),
                ("age", Value::from(age)),
                ("team_id", team),
            ],
        )
        .expect("Failed to insert member")
}

/// Two teams and six members:
///
/// | username | age | team  |
/// |----------|-----|-------|
/// | member1  | 10  | teamA |
/// | member2  | 20  | teamA |
/// | member3  | 30  | teamB |
/// | member4  | 10  | teamB |
/// | member5  | 100 | teamB |
/// | (null)   | 10  | none  |
pub fn members() -> MemoryDataSource {
    let source = MemoryDataSource::new(schema());
    let team_a = insert_team(&source, "teamA");
    let team_b = insert_team(&source, "teamB");

    insert_member(&source, Some("member1"), 10, Some(team_a));
    insert_member(&source, Some("member2"), 20, Some(team_a));
    insert_member(&source, Some("member3"), 30, Some(team_b));
    insert_member(&source, Some("member4"), 10, Some(team_b));
    insert_member(&source, Some("member5"), 100, Some(team_b));
    insert_member(&source, None, 10, None);
    source
}

/// A(10, X), B(20, X), C(30, Y)
pub fn scenario() -> MemoryDataSource {
    let source = MemoryDataSource::new(schema());
    let x = insert_team(&source, "X");
    let y = insert_team(&source, "Y");

    insert_member(&source, Some("A"), 10, Some(x));
    insert_member(&source, Some("B"), 20, Some(x));
    insert_member(&source, Some("C"), 30, Some(y));
    source
}

pub fn usernames(names: &[&str]) -> Vec<Option<String>> {
    names.iter().map(|n| Some(n.to_string())).collect()
}
