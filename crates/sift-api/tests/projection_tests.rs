// Projection strategies over real query results

mod common;

use common::*;
use sift::query::{Expressions, Field, Selectable};
use sift::{Error, Projections, QueryFactory};

#[test]
fn test_single_column() {
    let source = members();
    let ages = QueryFactory::new(&source)
        .select(AGE)
        .from(MEMBER)
        .filter(USERNAME.starts_with("member"))
        .order_by(AGE.desc())
        .fetch()
        .unwrap();
    assert_eq!(ages, vec![Some(100), Some(30), Some(20), Some(10), Some(10)]);
}

#[test]
fn test_tuple_projection() {
    let source = members();
    let rows = QueryFactory::new(&source)
        .select(Projections::tuple([USERNAME.select_item(), AGE.select_item()]))
        .from(MEMBER)
        .filter(AGE.eq(100))
        .fetch()
        .unwrap();
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.get(&USERNAME).unwrap().as_deref(), Some("member5"));
    assert_eq!(row.get(&AGE).unwrap(), Some(100));
    assert_eq!(row.get_at::<i64>(1).unwrap(), Some(100));
}

#[test]
fn test_bean_projection_with_alias() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let members = factory
        .select(Projections::bean::<MemberDto, _>([
            USERNAME.select_item(),
            AGE.select_item(),
        ]))
        .from(MEMBER)
        .filter(AGE.eq(20))
        .fetch()
        .unwrap();
    assert_eq!(
        members,
        vec![MemberDto {
            username: Some("member2".into()),
            age: Some(20)
        }]
    );

    let users = factory
        .select(Projections::bean::<UserDto, _>([
            USERNAME.as_("name").select_item(),
            AGE.select_item(),
        ]))
        .from(MEMBER)
        .filter(AGE.eq(20))
        .fetch()
        .unwrap();
    assert_eq!(users[0].name.as_deref(), Some("member2"));
}

#[test]
fn test_bean_projection_without_alias_fails() {
    let source = members();
    let result = QueryFactory::new(&source)
        .select(Projections::bean::<UserDto, _>([USERNAME, USERNAME]))
        .from(MEMBER)
        .fetch();
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));
}

#[test]
fn test_constructor_projection() {
    let source = members();
    let members = QueryFactory::new(&source)
        .select(Projections::constructor::<MemberDto, _>([
            USERNAME.select_item(),
            AGE.select_item(),
        ]))
        .from(MEMBER)
        .order_by(AGE.desc())
        .limit(1)
        .fetch()
        .unwrap();
    assert_eq!(members[0].username.as_deref(), Some("member5"));
}

#[test]
fn test_compiled_projection() {
    let source = members();
    let members = QueryFactory::new(&source)
        .select(Projections::compiled((USERNAME, AGE), |(username, age)| {
            MemberDto { username, age }
        }))
        .from(MEMBER)
        .filter(AGE.goe(30))
        .order_by(AGE.asc())
        .fetch()
        .unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[1].age, Some(100));
}

#[test]
fn test_compiled_projection_checks_schema_before_running() {
    let source = members();
    // `username` is declared as a string attribute
    let mistyped: Field<i64> = Field::new("member", "username");
    let result = QueryFactory::new(&source)
        .select(Projections::compiled((mistyped,), |(value,)| value))
        .from(MEMBER)
        .fetch();
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));
}

#[test]
fn test_entity_projection() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let members = factory
        .select_from::<Member>()
        .filter(AGE.eq(100))
        .fetch()
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username.as_deref(), Some("member5"));
    assert_eq!(members[0].team_id, Some(2));

    let teams = factory.select_from::<Team>().order_by(TEAM_NAME.asc()).fetch().unwrap();
    assert_eq!(
        teams.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        vec!["teamA", "teamB"]
    );
}

#[test]
fn test_constant_and_concat() {
    let source = members();
    let (name, constant) = QueryFactory::new(&source)
        .select((USERNAME, Expressions::constant("A".to_string())))
        .from(MEMBER)
        .filter(AGE.eq(20))
        .fetch_one()
        .unwrap()
        .unwrap();
    assert_eq!(name.as_deref(), Some("member2"));
    assert_eq!(constant.as_deref(), Some("A"));

    let labels = QueryFactory::new(&source)
        .select(USERNAME.concat("_").concat(AGE.string_value()))
        .from(MEMBER)
        .filter(AGE.eq(20))
        .fetch()
        .unwrap();
    assert_eq!(labels, vec![Some("member2_20".to_string())]);
}

#[test]
fn test_unknown_field_is_rejected_before_execution() {
    let source = members();
    let nickname: Field<String> = Field::new("member", "nickname");
    let result = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .filter(nickname.eq("x".to_string()))
        .fetch();
    assert!(matches!(result, Err(Error::UnresolvedField { .. })));
}
