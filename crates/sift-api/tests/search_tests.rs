// Search entry points and bulk updates

mod common;

use common::*;
use sift::query::{Condition, SearchCondition};
use sift::{Error, MemoryDataSource, Pageable, QueryFactory};

fn member_search(
    source: &MemoryDataSource,
    condition: &MemberSearchCondition,
) -> Vec<Option<String>> {
    QueryFactory::new(source)
        .select(USERNAME)
        .from(MEMBER)
        .left_join(&MEMBER_TEAM)
        .order_by(MEMBER_ID.asc())
        .search(condition)
        .unwrap()
}

#[test]
fn test_search_scenario() {
    let source = scenario();
    let condition = MemberSearchCondition {
        team_name: Some("Y".into()),
        age_goe: Some(25),
        ..Default::default()
    };
    assert_eq!(member_search(&source, &condition), usernames(&["C"]));
}

#[test]
fn test_unset_search_returns_everything() {
    let source = members();
    let condition = MemberSearchCondition::default();
    assert!(condition.build_condition().is_absent());
    assert_eq!(member_search(&source, &condition).len(), 6);
}

#[test]
fn test_search_age_range() {
    let source = members();
    let condition = MemberSearchCondition {
        age_goe: Some(20),
        age_loe: Some(30),
        ..Default::default()
    };
    assert_eq!(member_search(&source, &condition), usernames(&["member2", "member3"]));
}

#[test]
fn test_search_page_and_count() {
    let source = members();
    let factory = QueryFactory::new(&source);
    let condition = MemberSearchCondition {
        age_loe: Some(30),
        ..Default::default()
    };

    let page = factory
        .select(USERNAME)
        .from(MEMBER)
        .order_by(AGE.asc())
        .order_by(MEMBER_ID.asc())
        .search_page(&condition, Pageable::of(1, 2))
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.content, vec![None, Some("member2".to_string())]);

    let count = factory.select(USERNAME).from(MEMBER).count(&condition).unwrap();
    assert_eq!(count, 5);
}

#[test]
fn test_plain_condition_is_a_search_condition() {
    let source = members();
    let count = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .count(&AGE.eq(10))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_bulk_update_scenario() {
    let source = MemoryDataSource::new(schema());
    insert_member(&source, Some("A"), 10, None);
    insert_member(&source, Some("B"), 30, None);

    let factory = QueryFactory::new(&source);
    let loaded = factory.select_from::<Member>().order_by(AGE.asc()).fetch().unwrap();

    let affected = factory
        .bulk_update(USERNAME.assign("X".to_string()), AGE.lt(28))
        .unwrap();
    assert_eq!(affected, 1);

    // values loaded before the update are not refreshed
    assert_eq!(loaded[0].username.as_deref(), Some("A"));

    let names = factory
        .select(USERNAME)
        .from(MEMBER)
        .order_by(AGE.asc())
        .fetch()
        .unwrap();
    assert_eq!(names, usernames(&["X", "B"]));
}

#[test]
fn test_update_clause() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let affected = factory
        .update(MEMBER)
        .set(&AGE, 11)
        .set(&MEMBER_TEAM_ID, None)
        .filter(AGE.eq(10))
        .execute()
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(
        factory.select(USERNAME).from(MEMBER).count(&AGE.eq(11)).unwrap(),
        3
    );

    // an absent filter updates every row
    let affected = factory
        .update(MEMBER)
        .set(&AGE, 1)
        .filter(Condition::absent())
        .execute()
        .unwrap();
    assert_eq!(affected, 6);
}

#[test]
fn test_invalid_updates() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let no_assignments = factory.update(MEMBER).filter(AGE.eq(10)).execute();
    assert!(matches!(no_assignments, Err(Error::InvalidQuery(_))));

    let identifier = factory.update(MEMBER).set(&MEMBER_ID, 99).execute();
    assert!(matches!(identifier, Err(Error::InvalidQuery(_))));

    let foreign = factory.update(MEMBER).set(&TEAM_NAME, "x".to_string()).execute();
    assert!(matches!(foreign, Err(Error::UnresolvedField { .. })));
}
