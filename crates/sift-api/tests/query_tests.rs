// Fetch modes, ordering, paging and subqueries

mod common;

use common::*;
use sift::query::{EntityPath, Field, Query, Selectable};
use sift::{
    EntityMeta, Error, MemoryDataSource, Pageable, QueryConfig, QueryFactory, Schema, Value,
    ValueKind,
};

#[test]
fn test_fetch_all() {
    let source = members();
    let members = QueryFactory::new(&source)
        .select_from::<Member>()
        .fetch()
        .unwrap();
    assert_eq!(members.len(), 6);
}

#[test]
fn test_sort_desc_with_nulls_last() {
    let source = members();
    let names = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .order_by(AGE.desc())
        .order_by(USERNAME.asc().nulls_last())
        .fetch()
        .unwrap();

    let mut expected = usernames(&["member5", "member3", "member2", "member1", "member4"]);
    expected.push(None);
    assert_eq!(names, expected);
}

#[test]
fn test_sort_float_column_with_nan() {
    const READING: EntityPath = EntityPath::new("reading");
    const SCORE: Field<f64> = Field::new("reading", "score");

    let source = MemoryDataSource::new(
        Schema::new().with_entity(EntityMeta::new("reading").field("score", ValueKind::Float)),
    );
    for i in 0..40 {
        let score = if i % 3 == 0 { f64::NAN } else { (40 - i) as f64 };
        source.insert("reading", [("score", Value::from(score))]).unwrap();
    }
    let factory = QueryFactory::new(&source);

    let scores = factory
        .select(SCORE)
        .from(READING)
        .order_by(SCORE.asc())
        .fetch()
        .unwrap();
    assert_eq!(scores.len(), 40);
    let (numbers, nans) = scores.split_at(26);
    assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
    assert!(nans.iter().all(|score| score.is_some_and(f64::is_nan)));

    let lowest = factory
        .select(SCORE.min())
        .from(READING)
        .fetch_one()
        .unwrap();
    assert_eq!(lowest, Some(Some(2.0)));
}

#[test]
fn test_nulls_first() {
    let source = members();
    let names = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq(10))
        .order_by(USERNAME.asc().nulls_first())
        .fetch()
        .unwrap();
    assert_eq!(names, vec![None, Some("member1".into()), Some("member4".into())]);
}

#[test]
fn test_offset_and_limit() {
    let source = members();
    let names = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .order_by(AGE.desc())
        .order_by(USERNAME.asc())
        .offset(1)
        .limit(2)
        .fetch()
        .unwrap();
    assert_eq!(names, usernames(&["member3", "member2"]));
}

#[test]
fn test_fetch_page() {
    let source = members();
    let page = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .order_by(AGE.desc())
        .order_by(USERNAME.asc())
        .fetch_page(Pageable::new(1, 2))
        .unwrap();

    assert_eq!(page.total, 6);
    assert_eq!(page.content, usernames(&["member3", "member2"]));
    assert_eq!(page.total_pages(), 3);
    assert!(!page.is_last());
}

#[test]
fn test_page_size_is_clamped() {
    let source = members();
    let factory = QueryFactory::new(&source)
        .with_config(QueryConfig::default().with_max_page_size(4))
        .unwrap();
    let page = factory
        .select(USERNAME)
        .from(MEMBER)
        .fetch_page(Pageable::of(0, 50))
        .unwrap();
    assert_eq!(page.limit, 4);
    assert_eq!(page.len(), 4);
    assert_eq!(page.total, 6);
}

#[test]
fn test_invalid_config_is_rejected() {
    let source = members();
    let result = QueryFactory::new(&source).with_config(QueryConfig::default().with_max_page_size(0));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_fetch_one() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let found = factory
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq(100))
        .fetch_one()
        .unwrap();
    assert_eq!(found, Some(Some("member5".to_string())));

    let missing = factory
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq(99))
        .fetch_one()
        .unwrap();
    assert_eq!(missing, None);

    let ambiguous = factory
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq(10))
        .fetch_one();
    assert!(matches!(ambiguous, Err(Error::AmbiguousResult { found: 3 })));
}

#[test]
fn test_fetch_first_and_count() {
    let source = members();
    let query = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq(10))
        .order_by(USERNAME.asc());

    assert_eq!(query.fetch_first().unwrap(), Some(Some("member1".to_string())));
    assert_eq!(query.fetch_count().unwrap(), 3);
    // paging does not change the count
    let paged = query.offset(2).limit(1);
    assert_eq!(paged.fetch().unwrap().len(), 1);
    assert_eq!(paged.fetch_count().unwrap(), 3);
}

#[test]
fn test_scalar_subqueries() {
    let source = members();
    let factory = QueryFactory::new(&source);
    let sub = MEMBER.aliased("member_sub");

    let max_age = Query::new(sub.clone()).select([AGE.of(&sub).max().select_item()]);
    let oldest = factory
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq_subquery(max_age))
        .fetch()
        .unwrap();
    assert_eq!(oldest, usernames(&["member5"]));

    // average age is 30
    let avg_age = Query::new(sub.clone()).select([AGE.of(&sub).avg().select_item()]);
    let at_least_average = factory
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.goe_subquery(avg_age))
        .order_by(AGE.asc())
        .fetch()
        .unwrap();
    assert_eq!(at_least_average, usernames(&["member3", "member5"]));
}

#[test]
fn test_in_subquery() {
    let source = members();
    let sub = MEMBER.aliased("member_sub");
    let older_than_ten = Query::new(sub.clone())
        .select([AGE.of(&sub).select_item()])
        .filter(AGE.of(&sub).gt(10).into_expr().unwrap());

    let names = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.in_subquery(older_than_ten))
        .order_by(AGE.asc())
        .fetch()
        .unwrap();
    assert_eq!(names, usernames(&["member2", "member3", "member5"]));
}

#[test]
fn test_scalar_subquery_with_many_rows() {
    let source = members();
    let sub = MEMBER.aliased("member_sub");
    let every_age = Query::new(sub.clone()).select([AGE.of(&sub).select_item()]);

    let result = QueryFactory::new(&source)
        .select(USERNAME)
        .from(MEMBER)
        .filter(AGE.eq_subquery(every_age))
        .fetch();
    assert!(matches!(result, Err(Error::AmbiguousResult { found: 6 })));
}

#[test]
fn test_malformed_queries() {
    let source = members();
    let factory = QueryFactory::new(&source);

    let no_from = factory.select(USERNAME).fetch();
    assert!(matches!(no_from, Err(Error::InvalidQuery(_))));

    let dangling_on = factory
        .select(USERNAME)
        .from(MEMBER)
        .on(TEAM_NAME.eq("teamA".to_string()))
        .fetch();
    assert!(matches!(dangling_on, Err(Error::InvalidQuery(_))));
}

#[test]
fn test_bare_column_in_grouped_query() {
    let source = members();
    let result = QueryFactory::new(&source)
        .select((USERNAME, AGE.count()))
        .from(MEMBER)
        .group_by(&AGE)
        .fetch();
    assert!(matches!(result, Err(Error::InvalidQuery(_))));
}
