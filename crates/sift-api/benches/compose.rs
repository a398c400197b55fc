//! Benchmarks for condition composition and query execution.
//!
//! Composition is measured on its own; execution runs against the in-memory
//! source at a few table sizes, crossing the point where joins switch from
//! nested loops to hashing.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sift::query::{Condition, ConditionBuilder, EntityPath, Field, Reference};
use sift::{EntityMeta, MemoryDataSource, Pageable, QueryFactory, Schema, Value, ValueKind};
use std::hint::black_box;

const MEMBER: EntityPath = EntityPath::new("member");
const USERNAME: Field<String> = Field::new("member", "username");
const AGE: Field<i64> = Field::new("member", "age");
const TEAM_NAME: Field<String> = Field::new("team", "name");
const MEMBER_TEAM: Reference = Reference::new("member", "team_id", "team", "id");

fn source(members: usize) -> MemoryDataSource {
    let source = MemoryDataSource::new(
        Schema::new()
            .with_entity(EntityMeta::new("team").required("name", ValueKind::String))
            .with_entity(
                EntityMeta::new("member")
                    .field("username", ValueKind::String)
                    .field("age", ValueKind::Integer)
                    .field("team_id", ValueKind::Integer),
            ),
    );

    let teams = (members / 10).max(1);
    for index in 0..teams {
        source
            .insert("team", [("name", Value::from(format!("team{}", index)))])
            .expect("Failed to insert team");
    }
    for index in 0..members {
        source
            .insert(
                "member",
                [
                    ("username", Value::from(format!("member{}", index))),
                    ("age", Value::from((index % 80) as i64)),
                    ("team_id", Value::from((index % teams) as i64 + 1)),
                ],
            )
            .expect("Failed to insert member");
    }
    source
}

// =============================================================================
// Composition
// =============================================================================

fn benchmark_compose(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("compose");

    let inputs: (Option<String>, Option<i64>, Option<i64>) =
        (Some("team3".to_string()), None, Some(40));

    group.bench_function("pure", |bencher| {
        bencher.iter(|| {
            let (team, goe, loe) = black_box(&inputs);
            black_box(Condition::all([
                TEAM_NAME.eq(team.clone()),
                AGE.goe(*goe),
                AGE.loe(*loe),
            ]))
        });
    });

    group.bench_function("builder", |bencher| {
        bencher.iter(|| {
            let (team, goe, loe) = black_box(&inputs);
            let mut builder = ConditionBuilder::new();
            if let Some(team) = team {
                builder.and(TEAM_NAME.eq(team.clone()));
            }
            if let Some(goe) = goe {
                builder.and(AGE.goe(*goe));
            }
            if let Some(loe) = loe {
                builder.and(AGE.loe(*loe));
            }
            black_box(builder.build())
        });
    });

    group.finish();
}

// =============================================================================
// Execution
// =============================================================================

fn benchmark_search(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("search_page");

    for size in [50, 500, 5_000] {
        let source = source(size);
        let condition = Condition::all([TEAM_NAME.eq("team3".to_string()), AGE.loe(40)]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            let factory = QueryFactory::new(&source);
            bencher.iter(|| {
                let page = factory
                    .select(USERNAME)
                    .from(MEMBER)
                    .join(&MEMBER_TEAM)
                    .order_by(AGE.desc())
                    .search_page(black_box(&condition), Pageable::of(0, 20));
                black_box(page)
            });
        });
    }

    group.finish();
}

fn benchmark_group_by(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("group_by");

    for size in [50, 500, 5_000] {
        let source = source(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            let factory = QueryFactory::new(&source);
            bencher.iter(|| {
                black_box(
                    factory
                        .select((TEAM_NAME, AGE.avg()))
                        .from(MEMBER)
                        .join(&MEMBER_TEAM)
                        .group_by(&TEAM_NAME)
                        .fetch(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_compose,
    benchmark_search,
    benchmark_group_by
);
criterion_main!(benches);
