use sift::logging::LogConfig;
use sift::query::{Condition, EntityPath, Field, Reference, SearchCondition, Selectable};
use sift::{
    EntityMeta, MemoryDataSource, Pageable, Projections, QueryConfig, QueryFactory, Schema, Value,
    ValueKind,
};

const MEMBER: EntityPath = EntityPath::new("member");
const USERNAME: Field<String> = Field::new("member", "username");
const AGE: Field<i64> = Field::new("member", "age");
const TEAM_NAME: Field<String> = Field::new("team", "name");
const MEMBER_TEAM: Reference = Reference::new("member", "team_id", "team", "id");

#[derive(Debug, Default)]
struct MemberSearch {
    team_name: Option<String>,
    age_goe: Option<i64>,
    age_loe: Option<i64>,
}

impl SearchCondition for MemberSearch {
    fn build_condition(&self) -> Condition {
        Condition::all([
            TEAM_NAME.eq(self.team_name.clone()),
            AGE.goe(self.age_goe),
            AGE.loe(self.age_loe),
        ])
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Statements and timings are logged at debug
    let _guard = LogConfig::info().with_query_level("debug").init()?;

    println!("=== Sift Search Demo ===\n");

    let schema = Schema::new()
        .with_entity(EntityMeta::new("team").required("name", ValueKind::String))
        .with_entity(
            EntityMeta::new("member")
                .required("username", ValueKind::String)
                .field("age", ValueKind::Integer)
                .field("team_id", ValueKind::Integer),
        );
    let source = MemoryDataSource::new(schema);

    let team_a = source.insert("team", [("name", Value::from("teamA"))])?;
    let team_b = source.insert("team", [("name", Value::from("teamB"))])?;
    for (i, age) in [10, 20, 30, 40, 50, 60].into_iter().enumerate() {
        let team = if i % 2 == 0 { team_a } else { team_b };
        source.insert(
            "member",
            [
                ("username", Value::from(format!("member{}", i + 1))),
                ("age", Value::from(age)),
                ("team_id", Value::from(team)),
            ],
        )?;
    }

    let factory =
        QueryFactory::new(&source).with_config(QueryConfig::default().with_max_page_size(100))?;

    println!("1. Search with only some inputs set...");
    let search = MemberSearch {
        team_name: Some("teamB".to_string()),
        age_goe: Some(25),
        ..Default::default()
    };
    println!("   condition: {}", search.build_condition());
    let rows = factory
        .select((USERNAME, TEAM_NAME))
        .from(MEMBER)
        .join(&MEMBER_TEAM)
        .order_by(AGE.asc())
        .search(&search)?;
    for (username, team) in rows {
        println!("   {:?} in {:?}", username, team);
    }

    println!("\n2. Paging the unfiltered search...");
    let page = factory
        .select(Projections::tuple([
            USERNAME.as_("name").select_item(),
            AGE.as_("age").select_item(),
        ]))
        .from(MEMBER)
        .join(&MEMBER_TEAM)
        .order_by(AGE.desc())
        .search_page(&MemberSearch::default(), Pageable::of(1, 2))?;
    println!(
        "   page {} of {} ({} total)",
        page.offset / page.limit + 1,
        page.total_pages(),
        page.total
    );
    for row in &page.content {
        println!("   {:?}", row.values());
    }

    println!("\n3. Average age per team...");
    let averages = factory
        .select((TEAM_NAME, AGE.avg()))
        .from(MEMBER)
        .join(&MEMBER_TEAM)
        .group_by(&TEAM_NAME)
        .fetch()?;
    for (team, avg) in averages {
        println!("   {:?}: {:?}", team, avg);
    }

    println!("\n4. Bulk update...");
    let affected = factory.bulk_update(USERNAME.assign("junior".to_string()), AGE.lt(25))?;
    println!("   renamed {} members", affected);

    println!("\n=== Demo Complete ===");
    Ok(())
}
