use std::ops::ControlFlow;

use chrono::{DateTime, TimeZone, Utc};
use rowbind::{CatalogBuilder, DbClient, DbError, Entity, Querier, SqlValue};

#[derive(Debug, Default, Clone, PartialEq)]
struct TestRow {
    id: i32,
    name: String,
}

impl Entity for TestRow {
    fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self> {
        catalog
            .field("id", |r, v| r.id = v)
            .field("name", |r, v| r.name = v)
    }
}

/// A querier over a fresh database holding rows 1..=50 named "Name 1".."Name 50".
async fn seeded() -> (DbClient, Querier) {
    let client = DbClient::open_sqlite_in_memory().unwrap();
    let querier = client.querier();

    querier
        .update(
            "create table tests (id integer primary key on conflict fail, name text)",
            &[],
        )
        .await
        .unwrap();
    for id in 1..=50 {
        querier
            .update(
                "insert into tests (id, name) values (?, ?)",
                &[SqlValue::Int(id), format!("Name {id}").into()],
            )
            .await
            .unwrap();
    }

    (client, querier)
}

fn test_row(id: i32) -> TestRow {
    TestRow {
        id,
        name: format!("Name {id}"),
    }
}

#[tokio::test]
async fn test_list_entities() {
    let (_client, querier) = seeded().await;

    let rows: Vec<TestRow> = querier
        .list("select * from tests order by id limit ?", &[SqlValue::Int(20)])
        .await
        .unwrap();
    assert_eq!(rows, (1..=20).map(test_row).collect::<Vec<_>>());

    let err = querier
        .list::<TestRow>("select * from tests2", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Prepare(_)));
}

#[tokio::test]
async fn test_list_scalars() {
    let (_client, querier) = seeded().await;

    let names: Vec<String> = querier
        .list("select name from tests order by id limit ?", &[SqlValue::Int(20)])
        .await
        .unwrap();
    assert_eq!(names, (1..=20).map(|i| format!("Name {i}")).collect::<Vec<_>>());

    let ids: Vec<i64> = querier
        .list("select id from tests where id > ? order by id", &[SqlValue::Int(48)])
        .await
        .unwrap();
    assert_eq!(ids, vec![49, 50]);
}

#[tokio::test]
async fn test_stream_stops_when_asked() {
    let (_client, querier) = seeded().await;

    let mut seen = Vec::new();
    let count = querier
        .stream("select * from tests order by id", &[], |row: TestRow| {
            if row.id > 20 {
                return ControlFlow::Break(());
            }
            seen.push(row);
            ControlFlow::Continue(())
        })
        .await
        .unwrap();

    assert_eq!(count, 20);
    assert_eq!(seen, (1..=20).map(test_row).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_raw_stream() {
    let (_client, querier) = seeded().await;

    let mut names = Vec::new();
    let count = querier
        .raw_stream(
            "select id, name from tests where id <= ? order by id",
            &[SqlValue::Int(5)],
            |row| {
                assert_eq!(row.columns(), vec!["id", "name"]);
                names.push(row.try_get::<String>("name").unwrap());
                ControlFlow::Continue(())
            },
        )
        .await
        .unwrap();

    assert_eq!(count, 5);
    assert_eq!(names, (1..=5).map(|i| format!("Name {i}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_first() {
    let (_client, querier) = seeded().await;

    let row: TestRow = querier
        .first("select * from tests where id = ?", &[SqlValue::Int(20)])
        .await
        .unwrap();
    assert_eq!(row, test_row(20));

    let name: String = querier
        .first("select name from tests where id = ?", &[SqlValue::Int(20)])
        .await
        .unwrap();
    assert_eq!(name, "Name 20");

    let missing = querier
        .first::<TestRow>("select * from tests where id = ?", &[SqlValue::Int(100)])
        .await
        .unwrap_err();
    assert!(matches!(missing, DbError::NoRows));
}

#[tokio::test]
async fn test_insert() {
    let (_client, querier) = seeded().await;

    let id: i32 = querier
        .insert(
            "insert into tests (id, name) values (?, ?)",
            &[SqlValue::Int(100), "Name 100".into()],
        )
        .await
        .unwrap();
    assert_eq!(id, 100);

    let generated: i64 = querier
        .insert("insert into tests (name) values (?)", &["Generated".into()])
        .await
        .unwrap();
    assert_eq!(generated, 101);

    let returned: i64 = querier
        .insert(
            "insert into tests (name) values (?) returning id",
            &["Returned".into()],
        )
        .await
        .unwrap();
    assert_eq!(returned, 102);

    let duplicate = querier
        .insert::<i32>(
            "insert into tests (id, name) values (?, ?)",
            &[SqlValue::Int(1), "Name 1".into()],
        )
        .await
        .unwrap_err();
    match duplicate {
        DbError::Execute(detail) => assert!(detail.code.is_some()),
        other => panic!("Expected Execute error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update() {
    let (_client, querier) = seeded().await;

    let updated = querier
        .update(
            "update tests set name = 'Updated' where id = ? or id = ?",
            &[SqlValue::Int(1), SqlValue::Int(2)],
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let names: Vec<String> = querier
        .list("select name from tests where id <= 3 order by id", &[])
        .await
        .unwrap();
    assert_eq!(names, vec!["Updated", "Updated", "Name 3"]);

    let none = querier
        .update("update tests set name = 'x' where id = ?", &[SqlValue::Int(-1)])
        .await
        .unwrap();
    assert_eq!(none, 0);

    let deleted = querier.update("delete from tests", &[]).await.unwrap();
    assert_eq!(deleted, 50);

    let err = querier.update("delete from tests2", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Prepare(_)));
}

#[tokio::test]
async fn test_bind_count_mismatch_is_execute_error() {
    let (_client, querier) = seeded().await;

    let err = querier
        .list::<TestRow>("select * from tests where id = ? or id = ?", &[SqlValue::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Execute(_)));
}

rowbind::sql_enum! {
    #[derive(Default)]
    enum Tier {
        #[default]
        Bronze,
        Silver,
        Gold,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Member {
    id: i64,
    tier: Tier,
    joined: Option<DateTime<Utc>>,
    nickname: Option<String>,
}

impl Entity for Member {
    fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self> {
        catalog
            .field("id", |m, v| m.id = v)
            .field("tier", |m, v| m.tier = v)
            .field("joined", |m, v| m.joined = v)
            .field("nickname", |m, v| m.nickname = v)
    }
}

#[tokio::test]
async fn test_enum_and_timestamp_columns() {
    let client = DbClient::open_sqlite_in_memory().unwrap();
    let querier = client.querier();
    querier
        .update(
            "create table members (id integer primary key, tier text, joined text, nickname text)",
            &[],
        )
        .await
        .unwrap();

    let joined = Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap();
    let id: i64 = querier
        .insert(
            "insert into members (tier, joined, nickname) values (?, ?, ?)",
            &[Tier::Gold.into(), joined.into(), SqlValue::Null],
        )
        .await
        .unwrap();

    // Stored in lower case and as epoch seconds; both still map.
    querier
        .update(
            "insert into members (tier, joined, nickname) values ('silver', ?, 'Sil')",
            &[SqlValue::Int(joined.timestamp())],
        )
        .await
        .unwrap();

    let members: Vec<Member> = querier
        .list("select * from members order by id", &[])
        .await
        .unwrap();

    assert_eq!(
        members,
        vec![
            Member {
                id,
                tier: Tier::Gold,
                joined: Some(joined),
                nickname: None,
            },
            Member {
                id: id + 1,
                tier: Tier::Silver,
                joined: Some(joined),
                nickname: Some("Sil".to_string()),
            },
        ]
    );

    let tier: Tier = querier
        .first("select tier from members where id = ?", &[SqlValue::Int(id)])
        .await
        .unwrap();
    assert_eq!(tier, Tier::Gold);
}

#[tokio::test]
async fn test_insert_reports_id_for_cte_and_commented_statements() {
    let (_client, querier) = seeded().await;

    let from_cte: i64 = querier
        .insert(
            "with v(name) as (select ?) insert into tests (name) select name from v",
            &["From CTE".into()],
        )
        .await
        .unwrap();
    assert_eq!(from_cte, 51);

    let commented: i64 = querier
        .insert("/* audit */ insert into tests (name) values (?)", &["Commented".into()])
        .await
        .unwrap();
    assert_eq!(commented, 52);

    let name: String = querier
        .first("select name from tests where id = ?", &[SqlValue::Int(commented)])
        .await
        .unwrap();
    assert_eq!(name, "Commented");
}

#[derive(Debug, Default)]
struct Event {
    id: i64,
    at: Option<DateTime<Utc>>,
}

impl Entity for Event {
    fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self> {
        catalog
            .field("id", |e, v| e.id = v)
            .field("at", |e, v| e.at = v)
    }
}

#[tokio::test]
async fn test_database_generated_timestamps_map() {
    let client = DbClient::open_sqlite_in_memory().unwrap();
    let querier = client.querier();
    querier
        .update(
            "create table events (id integer primary key, at text default current_timestamp)",
            &[],
        )
        .await
        .unwrap();
    querier
        .update("insert into events (id) values (1)", &[])
        .await
        .unwrap();

    let stored: String = querier
        .first("select at from events where id = 1", &[])
        .await
        .unwrap();
    let event: Event = querier
        .first("select * from events where id = 1", &[])
        .await
        .unwrap();
    assert_eq!(event.id, 1);
    let at = event.at.expect("current_timestamp should map");
    assert_eq!(at.format("%Y-%m-%d %H:%M:%S").to_string(), stored);

    let scalar: DateTime<Utc> = querier
        .first("select datetime('2021-03-14 15:09:26')", &[])
        .await
        .unwrap();
    assert_eq!(scalar, Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap());
}
