//! Loader tests against a scratch PostgreSQL database.
//!
//! Run with `PROMO_SYNC_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Each test works on its own set of tables so they can run in parallel.

use super::*;
use crate::config::templates::sub_steps_per_campaign;
use sqlx::Row;

const TEST_DB_ENV: &str = "PROMO_SYNC_TEST_DATABASE_URL";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 6, 15)
}

fn campaign(title: &str, code: &str, start: NaiveDate, end: NaiveDate) -> Campaign {
    Campaign {
        title: title.to_string(),
        start_date: start,
        end_date: end,
        status: CampaignStatus::derive(start, end, today()),
        code: code.to_string(),
        clearance_date: start,
    }
}

fn sample_campaigns() -> Vec<Campaign> {
    vec![
        campaign("Printemps", "2024-0317", date(2024, 5, 1), date(2024, 6, 1)),
        campaign("Été", "2024-0412", date(2024, 7, 1), date(2024, 7, 31)),
        campaign("Juin", "2024-0501", date(2024, 6, 1), date(2024, 6, 30)),
    ]
}

/// Config whose tables are prefixed with `prefix`, freshly created
async fn scratch_loader(prefix: &str) -> Loader {
    let url = std::env::var(TEST_DB_ENV).expect("PROMO_SYNC_TEST_DATABASE_URL must be set");

    let mut config = Config::default();
    config.database.url = url;
    config.database.campaigns_table = format!("{}_campaigns", prefix);
    config.database.steps_table = format!("{}_steps", prefix);
    config.database.sub_steps_table = format!("{}_sub_steps", prefix);

    let loader = Loader::connect(&config).await.unwrap();
    let drop = format!(
        "DROP TABLE IF EXISTS {}, {}, {} CASCADE",
        config.database.sub_steps_table,
        config.database.steps_table,
        config.database.campaigns_table
    );
    sqlx::query(&drop).execute(loader.pool()).await.unwrap();
    loader.ensure_schema().await.unwrap();
    loader
}

async fn count(loader: &Loader, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(loader.pool())
        .await
        .unwrap()
}

/// Table contents without surrogate ids, in a stable order
async fn snapshot(loader: &Loader) -> Vec<String> {
    let db = &loader.db;
    let query = format!(
        r#"
        SELECT c.code || '|' || c.title || '|' || c.status || '|' || c.start_date::text
               || '|' || c.end_date::text || '|' || c.clearance_date::text
               || '|' || COALESCE(s.name, '') || '|' || COALESCE(s.status, '')
               || '|' || COALESCE(s.owner_id::text, '')
               || '|' || COALESCE(ss.name, '') || '|' || COALESCE(ss.status, '')
               || '|' || COALESCE(ss.ordre::text, '') AS line
        FROM {campaigns} c
        LEFT JOIN {steps} s ON s.campaign_id = c.id
        LEFT JOIN {sub_steps} ss ON ss.step_id = s.id
        ORDER BY line
        "#,
        campaigns = db.campaigns_table,
        steps = db.steps_table,
        sub_steps = db.sub_steps_table,
    );

    sqlx::query(&query)
        .fetch_all(loader.pool())
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.get::<String, _>("line"))
        .collect()
}

#[tokio::test]
#[ignore = "requires PostgreSQL (PROMO_SYNC_TEST_DATABASE_URL)"]
async fn test_load_generates_full_hierarchy() {
    let loader = scratch_loader("hierarchy").await;
    let campaigns = sample_campaigns();

    let report = loader.load(&campaigns, today()).await.unwrap();

    let n = campaigns.len() as u64;
    let steps_per_campaign = loader.steps.len() as u64;
    let subs_per_campaign = sub_steps_per_campaign(&loader.steps, &loader.sub_steps) as u64;

    assert_eq!(report.campaigns, n);
    assert_eq!(report.steps, n * steps_per_campaign);
    assert_eq!(report.sub_steps, n * subs_per_campaign);
    assert_eq!(count(&loader, &loader.db.steps_table).await as u64, n * 8);
    assert_eq!(count(&loader, &loader.db.sub_steps_table).await as u64, n * 25);

    // Every campaign carries exactly the template step names
    let mut expected_steps: Vec<String> = loader.steps.iter().map(|s| s.name.clone()).collect();
    expected_steps.sort();
    let ids: Vec<i32> = sqlx::query_scalar(&format!("SELECT id FROM {}", loader.db.campaigns_table))
        .fetch_all(loader.pool())
        .await
        .unwrap();
    for id in ids {
        let names: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT name FROM {} WHERE campaign_id = $1 ORDER BY name",
            loader.db.steps_table
        ))
        .bind(id)
        .fetch_all(loader.pool())
        .await
        .unwrap();
        assert_eq!(names, expected_steps);
    }

    // Sub-steps sit under the right parent with template orders
    let mut placed: Vec<(String, String, i32)> = sqlx::query_as(&format!(
        "SELECT DISTINCT s.name, ss.name, ss.ordre FROM {} ss JOIN {} s ON ss.step_id = s.id",
        loader.db.sub_steps_table, loader.db.steps_table
    ))
    .fetch_all(loader.pool())
    .await
    .unwrap();
    placed.sort();
    let mut expected: Vec<(String, String, i32)> = loader
        .sub_steps
        .iter()
        .map(|t| (t.step.clone(), t.name.clone(), t.order))
        .collect();
    expected.sort();
    assert_eq!(placed, expected);

    // Denormalized campaign reference matches the parent step
    let mismatched: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} ss JOIN {} s ON ss.step_id = s.id \
         WHERE ss.campaign_id <> s.campaign_id",
        loader.db.sub_steps_table, loader.db.steps_table
    ))
    .fetch_one(loader.pool())
    .await
    .unwrap();
    assert_eq!(mismatched, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (PROMO_SYNC_TEST_DATABASE_URL)"]
async fn test_completion_cascades_to_steps_and_sub_steps() {
    let loader = scratch_loader("cascade").await;

    // Passed in as ongoing; the load itself must mark it completed
    let mut ended = campaign("Hiver", "2024-0101", date(2024, 1, 10), date(2024, 2, 10));
    ended.status = CampaignStatus::Ongoing;
    let running = campaign("Juin", "2024-0501", date(2024, 6, 1), date(2024, 6, 30));

    let report = loader.load(&[ended, running], today()).await.unwrap();
    assert_eq!(report.completed_campaigns, 1);

    let db = &loader.db;
    let statuses: Vec<(String, String)> = sqlx::query_as(&format!(
        "SELECT code, status FROM {} ORDER BY code",
        db.campaigns_table
    ))
    .fetch_all(loader.pool())
    .await
    .unwrap();
    assert_eq!(
        statuses,
        vec![
            ("2024-0101".to_string(), "completed".to_string()),
            ("2024-0501".to_string(), "ongoing".to_string()),
        ]
    );

    let step_statuses: Vec<(String, String, i64)> = sqlx::query_as(&format!(
        "SELECT c.code, s.status, COUNT(*) FROM {} s JOIN {} c ON s.campaign_id = c.id \
         GROUP BY c.code, s.status ORDER BY c.code",
        db.steps_table, db.campaigns_table
    ))
    .fetch_all(loader.pool())
    .await
    .unwrap();
    assert_eq!(
        step_statuses,
        vec![
            ("2024-0101".to_string(), "completed".to_string(), 8),
            ("2024-0501".to_string(), "to_do".to_string(), 8),
        ]
    );

    let sub_statuses: Vec<(String, String, i64)> = sqlx::query_as(&format!(
        "SELECT c.code, ss.status, COUNT(*) FROM {} ss JOIN {} c ON ss.campaign_id = c.id \
         GROUP BY c.code, ss.status ORDER BY c.code",
        db.sub_steps_table, db.campaigns_table
    ))
    .fetch_all(loader.pool())
    .await
    .unwrap();
    assert_eq!(
        sub_statuses,
        vec![
            ("2024-0101".to_string(), "completed".to_string(), 25),
            ("2024-0501".to_string(), "to_do".to_string(), 25),
        ]
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL (PROMO_SYNC_TEST_DATABASE_URL)"]
async fn test_reload_replaces_content() {
    let loader = scratch_loader("replace").await;
    let campaigns = sample_campaigns();

    loader.load(&campaigns, today()).await.unwrap();
    let first = snapshot(&loader).await;

    loader.load(&campaigns, today()).await.unwrap();
    let second = snapshot(&loader).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(count(&loader, &loader.db.campaigns_table).await, 3);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (PROMO_SYNC_TEST_DATABASE_URL)"]
async fn test_failed_step_generation_rolls_back() {
    let good = scratch_loader("atomic").await;
    good.load(&sample_campaigns(), today()).await.unwrap();
    let before = snapshot(&good).await;

    sqlx::query(&format!(
        "ALTER TABLE {} ADD CONSTRAINT owner_positive CHECK (owner_id > 0)",
        good.db.steps_table
    ))
    .execute(good.pool())
    .await
    .unwrap();

    let mut config = Config::default();
    config.database = good.db.clone();
    config.steps[0].owner_id = -1;
    let bad = Loader::new(good.pool().clone(), &config);

    let replacement = vec![campaign("Nouvelle", "2025-0001", date(2025, 1, 1), date(2025, 1, 31))];
    match bad.load(&replacement, today()).await {
        Err(EtlError::Transaction { phase, .. }) => assert_eq!(phase, Phase::StepGeneration),
        other => panic!("expected transaction error, got {:?}", other),
    }

    assert_eq!(snapshot(&good).await, before);
    assert_eq!(count(&good, &good.db.campaigns_table).await, 3);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (PROMO_SYNC_TEST_DATABASE_URL)"]
async fn test_empty_input_clears_tables() {
    let loader = scratch_loader("empty").await;
    loader.load(&sample_campaigns(), today()).await.unwrap();

    let report = loader.load(&[], today()).await.unwrap();

    assert_eq!(report, LoadReport::default());
    assert_eq!(count(&loader, &loader.db.campaigns_table).await, 0);
    assert_eq!(count(&loader, &loader.db.sub_steps_table).await, 0);
}
