//! SQL text for the load phases
//!
//! Table names come from validated configuration; everything else is bound.

use crate::config::DatabaseConfig;
use crate::model::Campaign;

/// `CREATE TABLE IF NOT EXISTS` for the three tables, cascading deletes
/// from campaigns down to sub-steps
pub fn create_schema(db: &DatabaseConfig) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {campaigns} (
            id SERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            status TEXT NOT NULL,
            code TEXT NOT NULL,
            clearance_date DATE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {steps} (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            campaign_id INTEGER NOT NULL REFERENCES {campaigns}(id) ON DELETE CASCADE,
            owner_id INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {sub_steps} (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            step_id INTEGER NOT NULL REFERENCES {steps}(id) ON DELETE CASCADE,
            campaign_id INTEGER NOT NULL REFERENCES {campaigns}(id) ON DELETE CASCADE,
            ordre INTEGER NOT NULL
        );
        "#,
        campaigns = db.campaigns_table,
        steps = db.steps_table,
        sub_steps = db.sub_steps_table,
    )
}

pub fn truncate(table: &str) -> String {
    format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table)
}

/// Prefix of the bulk campaign insert; rows are appended with `push_values`
pub fn insert_campaigns_prefix(db: &DatabaseConfig) -> String {
    format!(
        "INSERT INTO {} ({}) ",
        db.campaigns_table,
        Campaign::COLUMNS.join(", ")
    )
}

/// One step per (campaign, template step).
///
/// Binds: `$1` initial status, `$2` step names, `$3` owner ids.
pub fn generate_steps(db: &DatabaseConfig) -> String {
    format!(
        r#"
        INSERT INTO {steps} (name, status, campaign_id, owner_id)
        SELECT t.name, $1, c.id, t.owner_id
        FROM {campaigns} c
        CROSS JOIN UNNEST($2::text[], $3::int4[]) WITH ORDINALITY AS t(name, owner_id, position)
        ORDER BY c.id, t.position
        "#,
        steps = db.steps_table,
        campaigns = db.campaigns_table,
    )
}

/// One sub-step per (step, template sub-step of that step).
///
/// Binds: `$1` initial status, `$2` parent step names, `$3` sub-step names,
/// `$4` orders.
pub fn generate_sub_steps(db: &DatabaseConfig) -> String {
    format!(
        r#"
        INSERT INTO {sub_steps} (name, status, step_id, campaign_id, ordre)
        SELECT t.name, $1, s.id, s.campaign_id, t.ordre
        FROM {steps} s
        JOIN UNNEST($2::text[], $3::text[], $4::int4[]) AS t(step_name, name, ordre)
          ON s.name = t.step_name
        ORDER BY s.id, t.ordre
        "#,
        sub_steps = db.sub_steps_table,
        steps = db.steps_table,
    )
}

/// Binds: `$1` completed status, `$2` run date
pub fn complete_campaigns(db: &DatabaseConfig) -> String {
    format!(
        "UPDATE {} SET status = $1 WHERE end_date < $2",
        db.campaigns_table
    )
}

/// Binds: `$1` completed task status, `$2` completed campaign status
pub fn complete_steps(db: &DatabaseConfig) -> String {
    format!(
        "UPDATE {steps} s SET status = $1 FROM {campaigns} c \
         WHERE s.campaign_id = c.id AND c.status = $2",
        steps = db.steps_table,
        campaigns = db.campaigns_table,
    )
}

/// Binds: `$1` completed task status
pub fn complete_sub_steps(db: &DatabaseConfig) -> String {
    format!(
        "UPDATE {sub_steps} ss SET status = $1 FROM {steps} s \
         WHERE ss.step_id = s.id AND s.status = $1",
        sub_steps = db.sub_steps_table,
        steps = db.steps_table,
    )
}
