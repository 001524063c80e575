//! Transactional rebuild of the campaign, step and sub-step tables
//!
//! All phases run in one transaction. Any failure rolls the whole load back,
//! so the tables either hold the previous run or the new one, never a mix.

mod sql;

use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::config::{Config, DatabaseConfig, StepTemplate, SubStepTemplate};
use crate::error::{EtlError, Result};
use crate::model::{Campaign, CampaignStatus, TaskStatus};

/// Rows per campaign INSERT, well under the 65535 bind limit at 6 binds/row
const INSERT_CHUNK: usize = 1000;

/// Stage of the load, reported with transaction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    CampaignReplace,
    StepGeneration,
    SubStepGeneration,
    Reconciliation,
    Commit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Begin => "begin",
            Phase::CampaignReplace => "campaign replace",
            Phase::StepGeneration => "step generation",
            Phase::SubStepGeneration => "sub-step generation",
            Phase::Reconciliation => "status reconciliation",
            Phase::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Rows written by a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub campaigns: u64,
    pub steps: u64,
    pub sub_steps: u64,
    pub completed_campaigns: u64,
}

type PhaseResult<T> = std::result::Result<T, (Phase, sqlx::Error)>;

fn during(phase: Phase) -> impl FnOnce(sqlx::Error) -> (Phase, sqlx::Error) {
    move |e| (phase, e)
}

pub struct Loader {
    pool: PgPool,
    db: DatabaseConfig,
    steps: Vec<StepTemplate>,
    sub_steps: Vec<SubStepTemplate>,
}

impl Loader {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            db: config.database.clone(),
            steps: config.steps.clone(),
            sub_steps: config.sub_steps.clone(),
        }
    }

    /// Open a single-connection pool on the configured database
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.database.url)
            .await
            .map_err(EtlError::Database)?;
        Ok(Self::new(pool, config))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = sql::create_schema(&self.db);
        sqlx::raw_sql(&ddl)
            .execute(&self.pool)
            .await
            .map_err(EtlError::Database)?;
        log::info!(
            "Schema ready ({}, {}, {})",
            self.db.campaigns_table,
            self.db.steps_table,
            self.db.sub_steps_table
        );
        Ok(())
    }

    /// Replace all three tables with `campaigns` and their generated
    /// hierarchy, then mark everything that ended before `today` completed.
    pub async fn load(&self, campaigns: &[Campaign], today: NaiveDate) -> Result<LoadReport> {
        let mut tx = self.pool.begin().await.map_err(|source| EtlError::Transaction {
            phase: Phase::Begin,
            source,
        })?;

        match self.run_phases(&mut tx, campaigns, today).await {
            Ok(report) => {
                tx.commit().await.map_err(|source| EtlError::Transaction {
                    phase: Phase::Commit,
                    source,
                })?;
                log::info!(
                    "Committed {} campaigns, {} steps, {} sub-steps ({} completed campaigns)",
                    report.campaigns,
                    report.steps,
                    report.sub_steps,
                    report.completed_campaigns
                );
                Ok(report)
            }
            Err((phase, source)) => {
                log::error!("Load failed during {}: {}", phase, source);
                if let Err(e) = tx.rollback().await {
                    log::error!("Rollback failed: {}", e);
                } else {
                    log::warn!("Transaction rolled back, tables left unchanged");
                }
                Err(EtlError::Transaction { phase, source })
            }
        }
    }

    async fn run_phases(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaigns: &[Campaign],
        today: NaiveDate,
    ) -> PhaseResult<LoadReport> {
        let campaigns_written = self.replace_campaigns(tx, campaigns).await?;
        log::info!("Inserted {} campaigns", campaigns_written);

        let steps_written = self.generate_steps(tx).await?;
        log::info!("Generated {} steps", steps_written);

        let sub_steps_written = self.generate_sub_steps(tx).await?;
        log::info!("Generated {} sub-steps", sub_steps_written);

        let completed_campaigns = self.reconcile(tx, today).await?;

        Ok(LoadReport {
            campaigns: campaigns_written,
            steps: steps_written,
            sub_steps: sub_steps_written,
            completed_campaigns,
        })
    }

    async fn replace_campaigns(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaigns: &[Campaign],
    ) -> PhaseResult<u64> {
        let at = during(Phase::CampaignReplace);

        sqlx::query(&sql::truncate(&self.db.campaigns_table))
            .execute(&mut **tx)
            .await
            .map_err(at)?;

        let mut written = 0;
        for chunk in campaigns.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(sql::insert_campaigns_prefix(&self.db));
            builder.push_values(chunk, |mut row, campaign| {
                row.push_bind(campaign.title.as_str())
                    .push_bind(campaign.start_date)
                    .push_bind(campaign.end_date)
                    .push_bind(campaign.status.as_str())
                    .push_bind(campaign.code.as_str())
                    .push_bind(campaign.clearance_date);
            });

            let result = builder
                .build()
                .execute(&mut **tx)
                .await
                .map_err(during(Phase::CampaignReplace))?;
            written += result.rows_affected();
        }

        Ok(written)
    }

    async fn generate_steps(&self, tx: &mut Transaction<'_, Postgres>) -> PhaseResult<u64> {
        sqlx::query(&sql::truncate(&self.db.steps_table))
            .execute(&mut **tx)
            .await
            .map_err(during(Phase::StepGeneration))?;

        let names: Vec<String> = self.steps.iter().map(|s| s.name.clone()).collect();
        let owners: Vec<i32> = self.steps.iter().map(|s| s.owner_id).collect();

        let result = sqlx::query(&sql::generate_steps(&self.db))
            .bind(TaskStatus::ToDo.as_str())
            .bind(names)
            .bind(owners)
            .execute(&mut **tx)
            .await
            .map_err(during(Phase::StepGeneration))?;

        Ok(result.rows_affected())
    }

    async fn generate_sub_steps(&self, tx: &mut Transaction<'_, Postgres>) -> PhaseResult<u64> {
        sqlx::query(&sql::truncate(&self.db.sub_steps_table))
            .execute(&mut **tx)
            .await
            .map_err(during(Phase::SubStepGeneration))?;

        let parents: Vec<String> = self.sub_steps.iter().map(|s| s.step.clone()).collect();
        let names: Vec<String> = self.sub_steps.iter().map(|s| s.name.clone()).collect();
        let orders: Vec<i32> = self.sub_steps.iter().map(|s| s.order).collect();

        let result = sqlx::query(&sql::generate_sub_steps(&self.db))
            .bind(TaskStatus::ToDo.as_str())
            .bind(parents)
            .bind(names)
            .bind(orders)
            .execute(&mut **tx)
            .await
            .map_err(during(Phase::SubStepGeneration))?;

        Ok(result.rows_affected())
    }

    /// Cascade completion campaign -> step -> sub-step. Each update reads
    /// the statuses written by the previous one.
    async fn reconcile(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        today: NaiveDate,
    ) -> PhaseResult<u64> {
        let at = || during(Phase::Reconciliation);

        let campaigns = sqlx::query(&sql::complete_campaigns(&self.db))
            .bind(CampaignStatus::Completed.as_str())
            .bind(today)
            .execute(&mut **tx)
            .await
            .map_err(at())?;

        let steps = sqlx::query(&sql::complete_steps(&self.db))
            .bind(TaskStatus::Completed.as_str())
            .bind(CampaignStatus::Completed.as_str())
            .execute(&mut **tx)
            .await
            .map_err(at())?;

        let sub_steps = sqlx::query(&sql::complete_sub_steps(&self.db))
            .bind(TaskStatus::Completed.as_str())
            .execute(&mut **tx)
            .await
            .map_err(at())?;

        log::info!(
            "Marked completed: {} campaigns, {} steps, {} sub-steps",
            campaigns.rows_affected(),
            steps.rows_affected(),
            sub_steps.rows_affected()
        );

        Ok(campaigns.rows_affected())
    }
}

#[cfg(test)]
mod tests;
