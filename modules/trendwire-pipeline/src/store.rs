//! Postgres persistence gateway.
//!
//! One row per region holds the current and previous item lists as JSONB.
//! Writes are whole-row upserts guarded by the region lease held by this run.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use trendwire_common::{CycleStatus, Region, RegionSnapshot, TrendError, TrendItem};

use crate::traits::SnapshotStore;

const CYCLE_STATUS_ID: &str = "global";

#[derive(Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
    run_id: Uuid,
    lease_ttl: Duration,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool, lease_ttl: Duration) -> Self {
        Self {
            pool,
            run_id: Uuid::new_v4(),
            lease_ttl,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running migrations")?;
        Ok(())
    }

    fn lease_seconds(&self) -> f64 {
        self.lease_ttl.as_secs_f64()
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    region: String,
    items: sqlx::types::Json<Vec<TrendItem>>,
    previous_items: sqlx::types::Json<Vec<TrendItem>>,
    last_updated: DateTime<Utc>,
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn read(&self, region: Region) -> Result<Option<RegionSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT region, items, previous_items, last_updated
            FROM region_snapshots
            WHERE region = $1
            "#,
        )
        .bind(region.code())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("reading snapshot for {region}"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(RegionSnapshot {
            region: row.region.parse()?,
            items: row.items.0,
            previous_items: row.previous_items.0,
            last_updated: row.last_updated,
        }))
    }

    async fn write(&self, snapshot: &RegionSnapshot) -> Result<()> {
        let region = snapshot.region;
        let mut tx = self.pool.begin().await?;

        // Lock our lease row for the duration of the write.
        let held: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT holder FROM region_leases
            WHERE region = $1 AND holder = $2 AND expires_at > now()
            FOR UPDATE
            "#,
        )
        .bind(region.code())
        .bind(self.run_id)
        .fetch_optional(&mut *tx)
        .await?;

        if held.is_none() {
            tx.rollback().await?;
            return Err(TrendError::LeaseLost {
                region: region.code().to_string(),
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO region_snapshots (region, items, previous_items, last_updated)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (region) DO UPDATE
            SET items = EXCLUDED.items,
                previous_items = EXCLUDED.previous_items,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(region.code())
        .bind(sqlx::types::Json(&snapshot.items))
        .bind(sqlx::types::Json(&snapshot.previous_items))
        .bind(snapshot.last_updated)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("writing snapshot for {region}"))?;

        tx.commit().await?;
        info!(region = %region, items = snapshot.items.len(), "snapshot written");
        Ok(())
    }

    async fn try_acquire_lease(&self, region: Region) -> Result<bool> {
        // Insert, or take over a lease that has expired (a killed run).
        let acquired: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO region_leases (region, holder, acquired_at, expires_at)
            VALUES ($1, $2, now(), now() + make_interval(secs => $3))
            ON CONFLICT (region) DO UPDATE
            SET holder = EXCLUDED.holder,
                acquired_at = EXCLUDED.acquired_at,
                expires_at = EXCLUDED.expires_at
            WHERE region_leases.expires_at <= now()
               OR region_leases.holder = EXCLUDED.holder
            RETURNING holder
            "#,
        )
        .bind(region.code())
        .bind(self.run_id)
        .bind(self.lease_seconds())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("acquiring lease for {region}"))?;

        Ok(acquired == Some(self.run_id))
    }

    async fn release_lease(&self, region: Region) -> Result<()> {
        let result = sqlx::query("DELETE FROM region_leases WHERE region = $1 AND holder = $2")
            .bind(region.code())
            .bind(self.run_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!(region = %region, "lease was no longer ours at release");
        }
        Ok(())
    }

    async fn write_cycle_status(&self, status: &CycleStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cycle_status (id, last_global_update, regions, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET last_global_update = EXCLUDED.last_global_update,
                regions = EXCLUDED.regions,
                status = EXCLUDED.status
            "#,
        )
        .bind(CYCLE_STATUS_ID)
        .bind(status.last_global_update)
        .bind(sqlx::types::Json(&status.regions))
        .bind(&status.status)
        .execute(&self.pool)
        .await
        .context("writing cycle status")?;
        Ok(())
    }
}
