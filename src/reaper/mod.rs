//! Periodic background reaper enforcing timeout policy on stale matches.
//!
//! Runs independently of request traffic on a fixed interval. Each swept
//! match goes through the engine's check-and-set entry points, which use
//! the same per-match row lock as live joins and choices, so a sweep can
//! race live traffic or another sweep without ever refunding twice or
//! starting a match that just filled.

use crate::db::timeouts::{with_default_timeout, TimeoutError};
use crate::engine::{EngineError, MatchEngine};
use crate::game::{MatchId, MIN_SEATS};
use sqlx::{PgPool, Row};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub cancelled: usize,
    pub force_started: usize,
}

/// Background reaper task
pub struct Reaper {
    pool: Arc<PgPool>,
    engine: MatchEngine,
}

impl Reaper {
    /// Create a new reaper over the same pool and engine the request
    /// handlers use.
    pub fn new(pool: Arc<PgPool>, engine: MatchEngine) -> Self {
        Self { pool, engine }
    }

    /// Spawn the reaper loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the sweep loop forever.
    pub async fn run(&self) {
        let interval_secs = self.engine.config().sweep_interval_secs;
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Reaper running every {interval_secs}s");
        loop {
            interval.tick().await;
            let stats = self.sweep().await;
            if stats.cancelled > 0 || stats.force_started > 0 {
                log::info!(
                    "Sweep cancelled {} and force-started {} matches",
                    stats.cancelled,
                    stats.force_started
                );
            }
        }
    }

    /// One full sweep. Stale matches are cancelled before force-start
    /// candidates are gathered, so a two-seat match past both cutoffs is
    /// refunded rather than started. A single match's failure never aborts
    /// the sweep.
    pub async fn sweep(&self) -> SweepStats {
        let stale_secs = self.engine.config().stale_timeout_secs;
        let grace_secs = self.engine.config().two_player_grace_secs;
        let mut stats = SweepStats::default();

        match self.stale_candidates(stale_secs).await {
            Ok(ids) => {
                for match_id in ids {
                    match self.engine.reap_stale(match_id, stale_secs).await {
                        Ok(true) => stats.cancelled += 1,
                        Ok(false) => {}
                        Err(EngineError::Busy) => {
                            log::debug!("match {match_id} locked by live traffic, skipping");
                        }
                        Err(e) => log::warn!("failed to reap match {match_id}: {e}"),
                    }
                }
            }
            Err(e) => log::warn!("stale candidate query failed: {e}"),
        }

        match self.force_start_candidates(grace_secs).await {
            Ok(ids) => {
                for match_id in ids {
                    match self.engine.force_start(match_id, grace_secs).await {
                        Ok(true) => stats.force_started += 1,
                        Ok(false) => {}
                        Err(EngineError::Busy) => {
                            log::debug!("match {match_id} locked by live traffic, skipping");
                        }
                        Err(e) => log::warn!("failed to force-start match {match_id}: {e}"),
                    }
                }
            }
            Err(e) => log::warn!("force-start candidate query failed: {e}"),
        }

        stats
    }

    /// Waiting matches past the stale cutoff. The list is a hint; the
    /// engine re-checks eligibility under the row lock.
    async fn stale_candidates(&self, older_than_secs: u64) -> Result<Vec<MatchId>, TimeoutError> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id FROM matches
                 WHERE status = 'waiting'
                   AND created_at < NOW() - make_interval(secs => $1)
                 ORDER BY id ASC",
            )
            .bind(older_than_secs as f64)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Two-seat waiting matches past the grace cutoff.
    async fn force_start_candidates(
        &self,
        older_than_secs: u64,
    ) -> Result<Vec<MatchId>, TimeoutError> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT m.id FROM matches m
                 WHERE m.status = 'waiting'
                   AND m.created_at < NOW() - make_interval(secs => $1)
                   AND (SELECT COUNT(*) FROM participants p WHERE p.match_id = m.id) = $2
                 ORDER BY m.id ASC",
            )
            .bind(older_than_secs as f64)
            .bind(MIN_SEATS as i64)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}
