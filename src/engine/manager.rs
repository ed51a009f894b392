//! Match engine: seat allocation, escrow, settlement and admin override.
//!
//! Every public operation executes as one serializable unit scoped to the
//! affected match: the match row is locked first (`FOR UPDATE`), wallet
//! rows second, and the lock is held to the end of the transaction. Lock
//! contention is retried with jittered backoff and surfaces as
//! [`EngineError::Busy`] once the budget is spent.

use super::{
    config::EngineConfig,
    errors::{EngineError, EngineResult},
    events::{MatchCompleted, MatchEvent, SeatResult},
    messages::{CancelIntent, ChooseIntent, IntentResponse, JoinIntent},
};
use crate::game::{
    resolve, Choice, Match, MatchId, MatchStatus, Outcome, Participant, Payout, Settlement, User,
    MAX_SEATS, MIN_SEATS,
};
use crate::wallet::{EntryKind, EntryStatus, WalletManager};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::broadcast;

/// Capacity of the outbound event channel; slow subscribers lag rather
/// than block the engine.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of a join: the seat the caller landed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub match_id: MatchId,
    /// Seats filled after this join, caller included.
    pub seat_count: usize,
    /// Whether this join filled the roster and activated the match.
    pub activated: bool,
}

/// Result of a choice submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseOutcome {
    pub match_id: MatchId,
    /// Present when this choice was the last one and settlement ran.
    pub completed: Option<MatchCompleted>,
}

/// Result of an admin cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub match_id: MatchId,
    pub refunds: Vec<Payout>,
}

/// Match engine
///
/// Cheap to clone; every clone shares the pool, wallet and event channel.
#[derive(Clone)]
pub struct MatchEngine {
    pool: Arc<PgPool>,
    wallet: WalletManager,
    config: EngineConfig,
    events: broadcast::Sender<MatchEvent>,
}

impl MatchEngine {
    /// Create a new match engine
    pub fn new(pool: Arc<PgPool>, wallet: WalletManager, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pool,
            wallet,
            config,
            events,
        }
    }

    /// Subscribe to outbound match events
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    /// Engine configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Join a match at the given stake, escrowing the bet.
    ///
    /// Finds the oldest joinable waiting match at this stake or opens a new
    /// one, then seats the user and debits the bet as one atomic unit. The
    /// third seat activates the match.
    pub async fn join(&self, user_id: i64, bet_amount: i64) -> EngineResult<JoinOutcome> {
        if bet_amount <= 0 {
            return Err(EngineError::InvalidBet(bet_amount));
        }

        let mut attempt = 0;
        loop {
            match self.try_join(user_id, bet_amount).await {
                Err(EngineError::Busy) if attempt + 1 < self.config.lock_retry_attempts => {
                    attempt += 1;
                    self.backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Submit a choice for a seated participant of an active match.
    ///
    /// Write-once: a second submission fails with `AlreadyChosen`. The last
    /// choice triggers settlement synchronously in the same transaction.
    pub async fn choose(
        &self,
        match_id: MatchId,
        user_id: i64,
        choice: Choice,
    ) -> EngineResult<ChooseOutcome> {
        let mut attempt = 0;
        loop {
            match self.try_choose(match_id, user_id, choice).await {
                Err(EngineError::Busy) if attempt + 1 < self.config.lock_retry_attempts => {
                    attempt += 1;
                    self.backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Admin override: cancel a waiting or active match and refund every
    /// seated participant, including those who already chose.
    pub async fn cancel(&self, match_id: MatchId) -> EngineResult<CancelOutcome> {
        let mut attempt = 0;
        loop {
            match self.try_cancel(match_id).await {
                Err(EngineError::Busy) if attempt + 1 < self.config.lock_retry_attempts => {
                    attempt += 1;
                    self.backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Fetch a match with its participants
    pub async fn get_match(&self, match_id: MatchId) -> EngineResult<(Match, Vec<Participant>)> {
        let row = sqlx::query(
            "SELECT id, bet_amount, status, winner_id, created_at, completed_at
             FROM matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(EngineError::MatchNotFound(match_id))?;

        let m = Match {
            id: row.get("id"),
            bet_amount: row.get("bet_amount"),
            status: MatchStatus::from_db(&row.get::<String, _>("status")),
            winner_id: row.get("winner_id"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            completed_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("completed_at")
                .map(|dt| dt.and_utc()),
        };

        let participants = sqlx::query(
            "SELECT match_id, user_id, choice, joined_at
             FROM participants WHERE match_id = $1
             ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(match_id)
        .fetch_all(self.pool.as_ref())
        .await?
        .iter()
        .map(|r| Participant {
            match_id: r.get("match_id"),
            user_id: r.get("user_id"),
            choice: r
                .get::<Option<String>, _>("choice")
                .and_then(|s| s.parse().ok()),
            joined_at: r.get::<chrono::NaiveDateTime, _>("joined_at").and_utc(),
        })
        .collect();

        Ok((m, participants))
    }

    /// Fetch a user's cumulative match counters
    pub async fn get_user(&self, user_id: i64) -> EngineResult<User> {
        let row = sqlx::query(
            "SELECT id, username, matches_played, matches_won, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(EngineError::UserNotFound(user_id))?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            matches_played: row.get("matches_played"),
            matches_won: row.get("matches_won"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    // === Intent surface (adapter boundary) ===

    /// Handle a join intent, returning the `(ok, message, data)` triple.
    pub async fn handle_join(&self, intent: JoinIntent) -> IntentResponse {
        match self.join(intent.user_id, intent.bet_amount).await {
            Ok(outcome) => IntentResponse::success(
                format!(
                    "Joined match {} ({}/{} seats)",
                    outcome.match_id, outcome.seat_count, MAX_SEATS
                ),
                serde_json::to_value(&outcome).ok(),
            ),
            Err(e) => IntentResponse::failure(&e),
        }
    }

    /// Handle a choice intent; the raw choice text is parsed here.
    pub async fn handle_choose(&self, intent: ChooseIntent) -> IntentResponse {
        let choice: Choice = match intent.choice.parse() {
            Ok(choice) => choice,
            Err(e) => return IntentResponse::failure(&EngineError::from(e)),
        };

        match self.choose(intent.match_id, intent.user_id, choice).await {
            Ok(outcome) => {
                let message = match &outcome.completed {
                    Some(completed) => match completed.winner_id {
                        Some(winner) => format!("Match settled, winner {winner}"),
                        None => "Match settled".to_string(),
                    },
                    None => "Choice recorded".to_string(),
                };
                IntentResponse::success(message, serde_json::to_value(&outcome).ok())
            }
            Err(e) => IntentResponse::failure(&e),
        }
    }

    /// Handle an admin cancel intent.
    pub async fn handle_cancel(&self, intent: CancelIntent) -> IntentResponse {
        match self.cancel(intent.match_id).await {
            Ok(outcome) => IntentResponse::success(
                format!(
                    "Match {} cancelled, {} seats refunded",
                    outcome.match_id,
                    outcome.refunds.len()
                ),
                serde_json::to_value(&outcome).ok(),
            ),
            Err(e) => IntentResponse::failure(&e),
        }
    }

    // === Reaper entry points ===

    /// Cancel-and-refund a waiting match older than the cutoff. The status
    /// check and flip happen under the row lock, so an overlapping sweep or
    /// racing join observes either the old waiting state (and blocks) or
    /// the terminal one; a refund can never be issued twice. Returns false
    /// when the match is no longer eligible.
    pub(crate) async fn reap_stale(
        &self,
        match_id: MatchId,
        older_than_secs: u64,
    ) -> EngineResult<bool> {
        let mut tx = self.pool.begin().await.map_err(EngineError::from)?;

        let row = sqlx::query(
            "SELECT bet_amount FROM matches
             WHERE id = $1 AND status = 'waiting'
               AND created_at < NOW() - make_interval(secs => $2)
             FOR UPDATE NOWAIT",
        )
        .bind(match_id)
        .bind(older_than_secs as f64)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let bet_amount: i64 = row.get("bet_amount");

        let refunds = self.refund_seats_in_tx(&mut tx, match_id, bet_amount).await?;

        sqlx::query("UPDATE matches SET status = 'cancelled' WHERE id = $1 AND status = 'waiting'")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(EngineError::from)?;

        log::info!(
            "Reaped stale match {match_id}, refunded {} seats",
            refunds.len()
        );
        self.emit(MatchEvent::MatchCancelled { match_id, refunds });
        Ok(true)
    }

    /// Force-start a two-seat waiting match older than the grace cutoff so
    /// the two present players can choose. Returns false when the match is
    /// no longer eligible.
    pub(crate) async fn force_start(
        &self,
        match_id: MatchId,
        older_than_secs: u64,
    ) -> EngineResult<bool> {
        let mut tx = self.pool.begin().await.map_err(EngineError::from)?;

        let row = sqlx::query(
            "SELECT bet_amount FROM matches
             WHERE id = $1 AND status = 'waiting'
               AND created_at < NOW() - make_interval(secs => $2)
               AND (SELECT COUNT(*) FROM participants p WHERE p.match_id = matches.id) = $3
             FOR UPDATE NOWAIT",
        )
        .bind(match_id)
        .bind(older_than_secs as f64)
        .bind(MIN_SEATS as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let bet_amount: i64 = row.get("bet_amount");

        let participants: Vec<i64> =
            sqlx::query("SELECT user_id FROM participants WHERE match_id = $1 ORDER BY joined_at ASC, user_id ASC")
                .bind(match_id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|r| r.get("user_id"))
                .collect();

        sqlx::query("UPDATE matches SET status = 'active' WHERE id = $1 AND status = 'waiting'")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(EngineError::from)?;

        log::info!("Force-started two-player match {match_id}");
        self.emit(MatchEvent::MatchFilled {
            match_id,
            bet_amount,
            seat_count: participants.len(),
            participants,
        });
        Ok(true)
    }

    // === Internals ===

    async fn try_join(&self, user_id: i64, bet_amount: i64) -> EngineResult<JoinOutcome> {
        let mut tx = self.pool.begin().await.map_err(EngineError::from)?;

        // Oldest joinable waiting match at this stake. SKIP LOCKED treats a
        // match another joiner currently holds as unavailable; the caller
        // then lands in a fresh match instead of blocking on the row.
        let candidate = sqlx::query(
            "SELECT m.id FROM matches m
             WHERE m.status = 'waiting'
               AND m.bet_amount = $1
               AND (SELECT COUNT(*) FROM participants p WHERE p.match_id = m.id) < $2
             ORDER BY m.created_at ASC, m.id ASC
             LIMIT 1
             FOR UPDATE OF m SKIP LOCKED",
        )
        .bind(bet_amount)
        .bind(MAX_SEATS as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let match_id: MatchId = match candidate {
            Some(row) => row.get("id"),
            None => sqlx::query(
                "INSERT INTO matches (bet_amount, status) VALUES ($1, 'waiting') RETURNING id",
            )
            .bind(bet_amount)
            .fetch_one(&mut *tx)
            .await?
            .get("id"),
        };

        let seated: Vec<i64> = sqlx::query(
            "SELECT user_id FROM participants WHERE match_id = $1 ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(match_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|r| r.get("user_id"))
        .collect();

        if seated.contains(&user_id) {
            return Err(EngineError::AlreadyJoined(match_id));
        }
        if seated.len() >= MAX_SEATS {
            return Err(EngineError::MatchFull(match_id));
        }

        // Escrow the bet. Match row is already locked; the wallet row lock
        // nests inside it (match before user, always).
        self.wallet
            .debit_in_tx(
                &mut tx,
                user_id,
                Some(match_id),
                bet_amount,
                EntryKind::Bet,
                EntryStatus::Settled,
                format!("bet:{match_id}:{user_id}"),
                Some(format!("Bet escrow for match {match_id}")),
            )
            .await?;

        sqlx::query("INSERT INTO participants (match_id, user_id) VALUES ($1, $2)")
            .bind(match_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let seat_count = seated.len() + 1;
        let activated = seat_count == MAX_SEATS;
        if activated {
            sqlx::query("UPDATE matches SET status = 'active' WHERE id = $1 AND status = 'waiting'")
                .bind(match_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await.map_err(EngineError::from)?;

        log::info!("User {user_id} joined match {match_id} ({seat_count}/{MAX_SEATS})");
        if activated {
            let mut participants = seated;
            participants.push(user_id);
            self.emit(MatchEvent::MatchFilled {
                match_id,
                bet_amount,
                seat_count,
                participants,
            });
        }

        Ok(JoinOutcome {
            match_id,
            seat_count,
            activated,
        })
    }

    async fn try_choose(
        &self,
        match_id: MatchId,
        user_id: i64,
        choice: Choice,
    ) -> EngineResult<ChooseOutcome> {
        let mut tx = self.pool.begin().await.map_err(EngineError::from)?;

        let match_row = sqlx::query(
            "SELECT bet_amount, status FROM matches WHERE id = $1 FOR UPDATE NOWAIT",
        )
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::MatchNotFound(match_id))?;

        if MatchStatus::from_db(&match_row.get::<String, _>("status")) != MatchStatus::Active {
            return Err(EngineError::MatchNotActive(match_id));
        }
        let bet_amount: i64 = match_row.get("bet_amount");

        let participant =
            sqlx::query("SELECT choice FROM participants WHERE match_id = $1 AND user_id = $2")
                .bind(match_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(EngineError::NotSeated(match_id))?;

        if participant.get::<Option<String>, _>("choice").is_some() {
            return Err(EngineError::AlreadyChosen(match_id));
        }

        sqlx::query("UPDATE participants SET choice = $1 WHERE match_id = $2 AND user_id = $3")
            .bind(choice.to_string())
            .bind(match_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let seats: Vec<(i64, Option<Choice>)> = sqlx::query(
            "SELECT user_id, choice FROM participants WHERE match_id = $1 ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(match_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|r| {
            (
                r.get::<i64, _>("user_id"),
                r.get::<Option<String>, _>("choice")
                    .and_then(|s| s.parse().ok()),
            )
        })
        .collect();

        let choices: Vec<(i64, Choice)> = seats
            .iter()
            .filter_map(|&(uid, c)| c.map(|c| (uid, c)))
            .collect();

        if choices.len() != seats.len() {
            // Still waiting on somebody.
            tx.commit().await.map_err(EngineError::from)?;
            log::info!("User {user_id} chose in match {match_id}");
            return Ok(ChooseOutcome {
                match_id,
                completed: None,
            });
        }

        let settlement = resolve(&choices, bet_amount, self.config.fee_bps);
        let completed = self
            .apply_settlement(&mut tx, match_id, &choices, &settlement)
            .await?;

        tx.commit().await.map_err(EngineError::from)?;

        log::info!(
            "Match {match_id} settled: pot {} fee {} winner {:?}",
            completed.pot,
            completed.fee,
            completed.winner_id
        );
        self.emit(MatchEvent::MatchCompleted(completed.clone()));

        Ok(ChooseOutcome {
            match_id,
            completed: Some(completed),
        })
    }

    async fn try_cancel(&self, match_id: MatchId) -> EngineResult<CancelOutcome> {
        let mut tx = self.pool.begin().await.map_err(EngineError::from)?;

        let row = sqlx::query("SELECT bet_amount, status FROM matches WHERE id = $1 FOR UPDATE NOWAIT")
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EngineError::MatchNotFound(match_id))?;

        let status = MatchStatus::from_db(&row.get::<String, _>("status"));
        if status.is_terminal() {
            return Err(EngineError::MatchNotActive(match_id));
        }
        let bet_amount: i64 = row.get("bet_amount");

        let refunds = self.refund_seats_in_tx(&mut tx, match_id, bet_amount).await?;

        sqlx::query(
            "UPDATE matches SET status = 'cancelled' WHERE id = $1 AND status IN ('waiting', 'active')",
        )
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(EngineError::from)?;

        log::info!(
            "Match {match_id} cancelled by admin, refunded {} seats",
            refunds.len()
        );
        self.emit(MatchEvent::MatchCancelled {
            match_id,
            refunds: refunds.clone(),
        });

        Ok(CancelOutcome { match_id, refunds })
    }

    /// Credit every seated participant their bet back. Caller holds the
    /// match lock and flips the status in the same transaction.
    async fn refund_seats_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        match_id: MatchId,
        bet_amount: i64,
    ) -> EngineResult<Vec<Payout>> {
        let user_ids: Vec<i64> = sqlx::query(
            "SELECT user_id FROM participants WHERE match_id = $1 ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(match_id)
        .fetch_all(&mut **tx)
        .await?
        .iter()
        .map(|r| r.get("user_id"))
        .collect();

        let mut refunds = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            self.wallet
                .credit_in_tx(
                    tx,
                    user_id,
                    Some(match_id),
                    bet_amount,
                    EntryKind::Refund,
                    EntryStatus::Settled,
                    format!("refund:{match_id}:{user_id}"),
                    Some(format!("Refund for match {match_id}")),
                )
                .await?;
            refunds.push(Payout {
                user_id,
                amount: bet_amount,
            });
        }
        Ok(refunds)
    }

    /// Apply a settlement inside the match-locked transaction: credits,
    /// status flip, counters.
    async fn apply_settlement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        match_id: MatchId,
        choices: &[(i64, Choice)],
        settlement: &Settlement,
    ) -> EngineResult<MatchCompleted> {
        let (kind, reference_prefix) = match settlement.outcome {
            Outcome::Draw => (EntryKind::Refund, "refund"),
            Outcome::Decisive { .. } => (EntryKind::Win, "win"),
        };

        for payout in &settlement.payouts {
            // A 100% fee leaves zero-amount payouts; the wallet rejects
            // zero credits, and there is nothing to move anyway.
            if payout.amount == 0 {
                continue;
            }
            self.wallet
                .credit_in_tx(
                    tx,
                    payout.user_id,
                    Some(match_id),
                    payout.amount,
                    kind,
                    EntryStatus::Settled,
                    format!("{reference_prefix}:{match_id}:{}", payout.user_id),
                    None,
                )
                .await?;
        }

        sqlx::query(
            "UPDATE matches
             SET status = 'completed', winner_id = $1, completed_at = NOW()
             WHERE id = $2 AND status = 'active'",
        )
        .bind(settlement.winner_id)
        .bind(match_id)
        .execute(&mut **tx)
        .await?;

        let seat_ids: Vec<i64> = choices.iter().map(|&(user_id, _)| user_id).collect();
        sqlx::query("UPDATE users SET matches_played = matches_played + 1 WHERE id = ANY($1)")
            .bind(seat_ids)
            .execute(&mut **tx)
            .await?;

        if !settlement.winner_ids.is_empty() {
            sqlx::query("UPDATE users SET matches_won = matches_won + 1 WHERE id = ANY($1)")
                .bind(settlement.winner_ids.clone())
                .execute(&mut **tx)
                .await?;
        }

        let payout_by_user: HashMap<i64, i64> = settlement
            .payouts
            .iter()
            .map(|p| (p.user_id, p.amount))
            .collect();

        Ok(MatchCompleted {
            match_id,
            outcome: settlement.outcome,
            winner_id: settlement.winner_id,
            pot: settlement.pot,
            fee: settlement.fee,
            seats: choices
                .iter()
                .map(|&(user_id, choice)| SeatResult {
                    user_id,
                    choice,
                    payout: payout_by_user.get(&user_id).copied().unwrap_or(0),
                })
                .collect(),
        })
    }

    fn emit(&self, event: MatchEvent) {
        // Send only errs when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }

    async fn backoff(&self, attempt: u32) {
        let base = self.config.lock_retry_backoff_ms.max(1);
        let jitter = rand::rng().random_range(0..base);
        tokio::time::sleep(Duration::from_millis(base * u64::from(attempt) + jitter)).await;
    }
}
