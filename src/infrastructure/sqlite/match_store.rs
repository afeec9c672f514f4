use crate::domain::entities::cycle_summary::{CycleSummary, StageFailure};
use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::{MarketPrice, OddsSnapshot};
use crate::domain::entities::recommendation::{Recommendation, RecommendationContent};
use crate::domain::error::DomainError;
use crate::domain::ports::match_store::*;
use crate::domain::values::lifecycle::MatchStatus;
use crate::infrastructure::sqlite::migrations::run_migrations;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Mutex, MutexGuard};

const MATCH_COLS: &str = "m.id, m.league, m.home_team, m.away_team, m.start_time, m.first_seen_at";

const REC_COLS: &str = "r.match_id, r.pick, r.pick_text, r.confidence, r.edge_reason, r.key_factors, \
     r.research_context, r.created_at, r.delivery_status, r.last_delivery_error, r.last_attempt_at, r.delivered_at";

/// Lifecycle status derived from the recommendation row and the abandon and
/// expiry flags. Delivery wins over expiry.
const STATUS_EXPR: &str = "CASE \
     WHEN r.delivery_status = 'delivered' THEN 'delivered' \
     WHEN m.expired_at IS NOT NULL THEN 'expired' \
     WHEN r.match_id IS NULL AND m.abandoned_at IS NOT NULL THEN 'abandoned' \
     WHEN r.match_id IS NULL THEN 'new' \
     ELSE 'analyzed' END";

const CYCLE_COLS: &str = "id, started_at, finished_at, fetched, new_matches, snapshots, analyzed, delivered, redelivered, abandoned, expired, failures";

pub struct SqliteMatchStore {
    conn: Mutex<Connection>,
}

impl SqliteMatchStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) the database at `db_path` and applies migrations.
    /// `":memory:"` gives a private in-memory store.
    pub fn open(db_path: &str) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        if db_path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DomainError::Database(format!("foreign_keys error: {e}")))?;
        run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn row_to_match(row: &Row, offset: usize) -> Result<Match, rusqlite::Error> {
        Ok(Match {
            id: row.get(offset)?,
            league: row.get(offset + 1)?,
            home_team: row.get(offset + 2)?,
            away_team: row.get(offset + 3)?,
            start_time: parse_ts(row, offset + 4)?,
            first_seen_at: parse_ts(row, offset + 5)?,
        })
    }

    fn row_to_recommendation(row: &Row, offset: usize) -> Result<Recommendation, rusqlite::Error> {
        let key_factors: String = row.get(offset + 5)?;
        Ok(Recommendation {
            match_id: row.get(offset)?,
            content: RecommendationContent {
                pick: parse_text(row, offset + 1)?,
                pick_text: row.get(offset + 2)?,
                confidence: parse_text(row, offset + 3)?,
                edge_reason: row.get(offset + 4)?,
                key_factors: serde_json::from_str(&key_factors)
                    .map_err(|e| conversion_error(offset + 5, e))?,
            },
            research_context: row.get(offset + 6)?,
            created_at: parse_ts(row, offset + 7)?,
            delivery_status: parse_text(row, offset + 8)?,
            last_delivery_error: row.get(offset + 9)?,
            last_attempt_at: parse_opt_ts(row, offset + 10)?,
            delivered_at: parse_opt_ts(row, offset + 11)?,
        })
    }

    fn row_to_snapshot(row: &Row) -> Result<OddsSnapshot, rusqlite::Error> {
        let prices: String = row.get(3)?;
        let prices: Vec<MarketPrice> =
            serde_json::from_str(&prices).map_err(|e| conversion_error(3, e))?;
        Ok(OddsSnapshot {
            id: row.get(0)?,
            match_id: row.get(1)?,
            bookmaker: row.get(2)?,
            prices,
            captured_at: parse_ts(row, 4)?,
        })
    }

    fn row_to_cycle(row: &Row) -> Result<CycleSummary, rusqlite::Error> {
        let failures: String = row.get(11)?;
        let failures: Vec<StageFailure> =
            serde_json::from_str(&failures).map_err(|e| conversion_error(11, e))?;
        Ok(CycleSummary {
            id: row.get(0)?,
            started_at: parse_ts(row, 1)?,
            finished_at: parse_opt_ts(row, 2)?,
            fetched: row.get(3)?,
            new_matches: row.get(4)?,
            snapshots: row.get(5)?,
            analyzed: row.get(6)?,
            delivered: row.get(7)?,
            redelivered: row.get(8)?,
            abandoned: row.get(9)?,
            expired: row.get(10)?,
            failures,
        })
    }

    fn match_exists(conn: &Connection, match_id: &str) -> Result<bool, DomainError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM matches WHERE id = ?1)",
            params![match_id],
            |r| r.get(0),
        )?;
        Ok(exists)
    }
}

impl MatchStore for SqliteMatchStore {
    fn upsert_match(&self, record: &Match) -> Result<bool, DomainError> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO matches (id, league, home_team, away_team, start_time, first_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    record.id,
                    record.league,
                    record.home_team,
                    record.away_team,
                    ts(&record.start_time),
                    ts(&record.first_seen_at),
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to upsert match: {e}")))?;
        Ok(inserted > 0)
    }

    fn append_snapshot(&self, snapshot: &OddsSnapshot) -> Result<(), DomainError> {
        let conn = self.lock()?;
        if !Self::match_exists(&conn, &snapshot.match_id)? {
            return Err(DomainError::NotFound(format!(
                "Match not found: {}",
                snapshot.match_id
            )));
        }
        let prices = serde_json::to_string(&snapshot.prices)
            .map_err(|e| DomainError::Parse(format!("Failed to encode prices: {e}")))?;
        conn.execute(
            "INSERT INTO odds_snapshots (id, match_id, bookmaker, prices, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.id,
                snapshot.match_id,
                snapshot.bookmaker,
                prices,
                ts(&snapshot.captured_at),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DomainError::Conflict(format!("Snapshot already exists: {}", snapshot.id))
            }
            e => DomainError::Database(format!("Failed to append snapshot: {e}")),
        })?;
        Ok(())
    }

    fn odds_history(&self, match_id: &str) -> Result<Vec<OddsSnapshot>, DomainError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, match_id, bookmaker, prices, captured_at FROM odds_snapshots
             WHERE match_id = ?1 ORDER BY captured_at ASC, rowid ASC",
        )?;
        let history = stmt
            .query_map(params![match_id], Self::row_to_snapshot)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    fn find_matches_needing_analysis(&self) -> Result<Vec<Match>, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MATCH_COLS} FROM matches m
             LEFT JOIN recommendations r ON r.match_id = m.id
             WHERE r.match_id IS NULL AND m.abandoned_at IS NULL AND m.expired_at IS NULL
             ORDER BY m.rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let matches = stmt
            .query_map([], |row| Self::row_to_match(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    fn find_matches_pending_delivery(&self) -> Result<Vec<PendingDelivery>, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MATCH_COLS}, {REC_COLS} FROM recommendations r
             JOIN matches m ON m.id = r.match_id
             WHERE r.delivery_status != 'delivered' AND m.expired_at IS NULL
             ORDER BY r.created_at ASC, r.rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let pending = stmt
            .query_map([], |row| {
                Ok(PendingDelivery {
                    record: Self::row_to_match(row, 0)?,
                    recommendation: Self::row_to_recommendation(row, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pending)
    }

    fn save_recommendation(&self, recommendation: &Recommendation) -> Result<(), DomainError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !Self::match_exists(&tx, &recommendation.match_id)? {
            return Err(DomainError::NotFound(format!(
                "Match not found: {}",
                recommendation.match_id
            )));
        }

        let content = &recommendation.content;
        let key_factors = serde_json::to_string(&content.key_factors)
            .map_err(|e| DomainError::Parse(format!("Failed to encode key factors: {e}")))?;
        let inserted = tx
            .execute(
                "INSERT INTO recommendations (match_id, pick, pick_text, confidence, edge_reason, key_factors,
                     research_context, created_at, delivery_status, last_delivery_error, last_attempt_at, delivered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(match_id) DO NOTHING",
                params![
                    recommendation.match_id,
                    content.pick.to_string(),
                    content.pick_text,
                    content.confidence.to_string(),
                    content.edge_reason,
                    key_factors,
                    recommendation.research_context,
                    ts(&recommendation.created_at),
                    recommendation.delivery_status.to_string(),
                    recommendation.last_delivery_error,
                    recommendation.last_attempt_at.as_ref().map(ts),
                    recommendation.delivered_at.as_ref().map(ts),
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to save recommendation: {e}")))?;
        if inserted == 0 {
            return Err(DomainError::Conflict(format!(
                "Recommendation already exists for match {}",
                recommendation.match_id
            )));
        }
        tx.commit()?;
        Ok(())
    }

    fn mark_delivered(&self, match_id: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE recommendations SET
                     last_attempt_at = CASE WHEN delivery_status = 'delivered' THEN last_attempt_at ELSE ?2 END,
                     delivered_at = COALESCE(delivered_at, ?2),
                     last_delivery_error = NULL,
                     delivery_status = 'delivered'
                 WHERE match_id = ?1",
                params![match_id, ts(&Utc::now())],
            )
            .map_err(|e| DomainError::Database(format!("Failed to mark delivered: {e}")))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!(
                "Recommendation not found for match {match_id}"
            )));
        }
        Ok(())
    }

    fn mark_delivery_failed(&self, match_id: &str, reason: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE recommendations SET delivery_status = 'failed', last_delivery_error = ?2, last_attempt_at = ?3
                 WHERE match_id = ?1 AND delivery_status != 'delivered'",
                params![match_id, reason, ts(&Utc::now())],
            )
            .map_err(|e| DomainError::Database(format!("Failed to mark delivery failure: {e}")))?;
        if rows == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM recommendations WHERE match_id = ?1)",
                params![match_id],
                |r| r.get(0),
            )?;
            if !exists {
                return Err(DomainError::NotFound(format!(
                    "Recommendation not found for match {match_id}"
                )));
            }
        }
        Ok(())
    }

    fn record_analysis_failure(&self, match_id: &str, reason: &str) -> Result<u32, DomainError> {
        let conn = self.lock()?;
        conn.query_row(
            "UPDATE matches SET analysis_attempts = analysis_attempts + 1, last_error = ?2
             WHERE id = ?1 RETURNING analysis_attempts",
            params![match_id, reason],
            |r| r.get::<_, u32>(0),
        )
        .optional()?
        .ok_or_else(|| DomainError::NotFound(format!("Match not found: {match_id}")))
    }

    fn abandon_analysis(&self, match_id: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE matches SET abandoned_at = COALESCE(abandoned_at, ?2) WHERE id = ?1",
            params![match_id, ts(&Utc::now())],
        )?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Match not found: {match_id}")));
        }
        Ok(())
    }

    fn expire_match(&self, match_id: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE matches SET expired_at = COALESCE(expired_at, ?2) WHERE id = ?1",
            params![match_id, ts(&Utc::now())],
        )?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Match not found: {match_id}")));
        }
        Ok(())
    }

    fn reset_match(&self, match_id: &str) -> Result<(), DomainError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !Self::match_exists(&tx, match_id)? {
            return Err(DomainError::NotFound(format!("Match not found: {match_id}")));
        }
        tx.execute(
            "DELETE FROM recommendations WHERE match_id = ?1",
            params![match_id],
        )?;
        tx.execute(
            "UPDATE matches SET analysis_attempts = 0, last_error = NULL, abandoned_at = NULL, expired_at = NULL WHERE id = ?1",
            params![match_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_match(&self, match_id: &str) -> Result<Option<Match>, DomainError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {MATCH_COLS} FROM matches m WHERE m.id = ?1");
        let record = conn
            .query_row(&sql, params![match_id], |row| Self::row_to_match(row, 0))
            .optional()?;
        Ok(record)
    }

    fn get_recommendation(&self, match_id: &str) -> Result<Option<Recommendation>, DomainError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {REC_COLS} FROM recommendations r WHERE r.match_id = ?1");
        let recommendation = conn
            .query_row(&sql, params![match_id], |row| {
                Self::row_to_recommendation(row, 0)
            })
            .optional()?;
        Ok(recommendation)
    }

    fn match_status(&self, match_id: &str) -> Result<MatchStatus, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {STATUS_EXPR} FROM matches m
             LEFT JOIN recommendations r ON r.match_id = m.id
             WHERE m.id = ?1"
        );
        conn.query_row(&sql, params![match_id], |row| parse_text(row, 0))
            .optional()?
            .ok_or_else(|| DomainError::NotFound(format!("Match not found: {match_id}")))
    }

    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchOverview>, DomainError> {
        let conn = self.lock()?;
        let mut sql = format!(
            "SELECT * FROM (
                 SELECT {MATCH_COLS}, {STATUS_EXPR} AS status,
                     (SELECT COUNT(*) FROM odds_snapshots s WHERE s.match_id = m.id) AS snapshot_count,
                     m.analysis_attempts, m.last_error, r.last_delivery_error, m.rowid AS seq
                 FROM matches m
                 LEFT JOIN recommendations r ON r.match_id = m.id
             ) WHERE 1=1"
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = &filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        sql.push_str(" ORDER BY start_time ASC, seq ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let matches = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(MatchOverview {
                    record: Self::row_to_match(row, 0)?,
                    status: parse_text(row, 6)?,
                    snapshot_count: row.get(7)?,
                    analysis_attempts: row.get(8)?,
                    last_error: row.get(9)?,
                    last_delivery_error: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    fn record_cycle(&self, summary: &CycleSummary) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let failures = serde_json::to_string(&summary.failures)
            .map_err(|e| DomainError::Parse(format!("Failed to encode failures: {e}")))?;
        conn.execute(
            "INSERT INTO cycle_runs (id, started_at, finished_at, fetched, new_matches, snapshots, analyzed,
                 delivered, redelivered, abandoned, expired, failures, duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                summary.id,
                ts(&summary.started_at),
                summary.finished_at.as_ref().map(ts),
                summary.fetched as i64,
                summary.new_matches as i64,
                summary.snapshots as i64,
                summary.analyzed as i64,
                summary.delivered as i64,
                summary.redelivered as i64,
                summary.abandoned as i64,
                summary.expired as i64,
                failures,
                summary.duration_seconds(),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to record cycle: {e}")))?;
        Ok(())
    }

    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleSummary>, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {CYCLE_COLS} FROM cycle_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let cycles = stmt
            .query_map(params![limit as i64], Self::row_to_cycle)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cycles)
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_ts(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_opt_ts(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn parse_text<T>(row: &Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = String>,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: String| conversion_error(idx, e))
}
