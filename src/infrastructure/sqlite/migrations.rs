use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            league TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            start_time TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            analysis_attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            abandoned_at TEXT,
            expired_at TEXT
        );

        CREATE TABLE IF NOT EXISTS odds_snapshots (
            id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL REFERENCES matches(id),
            bookmaker TEXT,
            prices TEXT NOT NULL DEFAULT '[]',
            captured_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recommendations (
            match_id TEXT PRIMARY KEY REFERENCES matches(id),
            pick TEXT NOT NULL,
            pick_text TEXT NOT NULL,
            confidence TEXT NOT NULL,
            edge_reason TEXT NOT NULL,
            key_factors TEXT NOT NULL DEFAULT '[]',
            research_context TEXT NOT NULL,
            created_at TEXT NOT NULL,
            delivery_status TEXT NOT NULL DEFAULT 'pending',
            last_delivery_error TEXT,
            last_attempt_at TEXT,
            delivered_at TEXT
        );

        CREATE TABLE IF NOT EXISTS cycle_runs (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            fetched INTEGER NOT NULL DEFAULT 0,
            new_matches INTEGER NOT NULL DEFAULT 0,
            snapshots INTEGER NOT NULL DEFAULT 0,
            analyzed INTEGER NOT NULL DEFAULT 0,
            delivered INTEGER NOT NULL DEFAULT 0,
            redelivered INTEGER NOT NULL DEFAULT 0,
            abandoned INTEGER NOT NULL DEFAULT 0,
            expired INTEGER NOT NULL DEFAULT 0,
            failures TEXT NOT NULL DEFAULT '[]',
            duration_seconds REAL
        );

        CREATE TRIGGER IF NOT EXISTS odds_snapshots_no_update
        BEFORE UPDATE ON odds_snapshots
        BEGIN
            SELECT RAISE(ABORT, 'odds snapshots are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS odds_snapshots_no_delete
        BEFORE DELETE ON odds_snapshots
        BEGIN
            SELECT RAISE(ABORT, 'odds snapshots are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS recommendations_delivered_is_final
        BEFORE UPDATE OF delivery_status ON recommendations
        WHEN OLD.delivery_status = 'delivered' AND NEW.delivery_status != 'delivered'
        BEGIN
            SELECT RAISE(ABORT, 'delivered recommendations cannot be reopened');
        END;

        CREATE INDEX IF NOT EXISTS idx_matches_start ON matches(start_time);
        CREATE INDEX IF NOT EXISTS idx_snapshots_match ON odds_snapshots(match_id, captured_at);
        CREATE INDEX IF NOT EXISTS idx_recommendations_delivery ON recommendations(delivery_status);
        CREATE INDEX IF NOT EXISTS idx_cycle_runs_started ON cycle_runs(started_at);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}
