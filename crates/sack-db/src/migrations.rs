use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            full_name       TEXT NOT NULL,
            role            TEXT NOT NULL CHECK (role IN ('admin', 'donator', 'receiver')),
            password        TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS receiver_points (
            id                  TEXT PRIMARY KEY,
            receiver_id         TEXT NOT NULL UNIQUE REFERENCES profiles(id) ON DELETE CASCADE,
            total_points        INTEGER NOT NULL CHECK (total_points >= 0),
            used_points         INTEGER NOT NULL DEFAULT 0 CHECK (used_points >= 0),
            available_points    INTEGER NOT NULL CHECK (available_points >= 0),
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            CHECK (available_points = total_points - used_points)
        );

        CREATE TABLE IF NOT EXISTS toys (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            description     TEXT,
            points          INTEGER NOT NULL CHECK (points BETWEEN 1 AND 100),
            image_url       TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'available'
                                CHECK (status IN ('available', 'reserved', 'claimed')),
            donator_id      TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            condition       TEXT NOT NULL DEFAULT 'good'
                                CHECK (condition IN ('new', 'like_new', 'good', 'fair')),
            age_range       TEXT NOT NULL,
            category        TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_toys_status
            ON toys(status, created_at);

        CREATE INDEX IF NOT EXISTS idx_toys_donator
            ON toys(donator_id, created_at);

        CREATE TABLE IF NOT EXISTS sack_items (
            id              TEXT PRIMARY KEY,
            receiver_id     TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            toy_id          TEXT NOT NULL UNIQUE REFERENCES toys(id),
            added_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sack_items_receiver
            ON sack_items(receiver_id, added_at);

        CREATE TABLE IF NOT EXISTS revoked_sessions (
            jti             TEXT PRIMARY KEY,
            expires_at      TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
