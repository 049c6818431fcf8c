use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    // Email uniqueness uses SQLite's default BINARY collation: matching is
    // byte-exact and case-sensitive.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            phone       TEXT,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    // Owned records are stored as JSON documents. The owner column is a
    // lookup key only: no foreign key, nothing cascades when a user goes.
    for collection in crate::COLLECTIONS {
        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {c} (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL,
                doc         TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_{c}_owner ON {c}(owner_id);
            ",
            c = collection
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}
