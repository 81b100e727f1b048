//! Database migrations
//!
//! Schema creation and migration logic. The schema is defined once here
//! and applied at start-up.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- BATCHES
        -- One recipe attempt. parent_batch_id is a weak link with no
        -- foreign key, so deleting a parent leaves children untouched.
        -- ============================================
        CREATE TABLE batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT 'Untitled Batch',
            created_at TEXT NOT NULL,
            final_served_weight REAL,
            number_of_servings REAL,
            rating REAL CHECK(rating IS NULL OR (rating >= 1 AND rating <= 10)),
            reference_urls TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
            is_ai_generated INTEGER NOT NULL DEFAULT 0,
            parent_batch_id INTEGER,

            -- Grade (all NULL when ungraded)
            grade_flavor REAL CHECK(grade_flavor IS NULL OR (grade_flavor >= 0 AND grade_flavor <= 10)),
            grade_texture REAL CHECK(grade_texture IS NULL OR (grade_texture >= 0 AND grade_texture <= 10)),
            grade_overall REAL CHECK(grade_overall IS NULL OR (grade_overall >= 0 AND grade_overall <= 10)),
            grade_notes TEXT
        );

        CREATE INDEX idx_batches_created_at ON batches(created_at);
        CREATE INDEX idx_batches_parent ON batches(parent_batch_id);

        -- ============================================
        -- BATCH INGREDIENTS
        -- Owned by a batch, replaced wholesale on edit
        -- ============================================
        CREATE TABLE batch_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK(kind IN ('dry', 'wet', 'stabilizer', 'ice')),
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            grams REAL NOT NULL DEFAULT 0,
            cups REAL NOT NULL DEFAULT 0,
            liters REAL NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_batch_ingredients_batch ON batch_ingredients(batch_id, kind, position);

        -- ============================================
        -- BATCH NOTES
        -- Append-only tasting notes
        -- ============================================
        CREATE TABLE batch_notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX idx_batch_notes_batch ON batch_notes(batch_id, position);

        -- ============================================
        -- REFERENCE URLS
        -- External pages used to ground suggestions
        -- ============================================
        CREATE TABLE reference_urls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            content TEXT,
            last_indexed TEXT,
            created_at TEXT NOT NULL
        );

        -- ============================================
        -- UNIQUE INGREDIENTS
        -- Name suggestions per ingredient kind
        -- ============================================
        CREATE TABLE unique_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('dry', 'wet', 'stabilizer', 'ice')),
            last_used TEXT NOT NULL,
            use_count INTEGER NOT NULL DEFAULT 1,
            UNIQUE(name, kind)
        );

        CREATE INDEX idx_unique_ingredients_kind ON unique_ingredients(kind, use_count DESC, last_used DESC);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
