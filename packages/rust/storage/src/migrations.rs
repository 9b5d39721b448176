//! SQL migration definitions for the topicrawl database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: tasks, sources, launches, task_sources",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Crawl tasks
CREATE TABLE IF NOT EXISTS tasks (
    id                        INTEGER PRIMARY KEY AUTOINCREMENT,
    query                     TEXT NOT NULL,
    status                    TEXT NOT NULL,
    depth_level               INTEGER NOT NULL,
    min_weight                REAL NOT NULL,
    max_sources               INTEGER NOT NULL,
    max_neighbours_per_source INTEGER NOT NULL,
    created_at                TEXT NOT NULL,
    updated_at                TEXT NOT NULL,
    processed_at              TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

-- Pages ever kept by any task, unique by URL
CREATE TABLE IF NOT EXISTS sources (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    url        TEXT NOT NULL UNIQUE,
    title      TEXT NOT NULL,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per crawl execution
CREATE TABLE IF NOT EXISTS launches (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    number         INTEGER NOT NULL,
    task_id        INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    started_at     TEXT NOT NULL,
    finished_at    TEXT,
    sources_viewed INTEGER NOT NULL DEFAULT 0,
    status         TEXT NOT NULL,
    error          TEXT,
    UNIQUE(task_id, number)
);

CREATE INDEX IF NOT EXISTS idx_launches_task_id ON launches(task_id);

-- Per-launch weight and parent of each kept source
CREATE TABLE IF NOT EXISTS task_sources (
    task_id          INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    launch_id        INTEGER NOT NULL REFERENCES launches(id) ON DELETE CASCADE,
    source_id        INTEGER NOT NULL REFERENCES sources(id),
    parent_source_id INTEGER REFERENCES sources(id),
    weight           REAL NOT NULL,
    PRIMARY KEY (launch_id, source_id)
);

CREATE INDEX IF NOT EXISTS idx_task_sources_task ON task_sources(task_id, launch_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
