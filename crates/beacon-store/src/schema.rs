/// SQL DDL for the beacon store.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'active',
    page_views INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    last_active_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_events (
    id TEXT PRIMARY KEY,
    notification_id TEXT NOT NULL,
    app_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS outcome_attempts (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    outcome_id TEXT NOT NULL,
    notification_ids TEXT NOT NULL,
    reported_at TEXT NOT NULL,
    PRIMARY KEY (session_id, outcome_id)
);

CREATE TABLE IF NOT EXISTS prompt_fires (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    prompt_kind TEXT NOT NULL,
    fired_at TEXT NOT NULL,
    PRIMARY KEY (session_id, prompt_kind)
);

CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status, started_at);
CREATE INDEX IF NOT EXISTS idx_notification_events_kind ON notification_events(kind, occurred_at);
CREATE INDEX IF NOT EXISTS idx_notification_events_notification ON notification_events(notification_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
