/// Authors are keyed by the platform's user id, messages by the platform's message id.
/// Timestamps are unix milliseconds (UTC).
pub const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS authors (
        id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL,
        display_name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        content TEXT NOT NULL,
        author_id TEXT NOT NULL REFERENCES authors (id),
        created_at INTEGER NOT NULL,
        edited_at INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at);
";
