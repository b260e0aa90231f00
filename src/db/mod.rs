use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::config::Config;
use tracing::{info, debug};

pub mod models;
pub mod schema;

pub use models::{AuthorRecord, AuthorRef, MessageRecord, RecentMessage, StoredMessage};
use models::millis_to_utc;

/// Durable record of authors and messages, keyed by the platform's ids.
///
/// Both writes are idempotent upserts. Each statement is atomic at the row level,
/// which is the only serialization point between concurrent event tasks.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn upsert_author(&self, author: AuthorRecord) -> anyhow::Result<AuthorRef>;
    async fn upsert_message(&self, message: MessageRecord) -> anyhow::Result<()>;
    /// Newest first.
    async fn recent_messages(&self, limit: usize) -> anyhow::Result<Vec<RecentMessage>>;
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(&config.database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection mutex poisoned"))
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.conn()?;
        conn.execute_batch(schema::SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a synchronous database call on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn save_author(&self, author: &AuthorRecord) -> anyhow::Result<AuthorRef> {
        debug!("Database: Upserting author {}", author.id);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO authors (id, username, display_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 display_name = excluded.display_name",
            (&author.id, &author.username, &author.display_name),
        )?;
        Ok(AuthorRef::new(author.id.clone()))
    }

    /// `author_id` and `created_at` are fixed by the first write. Content and
    /// `edited_at` follow the latest edit; a write carrying an older (or no)
    /// edit time never replaces a row that already holds a newer edit.
    pub fn save_message(&self, message: &MessageRecord) -> anyhow::Result<()> {
        debug!(
            "Database: Upserting message {} from author {}",
            message.id,
            message.author.as_str()
        );
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (id, content, author_id, created_at, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 content = excluded.content,
                 edited_at = excluded.edited_at
             WHERE messages.edited_at IS NULL
                OR (excluded.edited_at IS NOT NULL AND excluded.edited_at >= messages.edited_at)",
            (
                &message.id,
                &message.content,
                message.author.as_str(),
                message.created_at.timestamp_millis(),
                message.edited_at.map(|t| t.timestamp_millis()),
            ),
        )?;
        Ok(())
    }

    pub fn get_author(&self, id: &str) -> anyhow::Result<Option<AuthorRecord>> {
        let conn = self.conn()?;
        let author = conn
            .query_row(
                "SELECT id, username, display_name FROM authors WHERE id = ?1",
                [id],
                |row| {
                    Ok(AuthorRecord {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    pub fn get_message(&self, id: &str) -> anyhow::Result<Option<StoredMessage>> {
        let conn = self.conn()?;
        let message = conn
            .query_row(
                "SELECT id, content, author_id, created_at, edited_at FROM messages WHERE id = ?1",
                [id],
                |row| {
                    let edited_at: Option<i64> = row.get(4)?;
                    Ok(StoredMessage {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        author_id: row.get(2)?,
                        created_at: millis_to_utc(row.get(3)?),
                        edited_at: edited_at.map(millis_to_utc),
                    })
                },
            )
            .optional()?;
        Ok(message)
    }

    pub fn count_messages(&self) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_recent_messages(&self, limit: usize) -> anyhow::Result<Vec<RecentMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.content, a.display_name, m.created_at
             FROM messages m
             JOIN authors a ON a.id = m.author_id
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(RecentMessage {
                content: row.get(0)?,
                author_display_name: row.get(1)?,
                created_at: millis_to_utc(row.get(2)?),
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        debug!("Database: Recent messages returned {} rows", results.len());
        Ok(results)
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn upsert_author(&self, author: AuthorRecord) -> anyhow::Result<AuthorRef> {
        self.run_blocking(move |db| db.save_author(&author)).await
    }

    async fn upsert_message(&self, message: MessageRecord) -> anyhow::Result<()> {
        self.run_blocking(move |db| db.save_message(&message)).await
    }

    async fn recent_messages(&self, limit: usize) -> anyhow::Result<Vec<RecentMessage>> {
        self.run_blocking(move |db| db.get_recent_messages(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn test_db() -> Database {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        db
    }

    fn author(id: &str, display_name: &str) -> AuthorRecord {
        AuthorRecord {
            id: id.to_string(),
            username: format!("{}_handle", id),
            display_name: display_name.to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn message(id: &str, author: &AuthorRef, content: &str, created: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            content: content.to_string(),
            author: author.clone(),
            created_at: at(created),
            edited_at: None,
        }
    }

    #[test]
    fn test_author_upsert_keeps_latest_display_name() {
        let db = test_db();

        db.save_author(&author("u1", "Alice")).unwrap();
        db.save_author(&author("u1", "Alice in Chains")).unwrap();

        let stored = db.get_author("u1").unwrap().unwrap();
        assert_eq!(stored.display_name, "Alice in Chains");

        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_identical_redelivery_is_idempotent() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();
        let msg = message("m1", &alice, "hello", 0);

        db.save_message(&msg).unwrap();
        db.save_message(&msg).unwrap();

        assert_eq!(db.count_messages().unwrap(), 1);
        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.author_id, "u1");
        assert_eq!(stored.created_at, at(0));
        assert_eq!(stored.edited_at, None);
    }

    #[test]
    fn test_edit_updates_content_but_not_author_or_creation() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();
        let bob = db.save_author(&author("u2", "Bob")).unwrap();

        db.save_message(&message("m1", &alice, "helo", 0)).unwrap();

        // The edit claims a different author and creation time; both are immutable.
        let mut edit = message("m1", &bob, "hello", 30);
        edit.edited_at = Some(at(60));
        db.save_message(&edit).unwrap();

        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.edited_at, Some(at(60)));
        assert_eq!(stored.author_id, "u1");
        assert_eq!(stored.created_at, at(0));
    }

    #[test]
    fn test_late_create_does_not_revert_edit() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();

        let mut edit = message("m1", &alice, "edited", 0);
        edit.edited_at = Some(at(60));
        db.save_message(&edit).unwrap();
        db.save_message(&message("m1", &alice, "original", 0)).unwrap();

        let mut older_edit = message("m1", &alice, "first edit", 0);
        older_edit.edited_at = Some(at(30));
        db.save_message(&older_edit).unwrap();

        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.content, "edited");
        assert_eq!(stored.edited_at, Some(at(60)));
    }

    #[test]
    fn test_message_requires_existing_author() {
        let db = test_db();
        let ghost = AuthorRef::new("nobody");
        let result = db.save_message(&message("m1", &ghost, "boo", 0));
        assert!(result.is_err());
        assert_eq!(db.count_messages().unwrap(), 0);
    }

    #[test]
    fn test_recent_messages_newest_first() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();
        let bob = db.save_author(&author("u2", "Bob")).unwrap();

        db.save_message(&message("m1", &alice, "t1", 0)).unwrap();
        db.save_message(&message("m3", &alice, "t3", 20)).unwrap();
        db.save_message(&message("m2", &bob, "t2", 10)).unwrap();

        let recent = db.get_recent_messages(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "t3");
        assert_eq!(recent[0].author_display_name, "Alice");
        assert_eq!(recent[0].created_at, at(20));
        assert_eq!(recent[1].content, "t2");
        assert_eq!(recent[1].author_display_name, "Bob");
        assert_eq!(recent[1].created_at, at(10));
    }

    #[test]
    fn test_recent_messages_reflect_current_author_name() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();
        db.save_message(&message("m1", &alice, "hi", 0)).unwrap();
        db.save_author(&author("u1", "Alicia")).unwrap();

        let recent = db.get_recent_messages(10).unwrap();
        assert_eq!(recent[0].author_display_name, "Alicia");
    }

    #[test]
    fn test_millisecond_precision_survives() {
        let db = test_db();
        let alice = db.save_author(&author("u1", "Alice")).unwrap();
        let mut msg = message("m1", &alice, "precise", 0);
        msg.created_at = at(0) + Duration::milliseconds(123);
        db.save_message(&msg).unwrap();

        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.created_at, at(0) + Duration::milliseconds(123));
    }

    #[tokio::test]
    async fn test_store_trait_runs_on_blocking_pool() {
        let db = test_db();
        let store: &dyn MessageStore = &db;

        let alice = store.upsert_author(author("u1", "Alice")).await.unwrap();
        store
            .upsert_message(message("m1", &alice, "async hello", 0))
            .await
            .unwrap();

        let recent = store.recent_messages(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "async hello");
    }
}
