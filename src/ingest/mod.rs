//! Message ingestion: platform events in, author/message upserts out.
//!
//! Created and edited messages share one path. Every event is filtered, then the
//! author is upserted before the message that references it. Each write runs under
//! its own deadline and failures are logged and dropped; ingestion is best-effort.


use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::db::{AuthorRecord, MessageRecord, MessageStore};

pub mod filter;

pub use filter::{EventFilter, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingAuthor {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub is_bot: bool,
}

/// Transport-independent shape of a created or edited chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub kind: EventKind,
    pub id: String,
    pub guild_id: Option<String>,
    pub author: IncomingAuthor,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl IncomingAuthor {
    pub fn from_user(user: &serenity::User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.name.clone(),
            // Users without a global display name go by their handle.
            display_name: user
                .global_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| user.name.clone()),
            is_bot: user.bot,
        }
    }
}

impl IncomingMessage {
    pub fn from_message(message: &serenity::Message, kind: EventKind) -> Self {
        Self {
            kind,
            id: message.id.to_string(),
            guild_id: message.guild_id.map(|id| id.to_string()),
            author: IncomingAuthor::from_user(&message.author),
            content: message.content.clone(),
            created_at: timestamp_to_utc(&message.timestamp),
            edited_at: message.edited_timestamp.as_ref().map(timestamp_to_utc),
        }
    }

    /// Update events are partial; the ones without author, content or send time
    /// (embed unfurls, pins) carry nothing to store.
    pub fn from_update(event: &serenity::MessageUpdateEvent) -> Option<Self> {
        let author = event.author.as_ref()?;
        let content = event.content.as_ref()?;
        let timestamp = event.timestamp.as_ref()?;

        Some(Self {
            kind: EventKind::Updated,
            id: event.id.to_string(),
            guild_id: event.guild_id.map(|id| id.to_string()),
            author: IncomingAuthor::from_user(author),
            content: content.clone(),
            created_at: timestamp_to_utc(timestamp),
            edited_at: event.edited_timestamp.as_ref().map(timestamp_to_utc),
        })
    }
}

fn timestamp_to_utc(ts: &serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), ts.timestamp_subsec_nanos()).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    Rejected(Rejection),
    /// The author write failed or timed out; the message write was skipped.
    AuthorFailed,
    MessageFailed,
}

/// Filters events and writes them to the store.
///
/// A write deadline stops the ingestor from waiting; it does not cancel the
/// blocking store call, which may still commit after the timeout is logged. The
/// `edited_at` guard on the message upsert keeps such a late commit from
/// overwriting a newer edit.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MessageStore>,
    filter: EventFilter,
    write_timeout: Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MessageStore>, filter: EventFilter, write_timeout: Duration) -> Self {
        Self {
            store,
            filter,
            write_timeout,
        }
    }

    /// Fire-and-forget ingestion so the gateway dispatch is never held up by the store.
    pub fn spawn(&self, event: IncomingMessage) -> JoinHandle<IngestOutcome> {
        let ingestor = self.clone();
        tokio::spawn(async move { ingestor.ingest(event).await })
    }

    pub async fn ingest(&self, event: IncomingMessage) -> IngestOutcome {
        if let Err(reason) = self.filter.check(&event) {
            debug!("Ingest: dropping message {} ({})", event.id, reason);
            return IngestOutcome::Rejected(reason);
        }

        let author = AuthorRecord {
            id: event.author.id.clone(),
            username: event.author.username.clone(),
            display_name: event.author.display_name.clone(),
        };

        let author_ref = match timeout(self.write_timeout, self.store.upsert_author(author)).await {
            Ok(Ok(author_ref)) => author_ref,
            Ok(Err(e)) => {
                error!(
                    "Ingest: failed to upsert author {} for message {}: {}",
                    event.author.id, event.id, e
                );
                return IngestOutcome::AuthorFailed;
            }
            Err(_) => {
                warn!(
                    "Ingest: author upsert for {} timed out after {:?}; skipping message {}",
                    event.author.id, self.write_timeout, event.id
                );
                return IngestOutcome::AuthorFailed;
            }
        };

        let message = MessageRecord {
            id: event.id.clone(),
            content: event.content,
            author: author_ref,
            created_at: event.created_at,
            edited_at: event.edited_at,
        };

        match timeout(self.write_timeout, self.store.upsert_message(message)).await {
            Ok(Ok(())) => {
                debug!("Ingest: stored message {} ({:?})", event.id, event.kind);
                IngestOutcome::Stored
            }
            Ok(Err(e)) => {
                error!("Ingest: failed to upsert message {}: {}", event.id, e);
                IngestOutcome::MessageFailed
            }
            Err(_) => {
                warn!(
                    "Ingest: message upsert for {} timed out after {:?}",
                    event.id, self.write_timeout
                );
                IngestOutcome::MessageFailed
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::incoming;
    use super::*;
    use crate::db::{AuthorRef, Database, RecentMessage};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum StoreCall {
        Author(String),
        Message(String),
    }

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<StoreCall>>,
        fail_author: bool,
        author_delay: Option<Duration>,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn upsert_author(&self, author: AuthorRecord) -> anyhow::Result<AuthorRef> {
            if let Some(delay) = self.author_delay {
                tokio::time::sleep(delay).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push(StoreCall::Author(author.id.clone()));
            if self.fail_author {
                anyhow::bail!("constraint violation");
            }
            Ok(AuthorRef::new(author.id))
        }

        async fn upsert_message(&self, message: MessageRecord) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(StoreCall::Message(message.id));
            Ok(())
        }

        async fn recent_messages(&self, _limit: usize) -> anyhow::Result<Vec<RecentMessage>> {
            Ok(Vec::new())
        }
    }

    fn ingestor(store: Arc<dyn MessageStore>) -> Ingestor {
        Ingestor::new(store, EventFilter::new("999"), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_author_written_before_message() {
        let store = Arc::new(RecordingStore::default());
        let outcome = ingestor(store.clone()).ingest(incoming("m1", "u1", "hi")).await;

        assert_eq!(outcome, IngestOutcome::Stored);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Author("u1".to_string()),
                StoreCall::Message("m1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_events_never_reach_the_store() {
        let store = Arc::new(RecordingStore::default());
        let ingestor = ingestor(store.clone());

        let mut dm = incoming("m1", "u1", "hi");
        dm.guild_id = None;
        let mut bot = incoming("m2", "u2", "hi");
        bot.author.is_bot = true;
        let own = incoming("m3", "999", "hi");
        let blank = incoming("m4", "u1", "   ");

        assert_eq!(
            ingestor.ingest(dm).await,
            IngestOutcome::Rejected(Rejection::DirectMessage)
        );
        assert_eq!(
            ingestor.ingest(bot).await,
            IngestOutcome::Rejected(Rejection::BotAuthor)
        );
        assert_eq!(
            ingestor.ingest(own).await,
            IngestOutcome::Rejected(Rejection::SelfAuthored)
        );
        assert_eq!(
            ingestor.ingest(blank).await,
            IngestOutcome::Rejected(Rejection::EmptyContent)
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_author_failure_skips_message_write() {
        let store = Arc::new(RecordingStore {
            fail_author: true,
            ..Default::default()
        });
        let outcome = ingestor(store.clone()).ingest(incoming("m1", "u1", "hi")).await;

        assert_eq!(outcome, IngestOutcome::AuthorFailed);
        assert_eq!(store.calls(), vec![StoreCall::Author("u1".to_string())]);
    }

    #[tokio::test]
    async fn test_author_timeout_abandons_event() {
        let store = Arc::new(RecordingStore {
            author_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let ingestor = Ingestor::new(
            store.clone(),
            EventFilter::new("999"),
            Duration::from_millis(20),
        );

        let outcome = ingestor.ingest(incoming("m1", "u1", "hi")).await;
        assert_eq!(outcome, IngestOutcome::AuthorFailed);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_edit_against_real_store() {
        let db = Database::open(":memory:").unwrap();
        db.execute_init().unwrap();
        let ingestor = ingestor(Arc::new(db.clone()));

        let created = incoming("m1", "u1", "helo wrld");
        let mut edited = created.clone();
        edited.kind = EventKind::Updated;
        edited.content = "hello world".to_string();
        edited.edited_at = Some(created.created_at + ChronoDuration::seconds(45));

        assert_eq!(ingestor.ingest(created.clone()).await, IngestOutcome::Stored);
        assert_eq!(ingestor.ingest(created.clone()).await, IngestOutcome::Stored);
        assert_eq!(ingestor.ingest(edited.clone()).await, IngestOutcome::Stored);

        assert_eq!(db.count_messages().unwrap(), 1);
        let stored = db.get_message("m1").unwrap().unwrap();
        assert_eq!(stored.content, "hello world");
        assert_eq!(stored.edited_at, edited.edited_at);
        assert_eq!(stored.author_id, "u1");
        assert_eq!(stored.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_spawned_ingest_completes() {
        let store = Arc::new(RecordingStore::default());
        let handle = ingestor(store.clone()).spawn(incoming("m1", "u1", "hi"));

        assert_eq!(handle.await.unwrap(), IngestOutcome::Stored);
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn test_author_display_name_falls_back_to_handle() {
        let mut user = serenity::User::default();
        user.name = "alice_01".to_string();
        user.global_name = None;
        assert_eq!(IncomingAuthor::from_user(&user).display_name, "alice_01");

        user.global_name = Some("Alice".to_string());
        assert_eq!(IncomingAuthor::from_user(&user).display_name, "Alice");
    }

    #[test]
    fn test_from_message_maps_fields() {
        let mut msg = serenity::Message::default();
        msg.id = serenity::MessageId::new(42);
        msg.guild_id = Some(serenity::GuildId::new(7));
        msg.author.id = serenity::UserId::new(3);
        msg.author.name = "bob".to_string();
        msg.content = "hey".to_string();
        msg.timestamp = serenity::Timestamp::from_unix_timestamp(1_700_000_000).unwrap();

        let event = IncomingMessage::from_message(&msg, EventKind::Created);
        assert_eq!(event.id, "42");
        assert_eq!(event.guild_id.as_deref(), Some("7"));
        assert_eq!(event.author.id, "3");
        assert_eq!(event.content, "hey");
        assert_eq!(event.created_at.timestamp(), 1_700_000_000);
        assert_eq!(event.edited_at, None);
    }

    #[test]
    fn test_timestamp_keeps_subsecond_precision() {
        let ts = serenity::Timestamp::parse("2024-01-01T00:01:00.123Z").unwrap();
        let converted = timestamp_to_utc(&ts);
        assert_eq!(converted.timestamp(), 1_704_067_260);
        assert_eq!(converted.timestamp_subsec_millis(), 123);
    }
}
