use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

/// Proof that an author row was written; required to write a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRef(String);

impl AuthorRef {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub content: String,
    pub author: AuthorRef,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// A message row as it currently sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// One entry of the recency window handed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentMessage {
    pub content: String,
    pub author_display_name: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
