use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::email::{NormalizedRecord, RawMessage};

/// Mailbox the sync reads unread messages from
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Every message currently unread, fully fetched.
    /// Order is provider-defined and may change between calls.
    async fn list_unread(&self) -> Result<Vec<RawMessage>>;

    /// Fetch and decode one message by provider id
    async fn fetch(&self, id: &str) -> Result<RawMessage>;

    /// Mark messages read. Empty input is a no-op and marking an
    /// already-read message is not an error.
    async fn mark_read(&self, ids: &[String]) -> Result<()>;

    /// Name used in logs
    fn source_name(&self) -> &str;
}

/// Tabular store receiving one row per exported message
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Ids already recorded in the id column
    async fn list_known_ids(&self) -> Result<HashSet<String>>;

    /// Append all records in a single call (from, subject, date, body, id).
    /// Empty input is a no-op. A failure means nothing was appended.
    async fn append(&self, records: &[NormalizedRecord]) -> Result<()>;

    /// Name used in logs
    fn sink_name(&self) -> &str;
}
