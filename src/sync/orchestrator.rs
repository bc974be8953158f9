use std::fmt;

use log::{debug, info, warn};

use super::capabilities::{MessageSource, RowSink};
use super::checkpoint::CheckpointStore;
use crate::email::{ContentNormalizer, NormalizedRecord, RawMessage};
use crate::error::SyncError;

/// Steps of a sync run, in order. A run that fails in any step returns a
/// `SyncError` carrying that step and leaves the checkpoint untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    FetchingUnread,
    Normalizing,
    Deduping,
    Appending,
    MarkingRead,
    PersistingCheckpoint,
    Done,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStage::Idle => "loading the checkpoint",
            SyncStage::FetchingUnread => "fetching unread messages",
            SyncStage::Normalizing => "normalizing messages",
            SyncStage::Deduping => "listing known ids",
            SyncStage::Appending => "appending rows",
            SyncStage::MarkingRead => "marking messages read",
            SyncStage::PersistingCheckpoint => "saving the checkpoint",
            // Only reached through `enter`, no error carries it
            SyncStage::Done => "finishing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Process at most this many of the fetched unread messages
    pub limit: Option<usize>,
    /// Normalize and dedupe only: no append, no mark-read, no checkpoint
    pub dry_run: bool,
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Mailbox had nothing unread, no other call was made
    NoUnread,
    /// Every message was already in the sheet (or unparsable); all fetched
    /// messages were marked read
    NothingNew { marked_read: usize, skipped: usize },
    /// New rows appended; exported and already recorded messages marked read
    Exported {
        appended: usize,
        marked_read: usize,
        skipped: usize,
        last_processed_id: String,
    },
    /// Dry run: rows that would have been appended
    DryRun {
        records: Vec<NormalizedRecord>,
        already_known: usize,
        skipped: usize,
    },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NoUnread => write!(f, "✔ No new unread emails found."),
            SyncOutcome::NothingNew { marked_read, .. } => write!(
                f,
                "✔ No new unique emails to append ({} marked as read).",
                marked_read
            ),
            SyncOutcome::Exported { appended, .. } => {
                write!(f, "✔ Successfully processed {} new email(s).", appended)
            }
            SyncOutcome::DryRun { records, .. } => {
                write!(f, "🧪 Dry run: {} email(s) would be appended.", records.len())
            }
        }?;

        match self {
            SyncOutcome::NothingNew { skipped, .. }
            | SyncOutcome::Exported { skipped, .. }
            | SyncOutcome::DryRun { skipped, .. }
                if *skipped > 0 =>
            {
                write!(f, " {} email(s) skipped (unparsable date).", skipped)
            }
            _ => Ok(()),
        }
    }
}

/// Drives one mailbox → sheet export: fetch, normalize, dedupe, append,
/// mark read, save checkpoint.
pub struct Synchronizer<S: MessageSource, K: RowSink> {
    source: S,
    sink: K,
    normalizer: ContentNormalizer,
    checkpoints: CheckpointStore,
    options: SyncOptions,
}

impl<S: MessageSource, K: RowSink> Synchronizer<S, K> {
    pub fn new(
        source: S,
        sink: K,
        normalizer: ContentNormalizer,
        checkpoints: CheckpointStore,
        options: SyncOptions,
    ) -> Self {
        Synchronizer {
            source,
            sink,
            normalizer,
            checkpoints,
            options,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        info!(
            "🔄 Starting sync {} → {}",
            self.source.source_name(),
            self.sink.sink_name()
        );

        let mut stage = enter(SyncStage::Idle);
        let mut checkpoint = self
            .checkpoints
            .load()
            .map_err(|source| SyncError::Checkpoint { stage, source })?;
        debug!("Previous last_processed_id: {:?}", checkpoint.last_processed_id);

        stage = enter(SyncStage::FetchingUnread);
        let mut messages = self
            .source
            .list_unread()
            .await
            .map_err(|source| SyncError::Mailbox { stage, source })?;

        if let Some(limit) = self.options.limit {
            if messages.len() > limit {
                info!("Limiting run to {} of {} unread email(s)", limit, messages.len());
                messages.truncate(limit);
            }
        }

        if messages.is_empty() {
            info!("No unread emails found");
            enter(SyncStage::Done);
            return Ok(SyncOutcome::NoUnread);
        }
        info!("Found {} unread email(s)", messages.len());

        enter(SyncStage::Normalizing);
        let (records, skipped) = self.normalize_all(&messages);

        stage = enter(SyncStage::Deduping);
        let known_ids = self
            .sink
            .list_known_ids()
            .await
            .map_err(|source| SyncError::Sheet { stage, source })?;

        let (known, mut fresh): (Vec<NormalizedRecord>, Vec<NormalizedRecord>) = records
            .into_iter()
            .partition(|record| known_ids.contains(&record.id));
        debug!(
            "{} new record(s), {} already in {}",
            fresh.len(),
            known.len(),
            self.sink.sink_name()
        );

        // Chronological append, so the checkpoint names the newest exported message
        fresh.sort_by_key(|record| record.date);

        if self.options.dry_run {
            enter(SyncStage::Done);
            return Ok(SyncOutcome::DryRun {
                records: fresh,
                already_known: known.len(),
                skipped,
            });
        }

        if fresh.is_empty() {
            // Seen but not novel: mark everything read so it is not fetched forever
            stage = enter(SyncStage::MarkingRead);
            let all_ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
            self.source
                .mark_read(&all_ids)
                .await
                .map_err(|source| SyncError::Mailbox { stage, source })?;

            info!("No new unique emails to append, {} marked as read", all_ids.len());
            enter(SyncStage::Done);
            return Ok(SyncOutcome::NothingNew {
                marked_read: all_ids.len(),
                skipped,
            });
        }

        stage = enter(SyncStage::Appending);
        self.sink
            .append(&fresh)
            .await
            .map_err(|source| SyncError::Sheet { stage, source })?;
        info!("📊 Appended {} row(s) to {}", fresh.len(), self.sink.sink_name());

        // Exported plus already recorded ones; unparsable messages stay unread
        stage = enter(SyncStage::MarkingRead);
        let read_ids: Vec<String> = fresh
            .iter()
            .chain(known.iter())
            .map(|r| r.id.clone())
            .collect();
        self.source
            .mark_read(&read_ids)
            .await
            .map_err(|source| SyncError::Mailbox { stage, source })?;

        stage = enter(SyncStage::PersistingCheckpoint);
        let last_processed_id = fresh.last().map(|r| r.id.clone()).unwrap_or_default();
        checkpoint.last_processed_id = Some(last_processed_id.clone());
        self.checkpoints
            .save(&checkpoint)
            .map_err(|source| SyncError::Checkpoint { stage, source })?;

        enter(SyncStage::Done);
        Ok(SyncOutcome::Exported {
            appended: fresh.len(),
            marked_read: read_ids.len(),
            skipped,
            last_processed_id,
        })
    }

    /// Normalize every message, dropping those whose date cannot be parsed
    fn normalize_all(&self, messages: &[RawMessage]) -> (Vec<NormalizedRecord>, usize) {
        let mut records = Vec::with_capacity(messages.len());
        let mut skipped = 0;

        for message in messages {
            match self.normalizer.normalize(message) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("⚠️  Skipping email {}: {}", message.id, e);
                    skipped += 1;
                }
            }
        }

        (records, skipped)
    }
}

fn enter(stage: SyncStage) -> SyncStage {
    debug!("Sync stage: {:?}", stage);
    stage
}
