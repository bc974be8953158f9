/// Mailbox → sheet synchronization
pub mod capabilities;
pub mod checkpoint;
pub mod orchestrator;

pub use capabilities::{MessageSource, RowSink};
pub use checkpoint::{CheckpointStore, SyncCheckpoint};
pub use orchestrator::{SyncOptions, SyncOutcome, SyncStage, Synchronizer};
