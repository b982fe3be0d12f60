//! Deletion journal: a local SQLite record of what each run deleted.
//!
//! Deletion is not atomic across chunks, so every chunk is written down as
//! soon as the remote side accepts it. After an aborted run the journal is
//! the only record of what is already gone.
//!
//! - `model`: row types and status enums.
//! - `repo`: SQL-only functions that map rows into those types.

pub mod model;
pub mod repo;

pub use model::{ChatRunRecord, ChatStatus, ChatSummary, ChunkRecord, RunRecord, RunStatus};
pub use repo::*;
