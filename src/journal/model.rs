use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Aborted => "ABORTED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RUNNING" => Some(RunStatus::Running),
            "COMPLETED" => Some(RunStatus::Completed),
            "ABORTED" => Some(RunStatus::Aborted),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// How processing a single chat ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatStatus {
    Deleted,
    Nothing,
    DryRun,
    Failed,
    /// The run stopped while this chat was being swept.
    Aborted,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Deleted => "DELETED",
            ChatStatus::Nothing => "NOTHING",
            ChatStatus::DryRun => "DRY_RUN",
            ChatStatus::Failed => "FAILED",
            ChatStatus::Aborted => "ABORTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DELETED" => Some(ChatStatus::Deleted),
            "NOTHING" => Some(ChatStatus::Nothing),
            "DRY_RUN" => Some(ChatStatus::DryRun),
            "FAILED" => Some(ChatStatus::Failed),
            "ABORTED" => Some(ChatStatus::Aborted),
            _ => None,
        }
    }
}

/// Per-chat numbers written once the chat is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub title: String,
    pub eligible: usize,
    pub skipped_by_date: usize,
    pub skipped_by_meme: usize,
    pub injected: usize,
    pub status: ChatStatus,
    pub error: Option<String>,
}

impl ChatSummary {
    /// Empty summary, filled in while the chat is swept.
    pub fn new(chat_id: i64, title: impl Into<String>) -> Self {
        Self {
            chat_id,
            title: title.into(),
            eligible: 0,
            skipped_by_date: 0,
            skipped_by_meme: 0,
            injected: 0,
            status: ChatStatus::Nothing,
            error: None,
        }
    }

    /// Mark the chat as ended by `err`, keeping the numbers gathered so far.
    pub fn fail(&mut self, status: ChatStatus, err: &impl std::fmt::Display) {
        self.status = status;
        self.error = Some(err.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub cutoff: DateTime<Utc>,
    pub skip_memes: bool,
    pub dry_run: bool,
    pub status: RunStatus,
}

#[derive(Debug, Clone)]
pub struct ChatRunRecord {
    pub chat_id: i64,
    pub title: String,
    pub eligible: i64,
    pub injected: i64,
    pub status: ChatStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chat_id: i64,
    pub message_ids: Vec<i32>,
    pub attempts: i64,
}
