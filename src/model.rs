use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, SweepError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatKind {
    Group,
    Supergroup,
    Bot,
    Other,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Group => "group",
            ChatKind::Supergroup => "supergroup",
            ChatKind::Bot => "bot",
            ChatKind::Other => "other",
        }
    }

    /// Groups and supergroups are the chats a sweep can target.
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

impl From<&str> for ChatKind {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "bot" => ChatKind::Bot,
            _ => ChatKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub title: String,
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub caption: Option<String>,
}

/// Run-wide deletion policy, fixed before the first chat is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffPolicy {
    pub cutoff: DateTime<Utc>,
    pub skip_memes: bool,
}

impl CutoffPolicy {
    /// Cutoff `days` before `now`. Zero days would put the cutoff at run start.
    pub fn days_before(now: DateTime<Utc>, days: u32, skip_memes: bool) -> Result<Self> {
        if days == 0 {
            return Err(SweepError::Configuration(
                "cutoff must be at least one day in the past".into(),
            ));
        }
        Ok(Self {
            cutoff: now - Duration::days(i64::from(days)),
            skip_memes,
        })
    }
}

/// Position of the next search page within one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub chat_id: i64,
    pub offset: usize,
}

impl PageCursor {
    pub fn start(chat_id: i64) -> Self {
        Self { chat_id, offset: 0 }
    }

    pub fn advance(&mut self, by: usize) {
        self.offset += by;
    }
}

/// Message ids queued for deletion in one chat.
///
/// Keeps first-insertion order so listings and chunking are deterministic;
/// re-inserting an id is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionBatch {
    ids: Vec<i32>,
    seen: HashSet<i32>,
}

impl DeletionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already queued.
    pub fn insert(&mut self, id: i32) -> bool {
        if self.seen.insert(id) {
            self.ids.push(id);
            true
        } else {
            false
        }
    }

    /// Returns how many ids were new.
    pub fn merge<I: IntoIterator<Item = i32>>(&mut self, ids: I) -> usize {
        ids.into_iter().filter(|id| self.insert(*id)).count()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<i32> {
        self.ids
    }
}
