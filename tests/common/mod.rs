#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tg_sweeper::model::{Chat, ChatKind, Message};
use tg_sweeper::remote::TelegramApi;
use tg_sweeper::RemoteError;
use tokio::sync::Mutex;

type PageScript = VecDeque<Result<Vec<Message>, RemoteError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub chat_id: i64,
    pub offset: usize,
    pub limit: usize,
}

/// Scripted stand-in for the gateway that records every call it receives.
#[derive(Clone, Default)]
pub struct RecordingApi {
    chats: Vec<Chat>,
    pages: Arc<Mutex<HashMap<i64, PageScript>>>,
    delete_responses: Arc<Mutex<VecDeque<Result<(), RemoteError>>>>,
    search_calls: Arc<Mutex<Vec<SearchCall>>>,
    delete_calls: Arc<Mutex<Vec<(i64, Vec<i32>)>>>,
}

impl RecordingApi {
    pub fn new(chats: Vec<Chat>) -> Self {
        Self {
            chats,
            ..Default::default()
        }
    }

    pub async fn script_pages(&self, chat_id: i64, pages: Vec<Result<Vec<Message>, RemoteError>>) {
        self.pages.lock().await.insert(chat_id, VecDeque::from(pages));
    }

    pub async fn script_deletes(&self, responses: Vec<Result<(), RemoteError>>) {
        *self.delete_responses.lock().await = VecDeque::from(responses);
    }

    pub async fn search_calls(&self) -> Vec<SearchCall> {
        self.search_calls.lock().await.clone()
    }

    pub async fn delete_calls(&self) -> Vec<(i64, Vec<i32>)> {
        self.delete_calls.lock().await.clone()
    }
}

#[async_trait]
impl TelegramApi for RecordingApi {
    async fn list_chats(&self) -> Result<Vec<Chat>, RemoteError> {
        Ok(self.chats.clone())
    }

    async fn search_own_messages(
        &self,
        chat_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Message>, RemoteError> {
        self.search_calls.lock().await.push(SearchCall {
            chat_id,
            offset,
            limit,
        });
        let mut pages = self.pages.lock().await;
        pages
            .get_mut(&chat_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_messages(&self, chat_id: i64, ids: &[i32]) -> Result<(), RemoteError> {
        self.delete_calls.lock().await.push((chat_id, ids.to_vec()));
        self.delete_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

pub fn group(id: i64, title: &str) -> Chat {
    Chat {
        id,
        title: title.to_string(),
        kind: ChatKind::Supergroup,
    }
}

/// `count` consecutive messages starting at `first_id`, all `age_days` old relative to `now`.
pub fn messages(first_id: i32, count: usize, now: DateTime<Utc>, age_days: i64) -> Vec<Message> {
    (0..count as i32)
        .map(|i| Message {
            id: first_id + i,
            timestamp: now - Duration::days(age_days),
            caption: None,
        })
        .collect()
}
