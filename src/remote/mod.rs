//! Remote collaborators: chat listing, own-message search and bulk delete.
use async_trait::async_trait;

use crate::error::RemoteError;
use crate::model::{Chat, Message};

pub mod gateway;

pub use gateway::GatewayClient;

/// Upper bound the search endpoint accepts for `limit`.
pub const SEARCH_WINDOW: usize = 100;

#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn list_chats(&self) -> Result<Vec<Chat>, RemoteError>;

    /// Messages authored by the session owner in `chat_id`, starting `offset`
    /// results into the search. `limit` never exceeds [`SEARCH_WINDOW`].
    async fn search_own_messages(
        &self,
        chat_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Message>, RemoteError>;

    /// Ids that no longer exist are skipped by the remote side.
    async fn delete_messages(&self, chat_id: i64, ids: &[i32]) -> Result<(), RemoteError>;
}
