use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, SweepError};
use crate::model::{Message, PageCursor};
use crate::remote::{TelegramApi, SEARCH_WINDOW};

/// Largest page the search endpoint serves without misaligning its internal windows.
pub const MAX_PAGE_SIZE: usize = SEARCH_WINDOW;

/// Fetches one page of the caller's own messages at a time.
#[derive(Clone)]
pub struct PageFetcher {
    api: Arc<dyn TelegramApi>,
    page_size: usize,
}

impl PageFetcher {
    pub fn new(api: Arc<dyn TelegramApi>, page_size: usize) -> Result<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(SweepError::Configuration(format!(
                "search page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        Ok(Self { api, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// A page shorter than [`page_size`](Self::page_size) means the chat is exhausted.
    #[instrument(skip_all, fields(chat_id = cursor.chat_id, offset = cursor.offset))]
    pub async fn fetch(&self, cursor: PageCursor) -> Result<Vec<Message>> {
        debug!("searching messages");
        let page = self
            .api
            .search_own_messages(cursor.chat_id, cursor.offset, self.page_size)
            .await?;
        Ok(page)
    }
}
