use tracing::{info, instrument};

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::filter::partition;
use crate::model::{Chat, CutoffPolicy, DeletionBatch, PageCursor};

/// Everything discovered in one chat.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub batch: DeletionBatch,
    pub skipped_by_date: usize,
    pub skipped_by_meme: usize,
    pub pages: usize,
}

pub struct Paginator {
    fetcher: PageFetcher,
    policy: CutoffPolicy,
}

impl Paginator {
    pub fn new(fetcher: PageFetcher, policy: CutoffPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Walk the chat's search results until a short page and gather eligible ids.
    /// Fetch failures propagate; nothing is retried here.
    #[instrument(skip_all, fields(chat_id = chat.id))]
    pub async fn collect(&self, chat: &Chat) -> Result<Collection> {
        let page_size = self.fetcher.page_size();
        let mut cursor = PageCursor::start(chat.id);
        let mut collection = Collection::default();

        loop {
            let page = self.fetcher.fetch(cursor).await?;
            collection.pages += 1;

            let outcome = partition(&page, &self.policy);
            collection.batch.merge(outcome.eligible);
            collection.skipped_by_date += outcome.skipped_by_date;
            collection.skipped_by_meme += outcome.skipped_by_meme;

            info!(
                offset = cursor.offset,
                found = page.len(),
                title = %chat.title,
                "searched page"
            );
            if page.len() < page_size {
                break;
            }
            cursor.advance(page_size);
        }

        if collection.skipped_by_date + collection.skipped_by_meme > 0 {
            info!(
                skipped_by_date = collection.skipped_by_date,
                skipped_by_meme = collection.skipped_by_meme,
                "omitting messages"
            );
        }
        Ok(collection)
    }
}
