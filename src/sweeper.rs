//! Run orchestration: pick chats, fix the cutoff, then discover, confirm and
//! delete one chat at a time.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::deleter::{BulkDeleter, DeleteReport};
use crate::error::{Result, SweepError};
use crate::fetcher::PageFetcher;
use crate::journal::{self, ChatStatus, ChatSummary, Pool, RunStatus};
use crate::model::{Chat, CutoffPolicy, DeletionBatch};
use crate::paginator::{Collection, Paginator};
use crate::prompt::{self, Prompter, Selection};
use crate::range;
use crate::remote::TelegramApi;

const TIME_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    pub search_chunk_size: usize,
    pub delete_chunk_size: usize,
    pub default_cutoff_days: u32,
    pub dry_run: bool,
}

impl SweepSettings {
    pub fn from_config(cfg: &Config, dry_run: bool) -> Self {
        Self {
            search_chunk_size: cfg.cleaner.search_chunk_size,
            delete_chunk_size: cfg.cleaner.delete_chunk_size,
            default_cutoff_days: cfg.app.default_cutoff_days,
            dry_run,
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            search_chunk_size: 100,
            delete_chunk_size: 100,
            default_cutoff_days: 7,
            dry_run: false,
        }
    }
}

/// Per-chat choices made after discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatPlan {
    /// Half-open raw id range for deep clean.
    pub deep_clean: Option<(i32, i32)>,
}

/// Ids queued for one chat, waiting for a human decision.
#[derive(Debug, Clone)]
pub struct DeletionPlan {
    pub chat_id: i64,
    pub discovered: usize,
    pub injected: usize,
    batch: DeletionBatch,
}

/// A [`DeletionPlan`] that has been approved.
#[derive(Debug, Clone)]
pub struct AuthorizedDeletion {
    pub chat_id: i64,
    pub batch: DeletionBatch,
}

impl DeletionPlan {
    pub fn new(chat_id: i64, collection: Collection, plan: ChatPlan) -> Self {
        let discovered = collection.batch.len();
        let mut batch = collection.batch;
        let injected = plan
            .deep_clean
            .map(|(start, end)| batch.merge(range::inject(start, end)))
            .unwrap_or(0);
        Self {
            chat_id,
            discovered,
            injected,
            batch,
        }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn ids(&self) -> &[i32] {
        self.batch.ids()
    }

    /// Gate for the destructive step: nothing is handed out unless `confirmed`.
    pub fn authorize(self, confirmed: bool) -> Result<AuthorizedDeletion> {
        if !confirmed {
            return Err(SweepError::Aborted("deletion was not confirmed".into()));
        }
        Ok(AuthorizedDeletion {
            chat_id: self.chat_id,
            batch: self.batch,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: Option<i64>,
    pub chats: Vec<ChatSummary>,
}

pub struct Sweeper {
    api: Arc<dyn TelegramApi>,
    fetcher: PageFetcher,
    deleter: BulkDeleter,
    default_cutoff_days: u32,
    dry_run: bool,
    journal: Option<Pool>,
}

impl Sweeper {
    /// Validates page and chunk sizes before anything touches the network.
    pub fn new(api: Arc<dyn TelegramApi>, settings: &SweepSettings) -> Result<Self> {
        let fetcher = PageFetcher::new(api.clone(), settings.search_chunk_size)?;
        let deleter = BulkDeleter::new(api.clone(), settings.delete_chunk_size)?;
        Ok(Self {
            api,
            fetcher,
            deleter,
            default_cutoff_days: settings.default_cutoff_days,
            dry_run: settings.dry_run,
            journal: None,
        })
    }

    pub fn with_journal(mut self, pool: Pool) -> Self {
        self.journal = Some(pool);
        self
    }

    /// Offer the caller's groups as a numbered menu and return the chosen ones.
    #[instrument(skip_all)]
    pub async fn select_groups(&self, prompter: &mut dyn Prompter) -> Result<Vec<Chat>> {
        let groups: Vec<Chat> = self
            .api
            .list_chats()
            .await?
            .into_iter()
            .filter(|c| c.kind.is_group())
            .collect();
        if groups.is_empty() {
            return Err(SweepError::Aborted("no groups to choose from".into()));
        }

        prompter.say("Make a selection. Remove the sent messages in:");
        for (i, group) in groups.iter().enumerate() {
            prompter.say(&format!("  {}. {}", i + 1, group.title));
        }
        prompter.say("  -----------------------------------------------------------");
        prompter.say(&format!(
            "  {}. (!) DELETE ALL YOUR MESSAGES IN ALL OF THOSE GROUPS (!)",
            groups.len() + 1
        ));

        let answer = prompter.ask("Insert option numbers (comma separated): ")?;
        let selected = match prompt::parse_selection(&answer, groups.len())? {
            Selection::All => {
                prompter.say("THIS WILL DELETE ALL YOUR MESSAGES IN ALL GROUPS!");
                let answer = prompter.ask("Please type \"I understand\" to proceed: ")?;
                if !prompt::acknowledges(&answer) {
                    return Err(SweepError::Aborted("all-groups sweep not acknowledged".into()));
                }
                groups
            }
            Selection::Chosen(indices) => indices.into_iter().map(|i| groups[i].clone()).collect(),
        };

        let names: Vec<&str> = selected.iter().map(|c| c.title.as_str()).collect();
        prompter.say(&format!("Selected {}.", names.join(", ")));
        Ok(selected)
    }

    /// Ask for the cutoff day count, have it confirmed, then ask about memes.
    pub fn select_cutoff(&self, prompter: &mut dyn Prompter, now: DateTime<Utc>) -> Result<CutoffPolicy> {
        let answer = prompter.ask(&format!(
            "Type in the amount of the last days to ignore (the deletion cutoff) [{}]: ",
            self.default_cutoff_days
        ))?;
        let days = prompt::parse_days(&answer, self.default_cutoff_days)?;
        let policy = CutoffPolicy::days_before(now, days, false)?;

        prompter.say(&format!("Current date and time is: {}", now.format(TIME_FORMAT)));
        prompter.say(&format!(
            "Message deletion cutoff is {days} days before now, which is: {}",
            policy.cutoff.format(TIME_FORMAT)
        ));
        let answer = prompter.ask("If this cutoff time is correct, please type \"Y\" to proceed: ")?;
        if !prompt::is_yes(&answer) {
            return Err(SweepError::Aborted("cutoff not confirmed".into()));
        }

        let skip_memes = prompt::is_yes(&prompter.ask("Skip memes? y/N: ")?);
        Ok(CutoffPolicy {
            skip_memes,
            ..policy
        })
    }

    /// Ask whether to add a raw id range for this chat.
    pub fn plan_chat(&self, prompter: &mut dyn Prompter) -> Result<ChatPlan> {
        if !prompt::is_yes(&prompter.ask("Deep Clean? y/N: ")?) {
            return Ok(ChatPlan::default());
        }
        let start = prompt::parse_message_id(&prompter.ask("starting ID: ")?)?;
        let end = prompt::parse_message_id(&prompter.ask("end ID: ")?)?;
        if start >= end {
            warn!(start, end, "empty deep clean range; nothing added");
        }
        Ok(ChatPlan {
            deep_clean: Some((start, end)),
        })
    }

    /// Sweep every chat in order. A chat-local failure is logged and the run
    /// moves on; fatal errors end the run.
    #[instrument(skip_all, fields(chats = chats.len()))]
    pub async fn run(
        &self,
        chats: &[Chat],
        policy: &CutoffPolicy,
        prompter: &mut dyn Prompter,
    ) -> Result<RunReport> {
        let run_id = match &self.journal {
            Some(pool) => Some(journal::start_run(pool, policy, self.dry_run).await?),
            None => None,
        };
        let deleter = match (&self.journal, run_id) {
            (Some(pool), Some(id)) => self.deleter.clone().with_journal(pool.clone(), id),
            _ => self.deleter.clone(),
        };

        let mut report = RunReport {
            run_id,
            chats: Vec::new(),
        };
        for chat in chats {
            let mut summary = ChatSummary::new(chat.id, chat.title.clone());
            match self
                .sweep_chat(chat, policy, &deleter, prompter, &mut summary)
                .await
            {
                Ok(()) => {}
                Err(err) if !err.is_fatal() => {
                    error!(chat_id = chat.id, title = %chat.title, %err, "chat sweep failed");
                    prompter.say(&format!("Sweeping \"{}\" failed: {err}", chat.title));
                    summary.fail(ChatStatus::Failed, &err);
                }
                Err(err) => {
                    if let (Some(pool), Some(id)) = (&self.journal, run_id) {
                        let (chat_status, run_status) = match &err {
                            SweepError::Aborted(_) => (ChatStatus::Aborted, RunStatus::Aborted),
                            _ => (ChatStatus::Failed, RunStatus::Failed),
                        };
                        summary.fail(chat_status, &err);
                        journal::record_chat(pool, id, &summary).await?;
                        journal::finish_run(pool, id, run_status).await?;
                    }
                    return Err(err);
                }
            }
            if let (Some(pool), Some(id)) = (&self.journal, run_id) {
                journal::record_chat(pool, id, &summary).await?;
            }
            report.chats.push(summary);
        }

        if let (Some(pool), Some(id)) = (&self.journal, run_id) {
            journal::finish_run(pool, id, RunStatus::Completed).await?;
        }
        Ok(report)
    }

    /// Discover, confirm and delete for one chat. `summary` is filled in as
    /// the chat progresses so a failure still reports what was found.
    #[instrument(skip_all, fields(chat_id = chat.id))]
    async fn sweep_chat(
        &self,
        chat: &Chat,
        policy: &CutoffPolicy,
        deleter: &BulkDeleter,
        prompter: &mut dyn Prompter,
        summary: &mut ChatSummary,
    ) -> Result<()> {
        let paginator = Paginator::new(self.fetcher.clone(), *policy);
        let collection = paginator.collect(chat).await?;
        summary.eligible = collection.batch.len();
        summary.skipped_by_date = collection.skipped_by_date;
        summary.skipped_by_meme = collection.skipped_by_meme;

        prompter.say(&format!(
            "Found {} of your messages in \"{}\" older than the cutoff.",
            summary.eligible, chat.title
        ));
        if summary.skipped_by_date + summary.skipped_by_meme > 0 {
            prompter.say(&format!(
                "Omitting {} messages due to date cutoff and {} messages due to meme bypass.",
                summary.skipped_by_date, summary.skipped_by_meme
            ));
        }

        let plan = DeletionPlan::new(chat.id, collection, self.plan_chat(prompter)?);
        summary.injected = plan.injected;

        if plan.is_empty() {
            prompter.say(&format!("Nothing to delete in \"{}\".", chat.title));
            return Ok(());
        }

        prompter.say(&format!("Message IDs: {:?}", plan.ids()));
        if self.dry_run {
            prompter.say(&format!("Dry run: would delete {} messages.", plan.len()));
            summary.status = ChatStatus::DryRun;
            return Ok(());
        }

        prompter.say(&format!(
            "This will irreversibly delete {} messages older than the cutoff time in \"{}\".",
            plan.len(),
            chat.title
        ));
        let confirmed = prompt::is_yes(&prompter.ask("Please type \"Y\" to proceed: ")?);
        let authorized = plan.authorize(confirmed)?;

        let DeleteReport {
            deleted,
            chunks,
            rate_limited_waits,
            ..
        } = deleter.delete(authorized.chat_id, authorized.batch).await?;
        info!(deleted, chunks, rate_limited_waits, "chat swept");
        prompter.say(&format!("Deleted {deleted} messages in \"{}\".", chat.title));
        summary.status = ChatStatus::Deleted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(ids: &[i32]) -> Collection {
        let mut batch = DeletionBatch::new();
        batch.merge(ids.iter().copied());
        Collection {
            batch,
            ..Default::default()
        }
    }

    #[test]
    fn plan_merges_deep_clean_range() {
        let plan = DeletionPlan::new(
            1,
            collection(&[1001, 5]),
            ChatPlan {
                deep_clean: Some((1000, 1003)),
            },
        );
        assert_eq!(plan.discovered, 2);
        assert_eq!(plan.injected, 2);
        assert_eq!(plan.ids(), &[1001, 5, 1000, 1002]);
    }

    #[test]
    fn deep_clean_on_empty_discovery() {
        let plan = DeletionPlan::new(
            1,
            Collection::default(),
            ChatPlan {
                deep_clean: Some((1000, 1010)),
            },
        );
        assert_eq!(plan.ids(), (1000..1010).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn unconfirmed_plan_is_refused() {
        let plan = DeletionPlan::new(9, collection(&[1, 2]), ChatPlan::default());
        assert!(matches!(plan.clone().authorize(false), Err(SweepError::Aborted(_))));
        let ok = plan.authorize(true).unwrap();
        assert_eq!(ok.chat_id, 9);
        assert_eq!(ok.batch.ids(), &[1, 2]);
    }
}
