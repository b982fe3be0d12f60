use crate::model::{CutoffPolicy, Message};

const MEME_TAG: &str = "#MEMES";

/// How one page split up under a [`CutoffPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub eligible: Vec<i32>,
    pub skipped_by_date: usize,
    pub skipped_by_meme: usize,
}

/// Partition `messages` into ids to delete and skip counts. Source order is kept.
pub fn partition(messages: &[Message], policy: &CutoffPolicy) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for msg in messages {
        if msg.timestamp >= policy.cutoff {
            outcome.skipped_by_date += 1;
        } else if policy.skip_memes && is_meme(msg.caption.as_deref()) {
            outcome.skipped_by_meme += 1;
        } else {
            outcome.eligible.push(msg.id);
        }
    }
    outcome
}

fn is_meme(caption: Option<&str>) -> bool {
    caption
        .map(|c| c.chars().take(MEME_TAG.len()).collect::<String>().to_uppercase() == MEME_TAG)
        .unwrap_or(false)
}
