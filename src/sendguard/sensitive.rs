//! Sensitive-word filtering.
//!
//! Built on an Aho-Corasick trie for O(n) multi-pattern matching, the same
//! approach this workspace already used for keyword-based content
//! filtering. Word list and `flag` come from the shared store rather than
//! being hardcoded, since they're operator-tunable in production.

use crate::store::SharedStore;
use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use tracing::warn;

const WORDLIST_KEY: &str = "sensitive_word";
const FILTER_SET_KEY: &str = "sensitive_filter_set";
const HIT_MQ_KEY: &str = "sensitive_hit_word_mq";

/// One entry of the JSON array stored at `sensitive_word`.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct WordRecord {
    word: String,
}

/// The `flag` stored at `sensitive_filter_set`: whether a hit rejects the
/// send outright or is masked and allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Reject,
    Replace,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct FilterSetConfig {
    flag: i32,
}

impl FilterSetConfig {
    fn action(&self) -> FilterAction {
        match self.flag {
            3 => FilterAction::Replace,
            _ => FilterAction::Reject,
        }
    }
}

/// A record posted to `sensitive_hit_word_mq` on any hit, regardless of the
/// action taken.
#[derive(Debug, Clone, Serialize)]
pub struct HitSensitiveMessage {
    pub content: String,
    pub extra: HitExtra,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitExtra {
    pub sensitive_words: Vec<String>,
}

/// Outcome of filtering one message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Clean,
    Rejected,
    /// Content with hit spans replaced by the mask character, same length
    /// as the input.
    Replaced(String),
}

const MASK_CHAR: char = '*';

/// Load the word list and filter-set config from `store`, then filter
/// `text`. Always posts an MQ hit record when a match is found, regardless
/// of whether the outcome is a reject or a masked replace.
pub async fn filter(store: &dyn SharedStore, text: &str) -> Result<FilterOutcome, crate::store::StoreError> {
    let words = load_words(store).await?;
    if words.is_empty() {
        return Ok(FilterOutcome::Clean);
    }

    let matcher = match AhoCorasick::builder().ascii_case_insensitive(true).build(&words) {
        Ok(m) => m,
        Err(err) => {
            warn!(error = ?err, "failed to build sensitive-word matcher; skipping filter");
            return Ok(FilterOutcome::Clean);
        }
    };

    let matches: Vec<_> = matcher.find_iter(text).collect();
    if matches.is_empty() {
        return Ok(FilterOutcome::Clean);
    }

    let hit_words: Vec<String> = matches
        .iter()
        .map(|m| text[m.start()..m.end()].to_string())
        .collect();

    let record = HitSensitiveMessage {
        content: text.to_string(),
        extra: HitExtra {
            sensitive_words: hit_words,
        },
    };
    store
        .list_push(HIT_MQ_KEY, &serde_json::to_string(&record).unwrap())
        .await?;

    let action = load_filter_action(store).await?;
    match action {
        FilterAction::Reject => Ok(FilterOutcome::Rejected),
        FilterAction::Replace => {
            let mut chars: Vec<char> = text.chars().collect();
            for m in &matches {
                for c in chars.iter_mut().take(m.end()).skip(m.start()) {
                    *c = MASK_CHAR;
                }
            }
            Ok(FilterOutcome::Replaced(chars.into_iter().collect()))
        }
    }
}

async fn load_words(store: &dyn SharedStore) -> Result<Vec<String>, crate::store::StoreError> {
    let Some(raw) = store.get(WORDLIST_KEY).await? else {
        return Ok(Vec::new());
    };
    let records: Vec<WordRecord> = serde_json::from_str(&raw).unwrap_or_default();
    Ok(records.into_iter().map(|r| r.word).collect())
}

async fn load_filter_action(store: &dyn SharedStore) -> Result<FilterAction, crate::store::StoreError> {
    let Some(raw) = store.get(FILTER_SET_KEY).await? else {
        return Ok(FilterAction::Reject);
    };
    let config: FilterSetConfig = serde_json::from_str(&raw).unwrap_or(FilterSetConfig { flag: 1 });
    Ok(config.action())
}
