//! Eligibility rules applied to a candidate before it reaches the cache.

use std::collections::HashSet;

use crate::config::PopfeedConfig;
use crate::item::{AuthorId, RawItem};

pub trait EligibilityFilter: Send + Sync {
    /// `threshold` is the cache's current admission minimum, if any.
    fn is_eligible(&self, item: &RawItem, threshold: Option<u64>) -> bool;
}

/// Score floor, admission threshold, ignored authors, ignored words.
#[derive(Debug, Clone, Default)]
pub struct BasicFilter {
    min_score: u64,
    ignored_authors: HashSet<AuthorId>,
    /// Lowercased.
    ignored_words: Vec<String>,
}

impl BasicFilter {
    pub fn new(
        min_score: u64,
        ignored_authors: impl IntoIterator<Item = AuthorId>,
        ignored_words: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            min_score,
            ignored_authors: ignored_authors.into_iter().collect(),
            ignored_words: ignored_words
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn from_config(cfg: &PopfeedConfig) -> Self {
        Self::new(
            cfg.min_score,
            cfg.ignored_authors.iter().copied(),
            cfg.ignored_words.iter().cloned(),
        )
    }
}

impl EligibilityFilter for BasicFilter {
    fn is_eligible(&self, item: &RawItem, threshold: Option<u64>) -> bool {
        let score = item.score();
        if score < self.min_score {
            return false;
        }
        if threshold.is_some_and(|min| score < min) {
            return false;
        }
        if self.ignored_authors.contains(&item.author_id) {
            return false;
        }
        if !self.ignored_words.is_empty() {
            let text = item.text.to_lowercase();
            if self.ignored_words.iter().any(|w| text.contains(w.as_str())) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fixtures::raw;

    #[test]
    fn default_admits_everything() {
        let f = BasicFilter::default();
        assert!(f.is_eligible(&raw(1, 1, 0), None));
    }

    #[test]
    fn floor_and_threshold() {
        let f = BasicFilter::new(10, Vec::<AuthorId>::new(), Vec::<String>::new());
        assert!(!f.is_eligible(&raw(1, 1, 9), None));
        assert!(f.is_eligible(&raw(1, 1, 10), None));
        assert!(!f.is_eligible(&raw(1, 1, 11), Some(12)));
        assert!(f.is_eligible(&raw(1, 1, 12), Some(12)));
    }

    #[test]
    fn ignored_authors_and_words() {
        let f = BasicFilter::new(0, [AuthorId(7)], ["  Giveaway ".to_string(), String::new()]);
        assert!(!f.is_eligible(&raw(1, 7, 100), None));

        let mut item = raw(2, 8, 100);
        item.text = "Big GIVEAWAY today".to_string();
        assert!(!f.is_eligible(&item, None));
        item.text = "nothing to see".to_string();
        assert!(f.is_eligible(&item, None));
    }

    #[test]
    fn built_from_config() {
        let cfg = PopfeedConfig {
            min_score: 3,
            ignored_authors: vec![AuthorId(5)],
            ..PopfeedConfig::default()
        };
        let f = BasicFilter::from_config(&cfg);
        assert!(!f.is_eligible(&raw(1, 1, 2), None));
        assert!(!f.is_eligible(&raw(1, 5, 20), None));
        assert!(f.is_eligible(&raw(1, 1, 20), None));
    }
}
