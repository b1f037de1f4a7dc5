//! Content-density filter for markdown blocks.
//!
//! Each block gets a score in roughly `[0, 1]`:
//!
//! | metric        | weight | value                                        |
//! |---------------|--------|----------------------------------------------|
//! | text density  | 0.4    | visible chars / markup chars                 |
//! | link density  | 0.2    | 1 - link chars / visible chars               |
//! | tag weight    | 0.2    | per-element table, 0.5 by default            |
//! | class/id hint | 0.1    | 1 for content hints, 0.5 neutral, 0 boilerplate |
//! | text length   | 0.1    | ln(len + 1) / ln(1000), capped at 1          |
//!
//! Blocks whose own or ancestor class/id looks like navigation, footer, ads
//! and similar chrome have their score multiplied by [`BOILERPLATE_FACTOR`].
//! Both densities are measured in characters, so Hangul and Latin blocks of
//! the same shape score the same.

use super::blocks::Block;
use crate::config::{MarkdownConfig, PruneThresholdType};
use regex::Regex;
use std::sync::LazyLock;

/// Score multiplier for blocks inside boilerplate containers.
pub const BOILERPLATE_FACTOR: f64 = 0.4;

static BOILERPLATE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(nav|navbar|navigation|menu|gnb|lnb|footer|header|sidebar|aside|breadcrumbs?|ads?|advert\w*|banner|promo|sponsor\w*|comments?|reply|share|sns|social|related|recommend\w*|popular|ranking|copyright)\b",
    )
    .expect("boilerplate hint regex is valid")
});

static CONTENT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(article|content|post|story|entry|news[-_]?body|view[-_]?cont|main)")
        .expect("content hint regex is valid")
});

fn tag_weight(tag: &str) -> f64 {
    match tag {
        "article" | "main" | "p" => 1.0,
        "section" | "blockquote" | "pre" | "h1" | "h2" | "h3" => 0.9,
        "h4" | "h5" | "h6" => 0.8,
        "ul" | "ol" | "dl" | "table" => 0.6,
        "span" => 0.4,
        _ => 0.5,
    }
}

/// How much an element's tag vouches for content, used by the dynamic threshold.
fn tag_importance(tag: &str) -> f64 {
    match tag {
        "article" => 1.5,
        "main" | "h1" => 1.4,
        "section" | "h2" => 1.3,
        "p" | "h3" => 1.2,
        "span" => 0.6,
        _ => 0.7,
    }
}

fn link_ratio(block: &Block) -> f64 {
    if block.text_len == 0 {
        return 1.0;
    }
    (block.link_text_len as f64 / block.text_len as f64).min(1.0)
}

fn text_ratio(block: &Block) -> f64 {
    (block.text_len as f64 / block.markup_len.max(1) as f64).min(1.0)
}

/// Drops low-information blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct PruningFilter {
    pub threshold: f64,
    pub threshold_type: PruneThresholdType,
    /// Non-heading blocks with fewer words are dropped outright.
    pub min_word_threshold: usize,
    /// Words a non-heading block needs to reach the fit view at all.
    pub word_count_threshold: usize,
}

impl PruningFilter {
    pub fn from_config(config: &MarkdownConfig) -> Self {
        Self {
            threshold: config.prune_threshold,
            threshold_type: config.prune_threshold_type,
            min_word_threshold: config.min_word_threshold,
            word_count_threshold: config.word_count_threshold,
        }
    }

    pub fn score(&self, block: &Block) -> f64 {
        let is_boilerplate = BOILERPLATE_HINT.is_match(&block.hint);
        let hint = if is_boilerplate {
            0.0
        } else if CONTENT_HINT.is_match(&block.hint) {
            1.0
        } else {
            0.5
        };
        let length = ((block.text_len as f64 + 1.0).ln() / 1000f64.ln()).min(1.0);

        let score = 0.4 * text_ratio(block)
            + 0.2 * (1.0 - link_ratio(block))
            + 0.2 * tag_weight(&block.tag)
            + 0.1 * hint
            + 0.1 * length;
        if is_boilerplate {
            score * BOILERPLATE_FACTOR
        } else {
            score
        }
    }

    /// The threshold a block must reach.
    pub fn threshold_for(&self, block: &Block) -> f64 {
        match self.threshold_type {
            PruneThresholdType::Fixed => self.threshold,
            PruneThresholdType::Dynamic => {
                let mut threshold = self.threshold;
                if tag_importance(&block.tag) > 1.0 {
                    threshold *= 0.8;
                }
                if text_ratio(block) > 0.4 {
                    threshold *= 0.9;
                }
                if link_ratio(block) > 0.6 {
                    threshold *= 1.2;
                }
                threshold
            }
        }
    }

    pub fn keep(&self, block: &Block) -> bool {
        let min_words = self.min_word_threshold.max(self.word_count_threshold);
        if !block.is_heading() && block.words < min_words {
            return false;
        }
        self.score(block) >= self.threshold_for(block)
    }

    pub fn filter<'b>(&self, blocks: &'b [Block]) -> Vec<&'b Block> {
        blocks.iter().filter(|b| self.keep(b)).collect()
    }
}
