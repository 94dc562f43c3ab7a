use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::ImageAsset;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMAGE_([1-9][0-9]*)\]").expect("token regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlaceholderToken(pub u32);

impl PlaceholderToken {
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlaceholderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[IMAGE_{}]", self.0)
    }
}

/// A token found in text, with its byte span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenMatch {
    pub token: PlaceholderToken,
    pub start: usize,
    pub end: usize,
}

/// Every well-formed token in `text`, left to right.
pub fn find_tokens(text: &str) -> Vec<TokenMatch> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
            Some(TokenMatch {
                token: PlaceholderToken(number),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// One extracted graphic and where it stood.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceholderAssociation {
    pub token: PlaceholderToken,
    pub asset: ImageAsset,
    /// Index among the source document's body paragraphs.
    pub paragraph_index: usize,
    pub rel_id: String,
}

/// What reinsertion managed to do, for logs and batch results.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReinsertReport {
    pub inserted: usize,
    /// Token occurrences left as literal text: duplicates of an already
    /// consumed token, or tokens nothing was extracted for.
    pub unmatched_tokens: Vec<PlaceholderToken>,
    /// Associations whose token never showed up in the corrected document.
    pub unconsumed: Vec<PlaceholderToken>,
}

impl ReinsertReport {
    pub fn is_clean(&self) -> bool {
        self.unmatched_tokens.is_empty() && self.unconsumed.is_empty()
    }
}
