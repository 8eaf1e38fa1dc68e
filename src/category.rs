//! Basic category functions
//!
//! A basic category function maps a full treebank label such as `NP-SBJ-1`
//! onto its bare category (`NP`). Patterns use it for `@` descriptions,
//! `~link` comparisons and the unbroken-category relations.

use std::borrow::Cow;

/// Label normalization strategy, shared by every matcher built from a pattern
pub trait BasicCategory: Send + Sync {
    fn basic_category<'a>(&self, label: &'a str) -> Cow<'a, str>;
}

impl<F> BasicCategory for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn basic_category<'a>(&self, label: &'a str) -> Cow<'a, str> {
        Cow::Owned(self(label))
    }
}

/// Penn treebank conventions: functional tags, coindexation and gap indices
/// are appended after one of a few annotation characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PennBasicCategory;

const ANNOTATION_CHARS: &[char] = &['-', '=', '|', '#', '^', '~', '_'];

impl PennBasicCategory {
    /// Byte offset where the annotations of `label` begin. A label that starts
    /// with an annotation character (-NONE-, -LRB-) keeps it up to the matching
    /// closing character.
    fn annotation_start(label: &str) -> usize {
        let mut opened: Option<char> = None;
        for (pos, ch) in label.char_indices() {
            if !ANNOTATION_CHARS.contains(&ch) {
                continue;
            }
            if pos == 0 {
                opened = Some(ch);
            } else if opened == Some(ch) {
                opened = None;
            } else {
                return pos;
            }
        }
        label.len()
    }
}

impl BasicCategory for PennBasicCategory {
    fn basic_category<'a>(&self, label: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(&label[..Self::annotation_start(label)])
    }
}
