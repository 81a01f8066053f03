//! Precompiled keyword matchers.
//!
//! Keyword and exclusion matching runs once per directory entry over trees
//! with tens of thousands of entries, so the substring searchers are compiled
//! once per search and reused. Case-insensitivity is baked in at compile
//! time by lowercasing the needles; candidates are lowercased once per call.

use std::borrow::Cow;

use memchr::memmem::Finder;

/// A set of substring patterns compiled from caller keywords.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    terms: Vec<KeywordTerm>,
    case_sensitive: bool,
}

#[derive(Debug, Clone)]
struct KeywordTerm {
    /// Keyword as the caller supplied it, for reporting matches.
    original: String,
    finder: Finder<'static>,
}

impl KeywordSet {
    /// Compiles one searcher per keyword.
    pub fn compile(keywords: &[String], case_sensitive: bool) -> Self {
        let terms = keywords
            .iter()
            .map(|keyword| {
                let needle = if case_sensitive {
                    keyword.clone()
                } else {
                    keyword.to_lowercase()
                };
                KeywordTerm {
                    original: keyword.clone(),
                    finder: Finder::new(needle.as_bytes()).into_owned(),
                }
            })
            .collect();
        Self {
            terms,
            case_sensitive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if any keyword occurs in `candidate`. False for an empty set.
    pub fn matches_any(&self, candidate: &str) -> bool {
        let haystack = self.haystack(candidate);
        self.terms
            .iter()
            .any(|term| term.finder.find(haystack.as_bytes()).is_some())
    }

    /// True if every keyword occurs in `candidate`. True for an empty set.
    pub fn matches_all(&self, candidate: &str) -> bool {
        let haystack = self.haystack(candidate);
        self.terms
            .iter()
            .all(|term| term.finder.find(haystack.as_bytes()).is_some())
    }

    /// Returns the first keyword occurring in `text`, in its original casing.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = self.haystack(text);
        self.terms
            .iter()
            .find(|term| term.finder.find(haystack.as_bytes()).is_some())
            .map(|term| term.original.as_str())
    }

    fn haystack<'a>(&self, candidate: &'a str) -> Cow<'a, str> {
        if self.case_sensitive {
            Cow::Borrowed(candidate)
        } else {
            Cow::Owned(candidate.to_lowercase())
        }
    }
}
