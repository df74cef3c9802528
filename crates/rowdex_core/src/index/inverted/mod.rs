//! Inverted text index.
//!
//! Maps normalized terms to sorted, deduplicated posting lists of row
//! locators. A reverse map from locator to terms makes removing a document
//! proportional to its own term count.
//!
//! Locking: each posting list has its own mutex. The term map lock is held
//! shared while a list is touched and exclusively only to add or remove a
//! term. Document writers are serialized by the reverse map lock, which is
//! held for the whole update and always taken before the term map, so the
//! per-list mutexes only let readers run alongside a writer. Two writers
//! never touch posting lists at the same time.

mod tokenizer;

pub use tokenizer::{TokenizerConfig, DEFAULT_STOPWORDS};

use crate::descriptor::IndexKind;
use crate::error::{IndexError, IndexResult};
use crate::index::traits::Index;
use crate::key::{Key, Value};
use crate::types::RowLocator;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type PostingList = Arc<Mutex<Vec<RowLocator>>>;

/// Serializable image of an inverted index: the reverse map alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedImage {
    /// Each document's distinct terms.
    pub documents: Vec<(RowLocator, Vec<String>)>,
}

/// Inverted index over a single text column.
///
/// # Example
///
/// ```
/// use rowdex_core::{InvertedIndex, RowLocator, TokenizerConfig};
///
/// let index = InvertedIndex::new("descr_fts", TokenizerConfig::default());
/// index.index_document(RowLocator::new(1), "Gaming laptop, 16GB").unwrap();
/// index.index_document(RowLocator::new(2), "Office laptop").unwrap();
///
/// let hits = index.lookup_all(&["gaming", "laptop"]);
/// assert_eq!(hits, vec![RowLocator::new(1)]);
/// ```
pub struct InvertedIndex {
    name: String,
    tokenizer: TokenizerConfig,
    terms: RwLock<HashMap<String, PostingList>>,
    documents: RwLock<HashMap<RowLocator, Vec<String>>>,
    postings: AtomicUsize,
}

impl InvertedIndex {
    /// Creates an empty inverted index.
    pub fn new(name: impl Into<String>, tokenizer: TokenizerConfig) -> Self {
        Self {
            name: name.into(),
            tokenizer,
            terms: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            postings: AtomicUsize::new(0),
        }
    }

    /// Tokenizer settings.
    pub fn tokenizer(&self) -> &TokenizerConfig {
        &self.tokenizer
    }

    /// Indexes `text` under `locator`, replacing any previous terms.
    ///
    /// A document with no indexable tokens is still recorded.
    pub fn index_document(&self, locator: RowLocator, text: &str) -> IndexResult<()> {
        let tokens = self.tokenizer.distinct_tokens(text);
        self.store_terms(locator, tokens, true)
    }

    /// Indexes `text` under a locator that is not indexed yet.
    ///
    /// Fails with `DuplicateKey` if `locator` already has a document.
    pub fn add_document(&self, locator: RowLocator, text: &str) -> IndexResult<()> {
        let tokens = self.tokenizer.distinct_tokens(text);
        self.store_terms(locator, tokens, false)
    }

    fn store_terms(
        &self,
        locator: RowLocator,
        tokens: Vec<String>,
        replace: bool,
    ) -> IndexResult<()> {
        let mut documents = self.documents.write();
        if !replace && documents.contains_key(&locator) {
            return Err(IndexError::duplicate_key(
                &self.name,
                format!("{locator} is already indexed"),
            ));
        }
        documents.try_reserve(1).map_err(|e| {
            IndexError::resource_exhausted(format!("inverted index '{}': {e}", self.name))
        })?;

        if let Some(old) = documents.get(&locator) {
            for term in old.iter().filter(|term| tokens.binary_search(*term).is_err()) {
                self.remove_posting(term, locator);
            }
        }
        let old = documents.get(&locator);
        for term in &tokens {
            let already = old.is_some_and(|old| old.binary_search(term).is_ok());
            if !already {
                self.add_posting(term, locator);
            }
        }
        documents.insert(locator, tokens);
        Ok(())
    }

    /// Removes a document and all of its postings.
    pub fn remove_document(&self, locator: RowLocator) -> IndexResult<()> {
        let mut documents = self.documents.write();
        let terms = documents.remove(&locator).ok_or_else(|| {
            IndexError::not_found(format!("document {locator} in index '{}'", self.name))
        })?;
        for term in &terms {
            self.remove_posting(term, locator);
        }
        Ok(())
    }

    fn add_posting(&self, term: &str, locator: RowLocator) {
        {
            let terms = self.terms.read();
            if let Some(list) = terms.get(term) {
                if insert_sorted(&mut list.lock(), locator) {
                    self.postings.fetch_add(1, Ordering::AcqRel);
                }
                return;
            }
        }
        let mut terms = self.terms.write();
        let list = terms.entry(term.to_string()).or_default();
        if insert_sorted(&mut list.lock(), locator) {
            self.postings.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn remove_posting(&self, term: &str, locator: RowLocator) {
        let now_empty = {
            let terms = self.terms.read();
            let Some(list) = terms.get(term) else {
                return;
            };
            let mut list = list.lock();
            if let Ok(pos) = list.binary_search(&locator) {
                list.remove(pos);
                self.postings.fetch_sub(1, Ordering::AcqRel);
            }
            list.is_empty()
        };
        if now_empty {
            let mut terms = self.terms.write();
            // Another writer may have re-added the term in between.
            if terms.get(term).is_some_and(|list| list.lock().is_empty()) {
                terms.remove(term);
            }
        }
    }

    fn posting(&self, term: &str) -> Option<Vec<RowLocator>> {
        let terms = self.terms.read();
        terms.get(term).map(|list| list.lock().clone())
    }

    /// Documents containing `term`.
    pub fn lookup_term(&self, term: &str) -> Vec<RowLocator> {
        self.tokenizer
            .normalize(term)
            .and_then(|term| self.posting(&term))
            .unwrap_or_default()
    }

    /// Documents containing every term.
    ///
    /// Terms the tokenizer would never index (stopwords, out-of-bounds
    /// lengths) are ignored. Posting lists are intersected shortest first.
    pub fn lookup_all<S: AsRef<str>>(&self, terms: &[S]) -> Vec<RowLocator> {
        let mut lists = Vec::new();
        for term in terms {
            let Some(term) = self.tokenizer.normalize(term.as_ref()) else {
                continue;
            };
            match self.posting(&term) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(Vec::len);
        let mut lists = lists.into_iter();
        let Some(mut acc) = lists.next() else {
            return Vec::new();
        };
        for list in lists {
            if acc.is_empty() {
                break;
            }
            acc = intersect(&acc, &list);
        }
        acc
    }

    /// Documents containing any of the terms.
    pub fn lookup_any<S: AsRef<str>>(&self, terms: &[S]) -> Vec<RowLocator> {
        let mut acc = Vec::new();
        for term in terms {
            if let Some(list) = self
                .tokenizer
                .normalize(term.as_ref())
                .and_then(|term| self.posting(&term))
            {
                acc = union(&acc, &list);
            }
        }
        acc
    }

    /// Documents containing a term that starts with `prefix`.
    pub fn lookup_prefix(&self, prefix: &str) -> Vec<RowLocator> {
        let prefix = if self.tokenizer.case_insensitive {
            prefix.to_lowercase()
        } else {
            prefix.to_string()
        };
        let terms = self.terms.read();
        let mut acc = Vec::new();
        for (term, list) in terms.iter() {
            if term.starts_with(&prefix) {
                acc = union(&acc, &list.lock());
            }
        }
        acc
    }

    /// Number of documents containing `term`.
    pub fn term_frequency(&self, term: &str) -> usize {
        self.lookup_term(term).len()
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.terms.read().len()
    }

    /// Number of `(term, document)` postings.
    pub fn posting_count(&self) -> usize {
        self.postings.load(Ordering::Acquire)
    }

    /// Locators of every indexed document, sorted.
    pub fn document_locators(&self) -> Vec<RowLocator> {
        let mut locators: Vec<_> = self.documents.read().keys().copied().collect();
        locators.sort_unstable();
        locators
    }

    /// Captures the reverse map for persistence.
    pub fn image(&self) -> InvertedImage {
        let mut documents: Vec<_> = self
            .documents
            .read()
            .iter()
            .map(|(loc, terms)| (*loc, terms.clone()))
            .collect();
        documents.sort_unstable_by_key(|(loc, _)| *loc);
        InvertedImage { documents }
    }

    /// Replaces the contents with a persisted image.
    pub fn restore(&self, image: InvertedImage) -> IndexResult<()> {
        self.clear();
        for (locator, mut terms) in image.documents {
            terms.sort_unstable();
            terms.dedup();
            self.store_terms(locator, terms, true)?;
        }
        Ok(())
    }

    fn text_of<'a>(&self, key: &'a Key) -> IndexResult<&'a str> {
        match key.values() {
            [Value::Text(text)] => Ok(text.as_str()),
            [Value::Null] => Ok(""),
            _ => Err(IndexError::invalid_key(format!(
                "inverted index '{}' takes a single text value, got {key}",
                self.name
            ))),
        }
    }
}

impl Index for InvertedIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Inverted
    }

    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        let text = self.text_of(key)?;
        self.add_document(locator, text)
    }

    fn delete(&self, _key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.remove_document(locator)
    }

    /// Documents containing every token of the key's text.
    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>> {
        let text = self.text_of(key)?;
        Ok(self.lookup_all(&self.tokenizer.tokenize(text)))
    }

    fn len(&self) -> usize {
        self.document_count()
    }

    fn clear(&self) {
        let mut documents = self.documents.write();
        let mut terms = self.terms.write();
        documents.clear();
        terms.clear();
        self.postings.store(0, Ordering::Release);
    }

    fn check_integrity(&self) -> IndexResult<()> {
        let documents = self.documents.read();
        let terms = self.terms.write();
        let corrupt = |message: String| IndexError::corrupt(&self.name, message);

        let mut total = 0;
        for (term, list) in terms.iter() {
            let list = list.lock();
            if list.is_empty() {
                return Err(corrupt(format!("term '{term}' has an empty posting list")));
            }
            if list.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(corrupt(format!("posting list of '{term}' is not sorted and unique")));
            }
            for locator in list.iter() {
                let covered = documents
                    .get(locator)
                    .is_some_and(|doc| doc.binary_search(term).is_ok());
                if !covered {
                    return Err(corrupt(format!(
                        "posting {term} -> {locator} missing from the reverse map"
                    )));
                }
            }
            total += list.len();
        }

        let reverse_total: usize = documents.values().map(Vec::len).sum();
        if reverse_total != total {
            return Err(corrupt(format!(
                "reverse map holds {reverse_total} postings, term map holds {total}"
            )));
        }
        let recorded = self.postings.load(Ordering::Acquire);
        if recorded != total {
            return Err(corrupt(format!(
                "term map holds {total} postings, counter says {recorded}"
            )));
        }
        Ok(())
    }
}

/// Inserts into a sorted list; returns false if already present.
fn insert_sorted(list: &mut Vec<RowLocator>, locator: RowLocator) -> bool {
    match list.binary_search(&locator) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, locator);
            true
        }
    }
}

fn intersect(a: &[RowLocator], b: &[RowLocator]) -> Vec<RowLocator> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn union(a: &[RowLocator], b: &[RowLocator]) -> Vec<RowLocator> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(n: u64) -> RowLocator {
        RowLocator::new(n)
    }

    fn catalog() -> InvertedIndex {
        let index = InvertedIndex::new("descr", TokenizerConfig::default());
        index.index_document(loc(1), "gaming laptop").unwrap();
        index.index_document(loc(2), "office laptop").unwrap();
        index.index_document(loc(3), "gaming mouse").unwrap();
        index
    }

    #[test]
    fn conjunctive_lookup() {
        let index = catalog();
        assert_eq!(index.lookup_all(&["gaming", "laptop"]), vec![loc(1)]);
        assert_eq!(index.lookup_all(&["LAPTOP"]), vec![loc(1), loc(2)]);
        assert!(index.lookup_all(&["gaming", "tablet"]).is_empty());
        assert!(index.lookup_all::<&str>(&[]).is_empty());
    }

    #[test]
    fn disjunctive_lookup() {
        let index = catalog();
        assert_eq!(index.lookup_any(&["mouse", "office"]), vec![loc(2), loc(3)]);
        assert!(index.lookup_any(&["tablet"]).is_empty());
    }

    #[test]
    fn stopwords_in_queries_are_ignored() {
        let index = catalog();
        assert_eq!(index.lookup_all(&["the", "gaming", "laptop"]), vec![loc(1)]);
        assert!(index.lookup_term("the").is_empty());
    }

    #[test]
    fn reindex_replaces_terms() {
        let index = catalog();
        index.index_document(loc(1), "gaming tablet").unwrap();
        assert_eq!(index.lookup_term("laptop"), vec![loc(2)]);
        assert_eq!(index.lookup_term("tablet"), vec![loc(1)]);
        assert_eq!(index.lookup_term("gaming"), vec![loc(1), loc(3)]);
        index.check_integrity().unwrap();
    }

    #[test]
    fn remove_document_drops_empty_terms() {
        let index = catalog();
        index.remove_document(loc(2)).unwrap();
        assert_eq!(index.term_frequency("office"), 0);
        assert_eq!(index.term_count(), 3);
        assert_eq!(index.document_count(), 2);

        let err = index.remove_document(loc(2)).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
        index.check_integrity().unwrap();
    }

    #[test]
    fn empty_documents_are_recorded() {
        let index = InvertedIndex::new("d", TokenizerConfig::default());
        index.index_document(loc(7), "the of and").unwrap();
        assert_eq!(index.document_locators(), vec![loc(7)]);
        assert_eq!(index.posting_count(), 0);
        index.remove_document(loc(7)).unwrap();
    }

    #[test]
    fn prefix_lookup() {
        let index = catalog();
        index.index_document(loc(4), "game night").unwrap();
        assert_eq!(index.lookup_prefix("Gam"), vec![loc(1), loc(3), loc(4)]);
    }

    #[test]
    fn image_restores_postings() {
        let index = catalog();
        let copy = InvertedIndex::new("descr", TokenizerConfig::default());
        copy.restore(index.image()).unwrap();
        assert_eq!(copy.lookup_all(&["gaming", "laptop"]), vec![loc(1)]);
        assert_eq!(copy.posting_count(), index.posting_count());
        copy.check_integrity().unwrap();
    }

    #[test]
    fn index_trait_takes_text_keys() {
        let index = InvertedIndex::new("d", TokenizerConfig::default());
        index.insert(&Key::single("red shoes"), loc(1)).unwrap();
        assert_eq!(index.lookup_equal(&Key::single("Shoes")).unwrap(), vec![loc(1)]);
        let err = index.insert(&Key::single(5i64), loc(2)).unwrap_err();
        assert!(matches!(err, IndexError::InvalidKey { .. }));
    }

    #[test]
    fn insert_rejects_indexed_locator() {
        let index = InvertedIndex::new("d", TokenizerConfig::default());
        index.insert(&Key::single("gaming laptop"), loc(1)).unwrap();

        let err = index.insert(&Key::single("office chair"), loc(1)).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        assert_eq!(index.lookup_term("gaming"), vec![loc(1)]);
        assert!(index.lookup_term("office").is_empty());

        let err = index.add_document(loc(1), "gaming laptop").unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        index.check_integrity().unwrap();
    }

    #[test]
    fn merge_helpers() {
        let a = [loc(1), loc(3), loc(5)];
        let b = [loc(3), loc(4), loc(5), loc(6)];
        assert_eq!(intersect(&a, &b), vec![loc(3), loc(5)]);
        assert_eq!(union(&a, &b), vec![loc(1), loc(3), loc(4), loc(5), loc(6)]);
    }
}
