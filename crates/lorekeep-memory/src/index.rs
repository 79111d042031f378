use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::tokenize::{tokenize, tokenize_document};

/// A TF-IDF inverted index over the fragments of one scope.
///
/// The struct is its own persisted record: serializing it yields the four
/// maps verbatim, so a reloaded index scores identically. Ordered maps keep
/// the committed `index.json` stable across rewrites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdfIndex {
    /// term -> (fragment id -> count / document length)
    #[serde(default)]
    term_frequencies: BTreeMap<String, BTreeMap<String, f64>>,
    /// fragment id -> token count
    #[serde(default)]
    doc_lengths: BTreeMap<String, usize>,
    /// Number of indexed fragments.
    #[serde(default)]
    num_docs: usize,
    /// term -> number of fragments containing it
    #[serde(default)]
    doc_frequencies: BTreeMap<String, usize>,
}

impl TfIdfIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment to the index.
    ///
    /// Content and tags are tokenized together. Re-adding an indexed id
    /// replaces its previous entry. A fragment with no tokens is left out
    /// entirely; it stays reachable by id but never by search.
    pub fn add_document(&mut self, id: &str, content: &str, tags: &[String]) {
        self.remove_document(id);
        let tokens = tokenize_document(content, tags);
        if tokens.is_empty() {
            return;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let doc_len = tokens.len();
        for (term, count) in counts {
            self.term_frequencies
                .entry(term.to_string())
                .or_default()
                .insert(id.to_string(), count as f64 / doc_len as f64);
            *self.doc_frequencies.entry(term.to_string()).or_insert(0) += 1;
        }

        self.doc_lengths.insert(id.to_string(), doc_len);
        self.num_docs += 1;
    }

    /// Remove a fragment, reversing every contribution it made.
    ///
    /// Terms whose document frequency drops to zero are removed from both
    /// term maps. Unknown ids are ignored.
    pub fn remove_document(&mut self, id: &str) {
        if self.doc_lengths.remove(id).is_none() {
            return;
        }
        self.num_docs = self.num_docs.saturating_sub(1);

        let mut empty_terms = Vec::new();
        for (term, postings) in &mut self.term_frequencies {
            if postings.remove(id).is_none() {
                continue;
            }
            match self.doc_frequencies.get_mut(term) {
                Some(df) if *df > 1 => *df -= 1,
                _ => empty_terms.push(term.clone()),
            }
        }

        for term in empty_terms {
            self.term_frequencies.remove(&term);
            self.doc_frequencies.remove(&term);
        }
    }

    /// Search for fragments matching `query`, returning up to `top_k`
    /// `(id, score)` pairs sorted by descending score.
    ///
    /// ```text
    /// score(doc) = sum over query tokens t present in the index of
    ///              tf(t, doc) * ln(num_docs / df(t))
    /// ```
    ///
    /// Repeated query tokens count once per occurrence. Every fragment that
    /// contains a query term is returned, even when its score is zero.
    /// Equal scores are ordered by ascending fragment id.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        if self.num_docs == 0 || top_k == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let n = self.num_docs as f64;
        let mut scores: HashMap<&str, f64> = HashMap::new();

        for token in &query_tokens {
            let Some(postings) = self.term_frequencies.get(token) else {
                continue;
            };
            let df = self.doc_frequencies.get(token).copied().unwrap_or(0);
            let idf = if df > 0 { (n / df as f64).ln() } else { 0.0 };

            for (doc_id, &tf) in postings {
                *scores.entry(doc_id.as_str()).or_insert(0.0) += tf * idf;
            }
        }

        let mut results: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(top_k);
        results
    }

    /// Whether `id` is currently indexed.
    pub fn contains(&self, id: &str) -> bool {
        self.doc_lengths.contains_key(id)
    }

    /// Number of fragments in the index.
    pub fn document_count(&self) -> usize {
        self.num_docs
    }

    /// Number of distinct indexed terms.
    pub fn term_count(&self) -> usize {
        self.term_frequencies.len()
    }

    /// How many fragments contain `term`.
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.doc_frequencies.get(term).copied().unwrap_or(0)
    }

    /// Token count recorded for `id`.
    pub fn doc_length(&self, id: &str) -> Option<usize> {
        self.doc_lengths.get(id).copied()
    }

    /// Checks the internal bookkeeping: every term's document frequency
    /// matches its posting list and the document count matches the length table.
    pub fn is_consistent(&self) -> bool {
        self.num_docs == self.doc_lengths.len()
            && self.term_frequencies.len() == self.doc_frequencies.len()
            && self.term_frequencies.iter().all(|(term, postings)| {
                !postings.is_empty()
                    && self.doc_frequencies.get(term) == Some(&postings.len())
                    && postings.keys().all(|id| self.doc_lengths.contains_key(id))
            })
    }
}
