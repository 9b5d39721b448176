//! Okapi BM25 over the pages fetched by one launch.
//!
//! The scorer is built fresh per launch: every page is added first, then
//! each page is scored against the whole corpus. Scores depend only on the
//! final corpus, never on the order pages were added in.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use topicrawl_shared::{Page, ScoringConfig};

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k: f64,
    /// Document length normalisation, in `[0, 1]`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k: 1.2, b: 0.75 }
    }
}

impl From<&ScoringConfig> for Bm25Params {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            k: config.k,
            b: config.b,
        }
    }
}

/// One page as seen by the scorer.
#[derive(Debug, Clone)]
struct Document {
    /// Word count of the page body.
    size: u64,
    /// Occurrences of each query term; terms with zero hits are absent.
    term_frequencies: BTreeMap<String, u64>,
}

/// BM25 scorer for a fixed query.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    params: Bm25Params,
    terms: BTreeSet<String>,
    documents: HashMap<String, Document>,
    /// Number of documents containing each term.
    document_frequency: BTreeMap<String, u64>,
    total_size: u64,
}

impl Bm25Scorer {
    /// Build a scorer for `query`. Terms are lowercased and deduplicated.
    pub fn new(query: &str, params: Bm25Params) -> Self {
        let terms = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<BTreeSet<_>>();

        Self {
            params,
            terms,
            documents: HashMap::new(),
            document_frequency: BTreeMap::new(),
            total_size: 0,
        }
    }

    /// Add (or replace) the document under `key` from a page's body text.
    pub fn add_page(&mut self, key: &str, page: &Page) {
        self.add_text(key, &page.content);
    }

    /// Add (or replace) the document under `key`.
    pub fn add_text(&mut self, key: &str, text: &str) {
        self.remove(key);

        let mut size = 0u64;
        let mut term_frequencies = BTreeMap::new();
        for word in text.split_whitespace() {
            size += 1;
            let word = word.to_lowercase();
            if self.terms.contains(&word) {
                *term_frequencies.entry(word).or_insert(0u64) += 1;
            }
        }

        for term in term_frequencies.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_size += size;
        self.documents.insert(
            key.to_string(),
            Document {
                size,
                term_frequencies,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        let Some(old) = self.documents.remove(key) else {
            return;
        };
        self.total_size -= old.size;
        for term in old.term_frequencies.keys() {
            if let Some(df) = self.document_frequency.get_mut(term) {
                *df = df.saturating_sub(1);
            }
        }
    }

    /// BM25 score of the document under `key`, or `None` if it was never added.
    pub fn score(&self, key: &str) -> Option<f64> {
        let doc = self.documents.get(key)?;

        let n = self.documents.len() as f64;
        if self.total_size == 0 {
            return Some(0.0);
        }
        let avg_size = self.total_size as f64 / n;
        let Bm25Params { k, b } = self.params;
        let length_norm = k * (1.0 - b + b * doc.size as f64 / avg_size);

        let score = self
            .terms
            .iter()
            .map(|term| {
                let f = doc.term_frequencies.get(term).copied().unwrap_or(0) as f64;
                if f == 0.0 {
                    return 0.0;
                }
                self.idf(term, n) * f * (k + 1.0) / (f + length_norm)
            })
            .sum();

        Some(score)
    }

    fn idf(&self, term: &str, n: f64) -> f64 {
        let df = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Number of documents in the corpus.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
