use std::collections::HashSet;
use std::sync::LazyLock;

/// Tokens shorter than this are dropped.
const MIN_TOKEN_LEN: usize = 2;

/// Common English function words that carry no retrieval signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
    "own", "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because",
    "until", "while", "this", "that", "these", "those", "it",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Whether `word` (already lowercase) is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Tokenize text into normalized terms.
///
/// Lowercases, splits on every character that is not an ASCII letter or
/// digit, then drops tokens shorter than two characters and stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= MIN_TOKEN_LEN && !is_stopword(w))
        .map(str::to_string)
        .collect()
}

/// Tokenize a fragment's content with its tags appended as extra text.
pub fn tokenize_document(content: &str, tags: &[String]) -> Vec<String> {
    if tags.is_empty() {
        return tokenize(content);
    }
    let mut text = String::with_capacity(content.len() + tags.len() * 8);
    text.push_str(content);
    for tag in tags {
        text.push(' ');
        text.push_str(tag);
    }
    tokenize(&text)
}
