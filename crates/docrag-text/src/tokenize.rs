use regex::Regex;
use tracing::warn;

/// Lower-cased word runs (`\w+`) of a query, in order, duplicates kept.
pub fn query_terms(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case-insensitive whole-word matchers, one per term.
pub fn term_matchers(terms: &[String]) -> Vec<Regex> {
    terms
        .iter()
        .filter_map(|term| match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(term = %term, error = %e, "skipping unmatchable term");
                None
            }
        })
        .collect()
}

/// Number of whole-word occurrences of all matchers in `text`.
pub fn count_matches(matchers: &[Regex], text: &str) -> usize {
    matchers.iter().map(|re| re.find_iter(text).count()).sum()
}
