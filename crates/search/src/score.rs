//! Deterministic lexical scoring, matching the original `scoreResult`.

pub fn score(rank: usize, query_index: usize, raw_url: &str, title: &str, snippet: &str) -> f64 {
    let mut score = 100.0 - (rank as f64) * 2.0;
    score -= (query_index.saturating_sub(1)) as f64 * 5.0;
    if raw_url.starts_with("https://") {
        score += 3.0;
    }
    if title.len() > 8 {
        score += 2.0;
    }
    if snippet.len() > 80 {
        score += 2.0;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_rank_one_first_query() {
        let got = score(1, 1, "http://example.com", "short", "short");
        assert_eq!(got, 98.0);
    }

    #[test]
    fn https_and_long_title_and_snippet_bonus() {
        let long_title = "a".repeat(9);
        let long_snippet = "b".repeat(81);
        let got = score(1, 1, "https://example.com", &long_title, &long_snippet);
        assert_eq!(got, 98.0 + 3.0 + 2.0 + 2.0);
    }

    #[test]
    fn later_query_index_penalised() {
        let got = score(1, 3, "http://example.com", "x", "y");
        assert_eq!(got, 98.0 - 10.0);
    }
}
