//! The Search Adapter (C3): a provider-agnostic façade over a generic
//! meta-search back-end and a commercial search-API back-end, normalising
//! both into [`SearchResult`]. Grounded on `searchSearx`/`searchSerper` in
//! the original pipeline.

mod canonical;
mod score;

pub use canonical::{canonicalize, domain_from_url};
pub use score::score;

use serde::Deserialize;
use wsa_domain::config::{SearchConfig, SearchProvider};
use wsa_domain::error::{Error, Result};
use wsa_domain::model::SearchResult;

pub struct SearchAdapter {
    client: reqwest::Client,
    config: SearchConfig,
}

impl SearchAdapter {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Search {
                provider: "http-client".into(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub async fn search(
        &self,
        query: &str,
        query_index: usize,
        total_queries: usize,
    ) -> Result<Vec<SearchResult>> {
        match self.config.provider {
            SearchProvider::Searx => self.search_searx(query, query_index, total_queries).await,
            SearchProvider::Serper => self.search_serper(query, query_index, total_queries).await,
        }
    }

    async fn search_searx(
        &self,
        query: &str,
        query_index: usize,
        _total_queries: usize,
    ) -> Result<Vec<SearchResult>> {
        #[derive(Deserialize)]
        struct SearxItem {
            #[serde(default)]
            title: String,
            #[serde(default)]
            url: String,
            #[serde(default)]
            content: String,
            #[serde(default)]
            engine: String,
        }
        #[derive(Deserialize)]
        struct SearxResponse {
            #[serde(default)]
            results: Vec<SearxItem>,
        }

        let endpoint = format!("{}/search", self.config.searx_base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&endpoint)
            .query(&[("format", "json"), ("q", query)])
            .header("User-Agent", "research-agent/0.1")
            .send()
            .await
            .map_err(|e| Error::Search {
                provider: "searx".into(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Error::Search {
                provider: "searx".into(),
                message: format!("status {}", resp.status()),
            });
        }

        let payload: SearxResponse = resp.json().await.map_err(|e| Error::Search {
            provider: "searx".into(),
            message: format!("decode: {e}"),
        })?;

        let mut results = Vec::with_capacity(payload.results.len());
        for (idx, item) in payload.results.into_iter().enumerate() {
            if item.url.is_empty() {
                continue;
            }
            let rank = idx + 1;
            let Some(canonical_url) = canonicalize(&item.url) else {
                continue;
            };
            let score = score(rank, query_index, &item.url, &item.title, &item.content);
            results.push(SearchResult {
                title: item.title,
                url: item.url.clone(),
                canonical_url,
                snippet: item.content,
                engine: item.engine,
                rank,
                query_index,
                score,
                raw: serde_json::json!({ "url": item.url }),
            });
        }
        Ok(results)
    }

    async fn search_serper(
        &self,
        query: &str,
        query_index: usize,
        _total_queries: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(api_key) = self.config.serper_api_key.as_deref() else {
            return Err(Error::Search {
                provider: "serper".into(),
                message: "SERPER_API_KEY is required for the serper provider".into(),
            });
        };

        #[derive(Deserialize)]
        struct OrganicItem {
            #[serde(default)]
            title: String,
            #[serde(default)]
            link: String,
            #[serde(default)]
            snippet: String,
            #[serde(default)]
            position: i64,
        }
        #[derive(Deserialize)]
        struct SerperResponse {
            #[serde(default)]
            organic: Vec<OrganicItem>,
        }

        let body = serde_json::json!({ "q": query, "num": 10, "hl": "en", "gl": "us" });
        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("x-api-key", api_key)
            .header("Content-Type", "application/json")
            .header("User-Agent", "research-agent/0.1")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Search {
                provider: "serper".into(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Error::Search {
                provider: "serper".into(),
                message: format!("status {}", resp.status()),
            });
        }

        let payload: SerperResponse = resp.json().await.map_err(|e| Error::Search {
            provider: "serper".into(),
            message: format!("decode: {e}"),
        })?;

        let mut results = Vec::with_capacity(payload.organic.len());
        for (idx, item) in payload.organic.into_iter().enumerate() {
            let link = item.link.trim();
            if link.is_empty() {
                continue;
            }
            let rank = if item.position > 0 {
                item.position as usize
            } else {
                idx + 1
            };
            let Some(canonical_url) = canonicalize(link) else {
                continue;
            };
            let score = score(rank, query_index, link, &item.title, &item.snippet);
            results.push(SearchResult {
                title: item.title,
                url: link.to_string(),
                canonical_url,
                snippet: item.snippet,
                engine: "serper".into(),
                rank,
                query_index,
                score,
                raw: serde_json::json!({ "link": link }),
            });
        }
        Ok(results)
    }
}

/// Builds up to three query variants for the degenerate non-agent path,
/// matching the original's `buildSearchQueries` (Cyrillic-aware suffixing).
pub fn build_search_queries(query: &str, max_queries: usize) -> Vec<String> {
    let mut out = vec![query.to_string()];
    if max_queries <= 1 {
        return out;
    }
    let cyrillic = looks_cyrillic(query);
    out.push(format!("{query} {}", if cyrillic { "обзор" } else { "overview" }));
    if max_queries <= 2 {
        return out;
    }
    out.push(format!("{query} {}", if cyrillic { "руководство" } else { "guide" }));
    out
}

fn looks_cyrillic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0410}'..='\u{044f}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_search_queries_caps_at_requested_count() {
        assert_eq!(build_search_queries("rust", 1), vec!["rust"]);
        assert_eq!(
            build_search_queries("rust", 2),
            vec!["rust", "rust overview"]
        );
        assert_eq!(
            build_search_queries("rust", 5),
            vec!["rust", "rust overview", "rust guide"]
        );
    }

    #[test]
    fn build_search_queries_detects_cyrillic() {
        let out = build_search_queries("раст", 3);
        assert_eq!(out[1], "раст обзор");
        assert_eq!(out[2], "раст руководство");
    }
}
