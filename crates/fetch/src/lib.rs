//! The Page Acquirer (C4): fetch, classify, extract, cache. Grounded on
//! `readSources`/`extractPDFText`/`convertToMarkdown` in the original
//! pipeline and on the teacher's `web_fetch.rs` SSRF hardening.

mod extract;
mod pdf;
mod ssrf;

pub use extract::{extract_text, sanitize_utf8};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use uuid::Uuid;

use wsa_domain::config::FetchConfig;
use wsa_domain::emitter::StepEmitter;
use wsa_domain::model::{step_type, PageCacheEntry, Source};
use wsa_store::Store;

pub struct PageAcquirer {
    client: reqwest::Client,
    config: FetchConfig,
    store: Arc<dyn Store>,
}

impl PageAcquirer {
    pub fn new(config: FetchConfig, store: Arc<dyn Store>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("reqwest client build");
        Self {
            client,
            config,
            store,
        }
    }

    /// Fetches every source in place, populating `markdown_content` and
    /// backfilling titles. A single bad URL never fails the batch.
    pub async fn acquire(
        &self,
        run_id: Uuid,
        sources: &mut [Source],
        ttl_secs: i64,
        emitter: &dyn StepEmitter,
    ) {
        for source in sources.iter_mut() {
            self.acquire_one(run_id, source, ttl_secs, emitter).await;
        }
    }

    async fn acquire_one(
        &self,
        run_id: Uuid,
        source: &mut Source,
        ttl_secs: i64,
        emitter: &dyn StepEmitter,
    ) {
        emitter
            .emit(
                run_id,
                step_type::PAGE_FETCH_STARTED,
                "Requesting page",
                serde_json::json!({ "url": source.url }),
            )
            .await;

        if let Ok(Some(cached)) = self.store.load_cached_page(&source.url).await {
            let age = Utc::now().signed_duration_since(cached.fetched_at);
            if !cached.content.is_empty() && age.num_seconds() < ttl_secs {
                let title = sanitize_utf8(cached.title.as_deref().unwrap_or_default());
                let content = sanitize_utf8(&cached.content);
                if !title.is_empty() && source.title.is_none() {
                    source.title = Some(title.clone());
                    let _ = self.store.update_source_title(source.id, &title).await;
                }
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_OK,
                        "Page cache",
                        serde_json::json!({
                            "url": source.url,
                            "cached": true,
                            "age_seconds": age.num_seconds(),
                        }),
                    )
                    .await;
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_READABILITY_READY,
                        "Page read",
                        serde_json::json!({ "url": source.url, "title": title, "length": content.len() }),
                    )
                    .await;
                source.markdown_content = Some(self.to_markdown(&content, &source.url));
                return;
            }
        }

        if let Err(e) = ssrf::validate_url(&source.url) {
            emitter
                .emit(
                    run_id,
                    step_type::PAGE_FETCH_ERROR,
                    "Request error",
                    serde_json::json!({ "url": source.url, "error": e }),
                )
                .await;
            return;
        }

        let resp = match self
            .client
            .get(&source.url)
            .header("User-Agent", &self.config.user_agent)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_ERROR,
                        "Request error",
                        serde_json::json!({ "url": source.url, "error": e.to_string() }),
                    )
                    .await;
                return;
            }
        };

        if !resp.status().is_success() {
            emitter
                .emit(
                    run_id,
                    step_type::PAGE_FETCH_ERROR,
                    "Request error",
                    serde_json::json!({ "url": source.url, "error": format!("status {}", resp.status()) }),
                )
                .await;
            return;
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if extract::is_pdf_content_type(&content_type, &source.url) {
            self.acquire_pdf(run_id, source, resp, emitter).await;
            return;
        }

        if !extract::is_text_content_type(&content_type) {
            emitter
                .emit(
                    run_id,
                    step_type::PAGE_FETCH_SKIPPED,
                    "Skipped unsupported type",
                    serde_json::json!({ "url": source.url, "content_type": content_type }),
                )
                .await;
            return;
        }

        let body = match read_capped(resp, self.config.max_html_bytes).await {
            Ok(b) => b,
            Err(e) => {
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_ERROR,
                        "Request error",
                        serde_json::json!({ "url": source.url, "error": e }),
                    )
                    .await;
                return;
            }
        };
        let html = String::from_utf8_lossy(&body).to_string();

        emitter
            .emit(
                run_id,
                step_type::PAGE_FETCH_OK,
                "Page received",
                serde_json::json!({ "url": source.url, "bytes": body.len(), "cached": false }),
            )
            .await;

        let (title, text) = extract_text(&html);
        let title = sanitize_utf8(&title);
        let text = sanitize_utf8(&text);
        if !title.is_empty() && source.title.is_none() {
            source.title = Some(title.clone());
            let _ = self.store.update_source_title(source.id, &title).await;
        }

        emitter
            .emit(
                run_id,
                step_type::PAGE_READABILITY_READY,
                "Page read",
                serde_json::json!({ "url": source.url, "title": title, "length": text.len() }),
            )
            .await;

        let _ = self
            .store
            .upsert_page_cache(&PageCacheEntry {
                url: source.url.clone(),
                title: Some(title),
                content: text,
                snippets: vec![],
                fetched_at: Utc::now(),
            })
            .await;

        source.markdown_content = Some(self.to_markdown(&html, &source.url));
    }

    async fn acquire_pdf(
        &self,
        run_id: Uuid,
        source: &mut Source,
        resp: reqwest::Response,
        emitter: &dyn StepEmitter,
    ) {
        emitter
            .emit(
                run_id,
                step_type::PAGE_FETCH_PDF,
                "PDF received",
                serde_json::json!({ "url": source.url, "cached": false }),
            )
            .await;

        if let Some(len) = resp.content_length() {
            if len as usize > self.config.max_pdf_bytes {
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_ERROR,
                        "PDF error",
                        serde_json::json!({
                            "url": source.url,
                            "error": format!("pdf too large: {len} bytes (declared)"),
                        }),
                    )
                    .await;
                return;
            }
        }

        let body = match read_capped(resp, self.config.max_pdf_bytes).await {
            Ok(b) => b,
            Err(e) => {
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_ERROR,
                        "PDF error",
                        serde_json::json!({ "url": source.url, "error": e }),
                    )
                    .await;
                return;
            }
        };

        let text = match pdf::extract_pdf_text(&body, self.config.max_pdf_bytes) {
            Ok(t) => sanitize_utf8(&t),
            Err(e) => {
                emitter
                    .emit(
                        run_id,
                        step_type::PAGE_FETCH_ERROR,
                        "PDF error",
                        serde_json::json!({ "url": source.url, "error": e }),
                    )
                    .await;
                return;
            }
        };

        emitter
            .emit(
                run_id,
                step_type::PAGE_FETCH_OK,
                "PDF extracted",
                serde_json::json!({ "url": source.url, "bytes": text.len(), "cached": false }),
            )
            .await;
        emitter
            .emit(
                run_id,
                step_type::PAGE_READABILITY_READY,
                "PDF read",
                serde_json::json!({ "url": source.url, "title": source.title, "length": text.len() }),
            )
            .await;

        let _ = self
            .store
            .upsert_page_cache(&PageCacheEntry {
                url: source.url.clone(),
                title: source.title.clone(),
                content: text.clone(),
                snippets: vec![],
                fetched_at: Utc::now(),
            })
            .await;

        source.markdown_content = Some(text);
    }

    fn to_markdown(&self, html: &str, source_url: &str) -> String {
        let html = extract::absolutize_links(html, source_url);
        match htmd::convert(&html) {
            Ok(md) => sanitize_utf8(&md),
            Err(_) => {
                tracing::warn!(url = source_url, "html-to-markdown conversion failed, using plain text");
                let (_, text) = extract_text(&html);
                sanitize_utf8(&text)
            }
        }
    }
}

async fn read_capped(resp: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, String> {
    if let Some(len) = resp.content_length() {
        if len as usize > max_bytes {
            return Err(format!("body too large: {len} bytes (declared)"));
        }
    }
    let mut stream = resp.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        buf.extend_from_slice(&chunk);
        if buf.len() > max_bytes {
            return Err(format!("body too large: {} bytes (observed)", buf.len()));
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsa_store::InMemoryStore;

    fn acquirer() -> PageAcquirer {
        PageAcquirer::new(FetchConfig::default(), Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn cache_hit_skips_outbound_request() {
        let acq = acquirer();
        let url = "https://example.invalid/cached-page";
        acq.store
            .upsert_page_cache(&PageCacheEntry {
                url: url.to_string(),
                title: Some("Cached title".into()),
                content: "cached body text".into(),
                snippets: vec![],
                fetched_at: Utc::now(),
            })
            .await
            .unwrap();

        let run_id = Uuid::new_v4();
        let mut source = Source::new(run_id, url.to_string(), "example.invalid".into(), None);
        acq.acquire(run_id, std::slice::from_mut(&mut source), 3600, &wsa_domain::emitter::NullEmitter)
            .await;

        assert_eq!(source.title.as_deref(), Some("Cached title"));
        assert!(source.markdown_content.is_some());
    }

    #[tokio::test]
    async fn expired_cache_entry_is_not_treated_as_hit() {
        let acq = acquirer();
        let url = "https://example.invalid/stale-unreachable-host";
        let mut stale = PageCacheEntry {
            url: url.to_string(),
            title: Some("Old".into()),
            content: "old body".into(),
            snippets: vec![],
            fetched_at: Utc::now() - chrono::Duration::seconds(10_000),
        };
        stale.fetched_at = Utc::now() - chrono::Duration::seconds(10_000);
        acq.store.upsert_page_cache(&stale).await.unwrap();

        let run_id = Uuid::new_v4();
        let mut source = Source::new(run_id, url.to_string(), "example.invalid".into(), None);
        // ttl of 1 second means the 10000s-old entry is stale; the
        // subsequent live fetch will fail (invalid host) and the source
        // will simply have no markdown_content — proving the cache was
        // not used.
        acq.acquire(run_id, std::slice::from_mut(&mut source), 1, &wsa_domain::emitter::NullEmitter)
            .await;
        assert!(source.markdown_content.is_none());
    }
}
