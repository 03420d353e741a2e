//! Paperless-ngx REST client
//!
//! Uses a long-lived reqwest::Client for connection pooling. Every request
//! carries the `Authorization: Token ...` header.

use crate::archive::StatementSource;
use crate::config::PaperlessConfig;
use crate::error::AuditError;
use crate::matcher::{DateWindow, DocumentSearch};
use crate::models::{AuditPeriod, MatchCandidate, Note, OriginalFile, StatementDocument};
use crate::notes::NoteStore;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const STATEMENT_PAGE_SIZE: u32 = 100;
const SEARCH_PAGE_SIZE: u32 = 10;

lazy_static! {
    static ref FILENAME_RE: Regex = Regex::new(r#"filename="([^"]+)""#).unwrap();
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DocumentDetail {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct PaperlessClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PaperlessClient {
    pub fn new(config: &PaperlessConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Token {}", self.token))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.authorized(request).send().await.map_err(|e| {
            AuditError::DocumentStore(format!("Paperless request failed for {}: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::DocumentStore(format!(
                "Paperless returned {} for {}: {}",
                status, what, body
            )));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(self.client.get(url).query(query), url).await?;
        response.json::<T>().await.map_err(|e| {
            AuditError::DocumentStore(format!("Invalid JSON from Paperless for {}: {}", url, e))
        })
    }

    /// Fetch every page of a document listing.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut page: Page<T> = self.get_json(&self.url(path), query).await?;
        let mut items = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            page = self.get_json(&next, &[]).await?;
            items.append(&mut page.results);
        }

        Ok(items)
    }
}

#[async_trait]
impl DocumentSearch for PaperlessClient {
    async fn search(&self, query: &str, window: Option<DateWindow>) -> Result<Vec<MatchCandidate>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("page_size", SEARCH_PAGE_SIZE.to_string()),
        ];
        if let Some(window) = window {
            params.push(("created__date__gte", window.from.to_string()));
            params.push(("created__date__lte", window.to.to_string()));
        }

        let page: Page<MatchCandidate> = self
            .get_json(&self.url("/api/documents/"), &params)
            .await?;

        Ok(page.results)
    }
}

#[async_trait]
impl StatementSource for PaperlessClient {
    async fn list_statements(
        &self,
        tag_id: u64,
        period: AuditPeriod,
    ) -> Result<Vec<StatementDocument>> {
        let params = [
            ("tags__id__all", tag_id.to_string()),
            ("created__date__gte", period.first_day().to_string()),
            ("created__date__lt", period.next_month_first_day().to_string()),
            ("page_size", STATEMENT_PAGE_SIZE.to_string()),
        ];

        let statements = self.get_all_pages("/api/documents/", &params).await?;
        debug!(period = %period, count = statements.len(), "Listed statements");
        Ok(statements)
    }

    async fn download_original(&self, doc_id: u64) -> Result<OriginalFile> {
        let path = format!("/api/documents/{}/download/", doc_id);
        let request = self
            .client
            .get(self.url(&path))
            .query(&[("original", "true")]);
        let response = self.send(request, &path).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(filename_from_disposition)
            .unwrap_or_default();

        let bytes = response.bytes().await?.to_vec();

        Ok(OriginalFile { bytes, filename })
    }

    async fn document_content(&self, doc_id: u64) -> Result<String> {
        let path = format!("/api/documents/{}/", doc_id);
        let detail: DocumentDetail = self.get_json(&self.url(&path), &[]).await?;
        Ok(detail.content.unwrap_or_default())
    }
}

#[async_trait]
impl NoteStore for PaperlessClient {
    async fn list_notes(&self, doc_id: u64) -> Result<Vec<Note>> {
        let path = format!("/api/documents/{}/notes/", doc_id);
        self.get_json(&self.url(&path), &[]).await
    }

    async fn create_note(&self, doc_id: u64, text: &str) -> Result<()> {
        let path = format!("/api/documents/{}/notes/", doc_id);
        let request = self
            .client
            .post(self.url(&path))
            .json(&json!({ "note": text }));
        self.send(request, &path).await?;
        Ok(())
    }

    async fn delete_note(&self, doc_id: u64, note_id: u64) -> Result<()> {
        let path = format!("/api/documents/{}/notes/", doc_id);
        let request = self
            .client
            .delete(self.url(&path))
            .query(&[("id", note_id.to_string())]);
        self.send(request, &path).await?;
        Ok(())
    }
}

/// Pull the quoted filename out of a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> String {
    FILENAME_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
