use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::{DocumentEntry, DocumentStore, Filter, Properties, StoreError, StoreResult};
use crate::config::DocumentStoreConfig;
use crate::util::truncate_chars;

const NOTION_VERSION: &str = "2022-06-28";
const MAX_QUERY_PAGES: usize = 10;
const ERROR_BODY_MAX_CHARS: usize = 500;

/// Document store client for the Notion REST API.
pub struct NotionStore {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<PageResponse>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    properties: Value,
}

impl NotionStore {
    pub fn new(config: &DocumentStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> StoreResult<T> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .map_err(|err| transport_error(url, &err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_MAX_CHARS),
            });
        }

        response
            .json::<T>()
            .map_err(|err| StoreError::Decode(format!("{url}: {err}")))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        StoreError::Connection {
            url: url.to_string(),
        }
    } else {
        StoreError::Http(err.to_string())
    }
}

impl DocumentStore for NotionStore {
    fn query(&self, collection_id: &str, filter: &Filter) -> StoreResult<Vec<DocumentEntry>> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, collection_id);
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_QUERY_PAGES {
            let mut body = json!({ "filter": filter.to_json() });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let page: QueryResponse = self.post(&url, &body)?;
            entries.extend(page.results.into_iter().map(|result| DocumentEntry {
                id: result.id,
                properties: result.properties,
            }));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(collection = collection_id, matches = entries.len(), "queried document store");
        Ok(entries)
    }

    fn create(&self, collection_id: &str, properties: &Properties) -> StoreResult<String> {
        let url = format!("{}/v1/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": collection_id },
            "properties": properties.to_json(),
        });

        let page: PageResponse = self.post(&url, &body)?;
        Ok(page.id)
    }
}
