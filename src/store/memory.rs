use std::cell::{Cell, RefCell};

use serde_json::Value;

use super::properties::plain_text;
use super::{DocumentEntry, DocumentStore, Filter, Properties, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct StoredPage {
    pub collection_id: String,
    pub entry: DocumentEntry,
}

/// Document store double that keeps pages in memory and can be told to fail.
#[derive(Default)]
pub struct MemoryDocumentStore {
    pages: RefCell<Vec<StoredPage>>,
    fail_queries: Cell<bool>,
    fail_creates: Cell<bool>,
    queries: Cell<usize>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.set(fail);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.set(fail);
    }

    pub fn pages(&self, collection_id: &str) -> Vec<DocumentEntry> {
        self.pages
            .borrow()
            .iter()
            .filter(|page| page.collection_id == collection_id)
            .map(|page| page.entry.clone())
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.get()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn query(&self, collection_id: &str, filter: &Filter) -> StoreResult<Vec<DocumentEntry>> {
        self.queries.set(self.queries.get() + 1);
        if self.fail_queries.get() {
            return Err(StoreError::Timeout {
                url: format!("memory://{collection_id}/query"),
            });
        }

        Ok(self
            .pages
            .borrow()
            .iter()
            .filter(|page| page.collection_id == collection_id)
            .filter(|page| matches(filter, &page.entry.properties))
            .map(|page| page.entry.clone())
            .collect())
    }

    fn create(&self, collection_id: &str, properties: &Properties) -> StoreResult<String> {
        if self.fail_creates.get() {
            return Err(StoreError::Status {
                url: format!("memory://{collection_id}/pages"),
                status: 502,
                body: "bad gateway".to_string(),
            });
        }

        let mut pages = self.pages.borrow_mut();
        let id = format!("page-{}", pages.len() + 1);
        pages.push(StoredPage {
            collection_id: collection_id.to_string(),
            entry: DocumentEntry {
                id: id.clone(),
                properties: properties.to_json(),
            },
        });
        Ok(id)
    }
}

fn matches(filter: &Filter, properties: &Value) -> bool {
    match filter {
        Filter::TitleContains { property, value } => properties
            .get(property)
            .map(plain_text)
            .is_some_and(|title| title.to_lowercase().contains(&value.to_lowercase())),
        Filter::DateEquals { property, date } => properties
            .get(property)
            .and_then(|value| value.pointer("/date/start"))
            .and_then(Value::as_str)
            .is_some_and(|start| start == date.to_string()),
        Filter::And(filters) => filters.iter().all(|filter| matches(filter, properties)),
    }
}
