use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{DatabaseId, RecordId, RecordStore};
use crate::error::StoreError;
use crate::http::{send_with_retry, RetryPolicy};
use crate::listing::CandidateRecord;
use crate::settings::Settings;

const PAGE_SIZE: u32 = 100;
const MAX_SELECT_LEN: usize = 100;

/// Notion REST API backed store.
pub struct NotionStore {
    client: reqwest::Client,
    api_base: String,
    token: String,
    version: String,
    retry: RetryPolicy,
}

impl NotionStore {
    pub fn new(settings: &Settings, client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: settings.notion.api_base.trim_end_matches('/').to_string(),
            token: settings.notion.token.clone(),
            version: settings.notion.version.clone(),
            retry: settings.http.retry_policy(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }

    async fn post(&self, path: &str, body: &Value, retry: RetryPolicy) -> Result<Value, StoreError> {
        let response = send_with_retry(
            || self.request(Method::POST, path).json(body),
            retry,
            path,
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<DatabaseObject>,
}

#[derive(Deserialize)]
struct DatabaseObject {
    id: String,
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<PageObject>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct PageObject {
    #[serde(default)]
    properties: PageProperties,
}

#[derive(Deserialize, Default)]
struct PageProperties {
    #[serde(rename = "Link")]
    link: Option<UrlProperty>,
}

#[derive(Deserialize)]
struct UrlProperty {
    url: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(format!("{}: {}", what, e)))
}

/// Schema payload for a new listing database.
pub fn database_schema(parent_page_id: &str, title: &str) -> Value {
    json!({
        "parent": { "type": "page_id", "page_id": parent_page_id },
        "title": [{ "type": "text", "text": { "content": title } }],
        "properties": {
            "Title": { "title": {} },
            "Price": { "number": { "format": "dollar" } },
            "Location": { "select": {} },
            "Bedroom": { "select": {} },
            "Sq ft": { "rich_text": {} },
            "Date": { "date": {} },
            "Link": { "url": {} },
            "Amenities": { "multi_select": {} },
        }
    })
}

/// Select option names may not contain commas and are capped in length.
/// An empty name clears the property.
fn select(name: &str) -> Value {
    let cleaned: String = name.replace(',', "").trim().chars().take(MAX_SELECT_LEN).collect();
    if cleaned.is_empty() {
        Value::Null
    } else {
        json!({ "name": cleaned })
    }
}

/// Page payload for one listing, one property per record field.
pub fn record_payload(database: &DatabaseId, record: &CandidateRecord) -> Value {
    let amenities: Vec<Value> = record
        .amenities
        .iter()
        .map(|a| json!({ "name": a }))
        .collect();

    json!({
        "parent": { "database_id": database.0 },
        "properties": {
            "Title": { "title": [{ "text": { "content": record.title } }] },
            "Price": { "number": record.price },
            "Location": { "select": select(&record.location) },
            "Bedroom": { "select": select(&record.bedroom_code) },
            "Sq ft": { "rich_text": [{ "text": { "content": record.area_code } }] },
            "Date": { "date": { "start": record.listed_date.format("%Y-%m-%d").to_string() } },
            "Link": { "url": record.link },
            "Amenities": { "multi_select": amenities },
        }
    })
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn find_database(&self, title: &str) -> Result<Option<DatabaseId>, StoreError> {
        let body = json!({
            "query": title,
            "filter": { "value": "database", "property": "object" },
            "page_size": PAGE_SIZE,
        });
        let found: SearchResponse = decode(self.post("search", &body, self.retry).await?, "search")?;

        Ok(found
            .results
            .into_iter()
            .find(|db| db.title.iter().map(|t| t.plain_text.as_str()).collect::<String>() == title)
            .map(|db| DatabaseId(db.id)))
    }

    async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
    ) -> Result<DatabaseId, StoreError> {
        let body = database_schema(parent_page_id, title);
        let created: Created = decode(
            self.post("databases", &body, self.retry.non_idempotent()).await?,
            "create database",
        )?;
        info!("Created database {:?} ({})", title, created.id);
        Ok(DatabaseId(created.id))
    }

    async fn existing_links(&self, database: &DatabaseId) -> Result<Vec<String>, StoreError> {
        let path = format!("databases/{}/query", database.0);
        let mut links = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let page: QueryResponse = decode(self.post(&path, &body, self.retry).await?, "query")?;

            links.extend(
                page.results
                    .into_iter()
                    .filter_map(|p| p.properties.link.and_then(|l| l.url)),
            );

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Database {} holds {} links", database, links.len());
        Ok(links)
    }

    async fn create_record(
        &self,
        database: &DatabaseId,
        record: &CandidateRecord,
    ) -> Result<RecordId, StoreError> {
        let body = record_payload(database, record);
        let created: Created = decode(
            self.post("pages", &body, self.retry.non_idempotent()).await?,
            "create page",
        )?;
        Ok(RecordId(created.id))
    }
}
