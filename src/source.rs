use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::http::{send_with_retry, RetryPolicy};
use crate::listing::{DetailPage, ListingFragment};
use crate::parser::{parse_detail, parse_index};
use crate::settings::Settings;

/// Where listings come from: one index page plus a detail page per listing.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_index(&self) -> Result<Vec<ListingFragment>, FetchError>;

    async fn fetch_detail(&self, link: &str) -> Result<DetailPage, FetchError>;
}

/// The listing site over plain HTTP.
pub struct HttpListingSource {
    client: reqwest::Client,
    index_url: Url,
    query: Vec<(&'static str, String)>,
    retry: RetryPolicy,
}

impl HttpListingSource {
    pub fn new(settings: &Settings, client: reqwest::Client) -> Result<Self, FetchError> {
        let index_url = Url::parse(&settings.index_url).map_err(|_| FetchError::InvalidUrl {
            url: settings.index_url.clone(),
        })?;
        Ok(Self {
            client,
            index_url,
            query: settings.search.query_pairs(),
            retry: settings.http.retry_policy(),
        })
    }

    async fn get_html(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError> {
        let response = send_with_retry(|| self.client.get(url).query(query), self.retry, url)
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_index(&self) -> Result<Vec<ListingFragment>, FetchError> {
        info!("Fetching listing index: {}", self.index_url);
        let html = self.get_html(self.index_url.as_str(), &self.query).await?;
        let fragments = parse_index(&html, Some(&self.index_url));
        info!("Index lists {} postings", fragments.len());
        Ok(fragments)
    }

    async fn fetch_detail(&self, link: &str) -> Result<DetailPage, FetchError> {
        debug!("Fetching detail page: {}", link);
        let html = self.get_html(link, &[]).await?;
        Ok(parse_detail(&html))
    }
}
