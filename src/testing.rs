//! In-memory collaborators for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::classifier::{match_amenities, AmenityClassifier};
use crate::error::{ClassifyError, FetchError, StoreError};
use crate::listing::{CandidateRecord, DetailPage, ListingFragment};
use crate::source::ListingSource;
use crate::store::{DatabaseId, RecordId, RecordStore};

pub fn fragment(n: usize) -> ListingFragment {
    ListingFragment {
        title: Some(format!("Listing {n}")),
        link: Some(link(n)),
        price: Some(format!("${},000", n + 1)),
        location: Some("oakland".into()),
    }
}

pub fn link(n: usize) -> String {
    format!("https://sfbay.example.org/eby/apa/d/{n}.html")
}

/// Index page plus detail pages. Detail text mentions a balcony unless
/// overridden, so the echoing classifier tags it.
#[derive(Default)]
pub struct FakeSource {
    index: Option<Vec<ListingFragment>>,
    details: HashMap<String, DetailPage>,
    missing: HashSet<String>,
    pub index_calls: AtomicUsize,
    pub detail_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(fragments: Vec<ListingFragment>) -> Self {
        FakeSource {
            index: Some(fragments),
            ..Default::default()
        }
    }

    /// Index answers HTTP 500.
    pub fn failing_index() -> Self {
        FakeSource::default()
    }

    pub fn with_detail(mut self, link: String, page: DetailPage) -> Self {
        self.details.insert(link, page);
        self
    }

    pub fn with_missing_detail(mut self, link: String) -> Self {
        self.missing.insert(link);
        self
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn fetch_index(&self) -> Result<Vec<ListingFragment>, FetchError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.index.clone().ok_or(FetchError::Status {
            url: "index".into(),
            status: 500,
        })
    }

    async fn fetch_detail(&self, link: &str) -> Result<DetailPage, FetchError> {
        self.detail_calls.lock().unwrap().push(link.to_string());
        if self.missing.contains(link) {
            return Err(FetchError::Status {
                url: link.to_string(),
                status: 404,
            });
        }
        Ok(self.details.get(link).cloned().unwrap_or_else(|| DetailPage {
            size_text: Some("/ 1br - 600ft2 -".into()),
            timestamp: Some("2024-03-05T10:00:00-0800".into()),
            text: format!("{link} has a Balcony/Patio"),
        }))
    }
}

/// Replies with the listing text itself, so amenities come from whatever
/// vocabulary entries the text names. Fails for texts containing a marker.
#[derive(Default)]
pub struct FakeClassifier {
    fail_marker: Option<String>,
    panic_marker: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn failing_on(marker: &str) -> Self {
        FakeClassifier {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    /// Panics on texts containing `marker`, like a worker bug would.
    pub fn panicking_on(marker: &str) -> Self {
        FakeClassifier {
            panic_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AmenityClassifier for FakeClassifier {
    async fn classify(&self, listing_text: &str) -> Result<Vec<&'static str>, ClassifyError> {
        self.calls.lock().unwrap().push(listing_text.to_string());
        if let Some(marker) = &self.panic_marker {
            if listing_text.contains(marker.as_str()) {
                panic!("classifier blew up on {listing_text}");
            }
        }
        if let Some(marker) = &self.fail_marker {
            if listing_text.contains(marker.as_str()) {
                return Err(ClassifyError::Status {
                    status: 503,
                    body: "overloaded".into(),
                });
            }
        }
        Ok(match_amenities(listing_text))
    }
}

pub const DB_TITLE: &str = "Craigslist housing aggregator";

/// Store holding at most one database. Records are kept in submit order.
#[derive(Default)]
pub struct FakeStore {
    database: Mutex<Option<DatabaseId>>,
    links: Vec<String>,
    lookup_fails: bool,
    links_fail: bool,
    rejected: HashSet<String>,
    pub created_databases: Mutex<Vec<String>>,
    pub create_attempts: AtomicUsize,
    pub records: Mutex<Vec<CandidateRecord>>,
}

impl FakeStore {
    /// Store whose database already exists and holds `links`.
    pub fn with_links(links: Vec<String>) -> Self {
        FakeStore {
            database: Mutex::new(Some(DatabaseId("db-1".into()))),
            links,
            ..Default::default()
        }
    }

    /// Store without the listing database.
    pub fn empty() -> Self {
        FakeStore::default()
    }

    pub fn failing_lookup() -> Self {
        FakeStore {
            lookup_fails: true,
            ..Default::default()
        }
    }

    pub fn failing_links(mut self) -> Self {
        self.links_fail = true;
        self
    }

    pub fn rejecting(mut self, link: String) -> Self {
        self.rejected.insert(link);
        self
    }

    pub fn stored_links(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.link.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn find_database(&self, title: &str) -> Result<Option<DatabaseId>, StoreError> {
        if self.lookup_fails {
            return Err(StoreError::Status {
                status: 401,
                body: "unauthorized".into(),
            });
        }
        let db = self.database.lock().unwrap().clone();
        Ok(db.filter(|_| title == DB_TITLE))
    }

    async fn create_database(
        &self,
        parent_page_id: &str,
        _title: &str,
    ) -> Result<DatabaseId, StoreError> {
        self.created_databases
            .lock()
            .unwrap()
            .push(parent_page_id.to_string());
        let id = DatabaseId("db-created".into());
        *self.database.lock().unwrap() = Some(id.clone());
        Ok(id)
    }

    async fn existing_links(&self, _database: &DatabaseId) -> Result<Vec<String>, StoreError> {
        if self.links_fail {
            return Err(StoreError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(self.links.clone())
    }

    async fn create_record(
        &self,
        _database: &DatabaseId,
        record: &CandidateRecord,
    ) -> Result<RecordId, StoreError> {
        let n = self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(&record.link) {
            return Err(StoreError::Status {
                status: 400,
                body: "validation_error".into(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(RecordId(format!("page-{n}")))
    }
}
