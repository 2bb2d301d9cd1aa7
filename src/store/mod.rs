pub mod notion;

use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::listing::CandidateRecord;

pub use notion::NotionStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseId(pub String);

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The structured-record service listings are persisted to.
///
/// `create_record` does not check for duplicates; callers dedup against
/// `existing_links` first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Database whose title is exactly `title`, if any.
    async fn find_database(&self, title: &str) -> Result<Option<DatabaseId>, StoreError>;

    /// Create a database with the listing schema under `parent_page_id`.
    async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
    ) -> Result<DatabaseId, StoreError>;

    /// Every link currently stored in `database`.
    async fn existing_links(&self, database: &DatabaseId) -> Result<Vec<String>, StoreError>;

    async fn create_record(
        &self,
        database: &DatabaseId,
        record: &CandidateRecord,
    ) -> Result<RecordId, StoreError>;
}
