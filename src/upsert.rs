use tracing::{info, warn};

use crate::error::StoreError;
use crate::listing::CandidateRecord;
use crate::store::{DatabaseId, RecordId, RecordStore};

/// Submit one record. The store does not dedup, so this must only be
/// called for links the dedup filter let through. Failures are logged with
/// the store's status and body and handed back to the caller.
pub async fn upsert(
    store: &dyn RecordStore,
    database: &DatabaseId,
    record: &CandidateRecord,
) -> Result<RecordId, StoreError> {
    match store.create_record(database, record).await {
        Ok(id) => {
            info!(
                "Added {} ({} amenities) as {}",
                record.link,
                record.amenities.len(),
                id
            );
            Ok(id)
        }
        Err(StoreError::Status { status, body }) => {
            warn!(
                "Failed to add listing {} to the store. Status code: {}\nResponse: {}",
                record.link, status, body
            );
            Err(StoreError::Status { status, body })
        }
        Err(e) => {
            warn!("Failed to add listing {} to the store: {}", record.link, e);
            Err(e)
        }
    }
}
