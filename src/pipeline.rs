use std::collections::HashSet;
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::classifier::AmenityClassifier;
use crate::dedup::{is_new, ExistingLinks};
use crate::error::{ExtractError, RunError};
use crate::listing::ListingSummary;
use crate::parser::{complete, extract_summary};
use crate::settings::{ClassificationPolicy, Settings};
use crate::source::ListingSource;
use crate::store::{DatabaseId, RecordId, RecordStore};
use crate::upsert::upsert;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub database_title: String,
    pub parent_page_id: Option<String>,
    pub concurrency: usize,
    pub on_classification_failure: ClassificationPolicy,
    /// Only look at the first N index entries.
    pub limit: Option<usize>,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        PipelineOptions {
            database_title: settings.notion.database_title.clone(),
            parent_page_id: settings.notion.parent_page_id.clone(),
            concurrency: settings.pipeline.concurrency,
            on_classification_failure: settings.pipeline.on_classification_failure,
            limit: None,
        }
    }
}

/// What happened to one index entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingOutcome {
    Stored {
        link: String,
        record: RecordId,
        amenities: usize,
    },
    /// Classification failed and policy allowed storing without amenities.
    StoredWithoutAmenities {
        link: String,
        record: RecordId,
        reason: String,
    },
    Duplicate {
        link: String,
    },
    Malformed {
        position: usize,
        reason: ExtractError,
    },
    FetchFailed {
        link: String,
        reason: String,
    },
    ClassificationFailed {
        link: String,
        reason: String,
    },
    StoreFailed {
        link: String,
        reason: String,
    },
    /// The task handling this listing died before reporting.
    WorkerFailed {
        link: String,
        reason: String,
    },
}

impl ListingOutcome {
    /// Human-readable status line.
    pub fn describe(&self) -> String {
        match self {
            ListingOutcome::Stored {
                link, amenities, ..
            } => format!("Stored {} ({} amenities)", link, amenities),
            ListingOutcome::StoredWithoutAmenities { link, reason, .. } => {
                format!("Stored {} without amenities: {}", link, reason)
            }
            ListingOutcome::Duplicate { link } => format!("{} has already been logged", link),
            ListingOutcome::Malformed { position, reason } => {
                format!("Skipped entry #{}: {}", position + 1, reason)
            }
            ListingOutcome::FetchFailed { link, reason } => {
                format!("Skipped {}: detail page unavailable: {}", link, reason)
            }
            ListingOutcome::ClassificationFailed { link, reason } => {
                format!("Skipped {}: amenity classification failed: {}", link, reason)
            }
            ListingOutcome::StoreFailed { link, reason } => {
                format!("Failed to store {}: {}", link, reason)
            }
            ListingOutcome::WorkerFailed { link, reason } => {
                format!("Lost {}: worker failed: {}", link, reason)
            }
        }
    }
}

/// Summary of one run. `outcomes` is in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub database: DatabaseId,
    pub processed: usize,
    pub skipped_duplicate: usize,
    pub skipped_malformed: usize,
    pub fetch_failed: usize,
    pub enrichment_failed: usize,
    pub store_failed: usize,
    pub worker_failed: usize,
    pub succeeded: usize,
    pub outcomes: Vec<ListingOutcome>,
}

impl RunReport {
    fn new(database: DatabaseId) -> Self {
        RunReport {
            database,
            processed: 0,
            skipped_duplicate: 0,
            skipped_malformed: 0,
            fetch_failed: 0,
            enrichment_failed: 0,
            store_failed: 0,
            worker_failed: 0,
            succeeded: 0,
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: ListingOutcome) {
        self.processed += 1;
        match &outcome {
            ListingOutcome::Stored { .. } => self.succeeded += 1,
            ListingOutcome::StoredWithoutAmenities { .. } => {
                self.succeeded += 1;
                self.enrichment_failed += 1;
            }
            ListingOutcome::Duplicate { .. } => self.skipped_duplicate += 1,
            ListingOutcome::Malformed { .. } => self.skipped_malformed += 1,
            ListingOutcome::FetchFailed { .. } => self.fetch_failed += 1,
            ListingOutcome::ClassificationFailed { .. } => self.enrichment_failed += 1,
            ListingOutcome::StoreFailed { .. } => self.store_failed += 1,
            ListingOutcome::WorkerFailed { .. } => self.worker_failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} processed: {} stored, {} duplicate, {} malformed, {} fetch failed, {} enrichment failed, {} store failed, {} worker failed",
            self.processed,
            self.succeeded,
            self.skipped_duplicate,
            self.skipped_malformed,
            self.fetch_failed,
            self.enrichment_failed,
            self.store_failed,
            self.worker_failed,
        )
    }
}

/// Find the listing database by title, creating it under the configured
/// parent page when it does not exist.
pub async fn resolve_database(
    store: &dyn RecordStore,
    title: &str,
    parent_page_id: Option<&str>,
) -> Result<DatabaseId, RunError> {
    if let Some(id) = store.find_database(title).await.map_err(RunError::StoreLookup)? {
        info!("Using database {:?} ({})", title, id);
        return Ok(id);
    }

    let Some(parent) = parent_page_id else {
        return Err(RunError::NoParentPage {
            title: title.to_string(),
        });
    };
    store
        .create_database(parent, title)
        .await
        .map_err(|source| RunError::StoreCreate {
            title: title.to_string(),
            source,
        })
}

/// Per-listing steps after the dedup check. Shared by all workers.
struct Worker {
    source: Arc<dyn ListingSource>,
    classifier: Arc<dyn AmenityClassifier>,
    store: Arc<dyn RecordStore>,
    database: DatabaseId,
    policy: ClassificationPolicy,
}

impl Worker {
    async fn process(&self, summary: ListingSummary) -> ListingOutcome {
        let link = summary.link.clone();

        let detail = match self.source.fetch_detail(&link).await {
            Ok(detail) => detail,
            Err(e) => {
                return ListingOutcome::FetchFailed {
                    link,
                    reason: e.to_string(),
                }
            }
        };
        let mut record = complete(summary, &detail);

        let mut enrichment_error = None;
        match self.classifier.classify(&detail.text).await {
            Ok(amenities) => record.amenities = amenities,
            Err(e) if self.policy == ClassificationPolicy::StoreWithoutAmenities => {
                enrichment_error = Some(e.to_string());
            }
            Err(e) => {
                return ListingOutcome::ClassificationFailed {
                    link,
                    reason: e.to_string(),
                }
            }
        }

        match upsert(self.store.as_ref(), &self.database, &record).await {
            Ok(id) => match enrichment_error {
                None => ListingOutcome::Stored {
                    link,
                    record: id,
                    amenities: record.amenities.len(),
                },
                Some(reason) => ListingOutcome::StoredWithoutAmenities {
                    link,
                    record: id,
                    reason,
                },
            },
            Err(e) => ListingOutcome::StoreFailed {
                link,
                reason: e.to_string(),
            },
        }
    }
}

/// Index fetch → extract → dedup → detail/classify/upsert, one run at a time.
pub struct Pipeline {
    source: Arc<dyn ListingSource>,
    classifier: Arc<dyn AmenityClassifier>,
    store: Arc<dyn RecordStore>,
    options: PipelineOptions,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ListingSource>,
        classifier: Arc<dyn AmenityClassifier>,
        store: Arc<dyn RecordStore>,
        options: PipelineOptions,
    ) -> Self {
        Pipeline {
            source,
            classifier,
            store,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self) -> Result<RunReport, RunError> {
        let database = resolve_database(
            self.store.as_ref(),
            &self.options.database_title,
            self.options.parent_page_id.as_deref(),
        )
        .await?;

        let existing: ExistingLinks = self
            .store
            .existing_links(&database)
            .await
            .map_err(RunError::LinkSnapshot)?
            .into_iter()
            .collect();
        if existing.is_empty() {
            info!("No links stored yet, every listing is new");
        } else {
            info!("{} links already stored", existing.len());
        }

        let mut fragments = self.source.fetch_index().await.map_err(RunError::IndexFetch)?;
        if let Some(limit) = self.options.limit {
            fragments.truncate(limit);
        }
        info!("Beginning the scrape of {} postings", fragments.len());

        // Dedup and index-level extraction are cheap; settle them up front so
        // only new listings reach the workers. A known link is never extracted.
        let mut slots: Vec<Option<ListingOutcome>> = vec![None; fragments.len()];
        let mut claimed: HashSet<String> = HashSet::new();
        let mut work = Vec::new();
        for (position, fragment) in fragments.iter().enumerate() {
            let link = fragment.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
            let outcome = match link {
                Some(link) if !is_new(link, &existing) || claimed.contains(link) => {
                    ListingOutcome::Duplicate {
                        link: link.to_string(),
                    }
                }
                _ => match extract_summary(fragment) {
                    Err(reason) => ListingOutcome::Malformed { position, reason },
                    Ok(summary) => {
                        claimed.insert(summary.link.clone());
                        work.push((position, summary));
                        continue;
                    }
                },
            };
            log_outcome(&outcome);
            slots[position] = Some(outcome);
        }

        self.progress.set_length(work.len() as u64);
        let worker = Arc::new(Worker {
            source: Arc::clone(&self.source),
            classifier: Arc::clone(&self.classifier),
            store: Arc::clone(&self.store),
            database: database.clone(),
            policy: self.options.on_classification_failure,
        });
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, ListingOutcome)>(work.len().max(1));
        let mut handles = Vec::with_capacity(work.len());

        // Permits are taken before spawning, so concurrency 1 walks the
        // index strictly in order.
        for (position, summary) in work {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let link = summary.link.clone();
            let worker = Arc::clone(&worker);
            let tx = tx.clone();
            let handle = tokio::spawn(async move {
                let outcome = worker.process(summary).await;
                drop(permit);
                let _ = tx.send((position, outcome)).await;
            });
            handles.push((position, link, handle));
        }
        drop(tx);

        while let Some((position, outcome)) = rx.recv().await {
            log_outcome(&outcome);
            slots[position] = Some(outcome);
            self.progress.inc(1);
        }

        // A worker that panicked never reported; account for its listing.
        for (position, link, handle) in handles {
            if let Err(e) = handle.await {
                if slots[position].is_none() {
                    let outcome = ListingOutcome::WorkerFailed {
                        link,
                        reason: e.to_string(),
                    };
                    log_outcome(&outcome);
                    slots[position] = Some(outcome);
                    self.progress.inc(1);
                }
            }
        }
        self.progress.finish_and_clear();

        let mut report = RunReport::new(database);
        for outcome in slots.into_iter().flatten() {
            report.record(outcome);
        }
        info!("Run complete: {}", report.summary_line());
        Ok(report)
    }
}

fn log_outcome(outcome: &ListingOutcome) {
    match outcome {
        ListingOutcome::Stored { .. } | ListingOutcome::Duplicate { .. } => {
            info!("{}", outcome.describe())
        }
        _ => warn!("{}", outcome.describe()),
    }
}
