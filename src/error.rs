use thiserror::Error;

/// Listing site unreachable or answered with a non-success status.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// A required index-level field could not be located.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("listing has no {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("classification service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classification reply was empty")]
    EmptyReply,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// Failures that end a run before any listing is processed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("store lookup failed: {0}")]
    StoreLookup(#[source] StoreError),

    #[error("database {title:?} not found and no parent page configured to create it")]
    NoParentPage { title: String },

    #[error("could not create database {title:?}: {source}")]
    StoreCreate {
        title: String,
        #[source]
        source: StoreError,
    },

    #[error("could not read existing links: {0}")]
    LinkSnapshot(#[source] StoreError),

    #[error("index fetch failed: {0}")]
    IndexFetch(#[source] FetchError),
}
