use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::http::RetryPolicy;

const DEFAULT_CONFIG: &str = "housing_scraper";
const ENV_PREFIX: &str = "HOUSING";

/// Everything the pipeline needs from the outside world, resolved once at
/// startup: defaults, then an optional TOML file, then `HOUSING_*` env vars
/// (`HOUSING_NOTION__TOKEN`, `HOUSING_PIPELINE__CONCURRENCY`, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index_url: String,
    pub search: SearchFilter,
    pub notion: NotionSettings,
    pub openai: OpenAiSettings,
    pub http: HttpSettings,
    pub pipeline: PipelineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            index_url: "https://sfbay.craigslist.org/search/eby/apa".into(),
            search: SearchFilter::default(),
            notion: NotionSettings::default(),
            openai: OpenAiSettings::default(),
            http: HttpSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Query filters sent with the index request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    pub housing_types: Vec<u32>,
    pub max_bedrooms: Option<u32>,
    pub neighborhoods: Vec<u32>,
    pub pets_dog: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        SearchFilter {
            housing_types: vec![3, 4, 5, 6, 7],
            max_bedrooms: Some(2),
            neighborhoods: vec![112, 46, 47, 48, 49, 60, 62, 63, 65, 66],
            pets_dog: true,
        }
    }
}

impl SearchFilter {
    /// Repeated-key query pairs in the order the site expects them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = self
            .housing_types
            .iter()
            .map(|t| ("housing_type", t.to_string()))
            .collect();
        if let Some(max) = self.max_bedrooms {
            pairs.push(("max_bedrooms", max.to_string()));
        }
        pairs.extend(self.neighborhoods.iter().map(|n| ("nh", n.to_string())));
        if self.pets_dog {
            pairs.push(("pets_dog", "1".into()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotionSettings {
    pub api_base: String,
    pub version: String,
    pub token: String,
    pub database_title: String,
    /// Page the database is created under when it does not exist yet.
    pub parent_page_id: Option<String>,
}

impl Default for NotionSettings {
    fn default() -> Self {
        NotionSettings {
            api_base: "https://api.notion.com/v1".into(),
            version: "2022-02-22".into(),
            token: String::new(),
            database_title: "Craigslist housing aggregator".into(),
            parent_page_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        OpenAiSettings {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: 30,
            max_retries: 2,
            backoff_ms: 1000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.backoff_ms),
            idempotent: true,
        }
    }

    /// Shared reqwest client with the per-call timeout applied.
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .user_agent(&self.user_agent)
            .build()
            .context("Failed to create HTTP client")
    }
}

/// What to do with a listing whose amenity classification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Abandon the listing's store write.
    #[default]
    Skip,
    /// Store the listing with an empty amenity set.
    StoreWithoutAmenities,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub concurrency: usize,
    pub on_classification_failure: ClassificationPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            concurrency: 1,
            on_classification_failure: ClassificationPolicy::Skip,
        }
    }
}

impl Settings {
    /// Load settings from an explicit file, or `housing_scraper.toml` in the
    /// working directory when present, then overlay the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let builder = ::config::Config::builder();
        let builder = match path {
            Some(p) => builder.add_source(::config::File::from(p)),
            None => builder.add_source(::config::File::with_name(DEFAULT_CONFIG).required(false)),
        };

        let mut settings: Settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.apply_env_fallbacks();
        Ok(settings)
    }

    /// Accept the variable names the deployment has always used for secrets.
    fn apply_env_fallbacks(&mut self) {
        if self.notion.token.is_empty() {
            if let Ok(token) = std::env::var("NOTION_TOKEN") {
                self.notion.token = token;
            }
        }
        if self.openai.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
                self.openai.api_key = key;
            }
        }
    }

    /// Checks needed by every command that talks to the store.
    pub fn validate_store(&self) -> Result<()> {
        if self.notion.token.trim().is_empty() {
            bail!("Notion token missing: set HOUSING_NOTION__TOKEN or NOTION_TOKEN");
        }
        if self.notion.database_title.trim().is_empty() {
            bail!("notion.database_title must not be empty");
        }
        Ok(())
    }

    /// Checks needed before a full pipeline run.
    pub fn validate_run(&self) -> Result<()> {
        self.validate_store()?;
        if self.openai.api_key.trim().is_empty() {
            bail!("OpenAI key missing: set HOUSING_OPENAI__API_KEY or OPENAI_KEY");
        }
        if self.pipeline.concurrency == 0 {
            bail!("pipeline.concurrency must be at least 1");
        }
        reqwest::Url::parse(&self.index_url)
            .with_context(|| format!("index_url is not a valid URL: {}", self.index_url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_search() {
        let pairs = SearchFilter::default().query_pairs();
        assert_eq!(pairs.iter().filter(|(k, _)| *k == "housing_type").count(), 5);
        assert_eq!(pairs.iter().filter(|(k, _)| *k == "nh").count(), 10);
        assert!(pairs.contains(&("max_bedrooms", "2".to_string())));
        assert_eq!(pairs.last(), Some(&("pets_dog", "1".to_string())));
    }

    #[test]
    fn pets_flag_off_is_omitted() {
        let filter = SearchFilter {
            housing_types: vec![],
            max_bedrooms: None,
            neighborhoods: vec![],
            pets_dog: false,
        };
        assert!(filter.query_pairs().is_empty());
    }

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("housing_scraper_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
index_url = "http://localhost:9000/search"

[notion]
token = "secret_abc"
parent_page_id = "39e0659f0f094f15b3646f3fab3895bd"

[pipeline]
concurrency = 4
on_classification_failure = "store_without_amenities"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.index_url, "http://localhost:9000/search");
        assert_eq!(settings.notion.token, "secret_abc");
        assert_eq!(settings.notion.version, "2022-02-22");
        assert_eq!(
            settings.notion.parent_page_id.as_deref(),
            Some("39e0659f0f094f15b3646f3fab3895bd")
        );
        assert_eq!(settings.pipeline.concurrency, 4);
        assert_eq!(
            settings.pipeline.on_classification_failure,
            ClassificationPolicy::StoreWithoutAmenities
        );
        assert_eq!(settings.search.housing_types, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn run_validation_requires_secrets() {
        let mut settings = Settings::default();
        assert!(settings.validate_store().is_err());

        settings.notion.token = "secret".into();
        assert!(settings.validate_store().is_ok());
        assert!(settings.validate_run().is_err());

        settings.openai.api_key = "sk-test".into();
        assert!(settings.validate_run().is_ok());

        settings.pipeline.concurrency = 0;
        assert!(settings.validate_run().is_err());
    }
}
