mod amenities;
mod classifier;
mod dedup;
mod error;
mod http;
mod listing;
mod parser;
mod pipeline;
mod settings;
mod source;
mod store;
#[cfg(test)]
mod testing;
mod upsert;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::classifier::OpenAiClassifier;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::settings::Settings;
use crate::source::HttpListingSource;
use crate::store::{NotionStore, RecordStore};

#[derive(Parser)]
#[command(
    name = "housing_scraper",
    about = "Craigslist housing listings into a Notion database, tagged with amenities"
)]
struct Cli {
    /// Settings file (default: housing_scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find or create the listing database
    Init,
    /// Fetch the index and store every new listing
    Run {
        /// Max index entries to look at (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Listings processed at once (overrides settings)
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
    },
    /// Show how many listings the database holds
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    let client = settings.http.client()?;

    let result = match cli.command {
        Commands::Init => {
            settings.validate_store()?;
            let store = NotionStore::new(&settings, client);
            let id = pipeline::resolve_database(
                &store,
                &settings.notion.database_title,
                settings.notion.parent_page_id.as_deref(),
            )
            .await?;
            println!("Database {:?}: {}", settings.notion.database_title, id);
            Ok(())
        }
        Commands::Run { limit, concurrency } => {
            if let Some(c) = concurrency {
                settings.pipeline.concurrency = c;
            }
            settings.validate_run()?;

            let source = HttpListingSource::new(&settings, client.clone())?;
            let classifier = OpenAiClassifier::new(&settings, client.clone());
            let store = NotionStore::new(&settings, client);

            let mut options = PipelineOptions::from_settings(&settings);
            options.limit = limit;

            let pb = progress_bar()?;
            let report = Pipeline::new(
                Arc::new(source),
                Arc::new(classifier),
                Arc::new(store),
                options,
            )
            .with_progress(pb)
            .run()
            .await?;

            println!("Database: {}", report.database);
            println!("Processed:           {}", report.processed);
            println!("Stored:              {}", report.succeeded);
            println!("Duplicates:          {}", report.skipped_duplicate);
            println!("Malformed:           {}", report.skipped_malformed);
            println!("Fetch failures:      {}", report.fetch_failed);
            println!("Enrichment failures: {}", report.enrichment_failed);
            println!("Store failures:      {}", report.store_failed);
            if report.worker_failed > 0 {
                println!("Worker failures:     {}", report.worker_failed);
            }
            Ok(())
        }
        Commands::Stats => {
            settings.validate_store()?;
            let store = NotionStore::new(&settings, client);
            match store.find_database(&settings.notion.database_title).await? {
                Some(id) => {
                    let links = store.existing_links(&id).await?;
                    println!("Database: {}", id);
                    println!("Listings: {}", links.len());
                }
                None => println!(
                    "No database titled {:?}. Run 'init' first.",
                    settings.notion.database_title
                ),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
