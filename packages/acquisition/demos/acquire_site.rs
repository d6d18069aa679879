// Acquire brochure content for one company site and print the corpus.
//
// Usage: cargo run --example acquire_site -- "Acme" https://acme.com
//
// Reads OPENAI_API_KEY (optional), CHROME_BIN, ACQUISITION_CACHE_DIR and the
// ACQUISITION_* settings from the environment or a .env file.

use std::sync::Arc;

use acquisition::{
    AcquisitionConfig, ChromeFetcher, FileCache, LinkClassifier, OpenAiClassifier,
    PipelineController, Site,
};
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,acquisition=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let company = args.next().context("usage: acquire_site <company> <url>")?;
    let url = args.next().context("usage: acquire_site <company> <url>")?;

    let config = AcquisitionConfig::from_env().context("Failed to load configuration")?;

    let classifier: Option<Arc<dyn LinkClassifier>> = match OpenAiClassifier::from_env() {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            tracing::warn!(error = %e, "no classifier configured, using keywords");
            None
        }
    };

    let cache_dir =
        std::env::var("ACQUISITION_CACHE_DIR").unwrap_or_else(|_| ".cache/acquisition".into());
    let renderer = ChromeFetcher::from_env().with_config(&config);

    let controller = PipelineController::from_config(
        config,
        Arc::new(FileCache::new(cache_dir)),
        classifier,
        Some(Arc::new(renderer)),
    )
    .context("Failed to build pipeline")?;

    let site = Site::new(company, &url)?;
    let run = controller.run(&site).await?;

    println!("{}\n", run.report.summary());
    println!("{}", run.corpus.to_prompt_sections());

    Ok(())
}
