use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use translate_client::TranslateClient;
use trendwire_common::config::parse_list;
use trendwire_common::Config;
use trendwire_pipeline::cache_pg::PgTranslationCache;
use trendwire_pipeline::enrichment::Enricher;
use trendwire_pipeline::normalize::MergeLimits;
use trendwire_pipeline::pacing::{Clock, Pacer, TokioClock};
use trendwire_pipeline::pipeline::ensure_progress;
use trendwire_pipeline::report::ClaudeReporter;
use trendwire_pipeline::store::PgSnapshotStore;
use trendwire_pipeline::traits::ReportGenerator;
use trendwire_pipeline::translator::Translator;
use trendwire_pipeline::{PipelineSettings, RegionSources, TrendPipeline};
use trendwire_sources::{build_http_client, NewsLookup, VideoLookup};

#[derive(Parser)]
#[command(name = "trendwire", about = "Aggregate, translate and snapshot regional search trends")]
struct Cli {
    /// Comma-separated region codes, overriding REGIONS
    #[arg(long)]
    regions: Option<String>,

    /// Run the full cycle but skip leases and every write
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("trendwire=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("trendwire cycle starting");

    let mut config = Config::from_env()?;
    if let Some(regions) = cli.regions.as_deref() {
        config.regions = parse_list(regions)?;
        config.validate()?;
    }
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;

    let store = PgSnapshotStore::new(pool.clone(), config.lease_ttl);
    store.migrate().await?;
    info!(run_id = %store.run_id(), "store ready");

    let http = build_http_client(config.http_timeout)?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let cache = PgTranslationCache::load(pool, config.translation_cache_ttl_hours).await?;
    let translator = Translator::new(
        Arc::new(TranslateClient::new(http.clone())),
        Arc::new(cache),
    )
    .with_max_batch_chars(config.translate_max_batch_chars);

    let enricher = Enricher::new(
        Arc::new(NewsLookup::new(http.clone())),
        Arc::new(VideoLookup::new(http.clone())),
        Pacer::new(clock.clone(), config.enrichment_delay),
    );

    let reporter: Option<Arc<dyn ReportGenerator>> = config.anthropic_api_key.as_ref().map(|key| {
        let claude = Claude::new(key.clone(), config.report_model.clone()).with_http_client(http.clone());
        Arc::new(ClaudeReporter::new(claude)) as Arc<dyn ReportGenerator>
    });

    let pipeline = TrendPipeline::new(
        RegionSources::for_all_regions(&http),
        enricher,
        translator,
        Pacer::new(clock.clone(), config.translate_delay),
        reporter,
        Pacer::new(clock, config.report_delay),
        Arc::new(store),
        PipelineSettings {
            regions: config.regions.clone(),
            target_locales: config.target_locales.clone(),
            limits: MergeLimits {
                buffer_size: config.buffer_size,
                list_cap: config.list_cap,
            },
            dry_run: cli.dry_run,
        },
    );

    let stats = pipeline.run_cycle().await;
    info!("Trend cycle complete. {stats}");

    ensure_progress(&stats)
}
