use anyhow::Context;
use regfin_pipeline::{HttpSource, Pipeline, PipelineConfig};
use regfin_storage::SqliteRepository;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Path of an optional TOML config file.
const CONFIG_VAR: &str = "REGFIN_CONFIG";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var_os(CONFIG_VAR).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {CONFIG_VAR}"))?;

    let db = regfin_storage::create_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let source = HttpSource::new(&config).context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(source, SqliteRepository::new(db), config);

    // `regfin aggregate` recomputes the summary from persisted data only.
    if std::env::args().nth(1).as_deref() == Some("aggregate") {
        let outcome = pipeline.aggregate_persisted().await?;
        tracing::info!(
            groups = outcome.aggregates.len(),
            accepted = outcome.validation.accepted,
            persistence_errors = outcome.persistence_errors.len(),
            "re-aggregation finished"
        );
        return Ok(());
    }

    let outcome = pipeline.run().await?;
    let report = serde_json::to_string_pretty(&outcome.report)?;
    tracing::info!("run report:\n{report}");
    Ok(())
}
