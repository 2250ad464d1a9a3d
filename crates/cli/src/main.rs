use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cascadeguard")]
#[command(about = "Real-time liquidation and order-flow intelligence pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, detect, fuse, track, alert, and serve the dashboard
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Export persisted data as CSV (mirrors the dashboard's /api/export endpoints)
    Export {
        /// What to export
        #[arg(value_enum)]
        dataset: ExportDataset,
        /// Database URL (overrides config storage.database_url if set)
        #[arg(long)]
        database_url: Option<String>,
        /// Config file path, used when --database-url is not given
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Row limit
        #[arg(short, long, default_value_t = 1000)]
        limit: i64,
        /// Restrict the baseline export to one symbol (ignored for signals)
        #[arg(long)]
        symbol: Option<String>,
        /// Output file path
        #[arg(short, long)]
        output: String,
    },
    /// Open the store and apply its schema without starting the pipeline
    Migrate {
        /// Config file path, used when --database-url is not given
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Database URL (overrides config storage.database_url if set)
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum ExportDataset {
    Signals,
    Baselines,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_pipeline(&config).await,
        Commands::Export { dataset, database_url, config, limit, symbol, output } => {
            run_export(dataset, database_url, &config, limit, symbol.as_deref(), &output).await
        }
        Commands::Migrate { config, database_url } => run_migrate(&config, database_url).await,
    }
}

async fn run_pipeline(config_path: &str) -> anyhow::Result<()> {
    tracing::info!(config = config_path, "starting cascadeguard pipeline");
    let config = cascadeguard_core::ConfigLoader::load_from(config_path)?;
    let supervisor = cascadeguard_supervisor::Supervisor::new(config);
    supervisor.run().await
}

async fn resolve_database_url(database_url: Option<String>, config_path: &str) -> anyhow::Result<String> {
    if let Some(url) = database_url {
        return Ok(url);
    }
    let config = cascadeguard_core::ConfigLoader::load_from(config_path)?;
    Ok(config.storage.database_url)
}

async fn run_export(
    dataset: ExportDataset,
    database_url: Option<String>,
    config_path: &str,
    limit: i64,
    symbol: Option<&str>,
    output_path: &str,
) -> anyhow::Result<()> {
    let database_url = resolve_database_url(database_url, config_path).await?;
    let store = cascadeguard_store::Store::connect(&database_url).await?;

    let csv = match dataset {
        ExportDataset::Signals => store.export_signals_csv(limit).await?,
        ExportDataset::Baselines => store.export_baselines_csv(symbol, limit).await?,
    };

    std::fs::write(output_path, csv)?;
    tracing::info!(output = output_path, "export complete");
    Ok(())
}

async fn run_migrate(config_path: &str, database_url: Option<String>) -> anyhow::Result<()> {
    let database_url = resolve_database_url(database_url, config_path).await?;
    tracing::info!(database_url, "applying store schema");
    cascadeguard_store::Store::connect(&database_url).await?;
    tracing::info!("schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_no_extra_args() {
        let cli = Cli::try_parse_from(["cascadeguard", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { config } if config == "config/Config.toml"));
    }

    #[test]
    fn export_requires_dataset_and_output() {
        let cli = Cli::try_parse_from([
            "cascadeguard",
            "export",
            "signals",
            "--output",
            "signals.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Export { dataset, output, limit, .. } => {
                assert!(matches!(dataset, ExportDataset::Signals));
                assert_eq!(output, "signals.csv");
                assert_eq!(limit, 1000);
            }
            _ => panic!("expected Export command"),
        }
    }

    #[test]
    fn export_without_output_fails() {
        assert!(Cli::try_parse_from(["cascadeguard", "export", "signals"]).is_err());
    }

    #[test]
    fn migrate_accepts_database_url_override() {
        let cli = Cli::try_parse_from([
            "cascadeguard",
            "migrate",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Migrate { database_url: Some(url), .. } if url == "sqlite::memory:"));
    }
}
