//! shopfetch CLI
//!
//! Builds a per-run session from flags and environment, runs the pull
//! pipeline, and writes the denormalized CSV. This binary is also the
//! outermost error boundary: any fatal failure is logged in full and then
//! emitted on stderr as the JSON error envelope, never as a raw backtrace.

mod export;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use export::CsvExporter;
use shopfetch_common::logging::{init_logging, LogConfig};
use shopfetch_common::{ErrorEnvelope, PullError};
use shopfetch_core::api::AdminClient;
use shopfetch_core::{DataType, ExportOptions, PullConfig, PullRunner, PullStats, Session};

#[derive(Parser)]
#[command(
    name = "shopfetch",
    about = "Catalog export for Shopify-compatible stores",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull catalog data into staging and write a denormalized CSV export
    Pull(PullArgs),
}

#[derive(Args)]
struct PullArgs {
    /// Shop domain, e.g. example.myshopify.com
    #[arg(long)]
    shop: String,

    /// Admin API access token
    #[arg(long, env = "SHOPFETCH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Data types to pull, in enrichment order. Products is required.
    #[arg(long, value_delimiter = ',', default_value = "products")]
    types: Vec<String>,

    /// Expand variant options into separate name/value columns
    #[arg(long)]
    split_option_columns: bool,

    /// Include created/updated timestamp and template columns
    #[arg(long)]
    extra_fields: bool,

    /// Include the variant tax-rate code column
    #[arg(long)]
    tax_codes: bool,

    /// Metafield key to export (namespace.key); repeatable
    #[arg(long = "metafield")]
    metafield_keys: Vec<String>,

    /// Restrict products to one published status (e.g. ACTIVE)
    #[arg(long)]
    status: Option<String>,

    /// Staging database file shared across runs; tables are per-run
    #[arg(long, default_value = "shopfetch-staging.db")]
    staging_db: PathBuf,

    /// Output CSV file
    #[arg(long, short, default_value = "catalog.csv")]
    output: PathBuf,

    /// Keep this run's staging tables instead of dropping them on success
    #[arg(long)]
    keep_staging: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = LogConfig::from_env().and_then(|c| init_logging(&c)) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();
    let Commands::Pull(args) = cli.command;

    match pull(args).await {
        Ok(stats) => {
            println!("Pull completed: {}", stats);
            if stats.has_errors() {
                println!(
                    "Completed with {} recovered record error(s); see logs for detail",
                    stats.total_errors()
                );
            }
        }
        Err(e) => {
            // Full detail goes to the log; the caller gets the envelope.
            tracing::error!(error = %e, code = e.error_code(), "Pull run aborted");
            let envelope = ErrorEnvelope::from_error(&e);
            eprintln!(
                "{}",
                serde_json::to_string(&envelope).unwrap_or_else(|_| {
                    r#"{"error_code":"infrastructure_error","error_message":"An internal error occurred"}"#
                        .to_string()
                })
            );
            std::process::exit(1);
        }
    }
}

async fn pull(args: PullArgs) -> Result<PullStats, PullError> {
    let data_types = args
        .types
        .iter()
        .map(|t| DataType::from_str(t))
        .collect::<Result<Vec<_>, _>>()?;

    let options = ExportOptions {
        split_option_columns: args.split_option_columns,
        include_extra_fields: args.extra_fields,
        include_tax_codes: args.tax_codes,
        metafield_keys: args.metafield_keys,
        status_filter: args.status,
    };

    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let session = Session::new(args.shop, args.access_token, run_id, data_types, options)?;
    let config = PullConfig::from_env()?;

    tracing::info!(
        shop = session.shop_domain(),
        run_id = session.run_id(),
        types = ?session.data_types(),
        "Starting pull run"
    );

    let connect_options = SqliteConnectOptions::new()
        .filename(&args.staging_db)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await?;

    let transport = Arc::new(AdminClient::new(&session, &config)?);
    let runner = PullRunner::new(session, config, pool, transport)?;

    let mut stats = PullStats::new();
    runner.run_modules(&mut stats).await?;

    let exporter = CsvExporter::new(runner.output_fields());
    let mut stream = runner.stream()?;
    let rows = exporter.write_stream(&mut stream, &args.output).await?;

    tracing::info!(
        rows,
        output = %args.output.display(),
        watermark = stream.watermark(),
        "Export written"
    );

    if args.keep_staging {
        tracing::info!(
            staging_db = %args.staging_db.display(),
            prefix = runner.store().prefix(),
            "Keeping staging tables as requested"
        );
    } else {
        runner.teardown().await?;
    }

    Ok(stats)
}
