//! pricat-import - main entry point

use anyhow::{bail, Context};
use clap::Parser;
use pricat_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use pricat_common::types::strip_leading_zeros;
use pricat_import::config::Config;
use pricat_import::ftp::{SupplierFileMatcher, TransferClient};
use pricat_import::pipeline::{FeedSource, Pipeline, PipelineOptions, PipelineRun, PipelineServices};
use pricat_import::storage::{EntityStore, MemoryEntityStore, PgEntityStore};
use pricat_import::{Cli, Commands, RunArgs};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("pricat-import")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging not initialized: {}", e);
    }

    match execute_command(&cli).await {
        Ok(true) => {},
        Ok(false) => process::exit(1),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            process::exit(1);
        },
    }
}

/// Returns whether the command succeeded
async fn execute_command(cli: &Cli) -> anyhow::Result<bool> {
    let config = Config::load().context("Invalid configuration")?;

    match &cli.command {
        Commands::Run(args) => run(&config, args).await,

        Commands::Sync { remote_dir, json } => {
            let store = connect_store(&config).await?;
            let client = TransferClient::new(config.source_ftp.clone());
            let outcome = client.sync_suppliers(remote_dir, store.as_ref()).await;

            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "Suppliers: {} created, {} updated, {} unchanged ({} feed files)",
                    outcome.created, outcome.updated, outcome.unchanged, outcome.files_seen
                );
                for e in &outcome.errors {
                    println!("  error: {}", e);
                }
            }
            Ok(outcome.success)
        },

        Commands::ListRemote { remote_dir } => {
            let client = TransferClient::new(config.source_ftp.clone());
            for name in client.list_files(remote_dir).await? {
                println!("{}", name);
            }
            Ok(true)
        },
    }
}

async fn run(config: &Config, args: &RunArgs) -> anyhow::Result<bool> {
    let source = resolve_source(config, args).await?;

    let store: Arc<dyn EntityStore> = if args.dry_run {
        info!("Dry run: master data kept in memory");
        Arc::new(MemoryEntityStore::new())
    } else {
        connect_store(config).await?
    };

    let mut steps = config.pipeline.clone();
    steps.download_images &= !args.no_images;
    steps.export_report &= !args.no_report;
    steps.upload_package &= !args.no_upload;
    steps.trigger_import &= !args.no_trigger;

    let services = PipelineServices::from_config(config, store)?;
    let pipeline = Pipeline::new(services);
    let run = pipeline.run(&PipelineOptions::new(source).with_steps(steps)).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }

    Ok(run.success)
}

async fn resolve_source(config: &Config, args: &RunArgs) -> anyhow::Result<FeedSource> {
    if let Some(path) = &args.local_file {
        return Ok(FeedSource::Local(path.clone()));
    }
    if let Some(remote) = &args.remote_file {
        return Ok(FeedSource::Remote(remote.clone()));
    }
    let Some(supplier) = &args.supplier else {
        bail!("One of --supplier, --remote-file or --local-file is required");
    };

    let number = strip_leading_zeros(supplier);
    let matcher = SupplierFileMatcher::new()?;
    let client = TransferClient::new(config.source_ftp.clone());

    let newest = client
        .list_files("")
        .await?
        .iter()
        .filter_map(|name| matcher.parse(name))
        .filter(|file| file.number == number)
        .reduce(|best, file| if file.is_newer_than(&best) { file } else { best });

    match newest {
        Some(feed) => {
            info!(supplier = %number, file = %feed.file_name, "Selected feed");
            Ok(FeedSource::Remote(feed.file_name))
        },
        None => bail!("No feed for supplier {} on the source FTP", number),
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn EntityStore>> {
    let store = PgEntityStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout(),
    )
    .await
    .context("Failed to connect to the database")?;
    Ok(Arc::new(store))
}

fn print_run(run: &PipelineRun) {
    for step in &run.steps {
        let mark = if step.success { "ok  " } else { "FAIL" };
        println!("[{}] {:<18} {} ({} ms)", mark, step.step.as_str(), step.message, step.duration_ms);
    }
    println!(
        "articles: {}  manufacturers: {}  brands: {}  images: {}",
        run.article_count, run.manufacturer_count, run.brand_count, run.images_downloaded
    );
    if let Some(csv) = &run.target_csv {
        println!("import file: {}", csv.display());
    }
    if !run.errors.is_empty() {
        println!("{} problems:", run.errors.len());
        for e in &run.errors {
            println!("  {}", e);
        }
    }
}
