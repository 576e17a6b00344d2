mod cli;

use shutterbox::config;
use shutterbox::render::{self, RenderQueue, ResizeStep};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sb_core::ImageId;
use sb_db::pool::init_pool;
use sb_db::queries::{images, sync_runs};
use sb_metadata::{ExiftoolReader, MetadataReader};
use sb_sync::{run_sync, SyncOptions};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise info (debug with --verbose)
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Sync { cleanup, force } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sync(config_path, cleanup, force))
        }
        Commands::Validate => validate_config(config_path),
        Commands::Render { image } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(render_image(config_path, &image))
        }
        Commands::Runs { limit } => list_runs(config_path, limit),
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            token.cancel();
        }
    });
}

async fn sync(config_path: Option<&Path>, cleanup: bool, force: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::require_roots(&config)?;

    let pool = init_pool(&config.database.path).with_context(|| {
        format!("Failed to open database: {}", config.database.path.display())
    })?;
    let exiftool = Arc::new(
        ExiftoolReader::from_config(&config.sync.exiftool, config.sync.metadata_fields())
            .context("Failed to set up metadata reader")?,
    );
    let reader: Arc<dyn MetadataReader> = exiftool.clone();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let options = SyncOptions::from_config(&config, cleanup, force);
    let result = run_sync(&config, &pool, reader, options, cancel).await;
    if let Err(e) = exiftool.shutdown().await {
        tracing::warn!(error = %e, "exiftool did not shut down cleanly");
    }
    let report = result.context("Sync failed")?;

    println!("Sync {} ({})", report.run_id, report.mode);
    if report.force {
        println!("  Forced refresh");
    }
    println!("  Seen:        {}", report.seen);
    println!("  New:         {}", report.new);
    println!("  Dirty:       {}", report.dirty);
    println!("  Unchanged:   {}", report.unchanged);
    println!("  Filtered:    {}", report.filtered);
    println!("  Persisted:   {}", report.persisted);
    println!("  Touched:     {}", report.touched);
    println!("  Deleted:     {}", report.deleted);
    if report.extract_failed + report.write_failed > 0 {
        println!(
            "  Skipped:     {} (extraction {}, write {})",
            report.extract_failed + report.write_failed,
            report.extract_failed,
            report.write_failed
        );
    }

    Ok(())
}

async fn render_image(config_path: Option<&Path>, image: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if config.derivatives.is_empty() {
        anyhow::bail!("No derivatives configured");
    }

    let id: ImageId = image
        .parse()
        .with_context(|| format!("Invalid image id: {}", image))?;
    let pool = init_pool(&config.database.path)?;
    let record = {
        let conn = pool.get().context("Failed to get database connection")?;
        images::get_image(&conn, id)?.ok_or_else(|| anyhow::anyhow!("Image not found: {}", id))?
    };

    let job = render::job_for_image(&config, &record)?;
    let step = Arc::new(ResizeStep::new(&config.filesystem.derivatives));
    let queue = Arc::new(RenderQueue::new(step.clone(), config.render.workers));
    queue.submit(job)?;
    queue.close();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    queue.run(cancel).await;

    for task in &config.derivatives {
        let path = step.target_path(&task.name, &id.to_string());
        if path.exists() {
            println!("{}: {}", task.name, path.display());
        } else {
            println!("{}: not rendered", task.name);
        }
    }
    Ok(())
}

fn list_runs(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = init_pool(&config.database.path)?;
    let conn = pool.get().context("Failed to get database connection")?;

    let runs = sync_runs::list_recent(&conn, limit)?;
    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<11} {:<8} seen={} updated={} deleted={}{}  {}",
            run.id,
            run.mode.as_str(),
            run.status.as_str(),
            run.totals.seen,
            run.totals.updated,
            run.totals.deleted,
            if run.force { " forced" } else { "" },
            run.started_at
        );
        if let Some(error) = run.error {
            println!("    error: {}", error);
        }
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file specified, probing default locations"),
    }
    let config = config::load_config_or_default(path)?;
    println!("✓ Configuration is valid");
    println!("  Database: {}", config.database.path.display());
    println!("  Roots: {}", config.filesystem.roots.len());
    for (name, root) in &config.filesystem.roots {
        println!("    {}: {}", name, root.root.display());
    }
    println!("  Path filters: {}", config.sync.paths.len());
    println!("  ACL rules: {}", config.sync.acl.len());
    println!("  Metadata fields: {}", config.sync.metadata_fields().len());
    println!("  Schema hash: {}", config.sync.metadata_hash()?);
    println!("  Derivatives: {}", config.derivatives.len());
    Ok(())
}
