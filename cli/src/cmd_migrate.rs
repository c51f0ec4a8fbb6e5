//! `chainsink migrate`: apply or revert the post-sync changesets.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use chainsink_migrate::{
    connect_options, post_sync, FeatureFlags, Migrator, PgExecutor, EXPLORER_STATISTICS,
};

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Enable the explorer statistics changesets
    #[arg(long, env = "CALCULATE_EXPLORER_STATISTICS")]
    pub explorer_statistics: bool,

    /// Log every SQL statement at info
    #[arg(long, env = "LOG_QUERIES")]
    pub log_queries: bool,

    /// Revert this many changesets instead of applying
    #[arg(long)]
    pub down: Option<usize>,
}

pub async fn run(args: MigrateArgs) -> Result<()> {
    let flags = FeatureFlags::new().with(EXPLORER_STATISTICS, args.explorer_statistics);
    let set = post_sync().context("registering changesets")?;
    info!(
        changesets = set.len(),
        explorer_statistics = args.explorer_statistics,
        log_queries = args.log_queries,
        "running migrations"
    );

    let options = connect_options(&args.database_url, args.log_queries)
        .context("parsing DATABASE_URL")?;
    let pg = PgExecutor::connect_with(options)
        .await
        .context("connecting to Postgres")?;
    let migrator = Migrator::new(set, flags);

    let report = match args.down {
        Some(steps) => migrator.down(steps, &pg, &pg).await.context("reverting changesets")?,
        None => migrator.up(&pg, &pg).await.context("applying changesets")?,
    };

    println!(
        "{} changeset(s) {}, {} gated off, {} retries",
        report.executed.len(),
        if args.down.is_some() { "reverted" } else { "applied" },
        report.gated.len(),
        report.retries
    );
    Ok(())
}
