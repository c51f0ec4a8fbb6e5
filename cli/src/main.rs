//! ChainSink CLI: forward state-change batches to an HTTP or WebSocket sink.
//!
//! # Commands
//! ```
//! chainsink run      --endpoint-url <url> | --use-websocket --ws-url <url>
//! chainsink migrate  --database-url <url> [--explorer-statistics] [--log-queries] [--down <n>]
//! chainsink info
//! ```

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use chainsink_core::NetworkParams;

mod cmd_migrate;
mod cmd_run;
mod logging;

use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "chainsink",
    about = "Blockchain state-change sink: ChainSink CLI",
    long_about = "
ChainSink CLI: replay committed state changes to a downstream sink over
HTTP POST or a persistent WebSocket, and apply post-sync schema changesets.

ENVIRONMENT VARIABLES:
  ENDPOINT_URL                   HTTP endpoint batches are POSTed to
  USE_WEBSOCKET / WS_URL         Stream batches over a WebSocket instead
  MIN_BLOCK_HEIGHT               Drop batches that start below this height
  STATE_CHANGE_DIR               Directory holding state_changes.jsonl
  CONSUMER_PROGRESS_DIR          Directory holding checkpoints
  DATABASE_URL                   Postgres URL for `migrate`
  CALCULATE_EXPLORER_STATISTICS  Enable the explorer statistics changesets
  LOG_QUERIES                    Log every SQL statement during `migrate`
",
    version
)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    /// Log level or filter directive
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Per-crate level override, e.g. `chainsink-ws=debug` (repeatable)
    #[arg(long = "log-component", global = true, env = "LOG_COMPONENTS", value_delimiter = ',')]
    log_components: Vec<String>,

    /// Emit JSON logs
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct NetworkArgs {
    /// Use testnet parameters
    #[arg(long, global = true, env = "IS_TESTNET")]
    testnet: bool,

    /// Regtest mode (testnet only)
    #[arg(long, global = true, env = "REGTEST")]
    regtest: bool,

    /// Accelerated regtest (testnet + regtest only)
    #[arg(long, global = true, env = "ACCELERATED_REGTEST")]
    accelerated_regtest: bool,
}

impl NetworkArgs {
    fn params(&self) -> NetworkParams {
        NetworkParams::select(self.testnet, self.regtest, self.accelerated_regtest)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the state-change log into the configured sink
    Run(cmd_run::RunArgs),

    /// Apply (or revert) schema changesets
    Migrate(cmd_migrate::MigrateArgs),

    /// Show version and capabilities
    Info,
}

impl Cli {
    fn log_config(&self) -> Result<LogConfig> {
        let mut cfg = LogConfig {
            level: self.log_level.clone(),
            json: self.log_json,
            ..Default::default()
        };
        for pair in &self.log_components {
            let (component, level) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("--log-component expects <crate>=<level>, got '{pair}'"))?;
            cfg.components.insert(component.trim().into(), level.trim().into());
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config()?);
    let params = cli.network.params();

    match cli.command {
        Commands::Run(args) => cmd_run::run(args, params).await,
        Commands::Migrate(args) => cmd_migrate::run(args).await,
        Commands::Info => cmd_info(&params),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_info(params: &NetworkParams) -> Result<()> {
    println!("ChainSink v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Network:                     {}", params.network);
    println!();
    println!("Capabilities:");
    println!("  ✓ HTTP POST sink           (reqwest, 200-only acceptance)");
    println!("  ✓ WebSocket sink           (tokio-tungstenite, lazy dial, redial on failure)");
    println!("  ✓ Block-height watermark   (MinBlockHeight)");
    println!("  ✓ Transaction modes        (immediate, staged)");
    println!("  ✓ Replay with checkpoints  (JSONL change log, file checkpoints)");
    println!("  ✓ Schema changesets        (sqlx Postgres, transient-error retry)");
    Ok(())
}
