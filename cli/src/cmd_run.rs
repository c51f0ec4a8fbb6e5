//! `chainsink run`: replay `state_changes.jsonl` into the configured sink.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use chainsink_core::{
    ChangeLog, DispatcherConfig, EntryDispatcher, FileCheckpointStore, NetworkParams,
    ReplayConfig, ReplayDriver, RetryConfig, TransactionMode,
};
use chainsink_http::HttpPoster;
use chainsink_ws::WsConnector;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// HTTP endpoint batches are POSTed to (takes priority over the WebSocket)
    #[arg(long, env = "ENDPOINT_URL", default_value = "")]
    pub endpoint_url: String,

    /// Stream batches over a WebSocket
    #[arg(long, env = "USE_WEBSOCKET")]
    pub use_websocket: bool,

    /// WebSocket URL
    #[arg(long, env = "WS_URL", default_value = "")]
    pub ws_url: String,

    /// Batches whose first entry is below this height are dropped unsent
    #[arg(long, env = "MIN_BLOCK_HEIGHT", default_value_t = 0)]
    pub min_block_height: u64,

    /// immediate | staged
    #[arg(long, env = "TRANSACTION_MODE", default_value_t = TransactionMode::Immediate)]
    pub transaction_mode: TransactionMode,

    /// Directory containing state_changes.jsonl
    #[arg(long, env = "STATE_CHANGE_DIR", default_value = "/tmp/state-changes")]
    pub state_change_dir: PathBuf,

    /// Directory checkpoints are written to
    #[arg(long, env = "CONSUMER_PROGRESS_DIR", default_value = "/tmp/consumer-progress")]
    pub consumer_progress_dir: PathBuf,

    /// Checkpoint key
    #[arg(long, env = "CONSUMER_ID", default_value = "chainsink")]
    pub consumer_id: String,

    /// Serialized-size budget per batch
    #[arg(long, env = "BATCH_BYTES", default_value_t = 5_000_000)]
    pub batch_bytes: u64,

    /// Worker thread limit handed to the sync engine
    #[arg(long, env = "THREAD_LIMIT", default_value_t = 25)]
    pub thread_limit: usize,

    /// Also consume mempool entries
    #[arg(long, env = "SYNC_MEMPOOL")]
    pub sync_mempool: bool,

    /// Retries per batch before the run fails
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,
}

impl RunArgs {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            endpoint_url: self.endpoint_url.clone(),
            use_websocket: self.use_websocket,
            ws_url: self.ws_url.clone(),
            min_block_height: self.min_block_height,
            transaction_mode: self.transaction_mode,
        }
    }

    fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            consumer_id: self.consumer_id.clone(),
            max_batch_bytes: self.batch_bytes,
            retry: RetryConfig {
                max_retries: self.max_retries,
                ..Default::default()
            },
        }
    }
}

pub async fn run(args: RunArgs, params: NetworkParams) -> Result<()> {
    let config = args.dispatcher_config();

    info!(
        endpoint_url = %config.endpoint_url,
        use_websocket = config.use_websocket,
        ws_url = %config.ws_url,
        min_block_height = config.min_block_height,
        transaction_mode = %config.transaction_mode,
        state_change_dir = %args.state_change_dir.display(),
        consumer_progress_dir = %args.consumer_progress_dir.display(),
        consumer_id = %args.consumer_id,
        batch_bytes = args.batch_bytes,
        thread_limit = args.thread_limit,
        sync_mempool = args.sync_mempool,
        network = %params.network,
        regtest = params.regtest,
        accelerated_regtest = params.accelerated_regtest,
        "resolved configuration"
    );
    if config.sink_kind().is_none() {
        warn!("neither ENDPOINT_URL nor USE_WEBSOCKET is set; every batch will be rejected");
    }

    let poster = HttpPoster::with_defaults().context("building HTTP client")?;
    let mut handler = EntryDispatcher::builder(config)
        .params(params)
        .poster(Arc::new(poster))
        .connector(Box::new(WsConnector::new()))
        .build()
        .context("building dispatcher")?
        .into_handler();

    let log = ChangeLog::open_dir(&args.state_change_dir)
        .await
        .with_context(|| format!("reading change log in {}", args.state_change_dir.display()))?;
    let store = FileCheckpointStore::open(&args.consumer_progress_dir)
        .await
        .with_context(|| format!("opening checkpoints in {}", args.consumer_progress_dir.display()))?;

    let driver = ReplayDriver::new(args.replay_config(), Box::new(store));
    let summary = driver
        .run(&log, handler.as_mut())
        .await
        .context("replay failed")?;

    println!(
        "Replayed {} entries in {} batches (resumed at {}, {} retries)",
        summary.entries, summary.batches, summary.resumed_from, summary.retries
    );
    Ok(())
}
