use crate::{
    cache::{
        BlockCache,
        CacheTier,
        MemoryTier,
        RedisClientBackend,
        RedisTier,
    },
    persist::{
        Backoff,
        JobHistory,
        JobOptions,
        PersistJobReceiver,
        PersistQueue,
        spawn_workers,
    },
    service::BlockService,
    store::SledBlockStore,
    transport,
};
use blockmeter_ledger_client::SolanaLedgerClient;
use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Solana JSON-RPC endpoint
    #[arg(
        long,
        env = "SOLANA_RPC_URL",
        default_value = "https://api.mainnet-beta.solana.com"
    )]
    pub rpc_url: String,
    /// Commitment level passed to getBlock
    #[arg(long, env = "SOLANA_COMMITMENT_LEVEL", default_value = "confirmed")]
    pub commitment_level: String,
    /// Api server address
    #[arg(long, env = "BLOCKMETER_LISTEN_ADDR", default_value = "0.0.0.0:3001")]
    pub listen_addr: SocketAddr,
    /// Redis URL for the primary cache tier; memory-only when unset
    #[arg(long, env = "BLOCKMETER_REDIS_URL")]
    pub redis_url: Option<String>,
    /// Cache entry TTL in seconds
    #[arg(long, env = "BLOCKMETER_CACHE_TTL_SECS", default_value = "600")]
    pub cache_ttl_secs: u64,
    /// Max entries held by the in-process cache tier
    #[arg(long, env = "BLOCKMETER_CACHE_MAX_ENTRIES", default_value = "1000")]
    pub cache_max_entries: u64,
    /// Path of the block database
    #[arg(long, env = "BLOCKMETER_DB_PATH", default_value = "blockmeter-db")]
    pub db_path: PathBuf,
    /// Database cache size in bytes
    #[arg(long, env = "BLOCKMETER_DB_CACHE_SIZE", default_value = "1000000")]
    pub db_cache_size: usize,
    /// Number of persistence workers draining the queue
    #[arg(long, env = "BLOCKMETER_PERSIST_WORKERS", default_value = "2")]
    pub persist_workers: usize,
    /// Upsert attempts per persistence job
    #[arg(long, env = "BLOCKMETER_PERSIST_ATTEMPTS", default_value = "3")]
    pub persist_attempts: u32,
    /// Base retry delay in milliseconds, doubled per retry
    #[arg(long, env = "BLOCKMETER_PERSIST_BACKOFF_MS", default_value = "2000")]
    pub persist_backoff_ms: u64,
    /// Log level
    #[arg(long, env = "BLOCKMETER_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Config {
    /// Build the blockmeter application: bind the listener, open the store,
    /// resolve the cache tier set, and wire the service.
    pub async fn build(self) -> anyhow::Result<App> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(listen_addr = ?self.listen_addr, "Listening on address");

        let ledger = SolanaLedgerClient::new(&self.rpc_url, self.commitment_level.clone())?;

        // The tier set is decided once here and never re-resolved per request.
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
        if let Some(redis_url) = &self.redis_url {
            match RedisClientBackend::from_url(redis_url) {
                Ok(backend) => tiers.push(Arc::new(RedisTier::new(backend))),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Redis tier unavailable, continuing with memory tier only"
                    );
                }
            }
        }
        tiers.push(Arc::new(MemoryTier::new(self.cache_max_entries)));
        let cache = BlockCache::new(tiers, Duration::from_secs(self.cache_ttl_secs));

        let store = Arc::new(SledBlockStore::open(&self.db_path, self.db_cache_size)?);
        tracing::info!(db_path = %self.db_path.display(), "Opened block database");

        let (queue, persist_rx) = PersistQueue::new(JobOptions {
            attempts: self.persist_attempts,
            backoff: Backoff::exponential(Duration::from_millis(self.persist_backoff_ms)),
        });
        let history = Arc::new(JobHistory::default());

        let service = BlockService::new(ledger, cache, queue);

        Ok(App {
            listener,
            service,
            store,
            history,
            persist_rx,
            persist_workers: self.persist_workers,
        })
    }
}

/// Fully wired application, ready to serve.
pub struct App {
    pub listener: TcpListener,
    pub service: BlockService<SolanaLedgerClient>,
    store: Arc<SledBlockStore>,
    history: Arc<JobHistory>,
    persist_rx: PersistJobReceiver,
    persist_workers: usize,
}

impl App {
    /// Runs the API server and persistence workers until `cancel` fires,
    /// then drains the workers.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            listener,
            service,
            store,
            history,
            persist_rx,
            persist_workers,
        } = self;

        let workers = spawn_workers(persist_workers, &persist_rx, &store, &history, &cancel);
        drop(persist_rx);
        tracing::debug!(count = persist_workers, "Started persistence workers");

        transport::serve(listener, service, cancel).await?;
        tracing::info!("API server stopped");

        for worker in workers {
            worker.await?;
        }
        tracing::info!("Persistence workers stopped");

        Ok(())
    }
}
