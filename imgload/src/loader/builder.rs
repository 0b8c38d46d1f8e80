//! Builder wiring an [`ImageLoader`] together.
//!
//! ```text
//!  strategies ─► StrategyRegistry ─┐
//!  cache ──────────────────────────┼─► Dispatcher ──ChannelSink──► MainContext
//!  connectivity ───────────────────┤        ▲                          │
//!  logger ─────────────────────────┘        └──── DispatcherHandle ◄── LoaderCore
//! ```

use super::inner::{FailureListener, LoaderCore};
use super::ImageLoader;
use crate::cache::{Cache, MemoryCache, DEFAULT_MEMORY_CACHE_SIZE};
use crate::connectivity::{ConnectivityMonitor, ConnectivityObserver};
use crate::delivery::{ChannelSink, MainContext, MainHandler};
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::{LoadError, LoaderError};
use crate::log::{Logger, NoOpLogger, TracingLogger};
use crate::request::Request;
use crate::strategy::{
    AssetStrategy, FileStrategy, LoadStrategy, NetworkStrategy, NetworkStrategyConfig,
    StrategyRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Configures and starts an [`ImageLoader`].
///
/// ```no_run
/// # async fn demo() -> Result<(), imgload::LoaderError> {
/// use imgload::loader::ImageLoader;
///
/// let loader = ImageLoader::builder()
///     .with_memory_cache_size(32 * 1024 * 1024)
///     .with_asset_root("/usr/share/myapp/assets")
///     .start()?;
/// # Ok(())
/// # }
/// ```
pub struct ImageLoaderBuilder {
    dispatcher: DispatcherConfig,
    memory_cache_size: usize,
    cache: Option<Arc<dyn Cache>>,
    network: NetworkStrategyConfig,
    asset_root: Option<PathBuf>,
    strategies: Vec<Arc<dyn LoadStrategy>>,
    builtin_strategies: bool,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    logging_enabled: bool,
    logger: Option<Arc<dyn Logger>>,
    failure_listener: Option<FailureListener>,
}

impl Default for ImageLoaderBuilder {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            memory_cache_size: DEFAULT_MEMORY_CACHE_SIZE,
            cache: None,
            network: NetworkStrategyConfig::default(),
            asset_root: None,
            strategies: Vec::new(),
            builtin_strategies: true,
            connectivity: None,
            logging_enabled: false,
            logger: None,
            failure_listener: None,
        }
    }
}

impl ImageLoaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher = config;
        self
    }

    /// Byte budget of the default memory cache.
    pub fn with_memory_cache_size(mut self, bytes: usize) -> Self {
        self.memory_cache_size = bytes;
        self
    }

    /// Replaces the default memory cache.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_network_config(mut self, config: NetworkStrategyConfig) -> Self {
        self.network = config;
        self
    }

    /// Enables `asset:///` sources resolved under `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Adds a strategy ahead of the built-in ones.
    ///
    /// Strategies are consulted in registration order.
    pub fn with_strategy(mut self, strategy: Arc<dyn LoadStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Leaves out the file, asset and network strategies.
    pub fn without_builtin_strategies(mut self) -> Self {
        self.builtin_strategies = false;
        self
    }

    pub fn with_connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Emits request lifecycle events through `tracing`.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Uses a custom event logger; implies logging enabled.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self.logging_enabled = true;
        self
    }

    /// Called once for every hunter that fails terminally.
    pub fn with_failure_listener(
        mut self,
        listener: impl Fn(&Request, &LoadError) + Send + Sync + 'static,
    ) -> Self {
        self.failure_listener = Some(Arc::new(listener));
        self
    }

    fn registry(&mut self) -> Result<StrategyRegistry, LoaderError> {
        let mut registry = StrategyRegistry::new();
        for strategy in self.strategies.drain(..) {
            registry.register(strategy);
        }

        if self.builtin_strategies {
            registry.register(Arc::new(FileStrategy::new()));
            if let Some(root) = self.asset_root.take() {
                registry.register(Arc::new(AssetStrategy::new(root)));
            }
            let network = NetworkStrategy::new(self.network.clone())
                .map_err(|e| LoaderError::Startup(e.to_string()))?;
            registry.register(Arc::new(network));
        }

        Ok(registry)
    }

    /// Spawns the dispatcher and the main context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut self) -> Result<ImageLoader, LoaderError> {
        let registry = self.registry()?;

        let cache: Arc<dyn Cache> = match self.cache.take() {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::new(self.memory_cache_size)),
        };
        let connectivity: Arc<dyn ConnectivityMonitor> = match self.connectivity.take() {
            Some(monitor) => monitor,
            None => Arc::new(ConnectivityObserver::new()),
        };
        let logger: Arc<dyn Logger> = match (self.logger.take(), self.logging_enabled) {
            (Some(logger), _) => logger,
            (None, true) => Arc::new(TracingLogger::new()),
            (None, false) => Arc::new(NoOpLogger),
        };

        info!(
            strategies = ?registry.names(),
            pool_size = self.dispatcher.pool_size,
            cache_bytes = cache.max_size_bytes(),
            connectivity_permitted = connectivity.has_permission(),
            "Starting image loader"
        );

        let (main_tx, main_rx) = mpsc::unbounded_channel();
        let (dispatcher, handle) = Dispatcher::new(
            self.dispatcher,
            registry,
            Arc::clone(&cache),
            Arc::new(ChannelSink::new(main_tx.clone())),
            connectivity,
            Arc::clone(&logger),
        );

        let core = Arc::new(LoaderCore::new(
            handle,
            main_tx,
            cache,
            logger,
            self.failure_listener,
        ));

        let shutdown = CancellationToken::new();
        let dispatcher_task = dispatcher.spawn(shutdown.clone());
        let handler: Arc<dyn MainHandler> = Arc::clone(&core) as Arc<dyn MainHandler>;
        let main_task = MainContext::new(handler, main_rx).spawn(shutdown.clone());

        Ok(ImageLoader::from_parts(
            core,
            shutdown,
            vec![dispatcher_task, main_task],
        ))
    }
}
