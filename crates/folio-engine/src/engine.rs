//! The optimization engine.
//!
//! Per request: validate, build the cache key, look it up, and on a miss
//! fetch market data and run preprocessing, constraint compilation, the
//! solve and the analytics as one job on the worker pool. Identical
//! concurrent requests share one job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use folio_config::EngineConfig;
use folio_portfolio::{
    prepare_model, prepare_series, AssetSeries, FrontierPoint, OptimizationRequest,
    OptimizationResult, OptimizerError, ReturnModel,
};
use folio_traits::MarketDataSources;

use crate::builder::OptimizationEngineBuilder;
use crate::cache::SingleFlightCache;
use crate::clock::Clock;
use crate::error::EngineResult;
use crate::key::CacheKey;
use crate::pool::WorkerPool;
use crate::shutdown::GracefulShutdown;
use crate::stats::{EngineStats, StatsSnapshot};

/// Portfolio optimization service.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct OptimizationEngine {
    config: EngineConfig,
    sources: Option<MarketDataSources>,
    results: Arc<SingleFlightCache<OptimizationResult>>,
    frontiers: Arc<SingleFlightCache<Vec<FrontierPoint>>>,
    pool: WorkerPool,
    stats: Arc<EngineStats>,
    shutdown: Arc<GracefulShutdown>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl OptimizationEngine {
    /// Starts building an engine.
    pub fn builder() -> OptimizationEngineBuilder {
        OptimizationEngineBuilder::new()
    }

    pub(crate) fn start(
        config: EngineConfig,
        sources: Option<MarketDataSources>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        let ttl = if config.cache.enabled {
            config.cache.ttl()
        } else {
            Duration::ZERO
        };
        let pool = WorkerPool::new(config.pool.effective_threads(), config.pool.max_queue_depth)?;

        let engine = Self {
            results: Arc::new(SingleFlightCache::new(ttl, Arc::clone(&clock))),
            frontiers: Arc::new(SingleFlightCache::new(ttl, clock)),
            pool,
            stats: Arc::new(EngineStats::new()),
            shutdown: Arc::new(GracefulShutdown::with_defaults()),
            sweeper: Mutex::new(None),
            sources,
            config,
        };
        engine.spawn_sweeper();

        info!(
            threads = engine.pool.threads(),
            max_queue_depth = engine.pool.max_queue_depth(),
            ttl_secs = ttl.as_secs(),
            model_version = %engine.config.model_version,
            "optimization engine started"
        );
        Ok(engine)
    }

    fn spawn_sweeper(&self) {
        if !self.config.cache.enabled {
            return;
        }
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("no async runtime, expired results are only evicted on access");
                return;
            }
        };

        let results = Arc::clone(&self.results);
        let frontiers = Arc::clone(&self.frontiers);
        let mut stop = self.shutdown.subscribe();
        let period = self.config.cache.sweep_interval();

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = results.sweep() + frontiers.sweep();
                        if removed > 0 {
                            debug!(removed, "swept expired results");
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
            debug!("cache sweeper stopped");
        });
        *self.sweeper.lock() = Some(task);
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Optimizes `request` over price histories from the market data provider.
    pub async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> EngineResult<Arc<OptimizationResult>> {
        let outcome = async {
            let _operation = self.admit()?;
            request.validate()?;
            let key = CacheKey::for_request(request, &self.config.model_version)?;
            let (result, lookup) = self
                .results
                .get_or_try_init(&key, || self.compute_optimization(request, &key))
                .await;
            self.stats.record_lookup(lookup);
            debug!(key = %key, ?lookup, "optimize");
            result
        }
        .await;
        self.track(outcome)
    }

    /// Optimizes `request` over caller-supplied moments.
    ///
    /// No provider is consulted; benchmark metrics are not computed.
    pub async fn optimize_model(
        &self,
        model: &ReturnModel,
        request: &OptimizationRequest,
    ) -> EngineResult<Arc<OptimizationResult>> {
        let outcome = async {
            let _operation = self.admit()?;
            request.validate()?;
            let key = CacheKey::for_model(request, model, &self.config.model_version)?;
            let (result, lookup) = self
                .results
                .get_or_try_init(&key, || self.compute_model(model, request, &key))
                .await;
            self.stats.record_lookup(lookup);
            debug!(key = %key, ?lookup, "optimize_model");
            result
        }
        .await;
        self.track(outcome)
    }

    /// Sweeps the efficient frontier of the requested assets.
    ///
    /// `points` defaults to the configured frontier resolution. Dropping the
    /// returned future, or shutting the engine down, stops a sweep in
    /// progress at its next point.
    pub async fn frontier(
        &self,
        request: &OptimizationRequest,
        points: Option<usize>,
    ) -> EngineResult<Arc<Vec<FrontierPoint>>> {
        let points = points.unwrap_or(self.config.analytics.solver.frontier_points);
        let outcome = async {
            let _operation = self.admit()?;
            request.validate()?;
            let key = CacheKey::for_frontier(request, points, &self.config.model_version)?;
            let (result, lookup) = self
                .frontiers
                .get_or_try_init(&key, || self.compute_frontier(request, points, &key))
                .await;
            self.stats.record_lookup(lookup);
            debug!(key = %key, ?lookup, points, "frontier");
            result
        }
        .await;
        self.track(outcome)
    }

    fn admit(&self) -> EngineResult<crate::shutdown::OperationGuard<'_>> {
        self.stats.record_request();
        self.shutdown.enter()
    }

    fn track<T>(&self, outcome: EngineResult<T>) -> EngineResult<T> {
        if let Err(e) = &outcome {
            self.stats.record_error(e);
            warn!(code = %e.code(), error = %e, "request failed");
        }
        outcome
    }

    // =========================================================================
    // COMPUTATIONS
    // =========================================================================

    async fn compute_optimization(
        &self,
        request: &OptimizationRequest,
        key: &CacheKey,
    ) -> EngineResult<OptimizationResult> {
        let started = Instant::now();
        let series = self.fetch_series(request).await?;
        let benchmark = self.fetch_benchmark(request).await?;

        let request = request.clone();
        let analytics = self.config.analytics.clone();
        let version = self.config.model_version.clone();
        let stats = Arc::clone(&self.stats);

        let result = self
            .pool
            .run(move || {
                let prepared = prepare_series(&series, &request, &analytics)?;
                stats.record_solve();
                prepared.optimize(&request, benchmark.as_ref(), &analytics, &version)
            })
            .await?;

        info!(
            key = %key,
            method = %result.method,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "optimization computed"
        );
        Ok(result)
    }

    async fn compute_model(
        &self,
        model: &ReturnModel,
        request: &OptimizationRequest,
        key: &CacheKey,
    ) -> EngineResult<OptimizationResult> {
        let model = model.clone();
        let request = request.clone();
        let analytics = self.config.analytics.clone();
        let version = self.config.model_version.clone();
        let stats = Arc::clone(&self.stats);

        let result = self
            .pool
            .run(move || {
                let prepared = prepare_model(&model, &request)?;
                stats.record_solve();
                prepared.optimize(&request, None, &analytics, &version)
            })
            .await?;

        info!(key = %key, method = %result.method, "optimization computed");
        Ok(result)
    }

    async fn compute_frontier(
        &self,
        request: &OptimizationRequest,
        points: usize,
        key: &CacheKey,
    ) -> EngineResult<Vec<FrontierPoint>> {
        let series = self.fetch_series(request).await?;

        let cancel = CancelOnDrop::default();
        let cancelled = cancel.flag();
        let shutdown = Arc::clone(&self.shutdown);
        let request = request.clone();
        let analytics = self.config.analytics.clone();
        let stats = Arc::clone(&self.stats);

        let frontier = self
            .pool
            .run(move || {
                let prepared = prepare_series(&series, &request, &analytics)?;
                stats.record_solve();
                prepared.frontier(points, &analytics, || {
                    cancelled.load(Ordering::Relaxed) || shutdown.is_shutting_down()
                })
            })
            .await?;

        info!(key = %key, points = frontier.len(), "frontier computed");
        Ok(frontier)
    }

    // =========================================================================
    // MARKET DATA
    // =========================================================================

    fn sources(&self) -> EngineResult<&MarketDataSources> {
        self.sources
            .as_ref()
            .ok_or_else(|| OptimizerError::market_data("no market data provider configured"))
    }

    async fn fetch_series(&self, request: &OptimizationRequest) -> EngineResult<Vec<AssetSeries>> {
        let symbols = request.canonical_symbols();
        let series = self
            .sources()?
            .series
            .fetch_series(&symbols, request.lookback.as_ref())
            .await?;

        if let Some(missing) = symbols
            .iter()
            .find(|s| !series.iter().any(|x| x.symbol() == s.as_str()))
        {
            return Err(OptimizerError::market_data(format!(
                "no price history for {}",
                missing
            )));
        }
        Ok(series)
    }

    async fn fetch_benchmark(
        &self,
        request: &OptimizationRequest,
    ) -> EngineResult<Option<AssetSeries>> {
        let symbol = match &request.benchmark {
            Some(symbol) => symbol,
            None => return Ok(None),
        };
        let provider = self
            .sources()?
            .benchmarks
            .as_ref()
            .ok_or_else(|| OptimizerError::market_data("no benchmark provider configured"))?;
        let series = provider
            .fetch_benchmark(symbol, request.lookback.as_ref())
            .await?;
        Ok(Some(series))
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The solver pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of stored results, optimizations and frontiers together.
    pub fn cached_results(&self) -> usize {
        self.results.len() + self.frontiers.len()
    }

    /// Drops every stored result.
    pub fn clear_cache(&self) {
        self.results.clear();
        self.frontiers.clear();
        info!("result cache cleared");
    }

    /// Evicts expired results now and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.results.sweep() + self.frontiers.sweep()
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Stops accepting requests, cancels running frontier sweeps, waits
    /// for in-flight requests and stops the background sweeper.
    pub async fn shutdown(&self) {
        self.shutdown.close();
        self.shutdown.drain().await;

        let sweeper = self.sweeper.lock().take();
        if let Some(task) = sweeper {
            let _ = task.await;
        }
        info!(stats = ?self.stats(), "optimization engine stopped");
    }
}

impl Drop for OptimizationEngine {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for OptimizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationEngine")
            .field("model_version", &self.config.model_version)
            .field("pool", &self.pool)
            .field("cached_results", &self.cached_results())
            .field("sources", &self.sources)
            .finish()
    }
}

/// Raises a flag when the computation that owns it is dropped.
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
