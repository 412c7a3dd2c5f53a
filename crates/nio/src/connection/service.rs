use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::EngineConfig;
use crate::exchange::{ExchangeObserver, ExpectationGate};
use crate::handler::HandlerRegistry;
use crate::interceptor::Interceptors;
use crate::reuse::{ReuseDecider, ReuseStrategy};
use crate::throttle::WorkerPool;

/// Everything the connections of one server share: configuration, handlers,
/// hooks and the worker pool.
pub struct ExchangeService {
    config: EngineConfig,
    registry: Arc<dyn HandlerRegistry>,
    gate: Option<Arc<dyn ExpectationGate>>,
    interceptors: Interceptors,
    observer: Option<Arc<dyn ExchangeObserver>>,
    reuse: Arc<dyn ReuseStrategy>,
    pool: WorkerPool,
    next_exchange_id: AtomicU64,
}

impl ExchangeService {
    pub fn builder<H: HandlerRegistry + 'static>(registry: H) -> ExchangeServiceBuilder {
        ExchangeServiceBuilder::new(Arc::new(registry))
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &dyn HandlerRegistry {
        self.registry.as_ref()
    }

    #[inline]
    pub fn gate(&self) -> Option<&dyn ExpectationGate> {
        self.gate.as_deref()
    }

    #[inline]
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    #[inline]
    pub fn observer(&self) -> Option<&dyn ExchangeObserver> {
        self.observer.as_deref()
    }

    #[inline]
    pub fn reuse(&self) -> &dyn ReuseStrategy {
        self.reuse.as_ref()
    }

    #[inline]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn next_exchange_id(&self) -> u64 {
        self.next_exchange_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for ExchangeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeService")
            .field("config", &self.config)
            .field("gate", &self.gate.is_some())
            .field("interceptors", &self.interceptors)
            .field("observer", &self.observer.is_some())
            .field("pool", &self.pool)
            .finish()
    }
}

pub struct ExchangeServiceBuilder {
    config: EngineConfig,
    registry: Arc<dyn HandlerRegistry>,
    gate: Option<Arc<dyn ExpectationGate>>,
    interceptors: Interceptors,
    observer: Option<Arc<dyn ExchangeObserver>>,
    reuse: Arc<dyn ReuseStrategy>,
}

impl ExchangeServiceBuilder {
    fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self {
            config: EngineConfig::default(),
            registry,
            gate: None,
            interceptors: Interceptors::standard(),
            observer: None,
            reuse: Arc::new(ReuseDecider),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expectation_gate<G: ExpectationGate + 'static>(mut self, gate: G) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Replaces the standard interceptors.
    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn observer<O: ExchangeObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn reuse_strategy<S: ReuseStrategy + 'static>(mut self, reuse: S) -> Self {
        self.reuse = Arc::new(reuse);
        self
    }

    pub fn build(self) -> ExchangeService {
        let pool = WorkerPool::new(self.config.worker_pool_bound(), self.config.worker_queue_bound());
        ExchangeService {
            config: self.config,
            registry: self.registry,
            gate: self.gate,
            interceptors: self.interceptors,
            observer: self.observer,
            reuse: self.reuse,
            pool,
            next_exchange_id: AtomicU64::new(1),
        }
    }
}

impl fmt::Debug for ExchangeServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeServiceBuilder").field("config", &self.config).finish_non_exhaustive()
    }
}
