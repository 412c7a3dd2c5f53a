//! Engine configuration.
//!
//! There is no global default instance: every connection is handed an explicit
//! [`EngineConfig`], normally built once with [`EngineConfig::builder`] and shared.

use std::time::Duration;

use thiserror::Error;

use crate::throttle::ThrottleConfig;

/// Tunables of the exchange engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    high_watermark: usize,
    low_watermark: usize,
    worker_pool_bound: usize,
    worker_queue_bound: usize,
    drain_limit: u64,
    read_buffer_size: usize,
    expect_continue_timeout: Duration,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Buffered entity bytes at which the producing side is suspended.
    pub fn high_watermark(&self) -> usize {
        self.high_watermark
    }

    /// Buffered entity bytes at which a suspended producer resumes.
    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig { high_watermark: self.high_watermark, low_watermark: self.low_watermark }
    }

    /// Handlers running at the same time.
    pub fn worker_pool_bound(&self) -> usize {
        self.worker_pool_bound
    }

    /// Handlers waiting for a free worker before new ones are rejected.
    pub fn worker_queue_bound(&self) -> usize {
        self.worker_queue_bound
    }

    /// Largest unread request entity that is discarded to keep the connection
    /// open; anything larger closes it instead.
    pub fn drain_limit(&self) -> u64 {
        self.drain_limit
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// How long a client waits for `100 Continue` before sending the entity anyway.
    pub fn expect_continue_timeout(&self) -> Duration {
        self.expect_continue_timeout
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let throttle = ThrottleConfig::default();
        Self {
            high_watermark: throttle.high_watermark,
            low_watermark: throttle.low_watermark,
            worker_pool_bound: 8,
            worker_queue_bound: 64,
            drain_limit: 1024 * 1024,
            read_buffer_size: 8 * 1024,
            expect_continue_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("low watermark {low} must be below high watermark {high}")]
    InvalidWatermarks { low: usize, high: usize },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    fn new() -> Self {
        Self { config: EngineConfig::default() }
    }

    pub fn high_watermark(mut self, high_watermark: usize) -> Self {
        self.config.high_watermark = high_watermark;
        self
    }

    pub fn low_watermark(mut self, low_watermark: usize) -> Self {
        self.config.low_watermark = low_watermark;
        self
    }

    pub fn worker_pool_bound(mut self, worker_pool_bound: usize) -> Self {
        self.config.worker_pool_bound = worker_pool_bound;
        self
    }

    pub fn worker_queue_bound(mut self, worker_queue_bound: usize) -> Self {
        self.config.worker_queue_bound = worker_queue_bound;
        self
    }

    pub fn drain_limit(mut self, drain_limit: u64) -> Self {
        self.config.drain_limit = drain_limit;
        self
    }

    pub fn read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.config.read_buffer_size = read_buffer_size;
        self
    }

    pub fn expect_continue_timeout(mut self, timeout: Duration) -> Self {
        self.config.expect_continue_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let config = self.config;
        if config.high_watermark == 0 {
            return Err(ConfigError::Zero("high_watermark"));
        }
        if config.low_watermark >= config.high_watermark {
            return Err(ConfigError::InvalidWatermarks { low: config.low_watermark, high: config.high_watermark });
        }
        if config.worker_pool_bound == 0 {
            return Err(ConfigError::Zero("worker_pool_bound"));
        }
        if config.read_buffer_size == 0 {
            return Err(ConfigError::Zero("read_buffer_size"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.throttle(), ThrottleConfig::default());
        assert_eq!(config.drain_limit(), 1024 * 1024);
    }

    #[test]
    fn watermarks_must_be_ordered() {
        let err = EngineConfig::builder().high_watermark(100).low_watermark(100).build().unwrap_err();
        assert_eq!(err, ConfigError::InvalidWatermarks { low: 100, high: 100 });

        let config = EngineConfig::builder().high_watermark(100).low_watermark(10).build().unwrap();
        assert_eq!(config.throttle(), ThrottleConfig { high_watermark: 100, low_watermark: 10 });
    }

    #[test]
    fn pool_must_not_be_empty() {
        let err = EngineConfig::builder().worker_pool_bound(0).build().unwrap_err();
        assert_eq!(err, ConfigError::Zero("worker_pool_bound"));
    }
}
