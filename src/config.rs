use std::time::Duration;

use structopt::StructOpt;

use crate::chain::StateLayer;

/// Construction-time tunables for a [`crate::Watcher`].
#[derive(Debug, Clone, PartialEq, StructOpt)]
pub struct WatcherOptions {
    /// The block height/finality tag all [`crate::chain::ChainClient`]
    /// reads are pinned to for the lifetime of the watcher.
    #[structopt(long, env = "STATE_LAYER", default_value = "latest")]
    pub state_layer: StateLayer,

    /// How often the [`crate::expiration_queue::ExpirationQueue`] is polled.
    #[structopt(long, env = "ORDER_EXPIRATION_CHECKING_INTERVAL_MS", default_value = "50")]
    pub order_expiration_checking_interval_ms: u64,

    /// Orders fire as expired this many milliseconds before their actual
    /// `expirationTimestampSec`, to absorb polling jitter.
    #[structopt(long, env = "EXPIRATION_MARGIN_MS", default_value = "0")]
    pub expiration_margin_ms: u64,

    /// How often the full-cache-invalidation cleanup sweep runs.
    #[structopt(long, env = "CLEANUP_JOB_INTERVAL_MS", default_value = "3600000")]
    pub cleanup_job_interval_ms: u64,
}

impl WatcherOptions {
    pub fn order_expiration_checking_interval(&self) -> Duration {
        Duration::from_millis(self.order_expiration_checking_interval_ms)
    }

    pub fn cleanup_job_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_job_interval_ms)
    }
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            state_layer: StateLayer::Latest,
            order_expiration_checking_interval_ms: 50,
            expiration_margin_ms: 0,
            cleanup_job_interval_ms: 3_600_000,
        }
    }
}
