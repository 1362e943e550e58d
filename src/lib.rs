//! A reactive watcher for the validity of signed off-chain 0x orders.
//!
//! [`Watcher`] tracks a set of orders backed by on-chain balance, allowance
//! and fill/cancel state, and calls a single subscriber back whenever an
//! order's validity may have changed -- on a relevant chain event, on
//! expiration, or on the periodic cleanup sweep. It does not submit,
//! match or persist orders; it only decides when an order is worth
//! re-evaluating and re-evaluates it.
//!
//! The crate treats the chain client, the event-log transport and the
//! order-state evaluator as external collaborators (see [`chain::ChainClient`],
//! [`events::EventSource`] and [`evaluator::OrderEvaluator`]) so it can be
//! exercised end-to-end in tests without a live chain.

#![warn(clippy::all, clippy::pedantic, clippy::cargo, clippy::nursery)]

mod cache;
mod chain;
mod config;
mod dependency_index;
mod dispatcher;
mod emitter;
mod evaluator;
mod events;
mod expiration_queue;
mod orders;
mod utils;
mod watcher;

pub use crate::{
    chain::{ChainClient, StateLayer},
    config::WatcherOptions,
    evaluator::{CacheReader, OrderEvaluator},
    events::{DecodedLog, EventKind, EventSource, UpstreamEventError},
    orders::{Error as OrderError, InvalidReason, Order, OrderState, Signature, SignatureType, SignedOrder},
    watcher::{SubscriptionError, Watcher, WatcherError},
};

#[cfg(feature = "bench")]
pub mod bench {
    use criterion::Criterion;

    #[allow(clippy::wildcard_imports)]
    use super::*;

    pub fn main(criterion: &mut Criterion) {
        utils::recover::bench::group(criterion);
    }
}
