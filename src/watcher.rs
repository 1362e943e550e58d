//! The facade: owns the watched-order set, the dependency index, the
//! emitted-state memo and the expiration queue, and drives the watcher's
//! `Idle -> Running -> Idle` lifecycle.
//!
//! Scheduling model: conceptually single-threaded cooperative. Here that's
//! realized as one `tokio::sync::Mutex<State>` that every mutating
//! operation holds for its entire duration, including any evaluator/chain
//! awaits nested inside it — so two operations never observe the data
//! model mid-mutation. The subscriber handle itself lives behind a
//! *separate*, synchronous `std::sync::Mutex` ([`SubscriptionSlot`])
//! specifically so that a subscriber callback invoked from inside a locked
//! [`State`] can call back into [`Watcher::unsubscribe`] without
//! deadlocking on the lock it's already holding ("unsubscribe during
//! dispatch").

use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, register_histogram, register_int_counter, register_int_counter_vec,
    Histogram, IntCounter, IntCounterVec,
};
use thiserror::Error;
use tokio::{sync::Mutex as AsyncMutex, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use web3::types::{Address, H256};

use crate::{
    cache::LazyStateCache,
    chain::ChainClient,
    config::WatcherOptions,
    dependency_index::DependencyIndex,
    dispatcher::EventDispatcher,
    emitter::StateDiffEmitter,
    evaluator::OrderEvaluator,
    events::EventSource,
    expiration_queue::ExpirationQueue,
    orders::{self, InvalidReason, OrderState, SignedOrder},
    utils::now_ms,
};

static CLEANUP_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "watcher_cleanup_duration_seconds",
        "Time taken by a single periodic cleanup sweep.",
        exponential_buckets(0.001, 2.0, 14).unwrap()
    )
    .unwrap()
});
static EXPIRATION_FIRES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "watcher_expiration_fires_total",
        "Orders removed because their expiration (minus safety margin) elapsed."
    )
    .unwrap()
});
static EMITTED_STATE: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "watcher_emitted_state_total",
        "Order states delivered to the subscriber, by outcome.",
        &["outcome"]
    )
    .unwrap()
});
static ORDERS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "watcher_orders_added_total",
        "Orders inserted into the watched set via add_order (including re-adds)."
    )
    .unwrap()
});

/// Errors delivered to the subscriber in place of an [`OrderState`]. Never
/// raised synchronously from a public method — those use [`orders::Error`]
/// or [`SubscriptionError`] instead.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("event source was exhausted")]
    UpstreamClosed,
    #[error("event source reported an error")]
    Upstream(#[source] anyhow::Error),
    #[error("chain read failed while evaluating an order")]
    Evaluation(#[source] anyhow::Error),
    #[error("chain read failed during the periodic cleanup sweep")]
    Cleanup(#[source] anyhow::Error),
}

/// Raised synchronously from [`Watcher::subscribe`]/[`Watcher::unsubscribe`]
/// when the subscription state doesn't allow the requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("a subscriber is already attached")]
    AlreadyPresent,
    #[error("no subscriber is attached")]
    NotFound,
}

type CallbackFn = dyn Fn(Result<OrderState, WatcherError>) + Send + Sync;

struct Subscription {
    callback: Arc<CallbackFn>,
    tasks: Vec<JoinHandle<()>>,
}

/// Holds the single subscriber callback (if any) behind a plain
/// [`std::sync::Mutex`] so it can be read/cleared without `.await`, and
/// therefore without risk of deadlocking against the `State` lock a
/// callback may be invoked underneath.
#[derive(Default)]
pub(crate) struct SubscriptionSlot(std::sync::Mutex<Option<Subscription>>);

impl SubscriptionSlot {
    /// The active callback, if a subscriber is attached. Cloning the `Arc`
    /// is the only thing done under the lock.
    pub(crate) fn callback(&self) -> Option<Arc<CallbackFn>> {
        self.0.lock().unwrap().as_ref().map(|s| Arc::clone(&s.callback))
    }

    /// Installs `callback` as the sole subscriber, spawning its background
    /// tasks via `spawn_tasks` only once the slot is confirmed free. Holding
    /// the lock across the check and the spawn (rather than spawning first
    /// and checking after) means a rejected `subscribe` never spawns a
    /// duplicate event/expiration/cleanup loop in the first place.
    pub(crate) fn install<F>(&self, callback: Arc<CallbackFn>, spawn_tasks: F) -> Result<(), SubscriptionError>
    where
        F: FnOnce() -> Vec<JoinHandle<()>>,
    {
        let mut guard = self.0.lock().unwrap();
        if guard.is_some() {
            return Err(SubscriptionError::AlreadyPresent);
        }
        let tasks = spawn_tasks();
        *guard = Some(Subscription { callback, tasks });
        Ok(())
    }

    fn take(&self) -> Result<Subscription, SubscriptionError> {
        self.0.lock().unwrap().take().ok_or(SubscriptionError::NotFound)
    }

    /// Tears the subscription down (if any) and delivers `error` to the
    /// departing callback. A fatal error always unsubscribes.
    pub(crate) fn fail(&self, error: WatcherError) {
        if let Ok(sub) = self.take() {
            warn!(%error, "watcher subscription torn down by error");
            (sub.callback)(Err(error));
            for task in sub.tasks {
                task.abort();
            }
        }
    }
}

/// The mutable data model: watched orders, the emitted-state memo, the
/// dependency index and the expiration queue. Always accessed through
/// [`WatcherInner::state`].
#[derive(Default)]
struct State {
    watched: HashMap<H256, SignedOrder>,
    memo: HashMap<H256, OrderState>,
    dependencies: DependencyIndex,
    expiration: ExpirationQueue,
}

impl State {
    fn insert_order(&mut self, order: SignedOrder, hash: H256, zrx: Address) {
        let maker = order.order.maker_address;
        let maker_token = order.order.maker_token_address;
        let expiration_ms = order.order.expiration_timestamp_sec.saturating_mul(1000);
        self.watched.insert(hash, order);
        self.dependencies.add(maker, maker_token, hash);
        self.dependencies.add(maker, zrx, hash);
        self.expiration.add(hash, expiration_ms);
        ORDERS_ADDED.inc();
    }

    /// Common teardown shared by the public `remove_order` and the
    /// expiration-fire path. No-op if `hash` isn't watched.
    fn remove_order(&mut self, hash: H256, zrx: Address) -> Option<SignedOrder> {
        let order = self.watched.remove(&hash)?;
        self.memo.remove(&hash);
        self.dependencies
            .remove(order.order.maker_address, order.order.maker_token_address, hash);
        self.dependencies.remove(order.order.maker_address, zrx, hash);
        self.expiration.remove(&hash);
        Some(order)
    }

    async fn dispatch_log(&mut self, inner: &WatcherInner, log: crate::events::DecodedLog) {
        let candidates =
            EventDispatcher::dispatch(&inner.cache, &self.dependencies, &self.watched, log);
        if candidates.is_empty() {
            return;
        }
        StateDiffEmitter::emit(
            &candidates,
            &self.watched,
            &mut self.memo,
            &inner.cache,
            inner.evaluator.as_ref(),
            &inner.subscription,
        )
        .await;
    }

    async fn expire(&mut self, inner: &WatcherInner, hash: H256) {
        let zrx = match inner.cache.zrx_token_address().await {
            Ok(addr) => addr,
            Err(error) => {
                inner.subscription.fail(WatcherError::Evaluation(error));
                return;
            }
        };
        if self.remove_order(hash, zrx).is_none() {
            // Already gone (e.g. removed concurrently) -- nothing to fire.
            return;
        }
        EXPIRATION_FIRES.inc();
        let state = OrderState::Invalid {
            order_hash: hash,
            reason:     InvalidReason::Expired,
        };
        // The memo entry for `hash` was just purged by `remove_order`, so
        // the usual diff-against-memo comparison doesn't apply here; the
        // expiration just fires unconditionally.
        if let Some(callback) = inner.subscription.callback() {
            EMITTED_STATE.with_label_values(&["expired"]).inc();
            callback(Ok(state));
        }
    }

    async fn cleanup(&mut self, inner: &WatcherInner) {
        let _timer = CLEANUP_DURATION.start_timer();
        let hashes: Vec<H256> = self.watched.keys().copied().collect();
        debug!(count = hashes.len(), "running periodic cleanup sweep");
        let zrx = match inner.cache.zrx_token_address().await {
            Ok(addr) => addr,
            Err(error) => {
                inner.subscription.fail(WatcherError::Cleanup(error));
                return;
            }
        };
        for hash in &hashes {
            if let Some(order) = self.watched.get(hash) {
                invalidate_order_cache(&inner.cache, order, zrx);
            }
        }
        StateDiffEmitter::emit(
            &hashes,
            &self.watched,
            &mut self.memo,
            &inner.cache,
            inner.evaluator.as_ref(),
            &inner.subscription,
        )
        .await;
    }
}

/// Clears every cache entry the periodic cleanup sweep names for a single
/// order: maker's balance/allowance on its maker token, taker's
/// balance/allowance on the taker token, the ZRX pair for whichever side
/// pays a non-zero fee, and the order's own filled/cancelled amounts.
fn invalidate_order_cache(cache: &LazyStateCache, order: &SignedOrder, zrx: Address) {
    let o = &order.order;
    cache.delete_balance(o.maker_token_address, o.maker_address);
    cache.delete_allowance(o.maker_token_address, o.maker_address);
    cache.delete_balance(o.taker_token_address, o.taker_address);
    cache.delete_allowance(o.taker_token_address, o.taker_address);
    if !o.maker_fee.is_zero() {
        cache.delete_balance(zrx, o.maker_address);
        cache.delete_allowance(zrx, o.maker_address);
    }
    if !o.taker_fee.is_zero() {
        cache.delete_balance(zrx, o.taker_address);
        cache.delete_allowance(zrx, o.taker_address);
    }
    cache.delete_filled(order.hash());
    cache.delete_cancelled(order.hash());
}

struct WatcherInner {
    chain:        Arc<dyn ChainClient>,
    evaluator:    Arc<dyn OrderEvaluator>,
    event_source: AsyncMutex<Box<dyn EventSource>>,
    cache:        LazyStateCache,
    options:      WatcherOptions,
    network_id:   u64,
    subscription: SubscriptionSlot,
    state:        AsyncMutex<State>,
}

/// The reactive order-validity watcher: a cheaply-cloneable handle (an
/// `Arc` of shared state) over one watched-order set, one dependency
/// index, one cache and at most one subscriber at a time.
///
/// Multiple independent `Watcher`s never share a cache or index, because
/// each owns its own [`WatcherInner`].
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Constructs an `Idle` watcher. No background task runs, and no chain
    /// read happens, until [`Self::subscribe`] is called.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        evaluator: Arc<dyn OrderEvaluator>,
        event_source: Box<dyn EventSource>,
        network_id: u64,
        options: WatcherOptions,
    ) -> Self {
        let cache = LazyStateCache::new(Arc::clone(&chain), options.state_layer);
        let inner = Arc::new(WatcherInner {
            chain,
            evaluator,
            event_source: AsyncMutex::new(event_source),
            cache,
            options,
            network_id,
            subscription: SubscriptionSlot::default(),
            state: AsyncMutex::new(State::default()),
        });
        Self { inner }
    }

    /// Schema-validates the order, rejects it if it targets another chain,
    /// verifies the maker's signature, then atomically adds it to the
    /// watched set, dependency index and expiration queue. Idempotent:
    /// re-adding an already-watched hash refreshes the dependency/expiration
    /// entries without duplicating the order itself.
    ///
    /// The chain-id check runs ahead of signature recovery: it's a plain
    /// integer comparison, cheaper than an EC recovery, and an order signed
    /// for chain A is never going to pass validation here just because it
    /// also fails for some other reason.
    pub async fn add_order(&self, order: SignedOrder) -> Result<(), orders::Error> {
        order.order.validate()?;
        if order.order.chain_id != self.inner.network_id {
            return Err(orders::Error::WrongNetwork);
        }
        order.validate_signature()?;
        let hash = order.hash();
        let zrx = self
            .inner
            .cache
            .zrx_token_address()
            .await
            .map_err(|_| orders::Error::ChainUnavailable)?;
        let mut state = self.inner.state.lock().await;
        trace!(?hash, "adding order to watched set");
        state.insert_order(order, hash, zrx);
        Ok(())
    }

    /// No-op if `order_hash` isn't watched. Otherwise removes it from the
    /// watched set, the emitted-state memo, the dependency index and the
    /// expiration queue.
    pub async fn remove_order(&self, order_hash: H256) {
        let zrx = match self.inner.cache.zrx_token_address().await {
            Ok(addr) => addr,
            Err(error) => {
                warn!(%error, "could not resolve ZRX address while removing an order");
                return;
            }
        };
        let mut state = self.inner.state.lock().await;
        if state.remove_order(order_hash, zrx).is_some() {
            trace!(?order_hash, "removed order from watched set");
        }
    }

    /// `Idle -> Running`. Attaches the event-source listener, the
    /// expiration listener and starts the periodic cleanup timer. Fails
    /// with [`SubscriptionError::AlreadyPresent`] if already `Running`.
    pub fn subscribe<F>(&self, callback: F) -> Result<(), SubscriptionError>
    where
        F: Fn(Result<OrderState, WatcherError>) + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.subscription.install(Arc::new(callback), move || {
            vec![
                tokio::spawn(Self::run_event_loop(Arc::clone(&inner))),
                tokio::spawn(Self::run_expiration_loop(Arc::clone(&inner))),
                tokio::spawn(Self::run_cleanup_loop(Arc::clone(&inner))),
            ]
        })?;
        info!("watcher subscription attached");
        Ok(())
    }

    /// `Running -> Idle`. Synchronous from the caller's perspective: by the
    /// time this returns, both listeners are detached and the cleanup
    /// timer is stopped. The watched set, dependency index, memo and
    /// expiration queue are left untouched so a later `subscribe` resumes
    /// the same watched set; only the cache is cleared.
    pub fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        let sub = self.inner.subscription.take()?;
        for task in sub.tasks {
            task.abort();
        }
        self.inner.cache.delete_all();
        info!("watcher subscription detached");
        Ok(())
    }

    async fn run_event_loop(inner: Arc<WatcherInner>) {
        loop {
            let next = {
                let mut source = inner.event_source.lock().await;
                source.next().await
            };
            match next {
                None => {
                    inner.subscription.fail(WatcherError::UpstreamClosed);
                    return;
                }
                Some(Err(error)) => {
                    inner.subscription.fail(WatcherError::Upstream(error.into()));
                    return;
                }
                Some(Ok(log)) => {
                    let mut state = inner.state.lock().await;
                    state.dispatch_log(&inner, log).await;
                }
            }
        }
    }

    async fn run_expiration_loop(inner: Arc<WatcherInner>) {
        let mut ticker = tokio::time::interval(inner.options.order_expiration_checking_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = now_ms();
            let mut state = inner.state.lock().await;
            let due = state.expiration.pop_due(now, inner.options.expiration_margin_ms);
            for hash in due {
                state.expire(&inner, hash).await;
            }
        }
    }

    /// "Exclude-if-running": `tokio::time::interval`'s `Skip` policy drops
    /// any ticks that elapse while the previous sweep is still awaited,
    /// rather than queuing a backlog.
    async fn run_cleanup_loop(inner: Arc<WatcherInner>) {
        let mut ticker = tokio::time::interval(inner.options.cleanup_job_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let mut state = inner.state.lock().await;
            state.cleanup(&inner).await;
        }
    }
}
