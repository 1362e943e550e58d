//! Inbound decoded on-chain events.
//!
//! Log decoding and ABI handling are out of scope for this crate: an
//! [`EventSource`] implementation hands already-decoded events to the
//! watcher, which only needs to know the taxonomy below to dispatch them.

use async_trait::async_trait;
use thiserror::Error;
use web3::types::{Address, H256, U256};

/// The decoded shape of a log the watcher's [`crate::dispatcher::EventDispatcher`]
/// knows how to react to. Anything else decodes to [`EventKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// ERC20 `Approval(owner, spender, value)`.
    Approval { owner: Address, spender: Address, value: U256 },
    /// ERC20 `Transfer(from, to, value)`.
    Transfer { from: Address, to: Address, value: U256 },
    /// WETH `Deposit(owner, value)`.
    Deposit { owner: Address, value: U256 },
    /// WETH `Withdrawal(owner, value)`.
    Withdrawal { owner: Address, value: U256 },
    /// Exchange `LogFill`, identified down to the order hash.
    LogFill { order_hash: H256 },
    /// Exchange `LogCancel`, identified down to the order hash.
    LogCancel { order_hash: H256 },
    /// Exchange `LogError`. Intentionally ignored rather than surfaced to
    /// subscribers.
    LogError,
    /// Anything the upstream decoder didn't recognize.
    Unknown,
}

/// A single decoded log, tagged with the contract address it was emitted
/// from (the ERC20/WETH/Exchange contract the event concerns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedLog {
    pub contract_address: Address,
    pub kind: EventKind,
}

#[derive(Debug, Error)]
pub enum UpstreamEventError {
    #[error("event source stream ended unexpectedly")]
    Closed,
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// The inbound stream of decoded logs the watcher reacts to.
///
/// Modeled as a pull-based cursor (rather than `futures::Stream`) so it
/// stays object-safe under `#[async_trait]` and can be polled directly from
/// the watcher's own `select!` loop without an intermediate forwarding task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send {
    /// Returns the next decoded log, or `None` once the source is
    /// permanently exhausted.
    async fn next(&mut self) -> Option<Result<DecodedLog, UpstreamEventError>>;
}
