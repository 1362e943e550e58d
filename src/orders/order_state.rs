use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use web3::types::{H256, U256};

/// Why an order currently fails validation.
///
/// Granular on purpose: the cache-invalidation table and the cleanup sweep
/// both distinguish a trade token's balance/allowance from its ZRX fee
/// balance/allowance, so a single `Unfunded` variant would lose information
/// those two components rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    Expired,
    Cancelled,
    FullyFilled,
    InvalidSignature,
    InsufficientMakerBalance,
    InsufficientMakerAllowance,
    InsufficientMakerFeeBalance,
    InsufficientMakerFeeAllowance,
    InsufficientTakerBalance,
    InsufficientTakerAllowance,
    InsufficientTakerFeeBalance,
    InsufficientTakerFeeAllowance,
}

/// The outcome of evaluating a [`crate::SignedOrder`] against a state
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Valid {
        order_hash: H256,
        #[serde(with = "crate::utils::serde::u256_dec")]
        remaining_fillable_taker_asset_amount: U256,
    },
    Invalid {
        order_hash: H256,
        reason: InvalidReason,
    },
}

impl OrderState {
    pub fn order_hash(&self) -> H256 {
        match self {
            Self::Valid { order_hash, .. } | Self::Invalid { order_hash, .. } => *order_hash,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}
