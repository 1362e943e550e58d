use strum_macros::IntoStaticStr;
use thiserror::Error;

/// Schema-validation failures raised synchronously from [`crate::Watcher::add_order`].
///
/// These mirror the class of errors the 0x order-validator rejects an order
/// for before it is ever handed to an [`crate::OrderEvaluator`].
#[derive(Debug, Error, IntoStaticStr)]
pub enum Error {
    #[error("order makerAddress must not be the zero address")]
    ZeroMaker,
    #[error("order makerTokenAddress must not be the zero address")]
    ZeroMakerToken,
    #[error("order takerTokenAddress must not be the zero address")]
    ZeroTakerToken,
    #[error("order makerAssetAmount cannot be 0")]
    ZeroMakerAmount,
    #[error("order takerAssetAmount cannot be 0")]
    ZeroTakerAmount,
    #[error("order signature must be valid")]
    InvalidSignature,
    #[error("order chainId does not match the watcher's configured network")]
    WrongNetwork,
    #[error("could not reach the chain to resolve the ZRX token address")]
    ChainUnavailable,
}
