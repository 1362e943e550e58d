use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use web3::types::{Address, Recovery, RecoveryMessage, H256, U256};

use super::{Error, SignatureType};
use crate::{require, utils::recover};

const ETH_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

static NAME_HASH: Lazy<[u8; 32]> = Lazy::new(|| keccak(b"ZeroEx"));
static VERSION_HASH: Lazy<[u8; 32]> = Lazy::new(|| keccak(b"1.0.0"));
static EIP712_DOMAIN_TYPE_HASH: Lazy<[u8; 32]> = Lazy::new(|| {
    keccak(b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)")
});
static ORDER_TYPE_HASH: Lazy<[u8; 32]> = Lazy::new(|| {
    keccak(
        b"Order(address makerAddress,address takerAddress,address feeRecipientAddress,address \
          senderAddress,address makerTokenAddress,address takerTokenAddress,uint256 \
          makerAssetAmount,uint256 takerAssetAmount,uint256 makerFee,uint256 takerFee,uint256 \
          expirationTimeSeconds,uint256 salt)",
    )
});

fn keccak(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn word_address(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn word_u256(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// A 0x v2 style limit order.
///
/// Most fields are opaque to the watcher core; only `maker_address`,
/// `taker_address`, `maker_token_address`, `taker_token_address`,
/// `maker_fee`, `taker_fee` and `expiration_timestamp_sec` drive the
/// dependency index, cache invalidation and expiration queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub maker_address: Address,
    pub taker_address: Address,
    pub fee_recipient_address: Address,
    pub sender_address: Address,
    pub maker_token_address: Address,
    pub taker_token_address: Address,
    #[serde(with = "crate::utils::serde::u256_dec")]
    pub maker_asset_amount: U256,
    #[serde(with = "crate::utils::serde::u256_dec")]
    pub taker_asset_amount: U256,
    #[serde(with = "crate::utils::serde::u256_dec")]
    pub maker_fee: U256,
    #[serde(with = "crate::utils::serde::u256_dec")]
    pub taker_fee: U256,
    pub expiration_timestamp_sec: u64,
    #[serde(with = "crate::utils::serde::u256_dec")]
    pub salt: U256,
    pub exchange_address: Address,
    pub chain_id: u64,
}

impl Order {
    /// EIP-712 hash of the order, used as the key under which the watcher
    /// tracks it.
    pub fn hash(&self) -> H256 {
        let mut domain_preimage = Vec::with_capacity(32 * 4);
        domain_preimage.extend_from_slice(&*EIP712_DOMAIN_TYPE_HASH);
        domain_preimage.extend_from_slice(&*NAME_HASH);
        domain_preimage.extend_from_slice(&*VERSION_HASH);
        domain_preimage.extend_from_slice(&word_u256(U256::from(self.chain_id)));
        domain_preimage.extend_from_slice(&word_address(self.exchange_address));
        let domain_hash = keccak(&domain_preimage);

        let mut struct_preimage = Vec::with_capacity(32 * 13);
        struct_preimage.extend_from_slice(&*ORDER_TYPE_HASH);
        struct_preimage.extend_from_slice(&word_address(self.maker_address));
        struct_preimage.extend_from_slice(&word_address(self.taker_address));
        struct_preimage.extend_from_slice(&word_address(self.fee_recipient_address));
        struct_preimage.extend_from_slice(&word_address(self.sender_address));
        struct_preimage.extend_from_slice(&word_address(self.maker_token_address));
        struct_preimage.extend_from_slice(&word_address(self.taker_token_address));
        struct_preimage.extend_from_slice(&word_u256(self.maker_asset_amount));
        struct_preimage.extend_from_slice(&word_u256(self.taker_asset_amount));
        struct_preimage.extend_from_slice(&word_u256(self.maker_fee));
        struct_preimage.extend_from_slice(&word_u256(self.taker_fee));
        struct_preimage.extend_from_slice(&word_u256(U256::from(self.expiration_timestamp_sec)));
        struct_preimage.extend_from_slice(&word_u256(self.salt));
        let struct_hash = keccak(&struct_preimage);

        let mut preimage = Vec::with_capacity(2 + 32 + 32);
        preimage.extend_from_slice(b"\x19\x01");
        preimage.extend_from_slice(&domain_hash);
        preimage.extend_from_slice(&struct_hash);
        H256::from(keccak(&preimage))
    }

    pub fn validate(&self) -> Result<(), Error> {
        require!(self.maker_address != Address::zero(), Error::ZeroMaker);
        require!(
            self.maker_token_address != Address::zero(),
            Error::ZeroMakerToken
        );
        require!(
            self.taker_token_address != Address::zero(),
            Error::ZeroTakerToken
        );
        require!(!self.maker_asset_amount.is_zero(), Error::ZeroMakerAmount);
        require!(!self.taker_asset_amount.is_zero(), Error::ZeroTakerAmount);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub signature_type: SignatureType,
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

impl Signature {
    /// Recover the signer from a signature.
    /// See <https://github.com/0xProject/protocol/blob/835ee4e8/contracts/zero-ex/contracts/src/features/libs/LibSignature.sol#L67>
    pub fn recover(&self, hash: &H256) -> Option<Address> {
        let hash = match self.signature_type {
            SignatureType::EIP712 => *hash,
            SignatureType::EthSign => {
                let mut hasher = Keccak256::new();
                hasher.update(ETH_SIGN_PREFIX);
                hasher.update(hash);
                H256::from(<[u8; 32]>::from(hasher.finalize()))
            }
        };
        let recovery = Recovery {
            message: RecoveryMessage::Hash(hash),
            v: self.v.into(),
            r: self.r,
            s: self.s,
        };
        let (signature, recovery_id) = recovery.as_signature()?;
        recover(hash.as_bytes(), &signature, recovery_id).ok()
    }
}

/// An [`Order`] paired with the signature over its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub signature: Signature,
}

impl SignedOrder {
    pub fn hash(&self) -> H256 {
        self.order.hash()
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.order.validate()?;
        self.validate_signature()?;
        Ok(())
    }

    pub fn validate_signature(&self) -> Result<(), Error> {
        let hash = self.order.hash();
        let maker = self
            .signature
            .recover(&hash)
            .ok_or(Error::InvalidSignature)?;
        require!(self.order.maker_address == maker, Error::InvalidSignature);
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use pretty_assertions::assert_eq;
    use serde_json::{from_value, json};

    use super::*;

    pub fn example_order() -> Order {
        Order {
            maker_address: Address::from_low_u64_be(1),
            taker_address: Address::zero(),
            fee_recipient_address: Address::zero(),
            sender_address: Address::zero(),
            maker_token_address: Address::from_low_u64_be(2),
            taker_token_address: Address::from_low_u64_be(3),
            maker_asset_amount: U256::from(100),
            taker_asset_amount: U256::from(200),
            maker_fee: U256::zero(),
            taker_fee: U256::zero(),
            expiration_timestamp_sec: 1_900_000_000,
            salt: U256::from(42),
            exchange_address: Address::from_low_u64_be(0xdef1),
            chain_id: 1,
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let order = example_order();
        assert_eq!(order.hash(), order.hash());
    }

    #[test]
    fn test_hash_depends_on_fields() {
        let a = example_order();
        let mut b = a;
        b.salt = U256::from(43);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_validate_rejects_zero_maker() {
        let mut order = example_order();
        order.maker_address = Address::zero();
        assert!(matches!(order.validate(), Err(Error::ZeroMaker)));
    }

    #[test]
    fn test_validate_rejects_zero_amounts() {
        let mut order = example_order();
        order.maker_asset_amount = U256::zero();
        assert!(matches!(order.validate(), Err(Error::ZeroMakerAmount)));
    }

    #[test]
    fn test_json_order_round_trip() {
        let json = json!({
            "makerAddress": "0x0000000000000000000000000000000000000001",
            "takerAddress": "0x0000000000000000000000000000000000000000",
            "feeRecipientAddress": "0x0000000000000000000000000000000000000000",
            "senderAddress": "0x0000000000000000000000000000000000000000",
            "makerTokenAddress": "0x0000000000000000000000000000000000000002",
            "takerTokenAddress": "0x0000000000000000000000000000000000000003",
            "makerAssetAmount": "100",
            "takerAssetAmount": "200",
            "makerFee": "0",
            "takerFee": "0",
            "expirationTimestampSec": 1_900_000_000,
            "salt": "42",
            "exchangeAddress": "0x0000000000000000000000000000000000def1",
            "chainId": 1
        });
        let order = from_value::<Order>(json).unwrap();
        assert_eq!(order, example_order());
    }
}
