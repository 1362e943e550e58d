mod error;
mod order_state;
mod signature_type;
mod signed_order;

pub use self::{
    error::Error,
    order_state::{InvalidReason, OrderState},
    signature_type::SignatureType,
    signed_order::{Order, Signature, SignedOrder},
};

#[cfg(test)]
pub use self::signed_order::test;
