//! Wrappers of the core protocol contracts.

pub mod erc20;
pub mod polymath_registry;
pub mod security_token;
pub mod security_token_registry;
