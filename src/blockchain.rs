// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into block structure, chain state and block-level validation.

pub mod core;
pub use self::core::*;
