//! Error types for the consensus and execution core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Invalid block linkage: {0}")]
    InvalidBlockLinkage(String),
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Nonce space exhausted at difficulty {difficulty}")]
    NonceSpaceExhausted { difficulty: u32 },
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Insufficient balance: account {account} holds {available} {token}, needs {required}")]
    InsufficientBalance {
        account: String,
        token: String,
        available: String,
        required: String,
    },
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
