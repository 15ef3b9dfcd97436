use crate::crypto::CryptoProvider;
use crate::error::{ChainError, Result};
use crate::miner::meets_difficulty;

use super::chain::Block;

/// Recomputes the header hash and checks it against the stored hash and the
/// difficulty target.
pub fn verify_pow<C: CryptoProvider + ?Sized>(block: &Block, crypto: &C) -> Result<()> {
    let recomputed = block.header().hash_with(crypto);
    if recomputed != block.hash() {
        return Err(ChainError::InvalidBlock(format!(
            "Header hash mismatch. Expected {}, but got {}.",
            hex::encode(recomputed),
            block.hash_str()
        )));
    }

    if !meets_difficulty(&recomputed, block.header().difficulty) {
        return Err(ChainError::InvalidProofOfWork);
    }
    Ok(())
}

/// Genesis has height 0 and no predecessor; every other block extends
/// `parent` by exactly one and commits to its hash.
pub fn validate_linkage(block: &Block, parent: Option<&Block>) -> Result<()> {
    let header = block.header();
    match parent {
        None => {
            if !header.is_genesis() || header.height != 0 {
                return Err(ChainError::InvalidBlockLinkage(
                    "First block must be a genesis block at height 0 with no previous hash"
                        .to_string(),
                ));
            }
        }
        Some(parent) => {
            let expected = parent.height().checked_add(1).ok_or_else(|| {
                ChainError::InvalidBlockLinkage(format!(
                    "Block {} is at the maximum height",
                    parent.hash_str()
                ))
            })?;
            if header.height != expected {
                return Err(ChainError::InvalidBlockLinkage(format!(
                    "Invalid block height. Expected {}, but got {}.",
                    expected, header.height
                )));
            }

            match header.previous_hash {
                Some(previous) if previous == parent.hash() => {}
                Some(previous) => {
                    return Err(ChainError::InvalidBlockLinkage(format!(
                        "Invalid previous block hash. Expected {}, but got {}.",
                        parent.hash_str(),
                        hex::encode(previous)
                    )))
                }
                None => {
                    return Err(ChainError::InvalidBlockLinkage(
                        "Genesis block can only be applied to an empty chain".to_string(),
                    ))
                }
            }
        }
    }
    Ok(())
}

pub fn validate_transactions_root(block: &Block) -> Result<()> {
    let expected = Block::calculate_transactions_root(block.transactions());
    if expected != block.header().transactions_root {
        return Err(ChainError::InvalidBlock(format!(
            "Transactions root mismatch. Expected {}, but got {}.",
            hex::encode(expected),
            hex::encode(block.header().transactions_root)
        )));
    }
    Ok(())
}
