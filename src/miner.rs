//! Proof-of-work search.
//!
//! A block qualifies when its header hash, read as an unsigned little-endian
//! integer, is strictly below `target(difficulty) = 2^(difficulty + 1) - 1`.
//! Larger difficulties are therefore easier: difficulty 0 only admits the
//! all-zero digest, while SHA-256 headers become practical around 230 and
//! above.
//!
//! Nothing here bounds the search by default. A difficulty that no digest
//! can meet keeps [`Miner::mine`] busy until the nonce space runs out; use
//! [`Miner::mine_bounded`] when a cap is wanted.

use crate::blockchain::{Block, BlockHeader, BlockTemplate};
use crate::crypto::{CryptoProvider, Hash, Secp256k1Sha256};
use crate::error::{ChainError, Result};
use num_bigint::BigUint;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// `Σ 2^i for i in 0..=difficulty`, i.e. a run of `difficulty + 1` set bits.
pub fn target(difficulty: u32) -> BigUint {
    (BigUint::from(1u32) << (difficulty as u64 + 1)) - 1u32
}

/// From this difficulty on, `target` exceeds every 256-bit digest.
pub const SATURATING_DIFFICULTY: u32 = 256;

/// `target` as used against 256-bit digests. Capped at
/// [`SATURATING_DIFFICULTY`] so a header claiming a huge difficulty does
/// not allocate a huge integer; the comparison outcome is unchanged.
pub fn digest_target(difficulty: u32) -> BigUint {
    target(difficulty.min(SATURATING_DIFFICULTY))
}

/// Whether `hash` satisfies `difficulty`, without building targets wider
/// than a digest.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    difficulty >= SATURATING_DIFFICULTY || meets_target(hash, &target(difficulty))
}

/// Digest bytes as an unsigned little-endian integer.
pub fn hash_as_integer(hash: &Hash) -> BigUint {
    BigUint::from_bytes_le(hash)
}

pub fn meets_target(hash: &Hash, target: &BigUint) -> bool {
    &hash_as_integer(hash) < target
}

/// Mines with SHA-256 on the calling thread.
pub fn mine_block(template: BlockTemplate) -> Result<Block> {
    Miner::new(Secp256k1Sha256).mine(template)
}

struct Found {
    nonce: u64,
    hash: Hash,
    attempts: u64,
}

#[derive(Debug, Clone)]
pub struct Miner<C> {
    crypto: C,
    workers: usize,
}

impl<C: CryptoProvider> Miner<C> {
    pub fn new(crypto: C) -> Self {
        Miner { crypto, workers: 1 }
    }

    /// Splits the nonce space by stride across `workers` threads. The first
    /// worker to find a qualifying nonce wins; it need not be the smallest.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Searches until a qualifying nonce is found. With one worker the
    /// result is the smallest qualifying nonce.
    pub fn mine(&self, template: BlockTemplate) -> Result<Block> {
        let difficulty = template.header.difficulty;
        self.run(template, None)?
            .ok_or(ChainError::NonceSpaceExhausted { difficulty })
    }

    /// Like [`Self::mine`] but gives up after `max_attempts` hashes in total.
    /// `Ok(None)` means mining was aborted and no block was produced.
    pub fn mine_bounded(&self, template: BlockTemplate, max_attempts: u64) -> Result<Option<Block>> {
        self.run(template, Some(max_attempts))
    }

    fn run(&self, template: BlockTemplate, limit: Option<u64>) -> Result<Option<Block>> {
        let BlockTemplate {
            header,
            transactions,
        } = template;
        let target = digest_target(header.difficulty);
        let started = Instant::now();

        info!(
            "Mining block at height {} (difficulty {}, {} transactions, {} workers)",
            header.height,
            header.difficulty,
            transactions.len(),
            self.workers
        );

        let found = if self.workers == 1 {
            let stop = AtomicBool::new(false);
            search(&self.crypto, &header, &target, 0, 1, limit, &stop)
        } else {
            self.search_parallel(&header, &target, limit)?
        };

        let Some(found) = found else {
            info!(
                "Mining aborted at height {} after {:.3}s without a qualifying nonce",
                header.height,
                started.elapsed().as_secs_f64()
            );
            return Ok(None);
        };

        let mut header = header;
        header.nonce = found.nonce;
        info!(
            "Mined block {} at height {}: nonce {} after {} attempts in {:.3}s",
            hex::encode(found.hash),
            header.height,
            found.nonce,
            found.attempts,
            started.elapsed().as_secs_f64()
        );
        Ok(Some(Block::from_mined(header, transactions, found.hash)))
    }

    fn search_parallel(
        &self,
        header: &BlockHeader,
        target: &BigUint,
        limit: Option<u64>,
    ) -> Result<Option<Found>> {
        let workers = self.workers as u64;
        let per_worker = limit.map(|l| l.div_ceil(workers));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| ChainError::Config(format!("Failed to start mining workers: {}", e)))?;

        let stop = AtomicBool::new(false);
        let found = pool.install(|| {
            (0..workers).into_par_iter().find_map_any(|worker| {
                let found = search(
                    &self.crypto,
                    header,
                    target,
                    worker,
                    workers,
                    per_worker,
                    &stop,
                );
                if found.is_some() {
                    stop.store(true, Ordering::Relaxed);
                }
                found
            })
        });
        Ok(found)
    }
}

impl Default for Miner<Secp256k1Sha256> {
    fn default() -> Self {
        Miner::new(Secp256k1Sha256)
    }
}

/// Hash-and-compare loop over `start, start + stride, ...`. Returns `None`
/// when the attempt limit is hit, another worker signals `stop`, or the
/// nonce space is exhausted.
fn search<C: CryptoProvider + ?Sized>(
    crypto: &C,
    header: &BlockHeader,
    target: &BigUint,
    start: u64,
    stride: u64,
    limit: Option<u64>,
    stop: &AtomicBool,
) -> Option<Found> {
    let mut candidate = header.clone();
    candidate.nonce = start;
    let mut attempts = 0u64;

    loop {
        if limit.is_some_and(|l| attempts >= l) || stop.load(Ordering::Relaxed) {
            return None;
        }

        let hash = candidate.hash_with(crypto);
        attempts += 1;
        if meets_target(&hash, target) {
            return Some(Found {
                nonce: candidate.nonce,
                hash,
                attempts,
            });
        }

        candidate.nonce = match candidate.nonce.checked_add(stride) {
            Some(next) => next,
            None => {
                debug!("Worker starting at nonce {} exhausted its nonce range", start);
                return None;
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_closed_form() {
        assert_eq!(target(0), BigUint::from(1u32));
        assert_eq!(target(1), BigUint::from(3u32));
        assert_eq!(target(3), BigUint::from(15u32));
        assert_eq!(target(7), BigUint::from(255u32));
        assert_eq!(target(255).bits(), 256);
        assert_eq!(target(300).bits(), 301);
    }

    #[test]
    fn test_target_matches_bit_sum() {
        for difficulty in 0..40u32 {
            let mut sum = BigUint::from(0u32);
            for i in 0..=difficulty {
                sum += BigUint::from(1u32) << i;
            }
            assert_eq!(target(difficulty), sum);
        }
    }

    #[test]
    fn test_saturating_difficulty_admits_every_digest() {
        let all_ones = [0xFFu8; 32];
        assert!(!meets_difficulty(&all_ones, 255));
        assert!(meets_difficulty(&all_ones, SATURATING_DIFFICULTY));
        assert!(meets_difficulty(&all_ones, u32::MAX));

        assert_eq!(digest_target(u32::MAX), target(SATURATING_DIFFICULTY));
        assert_eq!(digest_target(240), target(240));
        for difficulty in [0u32, 3, 128, 255] {
            let mut hash = [0u8; 32];
            hash[31] = 0x40;
            assert_eq!(
                meets_difficulty(&hash, difficulty),
                meets_target(&hash, &target(difficulty))
            );
        }
    }

    #[test]
    fn test_huge_difficulty_mines_at_first_nonce() {
        let template = BlockTemplate::genesis(vec![2; 33], u32::MAX, Vec::new());
        let block = mine_block(template).unwrap();
        assert_eq!(block.header().nonce, 0);
    }

    #[test]
    fn test_hash_is_little_endian() {
        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        hash[1] = 0x02;
        assert_eq!(hash_as_integer(&hash), BigUint::from(0x0201u32));
    }

    #[test]
    fn test_meets_target_is_strict() {
        let mut hash = [0u8; 32];
        hash[0] = 15;
        assert!(!meets_target(&hash, &target(3)));
        hash[0] = 14;
        assert!(meets_target(&hash, &target(3)));
    }

    #[test]
    fn test_mine_block_with_sha256() {
        let template = BlockTemplate::genesis(vec![2; 33], 245, Vec::new());
        let block = mine_block(template).unwrap();

        assert!(meets_target(&block.hash(), &target(245)));
        assert_eq!(block.hash(), block.header().hash_with(&Secp256k1Sha256));
    }

    #[test]
    fn test_bounded_search_aborts() {
        let template = BlockTemplate::genesis(vec![2; 33], 0, Vec::new());
        let result = Miner::default().mine_bounded(template, 50).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_workers_clamped_to_one() {
        assert_eq!(Miner::default().with_workers(0).workers(), 1);
    }
}
