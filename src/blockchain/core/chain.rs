use crate::crypto::{sha256, CryptoProvider, Hash};
use crate::encoding::Writer;
use crate::error::{ChainError, Result};
use crate::executor::{Executor, TxReceipt};
use crate::ledger::{Event, Ledger};
use crate::transaction::{TransactionRecord, Validator};
use crate::vm::ScriptExecutor;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::ChainState;
use super::validation::{validate_linkage, validate_transactions_root, verify_pow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: u64,
    #[serde(with = "serde_bytes")]
    pub miner_public_key: Vec<u8>,
    /// `None` only for the genesis block.
    pub previous_hash: Option<Hash>,
    pub transactions_root: Hash,
    pub difficulty: u32,
    pub nonce: u64,
}

impl BlockHeader {
    /// Header bytes fed to the proof-of-work hash. The nonce is always the
    /// last eight bytes (little-endian).
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(96 + self.miner_public_key.len());
        writer
            .write_varint(self.height)
            .write_u64_le(self.timestamp)
            .write_varbytes(&self.miner_public_key);
        match &self.previous_hash {
            Some(previous) => writer.write_u8(1).write_raw(previous),
            None => writer.write_u8(0),
        };
        writer
            .write_raw(&self.transactions_root)
            .write_u32_le(self.difficulty)
            .write_u64_le(self.nonce);
        writer.into_bytes()
    }

    pub fn hash_with<C: CryptoProvider + ?Sized>(&self, crypto: &C) -> Hash {
        crypto.hash(&self.encode())
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }
}

/// A mined block. Only the miner produces these; every field is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<TransactionRecord>,
    hash: Hash,
}

impl Block {
    pub(crate) fn from_mined(
        header: BlockHeader,
        transactions: Vec<TransactionRecord>,
        hash: Hash,
    ) -> Self {
        Block {
            header,
            transactions,
            hash,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Ordered digest-list commitment: SHA-256 over the concatenated
    /// transaction hashes in block order.
    pub fn calculate_transactions_root(transactions: &[TransactionRecord]) -> Hash {
        let mut data = Vec::with_capacity(transactions.len() * 32);
        for tx in transactions {
            data.extend_from_slice(&tx.hash());
        }
        sha256(&data)
    }
}

/// A block being assembled: transactions and header are fixed, nonce is 0
/// and there is no hash yet. Pass it to the miner to obtain a [`Block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub(crate) header: BlockHeader,
    pub(crate) transactions: Vec<TransactionRecord>,
}

impl BlockTemplate {
    pub fn genesis(
        miner_public_key: Vec<u8>,
        difficulty: u32,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self::build(0, None, miner_public_key, difficulty, transactions, now_millis())
    }

    /// Template extending `parent`. The timestamp is forced past the parent's.
    ///
    /// Fails when the parent sits at the end of the height or timestamp
    /// range and so cannot have a successor.
    pub fn next(
        parent: &Block,
        miner_public_key: Vec<u8>,
        difficulty: u32,
        transactions: Vec<TransactionRecord>,
    ) -> Result<Self> {
        let height = parent.header.height.checked_add(1).ok_or_else(|| {
            ChainError::InvalidBlock(format!(
                "Block {} is at the maximum height",
                parent.hash_str()
            ))
        })?;
        let earliest = parent.header.timestamp.checked_add(1).ok_or_else(|| {
            ChainError::InvalidBlock(format!(
                "Block {} has the maximum timestamp",
                parent.hash_str()
            ))
        })?;

        Ok(Self::build(
            height,
            Some(parent.hash()),
            miner_public_key,
            difficulty,
            transactions,
            now_millis().max(earliest),
        ))
    }

    fn build(
        height: u64,
        previous_hash: Option<Hash>,
        miner_public_key: Vec<u8>,
        difficulty: u32,
        transactions: Vec<TransactionRecord>,
        timestamp: u64,
    ) -> Self {
        let transactions_root = Block::calculate_transactions_root(&transactions);
        BlockTemplate {
            header: BlockHeader {
                height,
                timestamp,
                miner_public_key,
                previous_hash,
                transactions_root,
                difficulty,
                nonce: 0,
            },
            transactions,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.header.timestamp = timestamp;
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// In-memory canonical chain: accepts mined blocks in order and applies
/// their transactions to the ledger.
pub struct Blockchain<L, S, C> {
    blocks: Vec<Block>,
    state: ChainState<L>,
    executor: Executor<S>,
    validator: Validator<C>,
    crypto: C,
}

impl<L, S, C> Blockchain<L, S, C>
where
    L: Ledger,
    S: ScriptExecutor,
    C: CryptoProvider + Clone,
{
    pub fn new(state: ChainState<L>, executor: Executor<S>, crypto: C) -> Self {
        Blockchain {
            blocks: Vec::new(),
            state,
            executor,
            validator: Validator::new(crypto.clone()),
            crypto,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn height(&self) -> Option<u64> {
        self.tip().map(Block::height)
    }

    pub fn state(&self) -> &ChainState<L> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChainState<L> {
        &mut self.state
    }

    /// Checks linkage, commitment and proof-of-work, then applies every
    /// transaction in block order. Nothing is applied if a check fails.
    pub fn accept_block(
        &mut self,
        block: Block,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Vec<TxReceipt>> {
        validate_linkage(&block, self.blocks.last())?;
        validate_transactions_root(&block)?;
        verify_pow(&block, &self.crypto)?;

        if self.blocks.iter().any(|b| b.hash() == block.hash()) {
            return Err(ChainError::InvalidBlock(format!(
                "Block {} already exists",
                block.hash_str()
            )));
        }

        let receipts =
            self.executor
                .apply_block(&block, &self.validator, &mut self.state, on_event);

        info!(
            "Accepted block {} at height {} ({} transactions)",
            block.hash_str(),
            block.height(),
            block.transactions().len()
        );
        self.blocks.push(block);
        Ok(receipts)
    }
}
