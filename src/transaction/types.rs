/// Transaction record and its canonical byte layout
use crate::crypto::{sha256, CryptoProvider, Hash, KeyPair, Secp256k1Sha256};
use crate::encoding::{Reader, Writer};
use crate::error::{ChainError, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Maximum encoded transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Where a record sits in its lifecycle. Validation and execution are
/// judgements made against ledger state and are not stored on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Unsigned,
    Signed,
}

/// A script invocation authorised by `sender_public_key`.
///
/// The identity fields are fixed at construction and `hash` is derived from
/// them, so a record's hash never changes. The signature can be attached
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TransactionWire", try_from = "TransactionWire")]
pub struct TransactionRecord {
    sender_public_key: Vec<u8>,
    script: Vec<u8>,
    fee: BigUint,
    order: BigUint,
    signature: Option<Vec<u8>>,
    hash: Hash,
}

impl TransactionRecord {
    pub fn new(
        sender_public_key: Vec<u8>,
        script: Vec<u8>,
        fee: impl Into<BigUint>,
        order: impl Into<BigUint>,
    ) -> Self {
        let mut record = TransactionRecord {
            sender_public_key,
            script,
            fee: fee.into(),
            order: order.into(),
            signature: None,
            hash: [0u8; 32],
        };
        record.hash = sha256(&record.signable_message());
        record
    }

    pub fn sender_public_key(&self) -> &[u8] {
        &self.sender_public_key
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Maximum cost the sender authorises.
    pub fn fee(&self) -> &BigUint {
        &self.fee
    }

    pub fn order(&self) -> &BigUint {
        &self.order
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn status(&self) -> TxStatus {
        if self.signature.is_some() {
            TxStatus::Signed
        } else {
            TxStatus::Unsigned
        }
    }

    fn write_unsigned(&self, writer: &mut Writer) {
        writer
            .write_varbytes(&self.sender_public_key)
            .write_varbytes(&self.script)
            .write_varbigint(&self.fee)
            .write_varbigint(&self.order);
    }

    /// The unsigned encoding: the bytes that are hashed and signed.
    pub fn signable_message(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(
            self.sender_public_key.len() + self.script.len() + 32,
        );
        self.write_unsigned(&mut writer);
        writer.into_bytes()
    }

    /// Unsigned encoding followed by `varbytes(signature)`.
    pub fn encode_signed(&self) -> Result<Vec<u8>> {
        let signature = self.signature.as_ref().ok_or_else(|| {
            ChainError::InvalidTransaction("Signature cannot be empty".to_string())
        })?;

        let mut writer = Writer::new();
        self.write_unsigned(&mut writer);
        writer.write_varbytes(signature);
        Ok(writer.into_bytes())
    }

    fn read_unsigned(reader: &mut Reader<'_>) -> Result<Self> {
        let sender_public_key = reader.read_varbytes()?;
        let script = reader.read_varbytes()?;
        let fee = reader.read_varbigint()?;
        let order = reader.read_varbigint()?;
        Ok(Self::new(sender_public_key, script, fee, order))
    }

    fn check_size(len: usize) -> Result<()> {
        if len > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                len, MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    /// Attaches a decoded signature, which must be non-empty.
    fn attach_decoded_signature(&mut self, signature: Vec<u8>) -> Result<()> {
        if signature.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Signature cannot be empty".to_string(),
            ));
        }
        self.signature = Some(signature);
        Ok(())
    }

    /// Size of the encoding this record travels in: signed when a signature
    /// is attached, unsigned otherwise.
    fn encoded_len(&self) -> usize {
        let mut writer = Writer::new();
        self.write_unsigned(&mut writer);
        if let Some(signature) = &self.signature {
            writer.write_varbytes(signature);
        }
        writer.len()
    }

    /// Rebuilds an unsigned record; the hash is recomputed from the fields.
    pub fn decode_unsigned(bytes: &[u8]) -> Result<Self> {
        Self::check_size(bytes.len())?;
        let mut reader = Reader::new(bytes);
        let record = Self::read_unsigned(&mut reader)?;
        reader.finish()?;
        Ok(record)
    }

    pub fn decode_signed(bytes: &[u8]) -> Result<Self> {
        Self::check_size(bytes.len())?;
        let mut reader = Reader::new(bytes);
        let mut record = Self::read_unsigned(&mut reader)?;
        record.attach_decoded_signature(reader.read_varbytes()?)?;
        reader.finish()?;
        Ok(record)
    }

    /// Signs with the default secp256k1 provider. See [`Self::sign_with`].
    pub fn sign(&mut self, keypair: Option<&KeyPair>) -> bool {
        self.sign_with(&Secp256k1Sha256, keypair)
    }

    /// Attaches a signature over the unsigned encoding.
    ///
    /// Returns `false` without touching the record if it is already signed,
    /// no key pair is given, or the provider fails to sign.
    pub fn sign_with<C: CryptoProvider>(&mut self, crypto: &C, keypair: Option<&KeyPair>) -> bool {
        if self.signature.is_some() {
            return false;
        }
        let Some(keypair) = keypair else {
            return false;
        };

        match crypto.sign(&self.signable_message(), &keypair.secret_key_bytes()) {
            Ok(signature) => {
                self.signature = Some(signature);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to sign transaction {}: {}", self.hash_str(), e);
                false
            }
        }
    }
}

/// Serde shape of a record. The hash is not part of it and is always
/// recomputed on the way in.
#[derive(Serialize, Deserialize)]
struct TransactionWire {
    #[serde(with = "serde_bytes")]
    sender_public_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    script: Vec<u8>,
    fee: BigUint,
    order: BigUint,
    #[serde(default)]
    signature: Option<serde_bytes::ByteBuf>,
}

impl From<TransactionRecord> for TransactionWire {
    fn from(record: TransactionRecord) -> Self {
        TransactionWire {
            sender_public_key: record.sender_public_key,
            script: record.script,
            fee: record.fee,
            order: record.order,
            signature: record.signature.map(serde_bytes::ByteBuf::from),
        }
    }
}

impl TryFrom<TransactionWire> for TransactionRecord {
    type Error = ChainError;

    fn try_from(wire: TransactionWire) -> Result<Self> {
        let mut record =
            TransactionRecord::new(wire.sender_public_key, wire.script, wire.fee, wire.order);
        if let Some(signature) = wire.signature {
            record.attach_decoded_signature(signature.into_vec())?;
        }
        Self::check_size(record.encoded_len())?;
        Ok(record)
    }
}
