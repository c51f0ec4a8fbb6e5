//! State-change entries as delivered by the sync engine.

use serde::{Deserialize, Serialize};

// ─── OperationType ────────────────────────────────────────────────────────────

/// The kind of mutation a state-change entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Insert,
    Upsert,
    Delete,
}

// ─── StateChangeEntry ─────────────────────────────────────────────────────────

/// One state mutation emitted by the blockchain indexer.
///
/// The payload fields (`encoder`, `ancestral_record`) are opaque JSON: their
/// shape is owned by the upstream encoding library and this crate never looks
/// inside them. Only `block_height` drives dispatch decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateChangeEntry {
    /// Insert, upsert or delete.
    pub operation_type: OperationType,
    /// Upstream encoder type tag.
    pub encoder_type: u32,
    /// Raw state key, hex-encoded on the wire.
    #[serde(with = "hex_bytes")]
    pub key_bytes: Vec<u8>,
    /// Decoded record after the mutation.
    pub encoder: serde_json::Value,
    /// Record before the mutation, if the engine tracked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestral_record: Option<serde_json::Value>,
    /// `true` if the mutation was reverted (mempool disconnect).
    #[serde(default)]
    pub is_reverted: bool,
    /// Height of the block that produced this entry.
    pub block_height: u64,
}

impl StateChangeEntry {
    /// Minimal upsert entry at `block_height` with an empty payload.
    pub fn upsert(block_height: u64, key_bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            operation_type: OperationType::Upsert,
            encoder_type: 0,
            key_bytes: key_bytes.into(),
            encoder: serde_json::Value::Null,
            ancestral_record: None,
            is_reverted: false,
            block_height,
        }
    }

    /// Size of this entry once serialized to JSON.
    pub fn encoded_len(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(self).map(|v| v.len())
    }
}

/// Encode a batch as the JSON array sent to every sink.
pub fn encode_batch(batch: &[StateChangeEntry]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(batch)
}

/// [`encode_batch`] as a string, for text-framed transports.
pub fn encode_batch_text(batch: &[StateChangeEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string(batch)
}

/// Decode a JSON array produced by [`encode_batch`].
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<StateChangeEntry>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// ─── SyncEvent ────────────────────────────────────────────────────────────────

/// Lifecycle notifications sent by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    Start,
    HypersyncStart,
    HypersyncComplete,
    BlocksyncStart,
    Complete,
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::HypersyncStart => write!(f, "hypersync-start"),
            Self::HypersyncComplete => write!(f, "hypersync-complete"),
            Self::BlocksyncStart => write!(f, "blocksync-start"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
