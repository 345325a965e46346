//! Identifier types shared across the crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub type RoadmapId = String;
pub type PhaseId = String;
pub type TopicId = String;
pub type InfoBitId = String;
pub type UserId = String;

static ROADMAP_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Mint a fresh opaque roadmap id.
///
/// roadmapId = hex(blake3(millis || pid || seq))[..32]
///
/// The id never contains `#`, so derived descendant ids split unambiguously.
pub fn new_roadmap_id() -> RoadmapId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&now_millis().to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&ROADMAP_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..16])
}
