//! Inbound message deduplication (§4.10 "Deduplication (inbound)").

use std::collections::{HashSet, VecDeque};
use tokio::sync::RwLock;

/// Default number of recently-seen message ids retained.
pub const DEFAULT_CAPACITY: usize = 1000;

/// A bounded ring of recently-seen inbound message ids. Trims the oldest
/// 10% on overflow, same drop-oldest policy as the tool-call audit log.
pub struct InboundDedup {
    seen: RwLock<DedupState>,
    capacity: usize,
}

struct DedupState {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl InboundDedup {
    /// Build a dedup ring retaining at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: RwLock::new(DedupState { ids: HashSet::new(), order: VecDeque::new() }),
            capacity,
        }
    }

    /// Record `message_id` as seen. Returns `true` if it was new (the
    /// caller should process it), `false` if it is a duplicate (the
    /// caller should ignore it).
    pub async fn check_and_record(&self, message_id: &str) -> bool {
        let mut state = self.seen.write().await;
        if state.ids.contains(message_id) {
            return false;
        }
        if state.order.len() >= self.capacity {
            let trim = (self.capacity / 10).max(1);
            for _ in 0..trim {
                if let Some(oldest) = state.order.pop_front() {
                    state.ids.remove(&oldest);
                }
            }
        }
        state.ids.insert(message_id.to_string());
        state.order.push_back(message_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sighting_is_new_second_is_duplicate() {
        let dedup = InboundDedup::new(10);
        assert!(dedup.check_and_record("m1").await);
        assert!(!dedup.check_and_record("m1").await);
    }

    #[tokio::test]
    async fn trims_the_oldest_tenth_past_capacity() {
        let dedup = InboundDedup::new(20);
        for i in 0..20 {
            assert!(dedup.check_and_record(&format!("m{i}")).await);
        }
        // Capacity reached; the next insert trims the oldest 10% (2 entries).
        assert!(dedup.check_and_record("m20").await);
        assert!(dedup.check_and_record("m0").await, "m0 should have been evicted");
        assert!(dedup.check_and_record("m1").await, "m1 should have been evicted");
        assert!(!dedup.check_and_record("m2").await, "m2 should still be tracked");
    }
}
