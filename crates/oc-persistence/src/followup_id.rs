//! Canonical FollowUpID generation (spec §4.10, §8 round-trip law,
//! §9 Open Question 4): `F-<ParentID>-<8hex>`, unique per parent id with no
//! cross-parent coordination. A caller-supplied duplicate within the same
//! parent is rejected and regenerated — here that's structural, since ids
//! are always server-generated, never accepted from the caller.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct FollowUpIdGenerator {
    issued: Mutex<HashMap<String, HashSet<String>>>,
}

impl FollowUpIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates `F-<parent_id>-<8hex>`, regenerating on collision within
    /// `parent_id`'s namespace.
    pub fn generate(&self, parent_id: &str) -> String {
        let mut guard = self.issued.lock().expect("followup id registry poisoned");
        let used = guard.entry(parent_id.to_string()).or_default();
        loop {
            let suffix = &Uuid::new_v4().simple().to_string()[..8];
            if used.insert(suffix.to_string()) {
                return format!("F-{parent_id}-{suffix}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_match_canonical_shape() {
        let gen = FollowUpIdGenerator::new();
        let id = gen.generate("P1");
        assert!(id.starts_with("F-P1-"));
        assert_eq!(id.len(), "F-P1-".len() + 8);
    }

    #[test]
    fn ids_are_unique_within_a_parent() {
        let gen = FollowUpIdGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            assert!(seen.insert(gen.generate("P1")));
        }
    }

    #[test]
    fn parents_do_not_share_a_namespace() {
        let gen = FollowUpIdGenerator::new();
        let a = gen.generate("P1");
        let b = gen.generate("P2");
        assert_ne!(a, b);
    }
}
