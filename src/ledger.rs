// 🧾 Merge Ledger
// Identity-keyed accumulation of canonical records
//
// Same (item id, kind, container id) → one line, quantities summed.
// Descriptive fields are first-writer-wins.

use crate::normalizer::{CanonicalItemRecord, ItemKind};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// IDENTITY KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub item_id: String,
    pub kind: ItemKind,
    pub container_id: String,
}

impl LedgerKey {
    pub fn of(record: &CanonicalItemRecord) -> Self {
        LedgerKey {
            item_id: record.item_id.clone(),
            kind: record.kind,
            container_id: record.container_id.clone(),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.item_id, self.kind, self.container_id)
    }
}

// ============================================================================
// LEDGER
// ============================================================================

/// Result of feeding one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Merged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub inserted: usize,
    pub merged: usize,
}

/// Per-run ledger. Created fresh for each player, flattened, then dropped.
///
/// Entries are kept in first-insertion order so `flatten` is stable.
#[derive(Debug, Default)]
pub struct MergeLedger {
    entries: Vec<CanonicalItemRecord>,
    index: HashMap<LedgerKey, usize>,
    stats: LedgerStats,
}

impl MergeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, or add its quantity to the existing line with the same key
    pub fn merge(&mut self, record: CanonicalItemRecord) -> MergeOutcome {
        let key = LedgerKey::of(&record);

        match self.index.get(&key) {
            Some(&slot) => {
                let existing = &mut self.entries[slot];
                existing.quantity = existing.quantity.saturating_add(record.quantity);
                self.stats.merged += 1;
                MergeOutcome::Merged
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(record);
                self.stats.inserted += 1;
                MergeOutcome::Inserted
            }
        }
    }

    pub fn merge_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = CanonicalItemRecord>,
    {
        for record in records {
            self.merge(record);
        }
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&CanonicalItemRecord> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    /// Consume the ledger into its lines, in first-insertion order
    pub fn flatten(self) -> Vec<CanonicalItemRecord> {
        self.entries
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(item_id: &str, kind: ItemKind, container_id: &str, quantity: u64) -> CanonicalItemRecord {
        CanonicalItemRecord {
            item_name: format!("Item {}", item_id),
            rarity: "Common".to_string(),
            tag: String::new(),
            tier: Some(1),
            quantity,
            container_name: "Chest".to_string(),
            claim_name: String::new(),
            region_id: String::new(),
            container_id: container_id.to_string(),
            kind,
            item_id: item_id.to_string(),
        }
    }

    #[test]
    fn test_duplicate_key_sums_quantity() {
        let mut ledger = MergeLedger::new();

        assert_eq!(ledger.merge(record("A", ItemKind::Item, "C1", 3)), MergeOutcome::Inserted);
        assert_eq!(ledger.merge(record("A", ItemKind::Item, "C1", 5)), MergeOutcome::Merged);

        let lines = ledger.flatten();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 8);
    }

    #[test]
    fn test_first_writer_wins_for_metadata() {
        let mut ledger = MergeLedger::new();

        let first = record("A", ItemKind::Item, "C1", 3);
        let mut second = record("A", ItemKind::Item, "C1", 5);
        second.item_name = "Renamed".to_string();
        second.rarity = "Epic".to_string();
        second.tier = Some(9);

        ledger.merge(first);
        ledger.merge(second);

        let lines = ledger.flatten();
        assert_eq!(lines[0].item_name, "Item A");
        assert_eq!(lines[0].rarity, "Common");
        assert_eq!(lines[0].tier, Some(1));
        assert_eq!(lines[0].quantity, 8);
    }

    #[test]
    fn test_kind_isolates_keys() {
        let mut ledger = MergeLedger::new();

        ledger.merge(record("10", ItemKind::Item, "X", 1));
        ledger.merge(record("10", ItemKind::Cargo, "X", 1));

        assert_eq!(ledger.len(), 2, "item and cargo with the same id must not combine");
    }

    #[test]
    fn test_container_isolates_keys() {
        let mut ledger = MergeLedger::new();

        ledger.merge(record("10", ItemKind::Item, "X", 1));
        ledger.merge(record("10", ItemKind::Item, "Y", 1));

        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_flatten_keeps_insertion_order() {
        let mut ledger = MergeLedger::new();

        ledger.merge_all(vec![
            record("3", ItemKind::Item, "C", 1),
            record("1", ItemKind::Item, "C", 1),
            record("2", ItemKind::Item, "C", 1),
            record("1", ItemKind::Item, "C", 4),
        ]);

        let stats = ledger.stats();
        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.merged, 1);

        let ids: Vec<String> = ledger.flatten().into_iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_key_display() {
        let key = LedgerKey::of(&record("7", ItemKind::Cargo, "C1", 1));
        assert_eq!(key.to_string(), "7_cargo_C1");
    }

    #[test]
    fn test_get_by_key() {
        let mut ledger = MergeLedger::new();
        ledger.merge(record("7", ItemKind::Sell, "O1", 2));

        let key = LedgerKey {
            item_id: "7".to_string(),
            kind: ItemKind::Sell,
            container_id: "O1".to_string(),
        };
        assert_eq!(ledger.get(&key).unwrap().quantity, 2);
        assert!(!ledger.is_empty());
    }
}
