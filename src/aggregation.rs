// 🧮 Aggregation Driver
// Per-player orchestration: experience → skill summary, sources → ledger
//
// Bad data degrades to partial output, never to an error: unknown skills and
// broken sources are skipped and logged, the rest still counts.

use crate::leveling::{level_from_experience, LevelingTable};
use crate::ledger::{LedgerStats, MergeLedger};
use crate::normalizer::{get_normalizer, CanonicalItemRecord, SourceKind};
use crate::payloads::{ExperienceEntry, PlayerResponse};
use crate::skills::{SkillCategory, SkillRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

// ============================================================================
// SKILLS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillLevel {
    pub skill_id: u32,
    pub name: String,
    pub category: SkillCategory,
    pub level: u32,
    pub experience: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillSummary {
    pub username: Option<String>,
    pub levels: Vec<SkillLevel>,
    pub total_level: u64,
    pub total_exp: u64,
}

impl SkillSummary {
    pub fn level_of(&self, skill_name: &str) -> Option<u32> {
        self.levels
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(skill_name))
            .map(|s| s.level)
    }
}

/// Resolve every entry against the registry and the table.
///
/// Unknown skill ids and entries without a usable quantity are skipped and
/// contribute nothing to the totals.
pub fn summarize_skills(
    entries: &[ExperienceEntry],
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> SkillSummary {
    let mut summary = SkillSummary::default();

    for entry in entries {
        let Some(skill) = registry.get(entry.skill_id) else {
            debug!(skill_id = entry.skill_id, "unrecognized skill id, skipping");
            continue;
        };

        let Some(xp) = entry.quantity else {
            debug!(skill = %skill.name, "experience entry without quantity, skipping");
            continue;
        };

        let level = match level_from_experience(xp, table) {
            Ok(level) => level,
            Err(e) => {
                warn!(skill = %skill.name, "skipping experience entry: {}", e);
                continue;
            }
        };

        summary.total_level = summary.total_level.saturating_add(level as u64);
        summary.total_exp = summary.total_exp.saturating_add(xp as u64);
        summary.levels.push(SkillLevel {
            skill_id: skill.id,
            name: skill.name.clone(),
            category: skill.category,
            level,
            experience: xp as u64,
        });
    }

    summary
}

/// Skill summary straight from a `/players/{id}` payload.
///
/// `None` when the payload has no player record.
pub fn summarize_player(
    payload: &Value,
    registry: &SkillRegistry,
    table: &LevelingTable,
) -> Option<SkillSummary> {
    let response = match PlayerResponse::deserialize(payload) {
        Ok(response) => response,
        Err(e) => {
            warn!("malformed player payload: {}", e);
            return None;
        }
    };

    let player = response.player?;
    let mut summary = summarize_skills(&player.experience, registry, table);
    summary.username = player.username;
    Some(summary)
}

// ============================================================================
// INVENTORY
// ============================================================================

/// Everything fetched for one player; any part may be missing
#[derive(Debug, Clone, Default)]
pub struct InventorySources {
    /// `/players/{id}/inventories`
    pub inventories: Option<Value>,
    /// One `/players/{id}/housing/{building}` payload per house
    pub housing: Vec<Value>,
    /// `/players/{id}` (market orders live here)
    pub player: Option<Value>,
}

impl InventorySources {
    fn payloads(&self) -> impl Iterator<Item = (SourceKind, &Value)> {
        let inventories = self.inventories.iter().map(|v| (SourceKind::Inventory, v));
        let housing = self.housing.iter().map(|v| (SourceKind::Housing, v));
        let market = self.player.iter().map(|v| (SourceKind::Market, v));
        inventories.chain(housing).chain(market)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryReport {
    pub records: Vec<CanonicalItemRecord>,
    pub stats: LedgerStats,
    pub skipped_sources: usize,
}

impl InventoryReport {
    pub fn total_quantity(&self) -> u64 {
        self.records.iter().map(|r| r.quantity).sum()
    }
}

/// Normalize every source into one shared ledger and flatten it.
pub fn aggregate_inventory(sources: &InventorySources) -> InventoryReport {
    let mut ledger = MergeLedger::new();
    let mut skipped_sources = 0;

    for (kind, payload) in sources.payloads() {
        match get_normalizer(kind).normalize_payload(payload) {
            Ok(records) => {
                debug!(source = kind.name(), records = records.len(), "normalized source");
                ledger.merge_all(records);
            }
            Err(e) => {
                warn!(source = kind.name(), "skipping source: {:#}", e);
                skipped_sources += 1;
            }
        }
    }

    let stats = ledger.stats();
    InventoryReport {
        records: ledger.flatten(),
        stats,
        skipped_sources,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::ItemKind;
    use serde_json::json;

    #[test]
    fn test_skill_summary_scenario() {
        let registry = SkillRegistry::new();
        let table = LevelingTable::standard();
        let entries = vec![ExperienceEntry::new(5, 640), ExperienceEntry::new(3, 0)];

        let summary = summarize_skills(&entries, &registry, table);

        assert!(summary.level_of("Mining").unwrap() >= 1);
        assert_eq!(summary.level_of("Mining"), Some(2));
        assert_eq!(summary.level_of("Carpentry"), Some(1));
        assert_eq!(summary.total_exp, 640);
        assert_eq!(summary.total_level, 3);
    }

    #[test]
    fn test_unknown_skill_skipped() {
        let registry = SkillRegistry::new();
        let table = LevelingTable::standard();
        let entries = vec![ExperienceEntry::new(99, 5000), ExperienceEntry::new(2, 1340)];

        let summary = summarize_skills(&entries, &registry, table);

        assert_eq!(summary.levels.len(), 1);
        assert_eq!(summary.total_exp, 1340);
        assert_eq!(summary.total_level, 3);
    }

    #[test]
    fn test_negative_or_missing_xp_skipped() {
        let registry = SkillRegistry::new();
        let table = LevelingTable::standard();
        let entries = vec![
            ExperienceEntry::new(5, -10),
            ExperienceEntry {
                skill_id: 6,
                quantity: None,
            },
            ExperienceEntry::new(7, 640),
        ];

        let summary = summarize_skills(&entries, &registry, table);

        assert_eq!(summary.levels.len(), 1);
        assert_eq!(summary.total_exp, 640);
    }

    #[test]
    fn test_summarize_player_payload() {
        let payload = json!({
            "player": {
                "username": "Ferris",
                "experience": [{"skill_id": 5, "quantity": 2130}]
            }
        });

        let summary =
            summarize_player(&payload, &SkillRegistry::new(), LevelingTable::standard()).unwrap();
        assert_eq!(summary.username.as_deref(), Some("Ferris"));
        assert_eq!(summary.level_of("Mining"), Some(4));
    }

    #[test]
    fn test_totals_saturate_on_huge_experience() {
        let registry = SkillRegistry::new();
        let table = LevelingTable::standard();
        let entries = vec![
            ExperienceEntry::new(2, i64::MAX),
            ExperienceEntry::new(3, i64::MAX),
            ExperienceEntry::new(5, i64::MAX),
        ];

        let summary = summarize_skills(&entries, &registry, table);

        assert_eq!(summary.levels.len(), 3);
        assert_eq!(summary.total_exp, u64::MAX, "total experience clamps instead of wrapping");
        assert_eq!(summary.total_level, 3 * table.max_level() as u64);
    }

    #[test]
    fn test_summarize_player_tolerates_odd_skill_ids() {
        let payload = json!({
            "player": {
                "username": "Ferris",
                "experience": [
                    {"skill_id": "5", "quantity": 640},
                    {"skill_id": null, "quantity": 100},
                    {"skill_id": "mining", "quantity": 100},
                    {"quantity": 100},
                    {"skillId": 3, "quantity": "0"}
                ],
                "marketOrders": {
                    "sellOrders": [{"entityId": 900, "itemId": 7, "quantity": 4}]
                }
            }
        });

        let summary =
            summarize_player(&payload, &SkillRegistry::new(), LevelingTable::standard()).unwrap();

        assert_eq!(summary.level_of("Mining"), Some(2), "numeric string id resolves");
        assert_eq!(summary.level_of("Carpentry"), Some(1));
        assert_eq!(summary.levels.len(), 2, "entries without a usable id are dropped");
        assert_eq!(summary.total_exp, 640);

        let report = aggregate_inventory(&InventorySources {
            player: Some(payload),
            ..Default::default()
        });
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped_sources, 0);
    }

    #[test]
    fn test_summarize_player_missing_player() {
        let payload = json!({"error": "not found"});
        assert!(summarize_player(&payload, &SkillRegistry::new(), LevelingTable::standard()).is_none());
    }

    fn inventory_payload(container: &str, item_id: u64, quantity: i64) -> Value {
        json!({
            "inventories": [{
                "entityId": container,
                "pockets": [{"contents": {"itemId": item_id, "itemType": 0, "quantity": quantity}}]
            }],
            "items": {}
        })
    }

    #[test]
    fn test_two_sources_merge_into_one_line() {
        let sources = InventorySources {
            inventories: Some(inventory_payload("C1", 7, 2)),
            housing: vec![json!({
                "inventories": [{
                    "entityId": "C1",
                    "inventory": [{"contents": {"item_id": 7, "item_type": 0, "quantity": 3}}]
                }]
            })],
            player: None,
        };

        let report = aggregate_inventory(&sources);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].quantity, 5);
        assert_eq!(report.records[0].kind, ItemKind::Item);
        assert_eq!(report.records[0].container_id, "C1");
        assert_eq!(report.stats.merged, 1);
    }

    #[test]
    fn test_zero_quantity_contributes_nothing() {
        let sources = InventorySources {
            inventories: Some(inventory_payload("C1", 7, 0)),
            ..Default::default()
        };

        let report = aggregate_inventory(&sources);
        assert!(report.records.is_empty());
        assert_eq!(report.skipped_sources, 0);
    }

    #[test]
    fn test_bad_slot_does_not_drop_its_source() {
        let sources = InventorySources {
            inventories: Some(json!({
                "inventories": [
                    {
                        "entityId": "C1",
                        "pockets": [{"contents": {"itemId": 7, "itemType": 0, "quantity": 5}}]
                    },
                    {
                        "entityId": "C2",
                        "pockets": [
                            {"contents": {"itemId": 8, "itemType": 1.0, "quantity": 2}},
                            {"contents": {"itemId": 9, "itemType": false, "quantity": {"n": 1}}}
                        ]
                    }
                ],
                "items": {}
            })),
            ..Default::default()
        };

        let report = aggregate_inventory(&sources);

        assert_eq!(report.skipped_sources, 0);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].quantity, 5);
        assert_eq!(report.records[1].kind, ItemKind::Cargo);
        assert_eq!(report.total_quantity(), 7);
    }

    #[test]
    fn test_broken_source_does_not_suppress_others() {
        let sources = InventorySources {
            inventories: Some(inventory_payload("C1", 7, 2)),
            housing: vec![json!({"inventories": 12}), json!("garbage")],
            player: Some(json!({
                "player": {
                    "marketOrders": {
                        "sellOrders": [{"entityId": 900, "itemId": 7, "itemName": "Plank", "quantity": 4}]
                    }
                }
            })),
        };

        let report = aggregate_inventory(&sources);

        assert_eq!(report.skipped_sources, 2);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].kind, ItemKind::Sell);
        assert_eq!(report.total_quantity(), 6);
    }

    #[test]
    fn test_no_sources() {
        let report = aggregate_inventory(&InventorySources::default());
        assert!(report.records.is_empty());
    }
}
