// 🧹 Record Normalizer
// Heterogeneous slots/orders → one CanonicalItemRecord shape
//
// Three sources, three encodings:
// - Personal inventories: camelCase slots, metadata maps keyed by id, numeric cargo flag
// - Housing: snake_case slots, metadata lists, numeric OR string cargo flag
// - Market orders: metadata embedded, no physical container
//
// The cargo flag is resolved once here (ItemKind::classify) and never
// re-inspected downstream.

use crate::payloads::{
    HousingDetail, HousingInventory, InventoriesResponse, ItemMeta, ItemTypeCode, MarketOrder,
    PlayerInventory, PlayerOrdersResponse, SlotContents,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub const UNKNOWN_HOUSE_LABEL: &str = "Unknown House";
pub const UNKNOWN_ROOM_LABEL: &str = "Unknown";
pub const SELL_ORDER_CONTAINER: &str = "Market Sell Order";
pub const BUY_ORDER_CONTAINER: &str = "Market Buy Order";

// ============================================================================
// CORE TYPES
// ============================================================================

/// What a ledger line holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Item,
    Cargo,
    Sell,
    Buy,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Item => "item",
            ItemKind::Cargo => "cargo",
            ItemKind::Sell => "sell",
            ItemKind::Buy => "buy",
        }
    }

    pub fn parse(s: &str) -> Option<ItemKind> {
        match s.trim().to_lowercase().as_str() {
            "item" => Some(ItemKind::Item),
            "cargo" => Some(ItemKind::Cargo),
            "sell" => Some(ItemKind::Sell),
            "buy" => Some(ItemKind::Buy),
            _ => None,
        }
    }

    /// Resolve a slot's type discriminant. Absent → plain item.
    pub fn classify(code: Option<&ItemTypeCode>) -> ItemKind {
        match code {
            Some(code) if code.is_cargo() => ItemKind::Cargo,
            _ => ItemKind::Item,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Sell,
    Buy,
}

impl OrderSide {
    pub fn kind(&self) -> ItemKind {
        match self {
            OrderSide::Sell => ItemKind::Sell,
            OrderSide::Buy => ItemKind::Buy,
        }
    }

    pub fn container_label(&self) -> &'static str {
        match self {
            OrderSide::Sell => SELL_ORDER_CONTAINER,
            OrderSide::Buy => BUY_ORDER_CONTAINER,
        }
    }
}

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Inventory,
    Housing,
    Market,
}

impl SourceKind {
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Inventory => "Personal inventories",
            SourceKind::Housing => "Housing storage",
            SourceKind::Market => "Market orders",
        }
    }
}

/// The normalized ledger line.
///
/// Field order and serde names are the inventory sheet's column layout.
/// Identity is `(item_id, kind, container_id)`; see `ledger::LedgerKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalItemRecord {
    #[serde(rename = "Item Name")]
    pub item_name: String,

    #[serde(rename = "Rarity")]
    pub rarity: String,

    #[serde(rename = "Tag")]
    pub tag: String,

    #[serde(rename = "Tier")]
    pub tier: Option<i64>,

    #[serde(rename = "Quantity")]
    pub quantity: u64,

    #[serde(rename = "Inventory Name")]
    pub container_name: String,

    #[serde(rename = "Claim Name")]
    pub claim_name: String,

    #[serde(rename = "Claim Region")]
    pub region_id: String,

    #[serde(rename = "Inventory ID")]
    pub container_id: String,

    #[serde(rename = "Item Type")]
    pub kind: ItemKind,

    #[serde(rename = "Item ID")]
    pub item_id: String,
}

// ============================================================================
// NORMALIZATION CONTEXT
// ============================================================================

/// Item and cargo reference metadata for one payload
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<String, ItemMeta>,
    cargos: HashMap<String, ItemMeta>,
}

impl ItemCatalog {
    pub fn from_maps(items: HashMap<String, ItemMeta>, cargos: HashMap<String, ItemMeta>) -> Self {
        ItemCatalog { items, cargos }
    }

    /// Index metadata lists by their `id`; entries without one are dropped
    pub fn from_lists(items: &[ItemMeta], cargos: &[ItemMeta]) -> Self {
        fn index(list: &[ItemMeta]) -> HashMap<String, ItemMeta> {
            list.iter()
                .filter_map(|meta| meta.id.clone().map(|id| (id, meta.clone())))
                .collect()
        }

        ItemCatalog {
            items: index(items),
            cargos: index(cargos),
        }
    }

    pub fn lookup(&self, kind: ItemKind, item_id: &str) -> Option<&ItemMeta> {
        match kind {
            ItemKind::Cargo => self.cargos.get(item_id),
            _ => self.items.get(item_id),
        }
    }
}

/// Descriptive fields of the container a slot sits in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerContext {
    pub container_id: String,
    pub container_name: String,
    pub claim_name: String,
    pub region_id: String,
}

impl ContainerContext {
    pub fn for_inventory(inventory: &PlayerInventory) -> Self {
        ContainerContext {
            container_id: inventory.entity_id.clone().unwrap_or_default(),
            container_name: inventory.inventory_name.clone().unwrap_or_default(),
            claim_name: inventory.claim_name.clone().unwrap_or_default(),
            region_id: inventory.region_id.clone().unwrap_or_default(),
        }
    }

    /// "<in-house label> - <building label>", claim data from the house
    pub fn for_housing(house: &HousingDetail, inventory: &HousingInventory) -> Self {
        let building = first_non_empty(&[&house.building_nickname, &house.building_name])
            .unwrap_or(UNKNOWN_HOUSE_LABEL);
        let room = first_non_empty(&[&inventory.building_nickname, &inventory.building_name])
            .unwrap_or(UNKNOWN_ROOM_LABEL);

        ContainerContext {
            container_id: inventory.entity_id.clone().unwrap_or_default(),
            container_name: format!("{} - {}", room, building),
            claim_name: house.claim_name.clone().unwrap_or_default(),
            region_id: house.claim_region_id.clone().unwrap_or_default(),
        }
    }
}

fn first_non_empty<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Quantity gate shared by every source: missing or non-positive → skip
fn positive_quantity(quantity: Option<i64>) -> Option<u64> {
    quantity.filter(|q| *q > 0).map(|q| q as u64)
}

// ============================================================================
// RECORD-LEVEL NORMALIZATION
// ============================================================================

/// One raw record together with the context needed to normalize it
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    InventorySlot {
        contents: &'a SlotContents,
        container: &'a ContainerContext,
        catalog: &'a ItemCatalog,
    },
    HousingSlot {
        contents: &'a SlotContents,
        container: &'a ContainerContext,
        catalog: &'a ItemCatalog,
    },
    MarketOrder {
        order: &'a MarketOrder,
        side: OrderSide,
    },
}

impl RawRecord<'_> {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            RawRecord::InventorySlot { .. } => SourceKind::Inventory,
            RawRecord::HousingSlot { .. } => SourceKind::Housing,
            RawRecord::MarketOrder { .. } => SourceKind::Market,
        }
    }
}

/// Canonical record for `raw`, or `None` when the record is skipped
/// (missing/non-positive quantity, no identifier).
pub fn normalize(raw: RawRecord<'_>) -> Option<CanonicalItemRecord> {
    match raw {
        RawRecord::InventorySlot {
            contents,
            container,
            catalog,
        }
        | RawRecord::HousingSlot {
            contents,
            container,
            catalog,
        } => normalize_slot(contents, container, catalog),
        RawRecord::MarketOrder { order, side } => normalize_order(order, side),
    }
}

fn normalize_slot(
    contents: &SlotContents,
    container: &ContainerContext,
    catalog: &ItemCatalog,
) -> Option<CanonicalItemRecord> {
    let Some(quantity) = positive_quantity(contents.quantity) else {
        debug!(container = %container.container_id, quantity = ?contents.quantity, "skipping slot without positive quantity");
        return None;
    };

    let Some(item_id) = contents.item_id.clone() else {
        debug!(container = %container.container_id, "skipping slot without item id");
        return None;
    };

    let kind = ItemKind::classify(contents.item_type.as_ref());
    let meta = catalog.lookup(kind, &item_id);
    if meta.is_none() {
        debug!(%item_id, %kind, "no reference metadata, using fallback name");
    }

    let item_name = non_empty(meta.and_then(|m| m.name.as_deref()))
        .unwrap_or_else(|| format!("Unknown {} {}", kind, item_id));

    Some(CanonicalItemRecord {
        item_name,
        rarity: meta.and_then(|m| m.rarity_str.clone()).unwrap_or_default(),
        tag: meta.and_then(|m| m.tag.clone()).unwrap_or_default(),
        tier: meta.and_then(|m| m.tier),
        quantity,
        container_name: container.container_name.clone(),
        claim_name: container.claim_name.clone(),
        region_id: container.region_id.clone(),
        container_id: container.container_id.clone(),
        kind,
        item_id,
    })
}

fn normalize_order(order: &MarketOrder, side: OrderSide) -> Option<CanonicalItemRecord> {
    let Some(quantity) = positive_quantity(order.quantity) else {
        debug!(order = ?order.entity_id, "skipping market order without positive quantity");
        return None;
    };

    // The order is its own container
    let Some(order_id) = order.entity_id.clone() else {
        debug!("skipping market order without entity id");
        return None;
    };

    let kind = side.kind();
    let item_id = order.item_id.clone().unwrap_or_else(|| order_id.clone());
    let item_name = non_empty(order.item_name.as_deref())
        .unwrap_or_else(|| format!("Unknown {} {}", kind, item_id));

    Some(CanonicalItemRecord {
        item_name,
        rarity: order.rarity_str.clone().unwrap_or_default(),
        tag: order.tag.clone().unwrap_or_default(),
        tier: order.tier,
        quantity,
        container_name: side.container_label().to_string(),
        claim_name: order.claim_name.clone().unwrap_or_default(),
        region_id: order.region_id.clone().unwrap_or_default(),
        container_id: order_id,
        kind,
        item_id,
    })
}

// ============================================================================
// PAYLOAD-LEVEL NORMALIZERS
// ============================================================================

/// SourceNormalizer - one implementation per source payload shape
///
/// A payload that does not decode at all is an error (the caller skips the
/// whole source); individual bad slots are skipped inside.
pub trait SourceNormalizer: Send + Sync {
    fn normalize_payload(&self, payload: &Value) -> Result<Vec<CanonicalItemRecord>>;

    fn source_kind(&self) -> SourceKind;
}

/// Personal inventories (`/players/{id}/inventories`)
pub struct InventoryNormalizer;

impl SourceNormalizer for InventoryNormalizer {
    fn normalize_payload(&self, payload: &Value) -> Result<Vec<CanonicalItemRecord>> {
        let data = InventoriesResponse::deserialize(payload)
            .context("Failed to decode inventories payload")?;

        let catalog = ItemCatalog::from_maps(data.items, data.cargos);
        let mut records = Vec::new();

        for inventory in &data.inventories {
            let container = ContainerContext::for_inventory(inventory);

            for contents in inventory.pockets.iter().filter_map(|p| p.contents.as_ref()) {
                let raw = RawRecord::InventorySlot {
                    contents,
                    container: &container,
                    catalog: &catalog,
                };
                records.extend(normalize(raw));
            }
        }

        Ok(records)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Inventory
    }
}

/// One house (`/players/{id}/housing/{building}`)
pub struct HousingNormalizer;

impl SourceNormalizer for HousingNormalizer {
    fn normalize_payload(&self, payload: &Value) -> Result<Vec<CanonicalItemRecord>> {
        let house =
            HousingDetail::deserialize(payload).context("Failed to decode housing payload")?;

        let catalog = ItemCatalog::from_lists(&house.items, &house.cargos);
        let mut records = Vec::new();

        for inventory in &house.inventories {
            let container = ContainerContext::for_housing(&house, inventory);

            for contents in inventory.inventory.iter().filter_map(|p| p.contents.as_ref()) {
                let raw = RawRecord::HousingSlot {
                    contents,
                    container: &container,
                    catalog: &catalog,
                };
                records.extend(normalize(raw));
            }
        }

        Ok(records)
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Housing
    }
}

/// Sell and buy orders embedded in the player record (`/players/{id}`)
pub struct MarketOrderNormalizer;

impl SourceNormalizer for MarketOrderNormalizer {
    fn normalize_payload(&self, payload: &Value) -> Result<Vec<CanonicalItemRecord>> {
        let data =
            PlayerOrdersResponse::deserialize(payload).context("Failed to decode player payload")?;

        let Some(orders) = data.player.and_then(|p| p.market_orders) else {
            return Ok(Vec::new());
        };

        let sells = orders.sell_orders.iter().map(|order| RawRecord::MarketOrder {
            order,
            side: OrderSide::Sell,
        });
        let buys = orders.buy_orders.iter().map(|order| RawRecord::MarketOrder {
            order,
            side: OrderSide::Buy,
        });

        Ok(sells.chain(buys).filter_map(normalize).collect())
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Market
    }
}

/// Normalizer for a source kind
pub fn get_normalizer(source: SourceKind) -> Box<dyn SourceNormalizer> {
    match source {
        SourceKind::Inventory => Box::new(InventoryNormalizer),
        SourceKind::Housing => Box::new(HousingNormalizer),
        SourceKind::Market => Box::new(MarketOrderNormalizer),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(item_id: &str, item_type: Option<ItemTypeCode>, quantity: Option<i64>) -> SlotContents {
        SlotContents {
            item_id: Some(item_id.to_string()),
            item_type,
            quantity,
        }
    }

    fn container(id: &str) -> ContainerContext {
        ContainerContext {
            container_id: id.to_string(),
            container_name: "Backpack".to_string(),
            claim_name: "Harbor".to_string(),
            region_id: "3".to_string(),
        }
    }

    fn meta(id: &str, name: &str) -> ItemMeta {
        ItemMeta {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            rarity_str: Some("Common".to_string()),
            tag: Some("Plank".to_string()),
            tier: Some(2),
        }
    }

    #[test]
    fn test_inventory_slot_with_metadata() {
        let catalog = ItemCatalog::from_lists(&[meta("7", "Rough Plank")], &[]);
        let contents = slot("7", Some(ItemTypeCode::Code(0)), Some(4));
        let ctx = container("C1");

        let record = normalize(RawRecord::InventorySlot {
            contents: &contents,
            container: &ctx,
            catalog: &catalog,
        })
        .unwrap();

        assert_eq!(record.item_name, "Rough Plank");
        assert_eq!(record.kind, ItemKind::Item);
        assert_eq!(record.quantity, 4);
        assert_eq!(record.tier, Some(2));
        assert_eq!(record.container_id, "C1");
        assert_eq!(record.claim_name, "Harbor");
    }

    #[test]
    fn test_fallback_names() {
        let catalog = ItemCatalog::default();
        let ctx = container("C1");

        let item = slot("42", None, Some(1));
        let cargo = slot("42", Some(ItemTypeCode::Code(1)), Some(1));

        let item_record = normalize(RawRecord::InventorySlot {
            contents: &item,
            container: &ctx,
            catalog: &catalog,
        })
        .unwrap();
        let cargo_record = normalize(RawRecord::InventorySlot {
            contents: &cargo,
            container: &ctx,
            catalog: &catalog,
        })
        .unwrap();

        assert_eq!(item_record.item_name, "Unknown item 42");
        assert_eq!(cargo_record.item_name, "Unknown cargo 42");
        assert_eq!(item_record.rarity, "");
        assert_eq!(item_record.tag, "");
        assert_eq!(item_record.tier, None);
    }

    #[test]
    fn test_cargo_lookup_uses_cargo_catalog() {
        let catalog = ItemCatalog::from_lists(&[meta("10", "Plank")], &[meta("10", "Log Crate")]);
        let ctx = container("X");
        let contents = slot("10", Some(ItemTypeCode::Label("cargo".to_string())), Some(1));

        let record = normalize(RawRecord::HousingSlot {
            contents: &contents,
            container: &ctx,
            catalog: &catalog,
        })
        .unwrap();

        assert_eq!(record.kind, ItemKind::Cargo);
        assert_eq!(record.item_name, "Log Crate");
    }

    #[test]
    fn test_skip_non_positive_or_missing_quantity() {
        let catalog = ItemCatalog::default();
        let ctx = container("C1");

        for quantity in [Some(0), Some(-3), None] {
            let contents = slot("7", None, quantity);
            let record = normalize(RawRecord::InventorySlot {
                contents: &contents,
                container: &ctx,
                catalog: &catalog,
            });
            assert!(record.is_none(), "quantity {:?} should be skipped", quantity);
        }
    }

    #[test]
    fn test_market_order_record() {
        let order = MarketOrder {
            entity_id: Some("5001".to_string()),
            item_id: Some("7".to_string()),
            item_name: Some("Rough Plank".to_string()),
            quantity: Some(20),
            claim_name: Some("Market Town".to_string()),
            ..Default::default()
        };

        let record = normalize(RawRecord::MarketOrder {
            order: &order,
            side: OrderSide::Buy,
        })
        .unwrap();

        assert_eq!(record.kind, ItemKind::Buy);
        assert_eq!(record.container_id, "5001");
        assert_eq!(record.container_name, BUY_ORDER_CONTAINER);
        assert_eq!(record.item_id, "7");
        assert_eq!(record.tier, None);
    }

    #[test]
    fn test_market_order_without_item_id_uses_order_id() {
        let order = MarketOrder {
            entity_id: Some("5002".to_string()),
            quantity: Some(1),
            ..Default::default()
        };

        let record = normalize(RawRecord::MarketOrder {
            order: &order,
            side: OrderSide::Sell,
        })
        .unwrap();

        assert_eq!(record.item_id, "5002");
        assert_eq!(record.item_name, "Unknown sell 5002");
        assert_eq!(record.container_name, SELL_ORDER_CONTAINER);
    }

    #[test]
    fn test_inventory_payload() {
        let payload = json!({
            "inventories": [{
                "entityId": 111,
                "inventoryName": "Toolbelt",
                "claimName": "Harbor",
                "regionId": 4,
                "pockets": [
                    {"contents": {"itemId": 7, "itemType": 0, "quantity": 2}},
                    {"contents": {"itemId": 9, "itemType": 1, "quantity": 1}},
                    {"contents": {"itemId": 8, "itemType": 0, "quantity": 0}},
                    {"contents": null}
                ]
            }],
            "items": {"7": {"name": "Rough Plank", "rarityStr": "Common", "tag": "Plank", "tier": 1}},
            "cargos": {"9": {"name": "Ore Chunk", "tier": 3}}
        });

        let records = get_normalizer(SourceKind::Inventory)
            .normalize_payload(&payload)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].item_name, "Rough Plank");
        assert_eq!(records[0].container_name, "Toolbelt");
        assert_eq!(records[0].region_id, "4");
        assert_eq!(records[1].kind, ItemKind::Cargo);
        assert_eq!(records[1].item_name, "Ore Chunk");
        assert_eq!(records[1].container_id, "111");
    }

    #[test]
    fn test_housing_payload_labels() {
        let payload = json!({
            "claimName": "Lakeside",
            "claimRegionId": 2,
            "buildingNickname": "",
            "buildingName": "Cottage",
            "items": [{"id": 7, "name": "Rough Plank"}],
            "cargos": [],
            "inventories": [
                {
                    "entityId": "h1",
                    "buildingNickname": "Cellar",
                    "inventory": [{"contents": {"item_id": 7, "item_type": "item", "quantity": 5}}]
                },
                {
                    "entityId": "h2",
                    "inventory": [{"contents": {"item_id": 3, "item_type": "cargo", "quantity": 1}}]
                }
            ]
        });

        let records = HousingNormalizer.normalize_payload(&payload).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].container_name, "Cellar - Cottage");
        assert_eq!(records[0].claim_name, "Lakeside");
        assert_eq!(records[0].region_id, "2");
        assert_eq!(records[1].container_name, "Unknown - Cottage");
        assert_eq!(records[1].item_name, "Unknown cargo 3");
    }

    #[test]
    fn test_housing_without_building_names() {
        let payload = json!({
            "inventories": [{"entityId": "h1", "inventory": [{"contents": {"item_id": 1, "quantity": 1}}]}]
        });

        let records = HousingNormalizer.normalize_payload(&payload).unwrap();
        assert_eq!(records[0].container_name, "Unknown - Unknown House");
    }

    #[test]
    fn test_market_payload_without_orders() {
        let payload = json!({"player": {"username": "Ferris"}});
        let records = MarketOrderNormalizer.normalize_payload(&payload).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_slot_only_drops_that_slot() {
        let payload = json!({
            "inventories": [
                {
                    "entityId": "C1",
                    "pockets": [{"contents": {"itemId": 7, "itemType": 0, "quantity": 5}}]
                },
                {
                    "entityId": "C2",
                    "pockets": [
                        {"contents": {"itemId": 8, "itemType": 1.0, "quantity": 2}},
                        {"contents": {"itemId": 9, "itemType": true, "quantity": 3}},
                        {"contents": {"itemId": 10, "itemType": 0, "quantity": "n/a"}},
                        {"contents": {"itemId": {"nested": 11}, "itemType": 0, "quantity": 1}},
                        {"contents": "not a slot"},
                        42
                    ]
                }
            ],
            "items": {}
        });

        let records = InventoryNormalizer.normalize_payload(&payload).unwrap();

        assert_eq!(records.len(), 3, "only the unusable slots are dropped");
        assert_eq!(records[0].item_id, "7");
        assert_eq!(records[1].item_id, "8");
        assert_eq!(records[1].kind, ItemKind::Cargo, "1.0 is the cargo code");
        assert_eq!(records[1].item_name, "Unknown cargo 8");
        assert_eq!(records[2].item_id, "9");
        assert_eq!(records[2].kind, ItemKind::Item, "non-numeric type is a plain item");
    }

    #[test]
    fn test_market_orders_survive_malformed_experience() {
        let payload = json!({
            "player": {
                "username": 12,
                "experience": "not a list",
                "marketOrders": {
                    "sellOrders": [{"entityId": 900, "itemId": 7, "quantity": 4}]
                }
            }
        });

        let records = MarketOrderNormalizer.normalize_payload(&payload).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ItemKind::Sell);
        assert_eq!(records[0].quantity, 4);
    }

    #[test]
    fn test_malformed_payload_is_error() {
        let payload = json!({"inventories": "not a list"});
        assert!(InventoryNormalizer.normalize_payload(&payload).is_err());
    }
}
