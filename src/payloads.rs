// 📦 Raw API Payloads
// Source-specific shapes as the player API returns them
//
// Each endpoint spells the same things differently (itemId vs item_id,
// itemType 1 vs "cargo", maps vs lists of metadata). These types only
// describe the wire shapes; `normalizer` turns them into canonical records.
// Every field is optional or defaulted so a partially filled payload still
// decodes.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// LENIENT FIELD DECODERS
// ============================================================================

/// `null` or missing → `T::default()`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A list decoded element by element; malformed elements are dropped, not fatal.
///
/// `null` or missing is an empty list. A value that is not a list at all is
/// still an error.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(values)) => values,
        Some(other) => {
            return Err(de::Error::custom(format!("expected a list, got {}", other)));
        }
    };

    Ok(values
        .into_iter()
        .filter_map(|value| match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("dropping malformed entry: {}", e);
                None
            }
        })
        .collect())
}

/// Identifiers arrive as JSON numbers or strings; keep them as text.
/// Anything else is treated as absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Display text; numbers are rendered, other shapes are absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Integers may arrive as numbers, numeric strings, or floats.
/// Unparseable values are treated as absent.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(int_from_value))
}

fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// Skill ids as numbers or numeric strings. Anything else fails the entry,
/// which `lenient_list` then drops.
fn lenient_skill_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let id = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    id.and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| de::Error::custom(format!("expected skill id, got {}", value)))
}

/// Item type as a code or label. Integral floats count as codes;
/// booleans and other shapes are absent.
fn lenient_item_type<'de, D>(deserializer: D) -> Result<Option<ItemTypeCode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(ItemTypeCode::Code),
        Some(Value::String(s)) => Some(ItemTypeCode::Label(s)),
        _ => None,
    })
}

/// A nested object that does not decode is treated as absent
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(value) => match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("dropping malformed object: {}", e);
                None
            }
        },
    })
}

// ============================================================================
// ITEM TYPE DISCRIMINANT
// ============================================================================

/// Numeric cargo sentinel used by the inventory endpoints
pub const CARGO_TYPE_CODE: i64 = 1;

/// String cargo sentinel used by the housing endpoints
pub const CARGO_TYPE_LABEL: &str = "cargo";

/// "Is this cargo" as the wire encodes it.
///
/// Classified exactly once, in `normalizer`, into an `ItemKind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ItemTypeCode {
    Code(i64),
    Label(String),
}

impl ItemTypeCode {
    pub fn is_cargo(&self) -> bool {
        match self {
            ItemTypeCode::Code(code) => *code == CARGO_TYPE_CODE,
            ItemTypeCode::Label(label) => {
                let label = label.trim();
                label.eq_ignore_ascii_case(CARGO_TYPE_LABEL)
                    || label.parse::<i64>() == Ok(CARGO_TYPE_CODE)
            }
        }
    }
}

// ============================================================================
// SHARED SHAPES
// ============================================================================

/// Item or cargo reference metadata
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMeta {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rarity_str: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub tier: Option<i64>,
}

/// Slot contents. Inventory endpoints use camelCase, housing uses snake_case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotContents {
    #[serde(rename = "itemId", alias = "item_id", default, deserialize_with = "lenient_id")]
    pub item_id: Option<String>,
    #[serde(
        rename = "itemType",
        alias = "item_type",
        default,
        deserialize_with = "lenient_item_type"
    )]
    pub item_type: Option<ItemTypeCode>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub quantity: Option<i64>,
}

/// One inventory slot; empty slots carry `contents: null`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pocket {
    #[serde(default, deserialize_with = "lenient_option")]
    pub contents: Option<SlotContents>,
}

// ============================================================================
// PLAYER SEARCH  (GET /players?q=)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerSearchResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub players: Vec<PlayerSearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSearchHit {
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub username: Option<String>,
}

// ============================================================================
// PLAYER  (GET /players/{id})
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerResponse {
    #[serde(default)]
    pub player: Option<PlayerRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub market_orders: Option<MarketOrders>,
}

/// The player payload seen by the market normalizer: orders only, so
/// malformed skill data cannot take the orders down with it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerOrdersResponse {
    #[serde(default, deserialize_with = "lenient_option")]
    pub player: Option<PlayerOrders>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOrders {
    #[serde(default, deserialize_with = "lenient_option")]
    pub market_orders: Option<MarketOrders>,
}

/// Raw (skill id, xp) pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExperienceEntry {
    #[serde(alias = "skillId", deserialize_with = "lenient_skill_id")]
    pub skill_id: u32,
    #[serde(default, deserialize_with = "lenient_int")]
    pub quantity: Option<i64>,
}

impl ExperienceEntry {
    pub fn new(skill_id: u32, quantity: i64) -> Self {
        ExperienceEntry {
            skill_id,
            quantity: Some(quantity),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrders {
    #[serde(default, deserialize_with = "lenient_list")]
    pub sell_orders: Vec<MarketOrder>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub buy_orders: Vec<MarketOrder>,
}

/// Market order with its item metadata embedded
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rarity_str: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub tier: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub claim_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub region_id: Option<String>,
}

// ============================================================================
// PERSONAL INVENTORIES  (GET /players/{id}/inventories)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoriesResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub inventories: Vec<PlayerInventory>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: HashMap<String, ItemMeta>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cargos: HashMap<String, ItemMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInventory {
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub inventory_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub claim_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub region_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub pockets: Vec<Pocket>,
}

// ============================================================================
// HOUSING  (GET /players/{id}/housing, /players/{id}/housing/{building})
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingEntry {
    #[serde(default, deserialize_with = "lenient_id")]
    pub building_entity_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingDetail {
    #[serde(default, deserialize_with = "lenient_list")]
    pub items: Vec<ItemMeta>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub cargos: Vec<ItemMeta>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub claim_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub claim_region_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub building_nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub building_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub inventories: Vec<HousingInventory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingInventory {
    #[serde(default, deserialize_with = "lenient_id")]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub building_nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub building_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub inventory: Vec<Pocket>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_type_code_both_encodings() {
        let numeric: ItemTypeCode = serde_json::from_value(json!(1)).unwrap();
        let label: ItemTypeCode = serde_json::from_value(json!("cargo")).unwrap();
        let item: ItemTypeCode = serde_json::from_value(json!(0)).unwrap();
        let item_label: ItemTypeCode = serde_json::from_value(json!("item")).unwrap();

        assert!(numeric.is_cargo());
        assert!(label.is_cargo());
        assert!(!item.is_cargo());
        assert!(!item_label.is_cargo());
    }

    #[test]
    fn test_slot_contents_accepts_both_field_spellings() {
        let camel: SlotContents =
            serde_json::from_value(json!({"itemId": 42, "itemType": 1, "quantity": 3})).unwrap();
        let snake: SlotContents =
            serde_json::from_value(json!({"item_id": "42", "item_type": "cargo", "quantity": "3"}))
                .unwrap();

        assert_eq!(camel.item_id.as_deref(), Some("42"));
        assert_eq!(snake.item_id.as_deref(), Some("42"));
        assert_eq!(camel.quantity, Some(3));
        assert_eq!(snake.quantity, Some(3));
        assert!(camel.item_type.unwrap().is_cargo());
        assert!(snake.item_type.unwrap().is_cargo());
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let data: InventoriesResponse = serde_json::from_value(json!({
            "inventories": null,
            "items": null
        }))
        .unwrap();

        assert!(data.inventories.is_empty());
        assert!(data.items.is_empty());
        assert!(data.cargos.is_empty());
    }

    #[test]
    fn test_player_with_experience_and_orders() {
        let data: PlayerResponse = serde_json::from_value(json!({
            "player": {
                "entityId": "72057594",
                "username": "Ferris",
                "experience": [
                    {"skill_id": 5, "quantity": 640},
                    {"skill_id": 3, "quantity": 0}
                ],
                "marketOrders": {
                    "sellOrders": [{"entityId": 900, "itemName": "Plank", "quantity": 20}],
                    "buyOrders": null
                }
            }
        }))
        .unwrap();

        let player = data.player.unwrap();
        assert_eq!(player.username.as_deref(), Some("Ferris"));
        assert_eq!(player.experience[0], ExperienceEntry::new(5, 640));
        let orders = player.market_orders.unwrap();
        assert_eq!(orders.sell_orders.len(), 1);
        assert_eq!(orders.sell_orders[0].entity_id.as_deref(), Some("900"));
        assert!(orders.buy_orders.is_empty());
    }

    #[test]
    fn test_empty_slot_contents() {
        let pocket: Pocket = serde_json::from_value(json!({"contents": null})).unwrap();
        assert!(pocket.contents.is_none());
    }

    #[test]
    fn test_unusable_field_values_decode_as_absent() {
        let slot: SlotContents = serde_json::from_value(json!({
            "itemId": [1, 2],
            "itemType": true,
            "quantity": "n/a"
        }))
        .unwrap();

        assert!(slot.item_id.is_none());
        assert!(slot.item_type.is_none());
        assert!(slot.quantity.is_none());
    }

    #[test]
    fn test_integral_float_item_type_is_a_code() {
        let cargo: SlotContents =
            serde_json::from_value(json!({"itemId": 8, "itemType": 1.0, "quantity": 2})).unwrap();
        let fractional: SlotContents =
            serde_json::from_value(json!({"itemId": 8, "itemType": 1.5, "quantity": 2})).unwrap();

        assert_eq!(cargo.item_type, Some(ItemTypeCode::Code(1)));
        assert!(fractional.item_type.is_none());
    }

    #[test]
    fn test_experience_entries_decode_one_by_one() {
        let record: PlayerRecord = serde_json::from_value(json!({
            "experience": [
                {"skill_id": "5", "quantity": 640},
                {"skill_id": null, "quantity": 1},
                {"skill_id": -3, "quantity": 1},
                "junk"
            ]
        }))
        .unwrap();

        assert_eq!(record.experience, vec![ExperienceEntry::new(5, 640)]);
    }

    #[test]
    fn test_list_that_is_not_a_list_is_an_error() {
        let result: Result<InventoriesResponse, _> =
            serde_json::from_value(json!({"inventories": 12}));
        assert!(result.is_err());
    }
}
