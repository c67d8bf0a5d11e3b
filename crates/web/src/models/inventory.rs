//! Inventory items, their images and restock history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmfusion_core::{AdminId, Availability, ImageId, InventoryId, Price, RestockId};

use crate::db::Document;

/// A stock item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryId,
    pub code: String,
    #[serde(default)]
    pub description: String,
    /// Not validated against negatives.
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Price>,
    pub stock_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub image_ids: Vec<ImageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create an inventory item.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub code: String,
    pub description: String,
    /// Defaults to 1.
    pub quantity: Option<i64>,
    /// Defaults to now.
    pub stock_date: Option<DateTime<Utc>>,
    pub location: String,
    pub availability: Availability,
}

impl InventoryItem {
    /// Quantity used when none is given.
    pub const DEFAULT_QUANTITY: i64 = 1;

    /// Build a fresh inventory document.
    #[must_use]
    pub fn new(input: NewInventoryItem) -> Self {
        let now = Utc::now();
        Self {
            id: InventoryId::generate(),
            code: input.code,
            description: input.description,
            quantity: input.quantity.unwrap_or(Self::DEFAULT_QUANTITY),
            price: None,
            stock_date: input.stock_date.unwrap_or(now),
            location: input.location,
            availability: input.availability,
            image_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for InventoryItem {
    type Id = InventoryId;

    const COLLECTION: &'static str = "inventory";
    const SEARCH_FIELDS: &'static [&'static str] = &["code", "description"];
    const SORT_FIELD: &'static str = "code";

    fn id(&self) -> InventoryId {
        self.id
    }
}

/// Editable inventory fields; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
}

/// An image attached to an inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryImage {
    pub id: ImageId,
    pub product: InventoryId,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryImage {
    /// Build a fresh image document.
    #[must_use]
    pub fn new(product: InventoryId, url: String) -> Self {
        let now = Utc::now();
        Self {
            id: ImageId::generate(),
            product,
            url,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for InventoryImage {
    type Id = ImageId;

    const COLLECTION: &'static str = "inventory_images";
    const SEARCH_FIELDS: &'static [&'static str] = &["url"];
    const SORT_FIELD: &'static str = "url";

    fn id(&self) -> ImageId {
        self.id
    }
}

/// Append-only audit record of a restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockHistory {
    pub id: RestockId,
    /// Acting admin.
    pub user: AdminId,
    pub product: InventoryId,
    /// Quantity delta applied.
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub cost_price: Option<Price>,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for RestockHistory {
    type Id = RestockId;

    const COLLECTION: &'static str = "restock_history";
    const SEARCH_FIELDS: &'static [&'static str] = &["note"];
    const SORT_FIELD: &'static str = "created_at";

    fn id(&self) -> RestockId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = InventoryItem::new(NewInventoryItem {
            code: "MZ-01".to_string(),
            description: "Maize seed".to_string(),
            quantity: None,
            stock_date: None,
            location: "Store A".to_string(),
            availability: Availability::InStock,
        });
        assert_eq!(item.quantity, InventoryItem::DEFAULT_QUANTITY);
        assert_eq!(item.stock_date, item.created_at);
        assert!(item.image_ids.is_empty());
        assert!(item.price.is_none());
    }

    #[test]
    fn test_patch_skips_untouched_fields() {
        let patch = InventoryPatch {
            location: Some("Shed".to_string()),
            ..InventoryPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"location": "Shed"}));
    }
}
