use crate::aliases::AliasTable;
use crate::coerce::{brand_icon_path, coerce_amount, coerce_count, slugify};
use crate::{CanonicalInventoryItem, RawRecord};
use tracing::debug;

/// Normalize an inventory record with the built-in alias table.
///
/// `positional_index` is the 0-based position of the record in its document;
/// it becomes the id (1-based) when the record carries none.
pub fn normalize_inventory_item(raw: &RawRecord, positional_index: usize) -> CanonicalInventoryItem {
    normalize_inventory_item_with(raw, positional_index, &AliasTable::inventory_default())
}

pub fn normalize_inventory_item_with(
    raw: &RawRecord,
    positional_index: usize,
    table: &AliasTable,
) -> CanonicalInventoryItem {
    let get = |field: &str| table.resolve_or_empty(raw, field);

    let brand = get("brand");
    let brand_slug = table
        .resolve(raw, "brand_slug")
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&brand));
    let brand_icon = table
        .resolve(raw, "brand_icon")
        .map(str::to_string)
        .unwrap_or_else(|| brand_icon_path(&brand_slug));

    CanonicalInventoryItem {
        id: table
            .resolve(raw, "id")
            .map(str::to_string)
            .unwrap_or_else(|| (positional_index + 1).to_string()),
        item: get("item"),
        vitola: get("vitola"),
        price: table.resolve(raw, "price").map(coerce_amount).unwrap_or(0.0),
        inventory: table.resolve(raw, "inventory").map(coerce_count).unwrap_or(0),
        brand,
        brand_slug,
        brand_icon,
    }
}

/// Normalize a whole inventory document, skipping blank records
pub fn normalize_inventory(records: &[RawRecord], table: &AliasTable) -> Vec<CanonicalInventoryItem> {
    let items: Vec<CanonicalInventoryItem> = records
        .iter()
        .enumerate()
        .filter(|(_, raw)| !raw.is_blank())
        .map(|(idx, raw)| normalize_inventory_item_with(raw, idx, table))
        .collect();
    debug!("Normalized {} inventory items", items.len());
    items
}

impl CanonicalInventoryItem {
    /// Flatten into a record keyed by the canonical field names
    pub fn to_raw_record(&self) -> RawRecord {
        vec![
            ("id", self.id.clone()),
            ("brand", self.brand.clone()),
            ("item", self.item.clone()),
            ("vitola", self.vitola.clone()),
            ("price", self.price.to_string()),
            ("inventory", self.inventory.to_string()),
            ("brand_slug", self.brand_slug.clone()),
            ("brand_icon", self.brand_icon.clone()),
        ]
        .into_iter()
        .collect()
    }
}
