use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub stock_qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.reorder_point
            .is_some_and(|reorder_point| self.stock_qty <= reorder_point)
    }
}

#[cfg(test)]
mod tests {
    use super::InventoryItem;

    fn item(stock_qty: u32, reorder_point: Option<u32>) -> InventoryItem {
        InventoryItem {
            id: "inv-test".to_string(),
            sku: "SKU".to_string(),
            name: "Oil Filter".to_string(),
            stock_qty,
            reorder_point,
            supplier: None,
            unit_cost: None,
        }
    }

    #[test]
    fn low_stock_requires_a_reorder_point() {
        assert!(item(5, Some(5)).is_low_stock());
        assert!(!item(6, Some(5)).is_low_stock());
        assert!(!item(0, None).is_low_stock());
    }
}
