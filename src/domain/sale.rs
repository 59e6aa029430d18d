use super::ids::{PersonId, ProductId, SaleId, SaleLineId};
use super::money::{Money, Price, Quantity};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sold product. `unit_price` and `product_name` are copied from the
/// product when the sale is created and never read back from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: SaleLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Price,
}

impl SaleLine {
    pub fn subtotal(&self) -> Result<Money, ValidationError> {
        self.unit_price.times(self.quantity)
    }
}

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub buyer: PersonId,
    pub purchased_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub lines: Vec<SaleLine>,
}

impl Sale {
    pub fn total(&self) -> Result<Money, ValidationError> {
        self.lines
            .iter()
            .try_fold(Money::ZERO, |total, line| total.checked_add(line.subtotal()?))
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at.get_or_insert(at);
    }

    /// Returns `true` when the buyer actually changed.
    pub fn reassign(&mut self, buyer: PersonId) -> bool {
        if self.buyer == buyer {
            return false;
        }
        self.buyer = buyer;
        true
    }
}
