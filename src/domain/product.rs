use super::ids::ProductId;
use super::money::Price;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A catalog item.
///
/// `price` is the current price only; sales keep their own copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image_link: Option<String>,
    pub expiry_date: NaiveDate,
    pub manufacturer: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at.get_or_insert(at);
    }
}
