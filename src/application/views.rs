//! Read models returned by the engines.
//!
//! Views are snapshots: they are built after the store write and carry
//! computed subtotals and totals so callers never re-derive amounts.

use crate::domain::cart::Cart;
use crate::domain::ids::{CartId, CartLineId, PersonId, ProductId, SaleId, SaleLineId};
use crate::domain::money::{Money, Price, two_places};
use crate::domain::person::{Person, Role};
use crate::domain::product::Product;
use crate::domain::sale::{Sale, SaleLine};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A person without the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonView {
    pub id: PersonId,
    pub name: String,
    pub national_id: String,
    pub phone: Option<String>,
    pub email: String,
    pub role: Role,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Person> for PersonView {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id,
            name: person.name.clone(),
            national_id: person.national_id.to_string(),
            phone: person.phone.clone(),
            email: person.email.to_string(),
            role: person.role,
            deleted_at: person.deleted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(serialize_with = "two_places")]
    pub unit_price: Price,
    pub subtotal: Money,
}

/// A cart priced with the catalog's current prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub cart_id: CartId,
    pub person_id: PersonId,
    pub person_name: String,
    pub created_at: DateTime<Utc>,
    pub total: Money,
    pub lines: Vec<CartLineView>,
}

impl CartView {
    /// `products` must hold the product of every line, in line order.
    pub(crate) fn build(
        owner: &Person,
        cart: &Cart,
        products: &[Product],
    ) -> Result<Self, ValidationError> {
        let lines = cart
            .lines()
            .iter()
            .zip(products)
            .map(|(line, product)| {
                Ok(CartLineView {
                    line_id: line.id,
                    product_id: line.product_id,
                    product_name: product.name.clone(),
                    quantity: line.quantity.value(),
                    unit_price: product.price,
                    subtotal: product.price.times(line.quantity)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self {
            cart_id: cart.id,
            person_id: owner.id,
            person_name: owner.name.clone(),
            created_at: cart.created_at,
            total: Money::total(lines.iter().map(|line| line.subtotal))?,
            lines,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleLineView {
    pub line_id: SaleLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(serialize_with = "two_places")]
    pub unit_price: Price,
    pub subtotal: Money,
}

impl TryFrom<&SaleLine> for SaleLineView {
    type Error = ValidationError;

    fn try_from(line: &SaleLine) -> Result<Self, Self::Error> {
        Ok(Self {
            line_id: line.id,
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity.value(),
            unit_price: line.unit_price,
            subtotal: line.subtotal()?,
        })
    }
}

/// A sale priced only from its own line snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleView {
    pub sale_id: SaleId,
    pub buyer: PersonView,
    pub purchased_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub total: Money,
    pub lines: Vec<SaleLineView>,
}

impl SaleView {
    pub(crate) fn build(sale: &Sale, buyer: &Person) -> Result<Self, ValidationError> {
        Ok(Self {
            sale_id: sale.id,
            buyer: PersonView::from(buyer),
            purchased_at: sale.purchased_at,
            deleted_at: sale.deleted_at,
            total: sale.total()?,
            lines: sale
                .lines
                .iter()
                .map(SaleLineView::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::person::{Email, NationalId};

    #[test]
    fn test_person_view_hides_password_hash() {
        let person = Person {
            id: PersonId::new(1),
            name: "Ana".to_string(),
            national_id: NationalId::parse("529.982.247-25").unwrap(),
            phone: Some("11987654321".to_string()),
            email: Email::parse("ana@example.com").unwrap(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Employee,
            deleted_at: None,
        };
        let json = serde_json::to_string(&PersonView::from(&person)).unwrap();

        assert!(!json.contains("argon2"));
        assert!(json.contains("\"national_id\":\"52998224725\""));
        assert!(json.contains("\"role\":\"employee\""));
    }
}
