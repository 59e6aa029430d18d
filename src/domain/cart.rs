use super::ids::{CartId, CartLineId, PersonId, ProductId};
use super::money::Quantity;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One product and how many units of it sit in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// The single active cart of a person.
///
/// Holds at most one line per product. Lines keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: PersonId,
    pub created_at: DateTime<Utc>,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(id: CartId, owner: PersonId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            created_at,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line_id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    /// Adds `quantity` to the line already holding `product_id`.
    ///
    /// Returns `Ok(false)` when the cart has no line for that product yet;
    /// the caller then appends one with [`Cart::push_line`].
    pub fn merge(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, ValidationError> {
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appends a new line, or merges it when the product is already present.
    pub fn push_line(&mut self, line: CartLine) -> Result<(), ValidationError> {
        if !self.merge(line.product_id, line.quantity)? {
            self.lines.push(line);
        }
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: CartLineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| line.id == line_id)?;
        Some(self.lines.remove(index))
    }

    /// Overwrites the quantity of a line. Zero removes the line.
    ///
    /// Returns `Ok(false)` when the line is not in this cart.
    pub fn set_quantity(
        &mut self,
        line_id: CartLineId,
        requested: i64,
    ) -> Result<bool, ValidationError> {
        if requested == 0 {
            return Ok(self.remove_line(line_id).is_some());
        }
        let quantity = Quantity::new(requested)?;
        match self.lines.iter_mut().find(|line| line.id == line_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
