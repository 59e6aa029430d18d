//! Application layer: the engines that orchestrate domain rules over the ports.
//!
//! Every engine takes the acting identity as an explicit argument; resolving a
//! principal to a person id happens before an engine is called.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod requests;
pub mod sale;
pub mod views;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::domain::ids::{PersonId, ProductId};
use crate::domain::person::Person;
use crate::domain::ports::{PersonStoreRef, ProductStoreRef};
use crate::domain::product::Product;
use crate::error::{Entity, PharmacyError, Result};

/// Loads a person in any state.
pub(crate) async fn person(persons: &PersonStoreRef, id: PersonId) -> Result<Person> {
    persons
        .find_by_id(id)
        .await?
        .ok_or_else(|| PharmacyError::not_found(Entity::Person, id))
}

/// Loads a person that may still take part in new commerce.
pub(crate) async fn active_person(persons: &PersonStoreRef, id: PersonId) -> Result<Person> {
    persons
        .find_by_id(id)
        .await?
        .filter(Person::is_active)
        .ok_or_else(|| PharmacyError::not_found(Entity::Person, id))
}

pub(crate) async fn product(products: &ProductStoreRef, id: ProductId) -> Result<Product> {
    products
        .find_by_id(id)
        .await?
        .ok_or_else(|| PharmacyError::not_found(Entity::Product, id))
}

pub(crate) async fn active_product(products: &ProductStoreRef, id: ProductId) -> Result<Product> {
    products
        .find_by_id(id)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| PharmacyError::not_found(Entity::Product, id))
}
