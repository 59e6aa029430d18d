use super::cart::Cart;
use super::ids::{CartId, CartLineId, PersonId, ProductId, SaleId, SaleLineId};
use super::person::Person;
use super::product::Product;
use super::sale::Sale;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persons keyed by id.
///
/// `save` inserts or replaces, and fails with `Conflict` when another person
/// already holds the same e-mail or national id.
#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn next_id(&self) -> Result<PersonId>;
    async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Person>>;
    async fn find_all(&self) -> Result<Vec<Person>>;
    async fn save(&self, person: Person) -> Result<Person>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn next_id(&self) -> Result<ProductId>;
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>>;
    async fn find_all(&self) -> Result<Vec<Product>>;
    async fn save(&self, product: Product) -> Result<Product>;
}

/// Carts keyed by owner.
///
/// `save` fails with `Conflict` when a different cart already belongs to the
/// same owner: one active cart per person.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn next_cart_id(&self) -> Result<CartId>;
    async fn next_line_id(&self) -> Result<CartLineId>;
    async fn find_by_owner(&self, owner: PersonId) -> Result<Option<Cart>>;
    async fn save(&self, cart: Cart) -> Result<Cart>;
}

/// Sales with their lines.
///
/// `save` writes the header and every line in one step; readers never
/// observe a sale with only part of its lines.
#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn next_sale_id(&self) -> Result<SaleId>;
    async fn next_line_id(&self) -> Result<SaleLineId>;
    async fn save(&self, sale: Sale) -> Result<Sale>;
    async fn find_by_id(&self, id: SaleId) -> Result<Option<Sale>>;
    async fn find_all(&self) -> Result<Vec<Sale>>;
}

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    /// Must compare in constant time.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
    /// Does the work of a failed `verify` when there is no stored hash to
    /// check, so an unknown account costs the same as a wrong password.
    fn verify_absent(&self, password: &str) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Who is calling, as established by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
}

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// Maps an authenticated principal to a person id.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Fails with `Unauthenticated` when no active person matches.
    async fn current_person_id(&self, principal: &Principal) -> Result<PersonId>;
}

pub type PersonStoreRef = Arc<dyn PersonStore>;
pub type ProductStoreRef = Arc<dyn ProductStore>;
pub type CartStoreRef = Arc<dyn CartStore>;
pub type SaleStoreRef = Arc<dyn SaleStore>;
pub type PasswordHasherRef = Arc<dyn PasswordHasher>;
pub type ClockRef = Arc<dyn Clock>;
