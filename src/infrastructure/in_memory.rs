use crate::domain::cart::Cart;
use crate::domain::ids::{CartId, CartLineId, PersonId, ProductId, SaleId, SaleLineId};
use crate::domain::person::Person;
use crate::domain::ports::{CartStore, PersonStore, ProductStore, SaleStore};
use crate::domain::product::Product;
use crate::domain::sale::Sale;
use crate::error::{PharmacyError, Result, UniqueField};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Monotonic id source shared by clones of a store.
#[derive(Debug, Default, Clone)]
struct Sequence(Arc<AtomicU64>);

impl Sequence {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Keeps the sequence ahead of ids that were assigned elsewhere.
    fn observe(&self, id: u64) {
        self.0.fetch_max(id, Ordering::SeqCst);
    }
}

/// A thread-safe in-memory store for persons.
///
/// Uses `Arc<RwLock<BTreeMap<PersonId, Person>>>` so clones share state and
/// listings come back in id order. Uniqueness of e-mail and national id is
/// checked under the write lock.
#[derive(Default, Clone)]
pub struct InMemoryPersonStore {
    persons: Arc<RwLock<BTreeMap<PersonId, Person>>>,
    ids: Sequence,
}

impl InMemoryPersonStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersonStore for InMemoryPersonStore {
    async fn next_id(&self) -> Result<PersonId> {
        Ok(PersonId::new(self.ids.next()))
    }

    async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>> {
        let persons = self.persons.read().await;
        Ok(persons.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Person>> {
        let email = email.trim().to_lowercase();
        let persons = self.persons.read().await;
        Ok(persons
            .values()
            .find(|p| p.email.as_str() == email)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Person>> {
        let persons = self.persons.read().await;
        Ok(persons.values().cloned().collect())
    }

    async fn save(&self, person: Person) -> Result<Person> {
        let mut persons = self.persons.write().await;
        for other in persons.values().filter(|p| p.id != person.id) {
            if other.email == person.email {
                return Err(PharmacyError::conflict(
                    UniqueField::Email,
                    person.email.as_str(),
                ));
            }
            if other.national_id == person.national_id {
                return Err(PharmacyError::conflict(
                    UniqueField::NationalId,
                    person.national_id.as_str(),
                ));
            }
        }
        self.ids.observe(person.id.value());
        debug!(person_id = %person.id, "Saving person");
        persons.insert(person.id, person.clone());
        Ok(person)
    }
}

/// A thread-safe in-memory product catalog.
#[derive(Default, Clone)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
    ids: Sequence,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn next_id(&self) -> Result<ProductId> {
        Ok(ProductId::new(self.ids.next()))
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }

    async fn save(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write().await;
        self.ids.observe(product.id.value());
        debug!(product_id = %product.id, "Saving product");
        products.insert(product.id, product.clone());
        Ok(product)
    }
}

/// A thread-safe in-memory store for carts, keyed by owner.
///
/// Keying by owner is what enforces the one-cart-per-person rule: a save for
/// an owner whose slot holds a different cart id is rejected.
#[derive(Default, Clone)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<BTreeMap<PersonId, Cart>>>,
    cart_ids: Sequence,
    line_ids: Sequence,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn next_cart_id(&self) -> Result<CartId> {
        Ok(CartId::new(self.cart_ids.next()))
    }

    async fn next_line_id(&self) -> Result<CartLineId> {
        Ok(CartLineId::new(self.line_ids.next()))
    }

    async fn find_by_owner(&self, owner: PersonId) -> Result<Option<Cart>> {
        let carts = self.carts.read().await;
        Ok(carts.get(&owner).cloned())
    }

    async fn save(&self, cart: Cart) -> Result<Cart> {
        let mut carts = self.carts.write().await;
        if let Some(existing) = carts.get(&cart.owner)
            && existing.id != cart.id
        {
            return Err(PharmacyError::conflict(
                UniqueField::CartOwner,
                cart.owner.to_string(),
            ));
        }
        self.cart_ids.observe(cart.id.value());
        for line in cart.lines() {
            self.line_ids.observe(line.id.value());
        }
        debug!(cart_id = %cart.id, owner = %cart.owner, lines = cart.lines().len(), "Saving cart");
        carts.insert(cart.owner, cart.clone());
        Ok(cart)
    }
}

/// A thread-safe in-memory store for sales.
///
/// A sale and all of its lines are inserted under a single write lock.
#[derive(Default, Clone)]
pub struct InMemorySaleStore {
    sales: Arc<RwLock<BTreeMap<SaleId, Sale>>>,
    sale_ids: Sequence,
    line_ids: Sequence,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaleStore for InMemorySaleStore {
    async fn next_sale_id(&self) -> Result<SaleId> {
        Ok(SaleId::new(self.sale_ids.next()))
    }

    async fn next_line_id(&self) -> Result<SaleLineId> {
        Ok(SaleLineId::new(self.line_ids.next()))
    }

    async fn save(&self, sale: Sale) -> Result<Sale> {
        let mut sales = self.sales.write().await;
        self.sale_ids.observe(sale.id.value());
        for line in &sale.lines {
            self.line_ids.observe(line.id.value());
        }
        debug!(sale_id = %sale.id, lines = sale.lines.len(), "Saving sale");
        sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn find_by_id(&self, id: SaleId) -> Result<Option<Sale>> {
        let sales = self.sales.read().await;
        Ok(sales.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Sale>> {
        let sales = self.sales.read().await;
        Ok(sales.values().cloned().collect())
    }
}
