use crate::application::account::AccountEngine;
use crate::application::cart::{CartEngine, CartLocks};
use crate::application::catalog::CatalogEngine;
use crate::application::sale::SaleEngine;
use crate::application::views::{CartView, SaleView};
use crate::config::AppConfig;
use crate::domain::ids::{CartLineId, PersonId, ProductId};
use crate::domain::ports::{
    CartStoreRef, ClockRef, IdentityResolver, PasswordHasherRef, PersonStoreRef, Principal,
    ProductStoreRef, SaleStoreRef,
};
use crate::error::Result;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::identity::StoreIdentityResolver;
use crate::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryPersonStore, InMemoryProductStore, InMemorySaleStore,
};
use crate::infrastructure::password::Argon2Hasher;
use std::sync::Arc;

/// The four stores the engines run on.
#[derive(Clone)]
pub struct StoreSet {
    pub persons: PersonStoreRef,
    pub products: ProductStoreRef,
    pub carts: CartStoreRef,
    pub sales: SaleStoreRef,
}

impl StoreSet {
    pub fn in_memory() -> Self {
        Self {
            persons: Arc::new(InMemoryPersonStore::new()),
            products: Arc::new(InMemoryProductStore::new()),
            carts: Arc::new(InMemoryCartStore::new()),
            sales: Arc::new(InMemorySaleStore::new()),
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let store = crate::infrastructure::rocksdb::RocksDBStore::open(path)?;
        Ok(Self {
            persons: Arc::new(store.clone()),
            products: Arc::new(store.clone()),
            carts: Arc::new(store.clone()),
            sales: Arc::new(store),
        })
    }
}

/// All operations behind one value, wired to a shared set of stores.
///
/// Operations that act on "my" data take a [`Principal`] and resolve it
/// through the identity resolver before calling an engine; everything else
/// is reached through the engine accessors.
pub struct Backoffice {
    catalog: CatalogEngine,
    accounts: AccountEngine,
    carts: CartEngine,
    sales: SaleEngine,
    identity: Arc<dyn IdentityResolver>,
}

impl Backoffice {
    pub fn new(
        stores: StoreSet,
        hasher: PasswordHasherRef,
        clock: ClockRef,
        min_password_length: usize,
    ) -> Self {
        let locks = CartLocks::new();
        Self {
            catalog: CatalogEngine::new(stores.products.clone(), clock.clone()),
            accounts: AccountEngine::new(stores.persons.clone(), hasher, clock.clone())
                .with_min_password_length(min_password_length),
            carts: CartEngine::new(
                stores.persons.clone(),
                stores.products.clone(),
                stores.carts.clone(),
                clock.clone(),
                locks.clone(),
            ),
            sales: SaleEngine::new(
                stores.persons.clone(),
                stores.products,
                stores.sales,
                stores.carts,
                clock,
                locks,
            ),
            identity: Arc::new(StoreIdentityResolver::new(stores.persons)),
        }
    }

    /// Production wiring: Argon2 hashing, wall clock, settings from `config`.
    pub fn from_config(stores: StoreSet, config: &AppConfig) -> Self {
        Self::new(
            stores,
            Arc::new(Argon2Hasher::new()),
            Arc::new(SystemClock),
            config.security.min_password_length,
        )
    }

    pub fn catalog(&self) -> &CatalogEngine {
        &self.catalog
    }

    pub fn accounts(&self) -> &AccountEngine {
        &self.accounts
    }

    pub fn carts(&self) -> &CartEngine {
        &self.carts
    }

    pub fn sales(&self) -> &SaleEngine {
        &self.sales
    }

    pub async fn resolve(&self, principal: &Principal) -> Result<PersonId> {
        self.identity.current_person_id(principal).await
    }

    pub async fn my_cart(&self, principal: &Principal) -> Result<CartView> {
        let me = self.resolve(principal).await?;
        self.carts.get_or_create_cart(me).await
    }

    pub async fn add_to_my_cart(
        &self,
        principal: &Principal,
        product: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        let me = self.resolve(principal).await?;
        self.carts.add_item(me, product, quantity).await
    }

    pub async fn remove_from_my_cart(
        &self,
        principal: &Principal,
        line: CartLineId,
    ) -> Result<CartView> {
        let me = self.resolve(principal).await?;
        self.carts.remove_item(me, line).await
    }

    pub async fn set_my_cart_quantity(
        &self,
        principal: &Principal,
        line: CartLineId,
        quantity: i64,
    ) -> Result<CartView> {
        let me = self.resolve(principal).await?;
        self.carts.set_quantity(me, line, quantity).await
    }

    pub async fn clear_my_cart(&self, principal: &Principal) -> Result<CartView> {
        let me = self.resolve(principal).await?;
        self.carts.clear_cart(me).await
    }

    pub async fn checkout(&self, principal: &Principal) -> Result<SaleView> {
        let me = self.resolve(principal).await?;
        self.sales.checkout(me).await
    }

    pub async fn my_sales(&self, principal: &Principal) -> Result<Vec<SaleView>> {
        let me = self.resolve(principal).await?;
        self.sales.list_sales_for(me).await
    }

    pub async fn change_my_password(
        &self,
        principal: &Principal,
        current: &str,
        new: &str,
    ) -> Result<()> {
        let me = self.resolve(principal).await?;
        self.accounts.change_password(me, current, new).await
    }
}
