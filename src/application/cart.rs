use super::views::CartView;
use super::{active_person, active_product, person};
use crate::domain::cart::{Cart, CartLine};
use crate::domain::ids::{CartLineId, PersonId, ProductId};
use crate::domain::money::Quantity;
use crate::domain::person::Person;
use crate::domain::ports::{CartStoreRef, ClockRef, PersonStoreRef, ProductStoreRef};
use crate::error::{Entity, PharmacyError, Result, UniqueField};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

type LockTable = Arc<Mutex<HashMap<PersonId, Arc<tokio::sync::Mutex<()>>>>>;

/// One async mutex per cart owner.
///
/// Every read-modify-write of a cart runs while holding its owner's guard,
/// so two concurrent adds cannot overwrite each other's increment. Clones
/// share the same table. An owner's entry lives only while someone holds or
/// waits for it.
#[derive(Default, Clone)]
pub struct CartLocks {
    locks: LockTable,
}

/// Held for the duration of one cart operation.
pub struct CartGuard {
    guard: Option<OwnedMutexGuard<()>>,
    owner: PersonId,
    locks: LockTable,
}

impl CartLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, owner: PersonId) -> CartGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(owner).or_default().clone()
        };
        CartGuard {
            guard: Some(lock.lock_owned().await),
            owner,
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for CartGuard {
    fn drop(&mut self) {
        // The guard keeps its mutex alive; release it before counting.
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.owner)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.owner);
        }
    }
}

/// Keeps each person's single cart consistent.
///
/// Prices are read from the product store every time a view is built, so a
/// cart is always a quote at current prices.
pub struct CartEngine {
    persons: PersonStoreRef,
    products: ProductStoreRef,
    carts: CartStoreRef,
    clock: ClockRef,
    locks: CartLocks,
}

impl CartEngine {
    pub fn new(
        persons: PersonStoreRef,
        products: ProductStoreRef,
        carts: CartStoreRef,
        clock: ClockRef,
        locks: CartLocks,
    ) -> Self {
        Self {
            persons,
            products,
            carts,
            clock,
            locks,
        }
    }

    /// Returns the person's cart, creating an empty one on first use.
    pub async fn get_or_create_cart(&self, owner: PersonId) -> Result<CartView> {
        let _guard = self.locks.lock(owner).await;
        let person = active_person(&self.persons, owner).await?;
        let cart = self.load_or_create(owner).await?;
        self.view(&person, &cart).await
    }

    /// Adds `quantity` units of a product, merging into the product's existing line.
    ///
    /// The cart is priced before it is saved; a line whose amount overflows is
    /// rejected and nothing is written.
    pub async fn add_item(
        &self,
        owner: PersonId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        let quantity = Quantity::new(quantity)?;

        let _guard = self.locks.lock(owner).await;
        let person = active_person(&self.persons, owner).await?;
        active_product(&self.products, product_id).await?;
        let mut cart = self.load_or_create(owner).await?;

        if !cart.merge(product_id, quantity)? {
            let line = CartLine {
                id: self.carts.next_line_id().await?,
                product_id,
                quantity,
            };
            cart.push_line(line)?;
        }
        let view = self.view(&person, &cart).await?;
        self.carts.save(cart).await?;
        info!(person_id = %owner, product_id = %product_id, quantity = quantity.value(), "Item added to cart");
        Ok(view)
    }

    pub async fn remove_item(&self, owner: PersonId, line_id: CartLineId) -> Result<CartView> {
        let _guard = self.locks.lock(owner).await;
        let person = person(&self.persons, owner).await?;
        let mut cart = self.existing(owner).await?;

        if cart.remove_line(line_id).is_none() {
            return Err(PharmacyError::not_found(Entity::CartLine, line_id));
        }
        let cart = self.carts.save(cart).await?;
        info!(person_id = %owner, line_id = %line_id, "Item removed from cart");
        self.view(&person, &cart).await
    }

    /// Overwrites a line's quantity. Zero removes the line.
    pub async fn set_quantity(
        &self,
        owner: PersonId,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<CartView> {
        if quantity != 0 {
            Quantity::new(quantity)?;
        }

        let _guard = self.locks.lock(owner).await;
        let person = person(&self.persons, owner).await?;
        let mut cart = self.existing(owner).await?;

        if !cart.set_quantity(line_id, quantity)? {
            return Err(PharmacyError::not_found(Entity::CartLine, line_id));
        }
        let view = self.view(&person, &cart).await?;
        self.carts.save(cart).await?;
        info!(person_id = %owner, line_id = %line_id, quantity, "Cart line quantity set");
        Ok(view)
    }

    pub async fn clear_cart(&self, owner: PersonId) -> Result<CartView> {
        let _guard = self.locks.lock(owner).await;
        let person = person(&self.persons, owner).await?;
        let mut cart = self.existing(owner).await?;

        cart.clear();
        let cart = self.carts.save(cart).await?;
        info!(person_id = %owner, "Cart cleared");
        self.view(&person, &cart).await
    }

    async fn existing(&self, owner: PersonId) -> Result<Cart> {
        self.carts
            .find_by_owner(owner)
            .await?
            .ok_or_else(|| PharmacyError::not_found(Entity::Cart, owner))
    }

    async fn load_or_create(&self, owner: PersonId) -> Result<Cart> {
        if let Some(cart) = self.carts.find_by_owner(owner).await? {
            return Ok(cart);
        }

        let cart = Cart::new(self.carts.next_cart_id().await?, owner, self.clock.now());
        match self.carts.save(cart).await {
            Ok(cart) => {
                info!(person_id = %owner, cart_id = %cart.id, "Cart created");
                Ok(cart)
            }
            // Another process created the owner's cart first; use that one.
            Err(PharmacyError::Conflict {
                field: UniqueField::CartOwner,
                ..
            }) => {
                warn!(person_id = %owner, "Lost cart creation race, re-reading");
                self.existing(owner).await
            }
            Err(e) => Err(e),
        }
    }

    async fn view(&self, owner: &Person, cart: &Cart) -> Result<CartView> {
        let mut products = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            products.push(super::product(&self.products, line.product_id).await?);
        }
        debug!(cart_id = %cart.id, lines = products.len(), "Cart priced");
        Ok(CartView::build(owner, cart, &products)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fixtures::{CPFS, Stores, start};
    use crate::domain::money::Money;
    use crate::domain::ports::{CartStore, PersonStore, ProductStore};
    use crate::error::ValidationError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine(stores: &Stores) -> CartEngine {
        CartEngine::new(
            Arc::new(stores.persons.clone()),
            Arc::new(stores.products.clone()),
            Arc::new(stores.carts.clone()),
            stores.clock_ref(),
            CartLocks::new(),
        )
    }

    #[tokio::test]
    async fn test_get_or_create_cart_is_lazy_and_stable() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        let engine = engine(&stores);

        assert!(stores.carts.find_by_owner(PersonId::new(7)).await.unwrap().is_none());
        let first = engine.get_or_create_cart(PersonId::new(7)).await.unwrap();
        let second = engine.get_or_create_cart(PersonId::new(7)).await.unwrap();

        assert_eq!(first.cart_id, second.cart_id);
        assert_eq!(first.created_at, start());
        assert_eq!(first.person_name, "Ana");
        assert_eq!(first.total, Money::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_or_deleted_person_has_no_cart() {
        let stores = Stores::new();
        let engine = engine(&stores);
        let err = engine.get_or_create_cart(PersonId::new(99)).await.unwrap_err();
        assert!(err.is_not_found(Entity::Person));

        let mut ana = stores.person(7, "Ana", CPFS[0]).await;
        ana.soft_delete(start());
        stores.persons.save(ana).await.unwrap();
        let err = engine.get_or_create_cart(PersonId::new(7)).await.unwrap_err();
        assert!(err.is_not_found(Entity::Person));
    }

    #[tokio::test]
    async fn test_add_item_merges_lines() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(12.50)).await;
        let engine = engine(&stores);

        engine.add_item(PersonId::new(7), ProductId::new(3), 2).await.unwrap();
        let view = engine.add_item(PersonId::new(7), ProductId::new(3), 5).await.unwrap();

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 7);
        assert_eq!(view.lines[0].subtotal, Money::new(dec!(87.50)));
        assert_eq!(view.total, Money::new(dec!(87.50)));
    }

    #[tokio::test]
    async fn test_add_item_rejections() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        let mut retired = stores.product(4, "Old syrup", dec!(3.00)).await;
        retired.soft_delete(start());
        stores.products.save(retired).await.unwrap();
        let engine = engine(&stores);

        let err = engine.add_item(PersonId::new(7), ProductId::new(3), 0).await.unwrap_err();
        assert!(matches!(
            err,
            PharmacyError::InvalidInput(ValidationError::NonPositiveQuantity { requested: 0 })
        ));

        let err = engine.add_item(PersonId::new(7), ProductId::new(3), 1).await.unwrap_err();
        assert!(err.is_not_found(Entity::Product));

        let err = engine.add_item(PersonId::new(7), ProductId::new(4), 1).await.unwrap_err();
        assert!(err.is_not_found(Entity::Product));
    }

    #[tokio::test]
    async fn test_cart_total_uses_current_prices() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(12.50)).await;
        let engine = engine(&stores);

        engine.add_item(PersonId::new(7), ProductId::new(3), 2).await.unwrap();
        stores.reprice(3, dec!(10.00)).await;

        let view = engine.get_or_create_cart(PersonId::new(7)).await.unwrap();
        assert_eq!(view.total, Money::new(dec!(20.00)));
    }

    #[tokio::test]
    async fn test_remove_item() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(12.50)).await;
        stores.product(5, "Soro", dec!(4.00)).await;
        let engine = engine(&stores);

        let err = engine.remove_item(PersonId::new(7), CartLineId::new(1)).await.unwrap_err();
        assert!(err.is_not_found(Entity::Cart));

        engine.add_item(PersonId::new(7), ProductId::new(3), 1).await.unwrap();
        let view = engine.add_item(PersonId::new(7), ProductId::new(5), 2).await.unwrap();
        let first = view.lines[0].line_id;

        let view = engine.remove_item(PersonId::new(7), first).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].product_id, ProductId::new(5));

        let err = engine.remove_item(PersonId::new(7), first).await.unwrap_err();
        assert!(err.is_not_found(Entity::CartLine));
    }

    #[tokio::test]
    async fn test_set_quantity() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(12.50)).await;
        let engine = engine(&stores);

        let view = engine.add_item(PersonId::new(7), ProductId::new(3), 1).await.unwrap();
        let line = view.lines[0].line_id;

        let view = engine.set_quantity(PersonId::new(7), line, 4).await.unwrap();
        assert_eq!(view.lines[0].quantity, 4);

        let err = engine.set_quantity(PersonId::new(7), line, -1).await.unwrap_err();
        assert!(matches!(err, PharmacyError::InvalidInput(_)));

        let view = engine.set_quantity(PersonId::new(7), line, 0).await.unwrap();
        assert!(view.lines.is_empty());
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(12.50)).await;
        let engine = engine(&stores);

        let err = engine.clear_cart(PersonId::new(7)).await.unwrap_err();
        assert!(err.is_not_found(Entity::Cart));

        engine.add_item(PersonId::new(7), ProductId::new(3), 3).await.unwrap();
        engine.clear_cart(PersonId::new(7)).await.unwrap();

        let view = engine.get_or_create_cart(PersonId::new(7)).await.unwrap();
        assert!(view.lines.is_empty());
        assert_eq!(view.total.to_string(), "0.00");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["total"], "0.00");
    }

    #[tokio::test]
    async fn test_amount_overflow_leaves_cart_unchanged() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Gold leaf", Decimal::MAX).await;
        stores.product(5, "Soro", dec!(4.00)).await;
        let engine = engine(&stores);
        engine.add_item(PersonId::new(7), ProductId::new(5), 1).await.unwrap();

        let err = engine.add_item(PersonId::new(7), ProductId::new(3), 2).await.unwrap_err();
        assert!(matches!(
            err,
            PharmacyError::InvalidInput(ValidationError::AmountTooLarge)
        ));

        let cart = stores.carts.find_by_owner(PersonId::new(7)).await.unwrap().unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].product_id, ProductId::new(5));
    }

    #[tokio::test]
    async fn test_lock_entries_are_released() {
        let locks = CartLocks::new();
        let first = locks.lock(PersonId::new(7)).await;
        let other = locks.lock(PersonId::new(8)).await;
        assert_eq!(locks.tracked(), 2);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(PersonId::new(7)).await;
            })
        };
        tokio::task::yield_now().await;
        drop(first);
        waiter.await.unwrap();
        drop(other);

        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        stores.product(3, "Dipirona", dec!(1.00)).await;
        let engine = Arc::new(engine(&stores));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.add_item(PersonId::new(7), ProductId::new(3), 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cart = stores.carts.find_by_owner(PersonId::new(7)).await.unwrap().unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity.value(), 50);
    }

    #[tokio::test]
    async fn test_creation_race_reuses_winning_cart() {
        let stores = Stores::new();
        stores.person(7, "Ana", CPFS[0]).await;
        // A second engine with its own lock table stands in for another process.
        let a = Arc::new(engine(&stores));
        let b = Arc::new(engine(&stores));

        let (x, y) = tokio::join!(
            a.get_or_create_cart(PersonId::new(7)),
            b.get_or_create_cart(PersonId::new(7))
        );
        assert_eq!(x.unwrap().cart_id, y.unwrap().cart_id);
    }
}
