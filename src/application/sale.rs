use super::cart::CartLocks;
use super::views::SaleView;
use super::{active_person, active_product, person};
use crate::domain::ids::{PersonId, ProductId, SaleId};
use crate::domain::money::Quantity;
use crate::domain::person::Person;
use crate::domain::ports::{CartStoreRef, ClockRef, PersonStoreRef, ProductStoreRef, SaleStoreRef};
use crate::domain::sale::{Sale, SaleLine};
use crate::error::{Entity, PharmacyError, Result, ValidationError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

/// Turns orders into immutable sale records.
///
/// Each sale line stores the product's name and unit price as they were at
/// creation; later catalog changes never alter a recorded sale.
pub struct SaleEngine {
    persons: PersonStoreRef,
    products: ProductStoreRef,
    sales: SaleStoreRef,
    carts: CartStoreRef,
    clock: ClockRef,
    locks: CartLocks,
}

impl SaleEngine {
    /// `locks` must be the table shared with the cart engine so that checkout
    /// and cart edits exclude each other.
    pub fn new(
        persons: PersonStoreRef,
        products: ProductStoreRef,
        sales: SaleStoreRef,
        carts: CartStoreRef,
        clock: ClockRef,
        locks: CartLocks,
    ) -> Self {
        Self {
            persons,
            products,
            sales,
            carts,
            clock,
            locks,
        }
    }

    /// Records a sale of `lines` (product, quantity) to `buyer`.
    ///
    /// Everything is validated and every product resolved before the first
    /// write. The sale and its lines are then persisted by a single store call.
    pub async fn create_sale(
        &self,
        buyer: PersonId,
        lines: Vec<(ProductId, i64)>,
    ) -> Result<SaleView> {
        if lines.is_empty() {
            return Err(ValidationError::EmptyOrder.into());
        }
        let requested = lines
            .into_iter()
            .map(|(product_id, quantity)| Ok((product_id, Quantity::new(quantity)?)))
            .collect::<std::result::Result<Vec<_>, ValidationError>>()?;

        let buyer = active_person(&self.persons, buyer).await?;
        let mut resolved = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let product = active_product(&self.products, product_id).await?;
            resolved.push((product, quantity));
        }

        let sale_id = self.sales.next_sale_id().await?;
        let mut sale_lines = Vec::with_capacity(resolved.len());
        for (product, quantity) in resolved {
            sale_lines.push(SaleLine {
                id: self.sales.next_line_id().await?,
                product_id: product.id,
                product_name: product.name,
                quantity,
                unit_price: product.price,
            });
        }

        let sale = Sale {
            id: sale_id,
            buyer: buyer.id,
            purchased_at: self.clock.now(),
            deleted_at: None,
            lines: sale_lines,
        };
        // Priced before the write so an amount overflow stores nothing.
        let view = SaleView::build(&sale, &buyer)?;
        let sale = self.sales.save(sale).await?;
        info!(sale_id = %sale.id, buyer = %buyer.id, total = %view.total, "Sale created");
        Ok(view)
    }

    /// Buys everything in the person's cart, then empties the cart.
    ///
    /// The cart is cleared only after the sale is stored; if the sale fails
    /// the cart is left as it was.
    pub async fn checkout(&self, owner: PersonId) -> Result<SaleView> {
        let _guard = self.locks.lock(owner).await;
        let mut cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or_else(|| PharmacyError::not_found(Entity::Cart, owner))?;
        if cart.is_empty() {
            return Err(ValidationError::EmptyOrder.into());
        }

        let lines = cart
            .lines()
            .iter()
            .map(|line| (line.product_id, i64::from(line.quantity.value())))
            .collect();
        let sale = self.create_sale(owner, lines).await?;

        cart.clear();
        self.carts.save(cart).await?;
        info!(sale_id = %sale.sale_id, person_id = %owner, "Cart checked out");
        Ok(sale)
    }

    /// Returns the sale even when it has been soft-deleted.
    pub async fn get_sale(&self, id: SaleId) -> Result<SaleView> {
        let sale = self.find(id).await?;
        let buyer = person(&self.persons, sale.buyer).await?;
        Ok(SaleView::build(&sale, &buyer)?)
    }

    pub async fn list_sales(&self) -> Result<Vec<SaleView>> {
        let sales: Vec<Sale> = self
            .sales
            .find_all()
            .await?
            .into_iter()
            .filter(Sale::is_active)
            .collect();
        self.views(sales).await
    }

    /// Active sales of one buyer, oldest first.
    pub async fn list_sales_for(&self, buyer: PersonId) -> Result<Vec<SaleView>> {
        let buyer = person(&self.persons, buyer).await?;
        let sales: Vec<SaleView> = self
            .sales
            .find_all()
            .await?
            .into_iter()
            .filter(|sale| sale.is_active() && sale.buyer == buyer.id)
            .map(|sale| SaleView::build(&sale, &buyer))
            .collect::<std::result::Result<_, _>>()?;
        debug!(buyer = %buyer.id, count = sales.len(), "Listed purchase history");
        Ok(sales)
    }

    /// Moves a sale to another buyer. Lines are never touched.
    ///
    /// Naming the current buyer changes nothing and checks nothing, even when
    /// that buyer has since been deleted.
    pub async fn update_sale(&self, id: SaleId, new_buyer: PersonId) -> Result<SaleView> {
        let mut sale = self.find(id).await?;
        if sale.buyer == new_buyer {
            let buyer = person(&self.persons, sale.buyer).await?;
            return Ok(SaleView::build(&sale, &buyer)?);
        }

        let buyer = active_person(&self.persons, new_buyer).await?;
        sale.reassign(buyer.id);
        let sale = self.sales.save(sale).await?;
        info!(sale_id = %id, buyer = %buyer.id, "Sale reassigned");
        Ok(SaleView::build(&sale, &buyer)?)
    }

    pub async fn delete_sale(&self, id: SaleId) -> Result<()> {
        let mut sale = self.find(id).await?;
        sale.soft_delete(self.clock.now());
        self.sales.save(sale).await?;
        info!(sale_id = %id, "Sale deleted");
        Ok(())
    }

    async fn find(&self, id: SaleId) -> Result<Sale> {
        self.sales
            .find_by_id(id)
            .await?
            .ok_or_else(|| PharmacyError::not_found(Entity::Sale, id))
    }

    async fn views(&self, sales: Vec<Sale>) -> Result<Vec<SaleView>> {
        let mut buyers: HashMap<PersonId, Person> = HashMap::new();
        let mut views = Vec::with_capacity(sales.len());
        for sale in &sales {
            let buyer = match buyers.entry(sale.buyer) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(person(&self.persons, sale.buyer).await?),
            };
            views.push(SaleView::build(sale, buyer)?);
        }
        Ok(views)
    }
}
