use super::product;
use super::requests::{NewProduct, ProductRequest, validate_product};
use crate::domain::ids::ProductId;
use crate::domain::ports::{ClockRef, ProductStoreRef};
use crate::domain::product::Product;
use crate::error::Result;
use tracing::info;

/// Catalog maintenance. Deleting a product only hides it; carts and sales
/// that reference it keep resolving.
pub struct CatalogEngine {
    products: ProductStoreRef,
    clock: ClockRef,
}

impl CatalogEngine {
    pub fn new(products: ProductStoreRef, clock: ClockRef) -> Self {
        Self { products, clock }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self
            .products
            .find_all()
            .await?
            .into_iter()
            .filter(Product::is_active)
            .collect())
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        product(&self.products, id).await
    }

    pub async fn create_product(&self, request: ProductRequest) -> Result<Product> {
        let new = validate_product(request, self.clock.now().date_naive())?;
        self.insert(new).await
    }

    /// Replaces every field of the product. Existing sales keep their snapshot.
    pub async fn update_product(&self, id: ProductId, request: ProductRequest) -> Result<Product> {
        let new = validate_product(request, self.clock.now().date_naive())?;
        let mut product = product(&self.products, id).await?;

        product.name = new.name;
        product.price = new.price;
        product.description = new.description;
        product.image_link = new.image_link;
        product.expiry_date = new.expiry_date;
        product.manufacturer = new.manufacturer;

        let product = self.products.save(product).await?;
        info!(product_id = %id, price = %product.price, "Product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut product = product(&self.products, id).await?;
        product.soft_delete(self.clock.now());
        self.products.save(product).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Adds every row to the catalog.
    ///
    /// All rows are read and validated first; a single bad row imports nothing.
    pub async fn import_products<I>(&self, rows: I) -> Result<Vec<Product>>
    where
        I: IntoIterator<Item = Result<ProductRequest>>,
    {
        let today = self.clock.now().date_naive();
        let mut validated = Vec::new();
        for row in rows {
            validated.push(validate_product(row?, today)?);
        }

        let mut imported = Vec::with_capacity(validated.len());
        for new in validated {
            imported.push(self.insert(new).await?);
        }
        info!(count = imported.len(), "Products imported");
        Ok(imported)
    }

    async fn insert(&self, new: NewProduct) -> Result<Product> {
        let product = Product {
            id: self.products.next_id().await?,
            name: new.name,
            price: new.price,
            description: new.description,
            image_link: new.image_link,
            expiry_date: new.expiry_date,
            manufacturer: new.manufacturer,
            deleted_at: None,
        };
        let product = self.products.save(product).await?;
        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }
}
