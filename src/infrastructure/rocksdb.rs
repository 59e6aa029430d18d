use crate::domain::cart::Cart;
use crate::domain::ids::{CartId, CartLineId, PersonId, ProductId, SaleId, SaleLineId};
use crate::domain::person::Person;
use crate::domain::ports::{CartStore, PersonStore, ProductStore, SaleStore};
use crate::domain::product::Product;
use crate::domain::sale::Sale;
use crate::error::{PharmacyError, Result, UniqueField};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Persons keyed by id.
pub const CF_PERSONS: &str = "persons";
/// Unique keys (`email:<address>`, `national_id:<digits>`) pointing at a person id.
pub const CF_PERSON_INDEX: &str = "person_index";
pub const CF_PRODUCTS: &str = "products";
/// Carts keyed by owner id, one per person.
pub const CF_CARTS: &str = "carts";
/// Sales keyed by id; each value carries all of the sale's lines.
pub const CF_SALES: &str = "sales";
/// Last id handed out, per sequence name.
pub const CF_SEQUENCES: &str = "sequences";

const SEQ_PERSONS: &str = "persons";
const SEQ_PRODUCTS: &str = "products";
const SEQ_CARTS: &str = "carts";
const SEQ_CART_LINES: &str = "cart_lines";
const SEQ_SALES: &str = "sales";
const SEQ_SALE_LINES: &str = "sale_lines";

/// A persistent store implementation using RocksDB.
///
/// Implements every store port over separate column families. Values are
/// JSON; keys are big-endian ids so iteration follows id order.
///
/// Writes are serialized by an async mutex so that uniqueness checks and
/// sequence bumps see a stable view, and each save is a single `WriteBatch`.
/// `Clone` shares the underlying `Arc<DB>` and the write mutex.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_PERSONS,
            CF_PERSON_INDEX,
            CF_PRODUCTS,
            CF_CARTS,
            CF_SALES,
            CF_SEQUENCES,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PharmacyError::Storage(format!("{name} column family not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn all<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn sequence(&self, name: &str) -> Result<u64> {
        match self.db.get_cf(self.cf(CF_SEQUENCES)?, name)? {
            Some(bytes) => decode_id(&bytes),
            None => Ok(0),
        }
    }

    async fn next(&self, name: &str) -> Result<u64> {
        let _guard = self.writes.lock().await;
        let next = self.sequence(name)? + 1;
        self.db
            .put_cf(self.cf(CF_SEQUENCES)?, name, next.to_be_bytes())?;
        Ok(next)
    }

    /// Keeps a sequence ahead of ids that were assigned by the caller.
    fn observe(&self, batch: &mut WriteBatch, name: &str, id: u64) -> Result<()> {
        if id > self.sequence(name)? {
            batch.put_cf(self.cf(CF_SEQUENCES)?, name, id.to_be_bytes());
        }
        Ok(())
    }

    fn check_unique(
        &self,
        field: UniqueField,
        key: &str,
        value: &str,
        owner: PersonId,
    ) -> Result<()> {
        match self.db.get_cf(self.cf(CF_PERSON_INDEX)?, key)? {
            Some(bytes) if decode_id(&bytes)? != owner.value() => {
                Err(PharmacyError::conflict(field, value))
            }
            _ => Ok(()),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| PharmacyError::Storage(format!("Serialization error: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PharmacyError::Storage(format!("Deserialization error: {e}")))
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| PharmacyError::Storage("Malformed id value".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn email_key(person: &Person) -> String {
    format!("email:{}", person.email)
}

fn national_id_key(person: &Person) -> String {
    format!("national_id:{}", person.national_id)
}

#[async_trait]
impl PersonStore for RocksDBStore {
    async fn next_id(&self) -> Result<PersonId> {
        self.next(SEQ_PERSONS).await.map(PersonId::new)
    }

    async fn find_by_id(&self, id: PersonId) -> Result<Option<Person>> {
        self.get(CF_PERSONS, &id.value().to_be_bytes())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Person>> {
        let key = format!("email:{}", email.trim().to_lowercase());
        match self.db.get_cf(self.cf(CF_PERSON_INDEX)?, key)? {
            Some(bytes) => self.get(CF_PERSONS, &bytes),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Person>> {
        self.all(CF_PERSONS)
    }

    async fn save(&self, person: Person) -> Result<Person> {
        let _guard = self.writes.lock().await;
        let key = person.id.value().to_be_bytes();
        let email = email_key(&person);
        let national_id = national_id_key(&person);

        self.check_unique(UniqueField::Email, &email, person.email.as_str(), person.id)?;
        self.check_unique(
            UniqueField::NationalId,
            &national_id,
            person.national_id.as_str(),
            person.id,
        )?;

        let index = self.cf(CF_PERSON_INDEX)?;
        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get::<Person>(CF_PERSONS, &key)? {
            for stale in [email_key(&previous), national_id_key(&previous)] {
                if stale != email && stale != national_id {
                    batch.delete_cf(index, stale);
                }
            }
        }
        batch.put_cf(index, &email, key);
        batch.put_cf(index, &national_id, key);
        batch.put_cf(self.cf(CF_PERSONS)?, key, encode(&person)?);
        self.observe(&mut batch, SEQ_PERSONS, person.id.value())?;
        self.db.write(batch)?;

        debug!(person_id = %person.id, "Person persisted");
        Ok(person)
    }
}

#[async_trait]
impl ProductStore for RocksDBStore {
    async fn next_id(&self) -> Result<ProductId> {
        self.next(SEQ_PRODUCTS).await.map(ProductId::new)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        self.get(CF_PRODUCTS, &id.value().to_be_bytes())
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        self.all(CF_PRODUCTS)
    }

    async fn save(&self, product: Product) -> Result<Product> {
        let _guard = self.writes.lock().await;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_PRODUCTS)?,
            product.id.value().to_be_bytes(),
            encode(&product)?,
        );
        self.observe(&mut batch, SEQ_PRODUCTS, product.id.value())?;
        self.db.write(batch)?;
        Ok(product)
    }
}

#[async_trait]
impl CartStore for RocksDBStore {
    async fn next_cart_id(&self) -> Result<CartId> {
        self.next(SEQ_CARTS).await.map(CartId::new)
    }

    async fn next_line_id(&self) -> Result<CartLineId> {
        self.next(SEQ_CART_LINES).await.map(CartLineId::new)
    }

    async fn find_by_owner(&self, owner: PersonId) -> Result<Option<Cart>> {
        self.get(CF_CARTS, &owner.value().to_be_bytes())
    }

    async fn save(&self, cart: Cart) -> Result<Cart> {
        let _guard = self.writes.lock().await;
        let key = cart.owner.value().to_be_bytes();
        if let Some(existing) = self.get::<Cart>(CF_CARTS, &key)?
            && existing.id != cart.id
        {
            return Err(PharmacyError::conflict(
                UniqueField::CartOwner,
                cart.owner.to_string(),
            ));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_CARTS)?, key, encode(&cart)?);
        self.observe(&mut batch, SEQ_CARTS, cart.id.value())?;
        if let Some(max_line) = cart.lines().iter().map(|l| l.id.value()).max() {
            self.observe(&mut batch, SEQ_CART_LINES, max_line)?;
        }
        self.db.write(batch)?;
        Ok(cart)
    }
}

#[async_trait]
impl SaleStore for RocksDBStore {
    async fn next_sale_id(&self) -> Result<SaleId> {
        self.next(SEQ_SALES).await.map(SaleId::new)
    }

    async fn next_line_id(&self) -> Result<SaleLineId> {
        self.next(SEQ_SALE_LINES).await.map(SaleLineId::new)
    }

    async fn save(&self, sale: Sale) -> Result<Sale> {
        let _guard = self.writes.lock().await;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_SALES)?,
            sale.id.value().to_be_bytes(),
            encode(&sale)?,
        );
        self.observe(&mut batch, SEQ_SALES, sale.id.value())?;
        if let Some(max_line) = sale.lines.iter().map(|l| l.id.value()).max() {
            self.observe(&mut batch, SEQ_SALE_LINES, max_line)?;
        }
        self.db.write(batch)?;

        debug!(sale_id = %sale.id, lines = sale.lines.len(), "Sale persisted");
        Ok(sale)
    }

    async fn find_by_id(&self, id: SaleId) -> Result<Option<Sale>> {
        self.get(CF_SALES, &id.value().to_be_bytes())
    }

    async fn find_all(&self) -> Result<Vec<Sale>> {
        self.all(CF_SALES)
    }
}
