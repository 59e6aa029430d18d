use crate::domain::ids::{PersonId, ProductId};
use crate::domain::money::Price;
use crate::domain::person::{Email, NationalId, Person, Role};
use crate::domain::ports::{ClockRef, PersonStore, ProductStore};
use crate::domain::product::Product;
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryPersonStore, InMemoryProductStore, InMemorySaleStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

pub(crate) const CPFS: [&str; 3] = ["52998224725", "12345678909", "11144477735"];

pub(crate) struct Stores {
    pub persons: InMemoryPersonStore,
    pub products: InMemoryProductStore,
    pub carts: InMemoryCartStore,
    pub sales: InMemorySaleStore,
    pub clock: FixedClock,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            persons: InMemoryPersonStore::new(),
            products: InMemoryProductStore::new(),
            carts: InMemoryCartStore::new(),
            sales: InMemorySaleStore::new(),
            clock: FixedClock::new(start()),
        }
    }

    pub fn clock_ref(&self) -> ClockRef {
        Arc::new(self.clock.clone())
    }

    pub async fn person(&self, id: u64, name: &str, cpf: &str) -> Person {
        let person = Person {
            id: PersonId::new(id),
            name: name.to_string(),
            national_id: NationalId::parse(cpf).unwrap(),
            phone: None,
            email: Email::parse(&format!("{}@example.com", name.to_lowercase())).unwrap(),
            password_hash: "unused".to_string(),
            role: Role::User,
            deleted_at: None,
        };
        self.persons.save(person).await.unwrap()
    }

    pub async fn product(&self, id: u64, name: &str, price: Decimal) -> Product {
        let product = Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::new(price).unwrap(),
            description: format!("{name} description"),
            image_link: None,
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            manufacturer: "Acme Pharma".to_string(),
            deleted_at: None,
        };
        self.products.save(product).await.unwrap()
    }

    pub async fn reprice(&self, id: u64, price: Decimal) {
        let mut product = self
            .products
            .find_by_id(ProductId::new(id))
            .await
            .unwrap()
            .unwrap();
        product.price = Price::new(price).unwrap();
        self.products.save(product).await.unwrap();
    }
}

pub(crate) fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_790_000_000, 0).unwrap()
}
