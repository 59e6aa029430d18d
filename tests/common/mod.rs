#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use pharmacy_backoffice::application::requests::{PersonRequest, ProductRequest};
use pharmacy_backoffice::application::views::PersonView;
use pharmacy_backoffice::domain::ids::{PersonId, ProductId};
use pharmacy_backoffice::domain::money::Price;
use pharmacy_backoffice::domain::person::{Email, NationalId, Person, Role};
use pharmacy_backoffice::domain::ports::{PersonStore, Principal, ProductStore};
use pharmacy_backoffice::domain::product::Product;
use pharmacy_backoffice::infrastructure::clock::FixedClock;
use pharmacy_backoffice::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryPersonStore, InMemoryProductStore, InMemorySaleStore,
};
use pharmacy_backoffice::infrastructure::password::Argon2Hasher;
use pharmacy_backoffice::interfaces::backoffice::{Backoffice, StoreSet};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

/// Valid CPFs, usable as distinct national ids.
pub const CPFS: [&str; 3] = ["52998224725", "12345678909", "11144477735"];

/// A wired back office over in-memory stores, with handles kept for inspection.
pub struct Harness {
    pub office: Backoffice,
    pub persons: InMemoryPersonStore,
    pub products: InMemoryProductStore,
    pub carts: InMemoryCartStore,
    pub sales: InMemorySaleStore,
    pub clock: FixedClock,
}

pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_790_000_000, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let persons = InMemoryPersonStore::new();
        let products = InMemoryProductStore::new();
        let carts = InMemoryCartStore::new();
        let sales = InMemorySaleStore::new();
        let clock = FixedClock::new(start());
        let stores = StoreSet {
            persons: Arc::new(persons.clone()),
            products: Arc::new(products.clone()),
            carts: Arc::new(carts.clone()),
            sales: Arc::new(sales.clone()),
        };
        let office = Backoffice::new(
            stores,
            Arc::new(Argon2Hasher::new()),
            Arc::new(clock.clone()),
            3,
        );
        Self {
            office,
            persons,
            products,
            carts,
            sales,
            clock,
        }
    }

    /// Registers through the account engine and returns the principal to act as.
    pub async fn register(&self, name: &str, cpf: &str, password: &str) -> (PersonView, Principal) {
        let email = format!("{}@example.com", name.to_lowercase());
        let view = self
            .office
            .accounts()
            .register(PersonRequest {
                name: name.to_string(),
                national_id: cpf.to_string(),
                phone: None,
                email: email.clone(),
                password: password.to_string(),
                role: None,
            })
            .await
            .unwrap();
        (view, Principal::new(email))
    }

    /// Stores a person with a fixed id, bypassing the engine.
    pub async fn seed_person(&self, id: u64, name: &str, cpf: &str) -> Principal {
        let email = format!("{}@example.com", name.to_lowercase());
        self.persons
            .save(Person {
                id: PersonId::new(id),
                name: name.to_string(),
                national_id: NationalId::parse(cpf).unwrap(),
                phone: None,
                email: Email::parse(&email).unwrap(),
                password_hash: "not-a-hash".to_string(),
                role: Role::User,
                deleted_at: None,
            })
            .await
            .unwrap();
        Principal::new(email)
    }

    /// Stores a product with a fixed id, bypassing the engine.
    pub async fn seed_product(&self, id: u64, name: &str, price: Decimal) -> ProductId {
        self.products
            .save(Product {
                id: ProductId::new(id),
                name: name.to_string(),
                price: Price::new(price).unwrap(),
                description: format!("{name} description"),
                image_link: None,
                expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                manufacturer: "Acme Pharma".to_string(),
                deleted_at: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn reprice(&self, id: ProductId, price: Decimal) {
        let current = self.office.catalog().get_product(id).await.unwrap();
        self.office
            .catalog()
            .update_product(
                id,
                ProductRequest {
                    name: current.name,
                    price,
                    description: current.description,
                    image_link: current.image_link,
                    expiry_date: current.expiry_date,
                    manufacturer: current.manufacturer,
                },
            )
            .await
            .unwrap();
    }
}

pub fn generate_products_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "name",
        "price",
        "description",
        "image_link",
        "expiry_date",
        "manufacturer",
    ])?;

    for i in 1..=rows {
        wtr.write_record([
            format!("Product {i}").as_str(),
            "9.99",
            "Generated",
            "",
            "2030-01-01",
            "Acme Pharma",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
