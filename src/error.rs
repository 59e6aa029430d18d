use std::fmt;
use thiserror::Error;

/// The kind of record a [`PharmacyError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Person,
    Product,
    Cart,
    CartLine,
    Sale,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Person => "Person",
            Entity::Product => "Product",
            Entity::Cart => "Cart",
            Entity::CartLine => "Cart line",
            Entity::Sale => "Sale",
        };
        f.write_str(name)
    }
}

/// Fields guarded by a uniqueness constraint in the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    NationalId,
    CartOwner,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniqueField::Email => "email",
            UniqueField::NationalId => "national id",
            UniqueField::CartOwner => "cart owner",
        };
        f.write_str(name)
    }
}

/// Input that was rejected before any store was touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Quantity must be positive, got {requested}")]
    NonPositiveQuantity { requested: i64 },
    #[error("Quantity {requested} is too large")]
    QuantityTooLarge { requested: i64 },
    #[error("Amount is too large")]
    AmountTooLarge,
    #[error("An order needs at least one line")]
    EmptyOrder,
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field} must be today or later")]
    DateInPast { field: &'static str },
}

#[derive(Error, Debug)]
pub enum PharmacyError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("Duplicate {field}: '{value}' already exists")]
    Conflict { field: UniqueField, value: String },
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("No authenticated person")]
    Unauthenticated,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PharmacyError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        PharmacyError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(field: UniqueField, value: impl Into<String>) -> Self {
        PharmacyError::Conflict {
            field,
            value: value.into(),
        }
    }

    pub fn is_not_found(&self, wanted: Entity) -> bool {
        matches!(self, PharmacyError::NotFound { entity, .. } if *entity == wanted)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PharmacyError {
    fn from(err: rocksdb::Error) -> Self {
        PharmacyError::Storage(err.into_string())
    }
}

pub type Result<T> = std::result::Result<T, PharmacyError>;
