//! Incoming payloads and the functions that turn them into domain values.
//!
//! Nothing here touches a store. Every check that can be made on the payload
//! alone happens here, before any password is hashed or any id allocated.

use crate::domain::money::Price;
use crate::domain::person::{Email, NationalId, Role};
use crate::error::ValidationError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::str::FromStr;

pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 255;

/// Payload for registration and administrative person creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonRequest {
    pub name: String,
    pub national_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: String,
    pub password: String,
    /// Ignored by registration, which always creates a `User`.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Profile update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Re-hashed only when present and non-empty.
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Catalog payload. Also the row shape of the product CSV import.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    /// Read as text so that the written scale (`12.50`) is kept.
    #[serde(deserialize_with = "decimal_from_text")]
    pub price: Decimal,
    pub description: String,
    #[serde(default)]
    pub image_link: Option<String>,
    pub expiry_date: NaiveDate,
    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPerson {
    pub name: String,
    pub national_id: NationalId,
    pub phone: Option<String>,
    pub email: Email,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub national_id: Option<NationalId>,
    pub phone: Option<String>,
    pub email: Option<Email>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image_link: Option<String>,
    pub expiry_date: NaiveDate,
    pub manufacturer: String,
}

pub fn validate_person(
    request: PersonRequest,
    min_password_length: usize,
) -> Result<NewPerson, ValidationError> {
    Ok(NewPerson {
        name: required_text("name", &request.name, NAME_MAX)?,
        national_id: NationalId::parse(&request.national_id)?,
        phone: normalize_phone(request.phone.as_deref())?,
        email: Email::parse(&request.email)?,
        password: validate_password(&request.password, min_password_length)?,
        role: request.role,
    })
}

pub fn validate_person_update(
    update: PersonUpdate,
    min_password_length: usize,
) -> Result<PersonPatch, ValidationError> {
    let password = match update.password {
        Some(password) if !password.is_empty() => {
            Some(validate_password(&password, min_password_length)?)
        }
        _ => None,
    };
    Ok(PersonPatch {
        name: update
            .name
            .map(|name| required_text("name", &name, NAME_MAX))
            .transpose()?,
        national_id: update
            .national_id
            .map(|raw| NationalId::parse(&raw))
            .transpose()?,
        phone: normalize_phone(update.phone.as_deref())?,
        email: update.email.map(|raw| Email::parse(&raw)).transpose()?,
        password,
        role: update.role,
    })
}

/// `today` is the caller's clock date; expiry may not lie before it.
pub fn validate_product(
    request: ProductRequest,
    today: NaiveDate,
) -> Result<NewProduct, ValidationError> {
    let name = required_text("name", &request.name, NAME_MAX)?;
    let price = Price::new(request.price)?;
    let description = required_text("description", &request.description, DESCRIPTION_MAX)?;
    let manufacturer = required_text("manufacturer", &request.manufacturer, NAME_MAX)?;
    if request.expiry_date < today {
        return Err(ValidationError::DateInPast {
            field: "expiry date",
        });
    }
    let image_link = request
        .image_link
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty());

    Ok(NewProduct {
        name,
        price,
        description,
        image_link,
        expiry_date: request.expiry_date,
        manufacturer,
    })
}

pub fn validate_password(password: &str, min: usize) -> Result<String, ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required { field: "password" });
    }
    if password.chars().count() < min {
        return Err(ValidationError::TooShort {
            field: "password",
            min,
        });
    }
    Ok(password.to_string())
}

/// Keeps digits only. A blank phone is treated as absent.
pub fn normalize_phone(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if raw
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '(' | ')' | '-' | ' ' | '+')))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone",
            reason: "must contain only digits",
        });
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(10..=11).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone",
            reason: "must have 10 or 11 digits",
        });
    }
    Ok(Some(digits))
}

fn decimal_from_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Decimal::from_str(raw.trim()).map_err(de::Error::custom)
}

fn required_text(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}
