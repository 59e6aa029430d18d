use super::ids::PersonId;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
    #[default]
    User,
}

/// A Brazilian CPF, kept as its 11 digits without punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    /// Accepts both `123.456.789-09` and `12345678909`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits: Vec<u32> = raw
            .chars()
            .filter(|c| !matches!(*c, '.' | '-' | ' '))
            .map(|c| c.to_digit(10))
            .collect::<Option<_>>()
            .ok_or(ValidationError::InvalidFormat {
                field: "national id",
                reason: "must contain only digits",
            })?;

        if digits.is_empty() {
            return Err(ValidationError::Required {
                field: "national id",
            });
        }
        if digits.len() != 11 {
            return Err(ValidationError::InvalidFormat {
                field: "national id",
                reason: "must have 11 digits",
            });
        }
        if digits.iter().all(|d| *d == digits[0]) {
            return Err(ValidationError::InvalidFormat {
                field: "national id",
                reason: "repeated digits",
            });
        }
        if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
            return Err(ValidationError::InvalidFormat {
                field: "national id",
                reason: "check digits do not match",
            });
        }

        Ok(Self(digits.iter().map(|d| d.to_string()).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Weights run from len+1 down to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 { 0 } else { rest }
}

impl TryFrom<String> for NationalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lower-cased e-mail address of the form `local@domain.tld`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let email = raw.trim();
        if email.is_empty() {
            return Err(ValidationError::Required { field: "email" });
        }

        let invalid = ValidationError::InvalidFormat {
            field: "email",
            reason: "expected local@domain.tld",
        };
        if email.chars().any(char::is_whitespace) {
            return Err(invalid);
        }
        let Some((local, domain)) = email.split_once('@') else {
            return Err(invalid);
        };
        if local.is_empty() || domain.contains('@') {
            return Err(invalid);
        }
        match domain.rsplit_once('.') {
            Some((host, tld)) if !host.is_empty() && !tld.is_empty() => {}
            _ => return Err(invalid),
        }

        Ok(Self(email.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered person: customer, employee or administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub national_id: NationalId,
    pub phone: Option<String>,
    pub email: Email,
    /// PHC string produced by the password hasher. Never the plain password.
    pub password_hash: String,
    pub role: Role,
    /// Soft-delete marker. `None` means active.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Person {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Marks the person as deleted. Deleting twice keeps the first date.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at.get_or_insert(at);
    }
}
