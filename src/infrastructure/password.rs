use crate::domain::ports::PasswordHasher;
use crate::error::{PharmacyError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, SaltString};
use argon2::{Argon2, PasswordVerifier};

/// Verified against when no account matches. Well-formed, default
/// parameters, matches no password.
const ABSENT_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$gKCEAfXq87UVnMsBbjvqPg$tOsF2uGovS7DXLmV41PXKHP+kfpEBi/aE0Le9tqtfgk";

/// Argon2id hashing with the crate's default parameters and a random salt.
///
/// Hashes are PHC strings, so the parameters travel with each hash.
#[derive(Default, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        argon2::PasswordHasher::hash_password(&self.argon2, password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PharmacyError::InternalError(format!("password hashing: {e}").into()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PharmacyError::InternalError(format!("stored hash: {e}").into()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PharmacyError::InternalError(
                format!("password verification: {e}").into(),
            )),
        }
    }

    fn verify_absent(&self, password: &str) -> Result<()> {
        self.verify(password, ABSENT_HASH).map(|_| ())
    }
}
