use crate::domain::ids::PersonId;
use crate::domain::ports::{IdentityResolver, PersonStoreRef, Principal};
use crate::error::{PharmacyError, Result};
use async_trait::async_trait;
use tracing::warn;

/// Resolves a principal's e-mail through the person store.
pub struct StoreIdentityResolver {
    persons: PersonStoreRef,
}

impl StoreIdentityResolver {
    pub fn new(persons: PersonStoreRef) -> Self {
        Self { persons }
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn current_person_id(&self, principal: &Principal) -> Result<PersonId> {
        match self.persons.find_by_email(&principal.email).await? {
            Some(person) if person.is_active() => Ok(person.id),
            _ => {
                warn!(email = %principal.email, "Principal does not map to an active person");
                Err(PharmacyError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::person::{Email, NationalId, Person, Role};
    use crate::domain::ports::PersonStore;
    use crate::infrastructure::in_memory::InMemoryPersonStore;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolves_only_active_persons() {
        let store = InMemoryPersonStore::new();
        let mut ana = Person {
            id: PersonId::new(7),
            name: "Ana".to_string(),
            national_id: NationalId::parse("52998224725").unwrap(),
            phone: None,
            email: Email::parse("ana@example.com").unwrap(),
            password_hash: "hash".to_string(),
            role: Role::User,
            deleted_at: None,
        };
        store.save(ana.clone()).await.unwrap();
        let resolver = StoreIdentityResolver::new(Arc::new(store.clone()));

        let id = resolver
            .current_person_id(&Principal::new("ana@example.com"))
            .await
            .unwrap();
        assert_eq!(id, PersonId::new(7));

        assert!(matches!(
            resolver
                .current_person_id(&Principal::new("nobody@example.com"))
                .await,
            Err(PharmacyError::Unauthenticated)
        ));

        ana.soft_delete(Utc::now());
        store.save(ana).await.unwrap();
        assert!(matches!(
            resolver
                .current_person_id(&Principal::new("ana@example.com"))
                .await,
            Err(PharmacyError::Unauthenticated)
        ));
    }
}
