use super::{active_person, person};
use super::requests::{
    NewPerson, PersonRequest, PersonUpdate, validate_password, validate_person,
    validate_person_update,
};
use super::views::PersonView;
use crate::domain::ids::PersonId;
use crate::domain::person::{Person, Role};
use crate::domain::ports::{ClockRef, PasswordHasherRef, PersonStoreRef};
use crate::error::{PharmacyError, Result};
use tracing::{info, warn};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 3;

/// Registration, profile maintenance and credential checks for persons.
pub struct AccountEngine {
    persons: PersonStoreRef,
    hasher: PasswordHasherRef,
    clock: ClockRef,
    min_password_length: usize,
}

impl AccountEngine {
    pub fn new(persons: PersonStoreRef, hasher: PasswordHasherRef, clock: ClockRef) -> Self {
        Self {
            persons,
            hasher,
            clock,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }

    pub fn with_min_password_length(mut self, min: usize) -> Self {
        self.min_password_length = min;
        self
    }

    /// Self-service sign-up. Always creates a `User`, whatever role was asked for.
    pub async fn register(&self, request: PersonRequest) -> Result<PersonView> {
        let new = validate_person(request, self.min_password_length)?;
        self.insert(new, Role::User).await
    }

    /// Administrative creation. Honours the requested role, `User` if absent.
    pub async fn create_person(&self, request: PersonRequest) -> Result<PersonView> {
        let new = validate_person(request, self.min_password_length)?;
        let role = new.role.unwrap_or_default();
        self.insert(new, role).await
    }

    pub async fn update_person(&self, id: PersonId, update: PersonUpdate) -> Result<PersonView> {
        let patch = validate_person_update(update, self.min_password_length)?;
        let mut person = person(&self.persons, id).await?;

        if let Some(name) = patch.name {
            person.name = name;
        }
        if let Some(national_id) = patch.national_id {
            person.national_id = national_id;
        }
        if let Some(phone) = patch.phone {
            person.phone = Some(phone);
        }
        if let Some(email) = patch.email {
            person.email = email;
        }
        if let Some(role) = patch.role {
            person.role = role;
        }
        if let Some(password) = patch.password {
            person.password_hash = self.hasher.hash(&password)?;
        }

        let person = self.persons.save(person).await?;
        info!(person_id = %id, "Person updated");
        Ok(PersonView::from(&person))
    }

    /// Replaces the password after checking the current one.
    pub async fn change_password(&self, id: PersonId, current: &str, new: &str) -> Result<()> {
        let new = validate_password(new, self.min_password_length)?;
        let mut person = active_person(&self.persons, id).await?;

        if !self.hasher.verify(current, &person.password_hash)? {
            warn!(person_id = %id, "Password change rejected: current password mismatch");
            return Err(PharmacyError::Unauthorized);
        }
        person.password_hash = self.hasher.hash(&new)?;
        self.persons.save(person).await?;
        info!(person_id = %id, "Password changed");
        Ok(())
    }

    pub async fn delete_person(&self, id: PersonId) -> Result<()> {
        let mut person = person(&self.persons, id).await?;
        person.soft_delete(self.clock.now());
        self.persons.save(person).await?;
        info!(person_id = %id, "Person deleted");
        Ok(())
    }

    pub async fn list_persons(&self) -> Result<Vec<PersonView>> {
        Ok(self
            .persons
            .find_all()
            .await?
            .iter()
            .filter(|p| p.is_active())
            .map(PersonView::from)
            .collect())
    }

    /// Returns the person even when soft-deleted.
    pub async fn get_person(&self, id: PersonId) -> Result<PersonView> {
        person(&self.persons, id).await.map(|p| PersonView::from(&p))
    }

    /// Checks an e-mail and password pair.
    ///
    /// Unknown e-mail, deleted person and wrong password all fail the same
    /// way, with `Unauthenticated`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<PersonView> {
        let person = self
            .persons
            .find_by_email(email)
            .await?
            .filter(Person::is_active);
        let Some(person) = person else {
            self.hasher.verify_absent(password)?;
            warn!("Authentication failed");
            return Err(PharmacyError::Unauthenticated);
        };
        if !self.hasher.verify(password, &person.password_hash)? {
            warn!("Authentication failed");
            return Err(PharmacyError::Unauthenticated);
        }
        info!(person_id = %person.id, "Authenticated");
        Ok(PersonView::from(&person))
    }

    async fn insert(&self, new: NewPerson, role: Role) -> Result<PersonView> {
        let password_hash = self.hasher.hash(&new.password)?;
        let person = Person {
            id: self.persons.next_id().await?,
            name: new.name,
            national_id: new.national_id,
            phone: new.phone,
            email: new.email,
            password_hash,
            role,
            deleted_at: None,
        };
        let person = self.persons.save(person).await?;
        info!(person_id = %person.id, role = ?person.role, "Person created");
        Ok(PersonView::from(&person))
    }
}
