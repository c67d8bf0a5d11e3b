//! Authentication service.
//!
//! Password login for admins and customers, customer registration and
//! password changes. Sessions are handled by the callers; this module only
//! answers "who is this" and keeps the password hashes.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use farmfusion_core::{AdminId, CustomerId, Email};

use crate::db::{DocumentStore, Repository, RepositoryError};
use crate::models::{Admin, Customer, NewCustomer, PasswordPatch};

/// Admin authentication.
pub struct AdminAuth<'a> {
    admins: Repository<'a, Admin>,
}

impl<'a> AdminAuth<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(store: &'a DocumentStore) -> Self {
        Self {
            admins: Repository::new(store),
        }
    }

    /// Check an admin's email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownEmail` if no admin has the email.
    /// Returns `AuthError::InvalidCredentials` if the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<Admin, AuthError> {
        let admin = self
            .admins
            .find_by("email", &normalize_email(email))
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        verify_password(password, &admin.password_hash)?;

        tracing::info!(admin_id = %admin.id, "admin logged in");
        Ok(admin)
    }

    /// Replace an admin's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountNotFound` if the admin does not exist.
    pub async fn reset_password(&self, id: AdminId, password: &str) -> Result<(), AuthError> {
        let patch = PasswordPatch {
            password_hash: hash_password(password)?,
        };
        self.admins
            .update(id, &patch)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        tracing::info!(admin_id = %id, "admin password reset");
        Ok(())
    }
}

/// Input for customer self-registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: Email,
    pub password: String,
    pub phone: String,
    pub address: String,
}

/// Customer authentication.
pub struct CustomerAuth<'a> {
    customers: Repository<'a, Customer>,
}

impl<'a> CustomerAuth<'a> {
    /// Create a new customer authentication service.
    #[must_use]
    pub const fn new(store: &'a DocumentStore) -> Self {
        Self {
            customers: Repository::new(store),
        }
    }

    /// Check a customer's email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownEmail` if no customer has the email.
    /// Returns `AuthError::InvalidCredentials` if the password is wrong or
    /// the account has none.
    pub async fn login(&self, email: &str, password: &str) -> Result<Customer, AuthError> {
        let customer = self
            .customers
            .find_by("email", &normalize_email(email))
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let hash = customer
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, hash)?;

        tracing::info!(customer_id = %customer.id, "customer logged in");
        Ok(customer)
    }

    /// Create a customer account with a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    pub async fn register(&self, input: Registration) -> Result<Customer, AuthError> {
        if self
            .customers
            .find_by("email", input.email.as_str())
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let customer = Customer::new(NewCustomer {
            full_name: input.full_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            password_hash: Some(hash_password(&input.password)?),
        });

        let customer = self.customers.create(customer).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Repository(other),
        })?;

        tracing::info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }

    /// Change a customer's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountNotFound` if the customer does not exist.
    /// Returns `AuthError::IncorrectPassword` if `current` does not match.
    pub async fn change_password(
        &self,
        id: CustomerId,
        current: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let customer = self
            .customers
            .get(id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if let Some(hash) = customer.password_hash.as_deref() {
            verify_password(current, hash).map_err(|e| match e {
                AuthError::InvalidCredentials => AuthError::IncorrectPassword,
                other => other,
            })?;
        }

        let patch = PasswordPatch {
            password_hash: hash_password(new_password)?,
        };
        self.customers
            .update(id, &patch)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        tracing::info!(customer_id = %id, "customer password changed");
        Ok(())
    }
}

/// Lookup form of an email: trimmed and lower-cased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
/// Returns `AuthError::PasswordHash` if the hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::NewAdmin;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Harvest2024").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Harvest2024", &hash).is_ok());
        assert!(matches!(
            verify_password("harvest2024", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_hash_is_a_server_error() {
        let err = verify_password("anything", "not-a-hash").unwrap_err();
        assert!(matches!(err, AuthError::PasswordHash));
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_admin_login_outcomes() {
        let store = DocumentStore::memory();
        let admin = Repository::<Admin>::new(&store)
            .create(Admin::new(NewAdmin {
                email: Email::parse("owner@farm.test").unwrap(),
                password_hash: hash_password("Owner1234").unwrap(),
                first_name: "Grace".to_string(),
                last_name: "Mensah".to_string(),
                phone: None,
                role: None,
            }))
            .await
            .unwrap();
        let auth = AdminAuth::new(&store);

        let logged_in = auth.login(" Owner@Farm.test ", "Owner1234").await.unwrap();
        assert_eq!(logged_in.id, admin.id);
        assert!(matches!(
            auth.login("nobody@farm.test", "Owner1234").await,
            Err(AuthError::UnknownEmail)
        ));
        assert!(matches!(
            auth.login("owner@farm.test", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));

        auth.reset_password(admin.id, "Fresh5678").await.unwrap();
        assert!(auth.login("owner@farm.test", "Fresh5678").await.is_ok());
    }

    fn registration(email: &str) -> Registration {
        Registration {
            full_name: "Kofi Boateng".to_string(),
            email: Email::parse(email).unwrap(),
            password: "Maize2024".to_string(),
            phone: "0244000000".to_string(),
            address: "Kumasi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_taken_email_without_creating() {
        let store = DocumentStore::memory();
        let auth = CustomerAuth::new(&store);

        auth.register(registration("kofi@farm.test")).await.unwrap();
        assert!(matches!(
            auth.register(registration("kofi@farm.test")).await,
            Err(AuthError::EmailTaken)
        ));
        assert_eq!(Repository::<Customer>::new(&store).all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_password_checks_current() {
        let store = DocumentStore::memory();
        let auth = CustomerAuth::new(&store);
        let customer = auth.register(registration("ama@farm.test")).await.unwrap();

        assert!(matches!(
            auth.change_password(customer.id, "Wrong1234", "Cassava99").await,
            Err(AuthError::IncorrectPassword)
        ));
        auth.change_password(customer.id, "Maize2024", "Cassava99")
            .await
            .unwrap();
        assert!(auth.login("ama@farm.test", "Cassava99").await.is_ok());
    }

    #[tokio::test]
    async fn test_customer_without_password_cannot_log_in() {
        let store = DocumentStore::memory();
        Repository::<Customer>::new(&store)
            .create(Customer::new(NewCustomer {
                full_name: "Walk In".to_string(),
                email: Email::parse("walkin@farm.test").unwrap(),
                phone: String::new(),
                address: String::new(),
                password_hash: None,
            }))
            .await
            .unwrap();

        assert!(matches!(
            CustomerAuth::new(&store).login("walkin@farm.test", "Anything1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
