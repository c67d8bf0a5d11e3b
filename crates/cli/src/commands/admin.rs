//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! farmfusion-cli admin create -e ama@farm.example -f Ama -l Mensah -p 'S0il&Seed!' -r "Super Admin"
//! ```
//!
//! The password may also come from `FARMFUSION_ADMIN_PASSWORD`.

use farmfusion_core::AdminId;
use farmfusion_web::db::{DocumentStore, Repository, RepositoryError};
use farmfusion_web::models::{Admin, NewAdmin, Role};
use farmfusion_web::services::auth::{AuthError, hash_password};
use farmfusion_web::validation;
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A field failed validation.
    #[error("Invalid {0}: {1}")]
    Invalid(&'static str, String),

    /// No role has the given name.
    #[error("Role not found: {0}")]
    UnknownRole(String),

    /// User already exists.
    #[error("Admin user already exists with email: {0}")]
    UserExists(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Password error: {0}")]
    Password(#[from] AuthError),
}

/// Arguments of `admin create`.
#[derive(Debug, Clone)]
pub struct CreateAdmin {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Option<String>,
}

/// Create a new admin user in the database named by `DATABASE_URL`.
///
/// # Errors
///
/// Returns `AdminError` if validation fails, the email is taken, the role
/// does not exist or the database is unreachable.
pub async fn create_user(input: CreateAdmin) -> Result<AdminId, AdminError> {
    let store = DocumentStore::postgres(connect().await?);
    let id = create(&store, input).await?;
    tracing::info!(admin_id = %id, "Admin user created successfully!");
    Ok(id)
}

/// Create a new admin user in `store`.
///
/// # Errors
///
/// See [`create_user`].
pub async fn create(store: &DocumentStore, input: CreateAdmin) -> Result<AdminId, AdminError> {
    let email = validation::email(&input.email).map_err(|e| AdminError::Invalid("email", e))?;
    let first_name =
        validation::name(&input.first_name).map_err(|e| AdminError::Invalid("first name", e))?;
    let last_name =
        validation::name(&input.last_name).map_err(|e| AdminError::Invalid("last name", e))?;
    validation::password(&input.password).map_err(|e| AdminError::Invalid("password", e))?;

    let role = match input.role.as_deref() {
        Some(name) => Some(
            Repository::<Role>::new(store)
                .find_by("name", name)
                .await?
                .ok_or_else(|| AdminError::UnknownRole(name.to_string()))?
                .id,
        ),
        None => None,
    };

    let admin = Admin::new(NewAdmin {
        email,
        password_hash: hash_password(&input.password)?,
        first_name,
        last_name,
        phone: None,
        role,
    });

    match Repository::<Admin>::new(store).create(admin).await {
        Ok(admin) => Ok(admin.id),
        Err(RepositoryError::Conflict(_)) => Err(AdminError::UserExists(input.email)),
        Err(e) => Err(e.into()),
    }
}
