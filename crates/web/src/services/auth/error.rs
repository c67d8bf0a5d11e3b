//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No account is registered with the email.
    #[error("no account with this email")]
    UnknownEmail,

    /// Password did not match, or the account has no password yet.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Current password given for a change did not match.
    #[error("incorrect password")]
    IncorrectPassword,

    /// Email is already registered.
    #[error("email already taken")]
    EmailTaken,

    /// Account disappeared between lookup and update.
    #[error("account not found")]
    AccountNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether this is a server-side failure rather than bad user input.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Repository(_) | Self::PasswordHash)
    }
}
