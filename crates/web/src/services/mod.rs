//! Business logic services.
//!
//! - `auth` - password login, registration and password changes

pub mod auth;
