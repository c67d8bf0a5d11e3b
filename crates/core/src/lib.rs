//! FarmFusion Core - Shared domain types.
//!
//! This crate provides the types shared by the FarmFusion components:
//! - `web` - Admin back office and customer area
//! - `cli` - Command-line tools for migrations, seeding and admin creation
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed document IDs, emails, prices, statuses and capabilities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
