//! Core types for FarmFusion.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod capability;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use capability::{Capability, CapabilityParseError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use status::*;
