//! Customer account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmfusion_core::{CustomerId, Email};

use crate::db::Document;

/// A customer as stored.
///
/// Customers created from the back office have no password until they set
/// one; they cannot log in before that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub full_name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub password_hash: Option<String>,
}

impl Customer {
    /// Build a fresh customer document.
    #[must_use]
    pub fn new(input: NewCustomer) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::generate(),
            full_name: input.full_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            password_hash: input.password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Customer {
    type Id = CustomerId;

    const COLLECTION: &'static str = "customers";
    const SEARCH_FIELDS: &'static [&'static str] = &["full_name", "email"];
    const SORT_FIELD: &'static str = "full_name";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email"];

    fn id(&self) -> CustomerId {
        self.id
    }
}

/// Editable customer fields.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerPatch {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
}

/// A customer without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerProfile {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            full_name: customer.full_name,
            email: customer.email,
            phone: customer.phone,
            address: customer.address,
            created_at: customer.created_at,
        }
    }
}
