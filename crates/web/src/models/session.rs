//! Session data keys.
//!
//! Sessions hold only identity ids; profiles are loaded per request so a
//! deleted account is noticed on the next page view.

/// Keys used in the session store.
pub mod session_keys {
    /// Logged-in admin id (`AdminId`).
    pub const ADMIN_ID: &str = "admin_id";

    /// Logged-in customer id (`CustomerId`).
    pub const CUSTOMER_ID: &str = "customer_id";
}
