//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (one span per request)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. Session layer (signed `__session` cookie)
//! 5. Flash messages (`__flash` cookie)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{
    ADMIN_LOGIN_PATH, AuthRejection, CUSTOMER_LOGIN_PATH, CurrentAdmin, CurrentCustomer,
    OptionalAdmin, OptionalCustomer, RequireAdmin, RequireCustomer, clear_session, safe_redirect,
    set_current_admin, set_current_customer,
};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
