//! Integration test harness for FarmFusion.
//!
//! [`TestApp`] drives the real router in-process over the in-memory document
//! and session stores, carrying cookies between requests like a browser.
//!
//! ```rust,ignore
//! let mut app = TestApp::new();
//! let admin = app.seed_admin("ama@farm.example", &[Capability::ViewInventory]).await;
//! app.login_admin("ama@farm.example").await;
//! let page = app.get("/admin/inventory").await;
//! assert_eq!(page.status, StatusCode::OK);
//! ```

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use secrecy::SecretString;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use tower_sessions::cookie::Cookie;

use farmfusion_core::{AdminId, Capability, CustomerId, PermissionId};
use farmfusion_web::build_router;
use farmfusion_web::config::WebConfig;
use farmfusion_web::db::{DocumentStore, Repository};
use farmfusion_web::models::{Admin, Customer, NewAdmin, NewCustomer, Permission, Role};
use farmfusion_web::services::auth::hash_password;
use farmfusion_web::state::AppState;
use farmfusion_web::validation;

/// Password every seeded account uses.
pub const PASSWORD: &str = "Harvest2026!";

const SESSION_SECRET: &str = "kP9#vR2$mX7!qL4@wZ8&nB3*tY6^hJ1%";

/// A response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// The body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// The application under test plus a cookie jar.
pub struct TestApp {
    state: AppState,
    router: Router,
    cookies: HashMap<String, String>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// A fresh application with empty stores.
    #[must_use]
    pub fn new() -> Self {
        let config = WebConfig::local(SecretString::from(SESSION_SECRET));
        let state = AppState::new(config, DocumentStore::memory());
        let router = build_router(state.clone(), MemoryStore::default());
        Self {
            state,
            router,
            cookies: HashMap::new(),
        }
    }

    /// The backing document store.
    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        self.state.store()
    }

    /// Whether the jar holds a session cookie.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.cookies.contains_key("__session")
    }

    /// Drop every cookie, as a new browser would.
    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = Request::get(path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Follow a redirect response with a GET.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        let location = response.location().unwrap().to_string();
        self.get(&location).await
    }

    async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str().unwrap().to_owned()).unwrap();
            let expired = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age.is_zero());
            if expired {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_owned(), cookie.value().to_owned());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    /// Create an admin whose role grants `capabilities`.
    pub async fn seed_admin(&self, email: &str, capabilities: &[Capability]) -> AdminId {
        let permissions = Repository::<Permission>::new(self.store());
        let mut ids: Vec<PermissionId> = Vec::new();
        for capability in capabilities {
            let existing = permissions
                .find_by("action", capability.as_str())
                .await
                .unwrap();
            let permission = match existing {
                Some(permission) => permission,
                None => permissions
                    .create(Permission::new(
                        capability.describe().to_string(),
                        String::new(),
                        capability.as_str().to_string(),
                    ))
                    .await
                    .unwrap(),
            };
            ids.push(permission.id);
        }

        let role = Repository::<Role>::new(self.store())
            .create(Role::new(format!("Role for {email}"), ids))
            .await
            .unwrap();

        Repository::<Admin>::new(self.store())
            .create(Admin::new(NewAdmin {
                email: validation::email(email).unwrap(),
                password_hash: hash_password(PASSWORD).unwrap(),
                first_name: "Ama".to_string(),
                last_name: "Mensah".to_string(),
                phone: None,
                role: Some(role.id),
            }))
            .await
            .unwrap()
            .id
    }

    /// Create a customer who can log in with [`PASSWORD`].
    pub async fn seed_customer(&self, email: &str) -> CustomerId {
        Repository::<Customer>::new(self.store())
            .create(Customer::new(NewCustomer {
                full_name: "Kofi Boateng".to_string(),
                email: validation::email(email).unwrap(),
                phone: "0244123456".to_string(),
                address: "12 Market Road, Kumasi".to_string(),
                password_hash: Some(hash_password(PASSWORD).unwrap()),
            }))
            .await
            .unwrap()
            .id
    }

    /// Log in as a seeded admin, asserting success.
    pub async fn login_admin(&mut self, email: &str) {
        let response = self
            .post_form("/admin/login", &[("email", email), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location(), Some("/admin"));
    }

    /// Log in as a seeded customer, asserting success.
    pub async fn login_customer(&mut self, email: &str) {
        let response = self
            .post_form("/customer/login", &[("email", email), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location(), Some("/customer"));
    }
}
