//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                            - Landing page
//!
//! # Customer area
//! GET  /register                    - Registration form
//! POST /register                    - Create account and log in
//! GET  /customer/login              - Login page
//! POST /customer/login              - Check credentials
//! GET  /customer/logout             - Logout
//! POST /customer/logout             - Logout
//! GET  /customer                    - Customer dashboard
//! GET  /customer/profile            - Profile page
//! POST /customer/profile            - intent: update | change_password
//!
//! # Back office
//! GET  /admin/login                 - Login page
//! POST /admin/login                 - Check credentials
//! GET  /admin/logout                - Logout
//! POST /admin/logout                - Logout
//! GET  /admin                       - Dashboard
//! GET  /admin/users                 - Admin list
//! POST /admin/users                 - intent: create | update | delete | reset_password
//! GET  /admin/customers             - Customer list
//! POST /admin/customers             - intent: create | update | delete
//! GET  /admin/inventory             - Inventory list
//! POST /admin/inventory             - intent: create | update | delete
//! GET  /admin/inventory/{id}        - Item detail with images and stock history
//! POST /admin/inventory/{id}        - intent: restock | attach_images
//! GET  /admin/settings              - General settings
//! POST /admin/settings              - intent: update
//! GET  /admin/settings/roles        - Role list
//! POST /admin/settings/roles        - intent: create | update | delete
//! GET  /admin/settings/permissions  - Permission list
//! POST /admin/settings/permissions  - intent: create | update | delete
//! GET  /admin/notifications         - Notifications for the current admin
//! POST /admin/notifications         - intent: mark_read
//! ```
//!
//! Form posts answer with a flash message and a redirect to the form's
//! `path` field, defaulting to the route itself.

pub mod admin;
pub mod customer;
pub mod home;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

use crate::db::{ListQuery, Page, RepositoryError};
use crate::filters;
use crate::flash::{FlashMessage, OutgoingFlash};
use crate::middleware::safe_redirect;
use crate::state::AppState;
use crate::validation::FieldErrors;

/// Build the application router (without middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .merge(customer::routes())
        .merge(admin::routes())
}

/// Login page shared by the back office and the customer area.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub flash: Option<FlashMessage>,
    pub heading: &'static str,
    pub action: &'static str,
    pub redirect_to: String,
    pub show_register: bool,
}

/// `?redirectTo=` on login pages and forms.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

impl LoginForm {
    /// The login page to return to after a failed attempt.
    #[must_use]
    pub fn retry_path(&self, login_path: &str) -> String {
        match self.redirect_to.as_deref().filter(|p| !p.is_empty()) {
            Some(target) => format!("{login_path}?redirectTo={}", urlencoding::encode(target)),
            None => login_path.to_string(),
        }
    }
}

/// What a form post asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Create,
    Update,
    Delete,
    ResetPassword,
    ChangePassword,
    Restock,
    AttachImages,
    MarkRead,
}

/// Query string of list pages.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    #[serde(alias = "searchTerm")]
    pub search_term: Option<String>,
}

impl ListParams {
    /// Build the repository query with the configured page size.
    #[must_use]
    pub fn query(&self, limit: u32) -> ListQuery {
        ListQuery::new(self.page.unwrap_or(1), self.search_term.clone(), limit)
    }
}

/// Pagination links for list templates.
#[derive(Debug, Clone)]
pub struct Pager {
    pub base_path: String,
    pub page: u32,
    pub total_pages: u64,
    pub total: u64,
    pub search_term: String,
}

impl Pager {
    /// Pagination for `page`, linking back to `base_path`.
    #[must_use]
    pub fn new<T>(base_path: &str, page: &Page<T>, params: &ListParams) -> Self {
        Self {
            base_path: base_path.to_string(),
            page: page.page,
            total_pages: page.total_pages,
            total: page.total,
            search_term: params.search_term.clone().unwrap_or_default(),
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages
    }

    /// Link to the page being shown.
    #[must_use]
    pub fn current_href(&self) -> String {
        self.href(self.page)
    }

    #[must_use]
    pub fn prev_href(&self) -> String {
        self.href(self.page.saturating_sub(1))
    }

    #[must_use]
    pub fn next_href(&self) -> String {
        self.href(self.page.saturating_add(1))
    }

    /// Link to another page, keeping the search term.
    fn href(&self, page: u32) -> String {
        if self.search_term.is_empty() {
            format!("{}?page={page}", self.base_path)
        } else {
            format!(
                "{}?page={page}&search_term={}",
                self.base_path,
                urlencoding::encode(&self.search_term)
            )
        }
    }
}

/// Redirect carrying a flash message.
pub fn flash_redirect(path: &str, message: FlashMessage) -> Response {
    (OutgoingFlash(message), Redirect::to(path)).into_response()
}

/// Where a form post goes back to: its `path` field if local, else `fallback`.
#[must_use]
pub fn form_path(path: Option<&str>, fallback: &str) -> String {
    safe_redirect(path.filter(|p| !p.is_empty()), fallback)
}

/// 400 with per-field messages as `{"errors": {...}}`.
pub fn validation_failed(errors: FieldErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "errors": errors })),
    )
        .into_response()
}

/// Parse an optional form field into a typed id.
pub fn parse_id<I: std::str::FromStr>(raw: Option<&str>) -> Option<I> {
    raw.map(str::trim).and_then(|s| s.parse().ok())
}

/// The write a management form performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Add,
    Update,
    Delete,
}

impl Verb {
    const fn past(self) -> &'static str {
        match self {
            Self::Add => "Added",
            Self::Update => "Updated",
            Self::Delete => "Deleted",
        }
    }

    const fn progressive(self) -> &'static str {
        match self {
            Self::Add => "Adding",
            Self::Update => "Updating",
            Self::Delete => "Deleting",
        }
    }
}

/// Flash message for a management write.
///
/// `Ok(None)` means the target did not exist. Duplicate keys read
/// "<Entity> already exists"; other failures are logged.
pub fn outcome<T>(
    entity: &str,
    verb: Verb,
    result: Result<Option<T>, RepositoryError>,
) -> FlashMessage {
    match result {
        Ok(Some(_)) => FlashMessage::success(format!("{entity} {} Successful", verb.past())),
        Ok(None) => {
            tracing::warn!(entity, ?verb, "target not found");
            FlashMessage::error(format!("Error {} {entity}", verb.progressive()))
        }
        Err(RepositoryError::Conflict(field)) => {
            tracing::info!(entity, %field, "duplicate value rejected");
            FlashMessage::error(format!("{entity} already exists"))
        }
        Err(e) => {
            tracing::error!(entity, ?verb, error = %e, "write failed");
            FlashMessage::error(format!("Error {} {entity}", verb.progressive()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_titles() {
        assert_eq!(
            outcome("Inventory", Verb::Add, Ok(Some(()))).title,
            "Inventory Added Successful"
        );
        let missing = outcome::<()>("Customer", Verb::Update, Ok(None));
        assert!(missing.is_error());
        assert_eq!(missing.title, "Error Updating Customer");
        assert_eq!(
            outcome::<()>("Role", Verb::Add, Err(RepositoryError::Conflict("name".into()))).title,
            "Role already exists"
        );
        assert_eq!(
            outcome::<()>("Permission", Verb::Delete, Err(RepositoryError::NotFound)).title,
            "Error Deleting Permission"
        );
    }

    #[test]
    fn test_pager_links_keep_search() {
        let query = ListQuery::new(2, Some("red apple".into()), 10);
        let page = Page::new(vec![(); 10], &query, 35);
        let params = ListParams {
            page: Some(2),
            search_term: Some("red apple".into()),
        };
        let pager = Pager::new("/admin/inventory", &page, &params);
        assert!(pager.has_prev());
        assert!(pager.has_next());
        assert_eq!(pager.total_pages, 4);
        assert_eq!(
            pager.next_href(),
            "/admin/inventory?page=3&search_term=red%20apple"
        );
        assert_eq!(
            pager.prev_href(),
            "/admin/inventory?page=1&search_term=red%20apple"
        );
        assert_eq!(
            pager.current_href(),
            "/admin/inventory?page=2&search_term=red%20apple"
        );
    }

    #[test]
    fn test_pager_links_without_search() {
        let query = ListQuery::new(1, None, 10);
        let page = Page::new(vec![(); 10], &query, 12);
        let params = ListParams {
            page: None,
            search_term: None,
        };
        let pager = Pager::new("/admin/roles", &page, &params);
        assert!(!pager.has_prev());
        assert_eq!(pager.next_href(), "/admin/roles?page=2");
    }

    #[test]
    fn test_form_path_defaults_to_route() {
        assert_eq!(form_path(Some("/admin/users?page=2"), "/admin/users"), "/admin/users?page=2");
        assert_eq!(form_path(Some(""), "/admin/users"), "/admin/users");
        assert_eq!(form_path(Some("https://evil.test"), "/admin/users"), "/admin/users");
    }

    #[test]
    fn test_intent_tokens() {
        let intent: Intent = serde_json::from_str("\"reset_password\"").unwrap();
        assert_eq!(intent, Intent::ResetPassword);
        assert!(serde_json::from_str::<Intent>("\"drop\"").is_err());
    }
}
