//! Authentication extractors for the back office and the customer area.
//!
//! Sessions store only the account id. The `Require*` extractors reject
//! anonymous requests with a redirect to the matching login page, carrying
//! the original path in `redirectTo`. The `Current*` extractors also load the
//! account; an id whose account no longer exists logs the session out.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::de::DeserializeOwned;
use tower_sessions::Session;

use farmfusion_core::{AdminId, CustomerId};

use crate::db::Repository;
use crate::error::AppError;
use crate::models::{Admin, AdminProfile, Customer, CustomerProfile, session_keys};
use crate::state::AppState;

/// Admin login page.
pub const ADMIN_LOGIN_PATH: &str = "/admin/login";

/// Customer login page.
pub const CUSTOMER_LOGIN_PATH: &str = "/customer/login";

/// Rejection for authenticated extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in: go to the login page and come back afterwards.
    RedirectToLogin(String),
    /// Loading the account failed.
    Error(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::Error(err) => err.into_response(),
        }
    }
}

impl From<AppError> for AuthRejection {
    fn from(err: AppError) -> Self {
        Self::Error(err)
    }
}

/// Extractor that requires a logged-in admin and yields their id.
pub struct RequireAdmin(pub AdminId);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_id(parts, session_keys::ADMIN_ID)
            .await
            .map(Self)
            .ok_or_else(|| login_redirect(ADMIN_LOGIN_PATH, parts))
    }
}

/// Extractor that optionally yields the logged-in admin's id.
pub struct OptionalAdmin(pub Option<AdminId>);

impl<S> FromRequestParts<S> for OptionalAdmin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id(parts, session_keys::ADMIN_ID).await))
    }
}

/// Extractor that loads the logged-in admin, without the password hash.
///
/// If the session points at a deleted admin the session is flushed and the
/// request is redirected to the login page.
pub struct CurrentAdmin(pub AdminProfile);

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAdmin(id) = RequireAdmin::from_request_parts(parts, state).await?;
        let admin = Repository::<Admin>::new(state.store())
            .get(id)
            .await
            .map_err(AppError::from)?;

        match admin {
            Some(admin) => Ok(Self(admin.into())),
            None => {
                tracing::warn!(admin_id = %id, "session refers to a missing admin");
                flush(parts).await?;
                Err(AuthRejection::RedirectToLogin(ADMIN_LOGIN_PATH.to_string()))
            }
        }
    }
}

/// Extractor that requires a logged-in customer and yields their id.
pub struct RequireCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_id(parts, session_keys::CUSTOMER_ID)
            .await
            .map(Self)
            .ok_or_else(|| login_redirect(CUSTOMER_LOGIN_PATH, parts))
    }
}

/// Extractor that optionally yields the logged-in customer's id.
pub struct OptionalCustomer(pub Option<CustomerId>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id(parts, session_keys::CUSTOMER_ID).await))
    }
}

/// Extractor that loads the logged-in customer, without the password hash.
pub struct CurrentCustomer(pub CustomerProfile);

impl FromRequestParts<AppState> for CurrentCustomer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireCustomer(id) = RequireCustomer::from_request_parts(parts, state).await?;
        let customer = Repository::<Customer>::new(state.store())
            .get(id)
            .await
            .map_err(AppError::from)?;

        match customer {
            Some(customer) => Ok(Self(customer.into())),
            None => {
                tracing::warn!(customer_id = %id, "session refers to a missing customer");
                flush(parts).await?;
                Err(AuthRejection::RedirectToLogin(
                    CUSTOMER_LOGIN_PATH.to_string(),
                ))
            }
        }
    }
}

/// Store the admin id in the session, rotating the session id first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    id: AdminId,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::ADMIN_ID, id).await
}

/// Store the customer id in the session, rotating the session id first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    id: CustomerId,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CUSTOMER_ID, id).await
}

/// Destroy the session (logout).
///
/// # Errors
///
/// Returns an error if the session record cannot be deleted.
pub async fn clear_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Pick the post-login destination: `redirect_to` if it is a local path,
/// otherwise `fallback`.
#[must_use]
pub fn safe_redirect(redirect_to: Option<&str>, fallback: &str) -> String {
    match redirect_to.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => fallback.to_string(),
    }
}

/// Read an id from the session; missing or malformed values read as `None`.
async fn session_id<T: DeserializeOwned>(parts: &Parts, key: &str) -> Option<T> {
    let session = parts.extensions.get::<Session>()?;
    session.get::<T>(key).await.ok().flatten()
}

fn login_redirect(login_path: &str, parts: &Parts) -> AuthRejection {
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |uri| uri.0.path());
    AuthRejection::RedirectToLogin(format!(
        "{login_path}?redirectTo={}",
        urlencoding::encode(path)
    ))
}

async fn flush(parts: &Parts) -> Result<(), AppError> {
    if let Some(session) = parts.extensions.get::<Session>() {
        clear_session(session).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use farmfusion_core::Email;
    use secrecy::SecretString;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::WebConfig;
    use crate::db::DocumentStore;
    use crate::models::NewAdmin;

    #[test]
    fn test_safe_redirect_only_allows_local_paths() {
        assert_eq!(safe_redirect(Some("/admin/users"), "/admin"), "/admin/users");
        assert_eq!(safe_redirect(Some("//evil.test"), "/admin"), "/admin");
        assert_eq!(safe_redirect(Some("https://evil.test"), "/admin"), "/admin");
        assert_eq!(safe_redirect(Some("/\\evil.test"), "/admin"), "/admin");
        assert_eq!(safe_redirect(None, "/customer"), "/customer");
    }

    #[test]
    fn test_login_redirect_keeps_original_path() {
        let (parts, ()) = Request::get("/admin/inventory?page=2")
            .body(())
            .unwrap()
            .into_parts();
        match login_redirect(ADMIN_LOGIN_PATH, &parts) {
            AuthRejection::RedirectToLogin(location) => assert_eq!(
                location,
                "/admin/login?redirectTo=%2Fadmin%2Finventory"
            ),
            AuthRejection::Error(_) => panic!("expected a redirect"),
        }
    }

    #[tokio::test]
    async fn test_missing_session_reads_as_logged_out() {
        let (mut parts, ()) = Request::get("/customer").body(()).unwrap().into_parts();
        let OptionalCustomer(id) = OptionalCustomer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(id.is_none());
        assert!(matches!(
            RequireCustomer::from_request_parts(&mut parts, &()).await,
            Err(AuthRejection::RedirectToLogin(location)) if location == "/customer/login?redirectTo=%2Fcustomer"
        ));
    }

    #[tokio::test]
    async fn test_current_admin_leaves_out_password_hash() {
        let store = DocumentStore::memory();
        let admin = Repository::<Admin>::new(&store)
            .create(Admin::new(NewAdmin {
                email: Email::parse("kwame@farm.test").unwrap(),
                password_hash: "argon2-secret".to_string(),
                first_name: "Kwame".to_string(),
                last_name: "Nkrumah".to_string(),
                phone: None,
                role: None,
            }))
            .await
            .unwrap();
        let config = WebConfig::local(SecretString::from("kP9#vR2$mX7!qL4@wZ8&nB3*tY6^hJ1%"));
        let state = AppState::new(config, store);

        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session.insert(session_keys::ADMIN_ID, admin.id).await.unwrap();
        let (mut parts, ()) = Request::get("/admin").body(()).unwrap().into_parts();
        parts.extensions.insert(session);

        let Ok(CurrentAdmin(profile)) = CurrentAdmin::from_request_parts(&mut parts, &state).await
        else {
            panic!("expected the admin to load");
        };
        assert_eq!(profile.id, admin.id);
        assert_eq!(profile.full_name(), "Kwame Nkrumah");
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2-secret"));
    }
}
