//! Back-office login and logout.

use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::{
    error::{Result, clear_sentry_user, set_sentry_user},
    flash::{Flash, FlashMessage},
    middleware::{ADMIN_LOGIN_PATH, OptionalAdmin, clear_session, safe_redirect, set_current_admin},
    routes::{LoginForm, LoginTemplate, RedirectParams, flash_redirect},
    services::auth::{AdminAuth, AuthError},
    state::AppState,
};

use super::DASHBOARD_PATH;

/// Admin login page. Already logged-in admins go straight on.
#[instrument(skip_all)]
pub async fn login_page(
    OptionalAdmin(admin_id): OptionalAdmin,
    Query(params): Query<RedirectParams>,
    Flash(flash): Flash,
) -> Response {
    if admin_id.is_some() {
        return Redirect::to(&safe_redirect(params.redirect_to.as_deref(), DASHBOARD_PATH))
            .into_response();
    }
    LoginTemplate {
        flash,
        heading: "Back office login",
        action: ADMIN_LOGIN_PATH,
        redirect_to: params.redirect_to.unwrap_or_default(),
        show_register: false,
    }
    .into_response()
}

/// Admin login handler.
///
/// Unknown emails and wrong passwords get different flash messages; both
/// return to the login page without creating a session.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let retry = form.retry_path(ADMIN_LOGIN_PATH);

    match AdminAuth::new(state.store())
        .login(&form.email, &form.password)
        .await
    {
        Ok(admin) => {
            set_current_admin(&session, admin.id).await?;
            set_sentry_user(&admin.id, Some(admin.email.as_str()));
            let target = safe_redirect(form.redirect_to.as_deref(), DASHBOARD_PATH);
            Ok(Redirect::to(&target).into_response())
        }
        Err(AuthError::UnknownEmail) => Ok(flash_redirect(
            &retry,
            FlashMessage::error("Email does not exist!"),
        )),
        Err(AuthError::InvalidCredentials) => Ok(flash_redirect(
            &retry,
            FlashMessage::error("Invalid Credentials"),
        )),
        Err(e) => {
            tracing::error!(error = %e, "admin login failed");
            Ok(flash_redirect(
                &retry,
                FlashMessage::error("Something went wrong, please try again"),
            ))
        }
    }
}

/// Admin logout handler.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_session(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to(ADMIN_LOGIN_PATH))
}
