//! Customer area: registration, login, dashboard and profile.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::{
    db::{Repository, RepositoryError},
    error::{Result, clear_sentry_user, set_sentry_user},
    filters,
    flash::{Flash, FlashMessage},
    middleware::{
        CUSTOMER_LOGIN_PATH, CurrentCustomer, OptionalCustomer, clear_session, safe_redirect,
        set_current_customer,
    },
    models::{Customer, CustomerPatch, CustomerProfile, Notification},
    services::auth::{AuthError, CustomerAuth, Registration},
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{
    Intent, LoginForm, LoginTemplate, RedirectParams, flash_redirect, form_path,
    validation_failed,
};

const DASHBOARD_PATH: &str = "/customer";
const PROFILE_PATH: &str = "/customer/profile";
const REGISTER_PATH: &str = "/register";

/// Customer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(REGISTER_PATH, get(register_page).post(register))
        .route(CUSTOMER_LOGIN_PATH, get(login_page).post(login))
        .route("/customer/logout", get(logout).post(logout))
        .route(DASHBOARD_PATH, get(dashboard))
        .route(PROFILE_PATH, get(profile_page).post(profile_action))
}

// =============================================================================
// Registration
// =============================================================================

/// Registration form fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub address: String,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "customer/register.html")]
pub struct RegisterTemplate {
    pub flash: Option<FlashMessage>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub errors: FieldErrors,
}

impl RegisterTemplate {
    fn blank(flash: Option<FlashMessage>) -> Self {
        Self {
            flash,
            full_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            errors: FieldErrors::new(),
        }
    }
}

/// Registration page handler.
#[instrument(skip_all)]
pub async fn register_page(
    OptionalCustomer(customer_id): OptionalCustomer,
    Flash(flash): Flash,
) -> Response {
    if customer_id.is_some() {
        return Redirect::to("/").into_response();
    }
    RegisterTemplate::blank(flash).into_response()
}

/// Validate a registration form.
///
/// # Errors
///
/// Returns the per-field messages when any field is invalid.
pub fn validate_registration(form: &RegisterForm) -> std::result::Result<Registration, FieldErrors> {
    let mut errors = FieldErrors::new();
    let full_name = errors.check("full_name", validation::name(&form.full_name));
    let email = errors.check("email", validation::email(&form.email));
    errors.check("password", validation::password(&form.password));
    errors.check(
        "confirm_password",
        validation::confirmation(&form.password, &form.confirm_password),
    );
    let phone = errors.check("phone", validation::phone(&form.phone, false));
    let address = errors.check("address", validation::address(&form.address));

    match (full_name, email, phone, address) {
        (Some(full_name), Some(email), Some(phone), Some(address)) if errors.is_empty() => {
            Ok(Registration {
                full_name,
                email,
                password: form.password.clone(),
                phone,
                address,
            })
        }
        _ => Err(errors),
    }
}

/// Registration handler. Invalid input re-renders the form with a 400.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let input = match validate_registration(&form) {
        Ok(input) => input,
        Err(errors) => {
            let template = RegisterTemplate {
                flash: None,
                full_name: form.full_name,
                email: form.email,
                phone: form.phone,
                address: form.address,
                errors,
            };
            return Ok((StatusCode::BAD_REQUEST, template).into_response());
        }
    };

    let customer = match CustomerAuth::new(state.store()).register(input).await {
        Ok(customer) => customer,
        Err(AuthError::EmailTaken) => {
            return Ok(flash_redirect(
                REGISTER_PATH,
                FlashMessage::error("Email already taken"),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "registration failed");
            return Ok(flash_redirect(
                REGISTER_PATH,
                FlashMessage::error("Error occurred while creating user!"),
            ));
        }
    };

    announce_registration(&state, &customer).await;
    set_current_customer(&session, customer.id).await?;
    set_sentry_user(&customer.id, Some(customer.email.as_str()));

    Ok(flash_redirect(
        "/",
        FlashMessage::success(format!("Welcome, {}", customer.full_name)),
    ))
}

/// Tell every admin about a new customer. Failure only logs.
async fn announce_registration(state: &AppState, customer: &Customer) {
    let notification = Notification::new(
        None,
        Some(customer.id),
        format!("New customer registered: {}", customer.full_name),
    );
    if let Err(e) = Repository::<Notification>::new(state.store())
        .create(notification)
        .await
    {
        tracing::warn!(customer_id = %customer.id, error = %e, "failed to record notification");
    }
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Customer login page.
#[instrument(skip_all)]
pub async fn login_page(
    OptionalCustomer(customer_id): OptionalCustomer,
    Query(params): Query<RedirectParams>,
    Flash(flash): Flash,
) -> Response {
    if customer_id.is_some() {
        return Redirect::to(&safe_redirect(params.redirect_to.as_deref(), DASHBOARD_PATH))
            .into_response();
    }
    LoginTemplate {
        flash,
        heading: "Customer login",
        action: CUSTOMER_LOGIN_PATH,
        redirect_to: params.redirect_to.unwrap_or_default(),
        show_register: true,
    }
    .into_response()
}

/// Customer login handler.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let retry = form.retry_path(CUSTOMER_LOGIN_PATH);

    match CustomerAuth::new(state.store())
        .login(&form.email, &form.password)
        .await
    {
        Ok(customer) => {
            set_current_customer(&session, customer.id).await?;
            set_sentry_user(&customer.id, Some(customer.email.as_str()));
            let target = safe_redirect(form.redirect_to.as_deref(), DASHBOARD_PATH);
            Ok(Redirect::to(&target).into_response())
        }
        Err(AuthError::UnknownEmail) => Ok(flash_redirect(
            &retry,
            FlashMessage::error("No Account with email!"),
        )),
        Err(AuthError::InvalidCredentials) => Ok(flash_redirect(
            &retry,
            FlashMessage::error("Invalid Credentials"),
        )),
        Err(e) => {
            tracing::error!(error = %e, "customer login failed");
            Ok(flash_redirect(
                &retry,
                FlashMessage::error("Something went wrong, please try again"),
            ))
        }
    }
}

/// Customer logout handler.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_session(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to(CUSTOMER_LOGIN_PATH))
}

// =============================================================================
// Dashboard / Profile
// =============================================================================

/// Customer dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "customer/dashboard.html")]
pub struct DashboardTemplate {
    pub flash: Option<FlashMessage>,
    pub customer: CustomerProfile,
    pub member_since: String,
}

/// Customer dashboard handler.
#[instrument(skip_all)]
pub async fn dashboard(
    CurrentCustomer(customer): CurrentCustomer,
    Flash(flash): Flash,
) -> DashboardTemplate {
    DashboardTemplate {
        flash,
        member_since: customer.created_at.format("%B %-d, %Y").to_string(),
        customer,
    }
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "customer/profile.html")]
pub struct ProfileTemplate {
    pub flash: Option<FlashMessage>,
    pub customer: CustomerProfile,
}

/// Profile page handler.
#[instrument(skip_all)]
pub async fn profile_page(
    CurrentCustomer(customer): CurrentCustomer,
    Flash(flash): Flash,
) -> ProfileTemplate {
    ProfileTemplate { flash, customer }
}

/// Profile form fields; which ones matter depends on `intent`.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Profile form handler (`update` or `change_password`).
#[instrument(skip_all)]
pub async fn profile_action(
    State(state): State<AppState>,
    session: Session,
    CurrentCustomer(customer): CurrentCustomer,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let path = form_path(form.path.as_deref(), PROFILE_PATH);

    match form.intent {
        Intent::Update => update_profile(&state, &session, &customer, &form, &path).await,
        Intent::ChangePassword => change_password(&state, &session, &customer, &form, &path).await,
        _ => Ok(flash_redirect(&path, FlashMessage::error("Unsupported action"))),
    }
}

async fn update_profile(
    state: &AppState,
    session: &Session,
    customer: &CustomerProfile,
    form: &ProfileForm,
    path: &str,
) -> Result<Response> {
    let mut errors = FieldErrors::new();
    let full_name = errors.check("full_name", validation::name(&form.full_name));
    let email = errors.check("email", validation::email(&form.email));
    let phone = errors.check("phone", validation::phone(&form.phone, false));
    let address = errors.check("address", validation::address(&form.address));
    let (Some(full_name), Some(email), Some(phone), Some(address)) = (full_name, email, phone, address)
    else {
        return Ok(validation_failed(errors));
    };

    let patch = CustomerPatch {
        full_name,
        email,
        phone,
        address,
    };
    match Repository::<Customer>::new(state.store())
        .update(customer.id, &patch)
        .await
    {
        Ok(Some(_)) => Ok(flash_redirect(path, FlashMessage::success("Profile Updated"))),
        Ok(None) => account_gone(session).await,
        Err(RepositoryError::Conflict(_)) => {
            Ok(flash_redirect(path, FlashMessage::error("Email already taken")))
        }
        Err(e) => {
            tracing::error!(error = %e, "profile update failed");
            Ok(flash_redirect(
                path,
                FlashMessage::error("Error Updating Profile!"),
            ))
        }
    }
}

async fn change_password(
    state: &AppState,
    session: &Session,
    customer: &CustomerProfile,
    form: &ProfileForm,
    path: &str,
) -> Result<Response> {
    let mut errors = FieldErrors::new();
    errors.check(
        "current_password",
        validation::required(&form.current_password, "Current password"),
    );
    errors.check("password", validation::password(&form.password));
    errors.check(
        "confirm_password",
        validation::confirmation(&form.password, &form.confirm_password),
    );
    if !errors.is_empty() {
        return Ok(validation_failed(errors));
    }

    match CustomerAuth::new(state.store())
        .change_password(customer.id, &form.current_password, &form.password)
        .await
    {
        Ok(()) => Ok(flash_redirect(path, FlashMessage::success("Password Changed"))),
        Err(AuthError::IncorrectPassword) => {
            Ok(flash_redirect(path, FlashMessage::error("Incorrect Password!")))
        }
        Err(AuthError::AccountNotFound) => account_gone(session).await,
        Err(e) => {
            tracing::error!(error = %e, "password change failed");
            Ok(flash_redirect(
                path,
                FlashMessage::error("Error Changing Password!"),
            ))
        }
    }
}

/// The account vanished mid-session: log out.
async fn account_gone(session: &Session) -> Result<Response> {
    clear_session(session).await?;
    clear_sentry_user();
    Ok(flash_redirect(
        CUSTOMER_LOGIN_PATH,
        FlashMessage::error("Customer does not exist!"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> RegisterForm {
        RegisterForm {
            full_name: "Ada Lovelace".into(),
            email: " Ada@Example.com ".into(),
            password: "Secret123".into(),
            confirm_password: "Secret123".into(),
            phone: String::new(),
            address: "12 Farm Lane".into(),
        }
    }

    #[test]
    fn test_valid_registration_normalizes_email() {
        let input = validate_registration(&form()).unwrap();
        assert_eq!(input.email.as_str(), "ada@example.com");
        assert_eq!(input.full_name, "Ada Lovelace");
    }

    #[test]
    fn test_registration_reports_each_field() {
        let mut bad = form();
        bad.full_name = "A".into();
        bad.confirm_password = "Secret124".into();
        bad.phone = "123".into();
        let errors = validate_registration(&bad).unwrap_err();
        assert_eq!(errors.get("full_name"), Some("Invalid name"));
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert_eq!(errors.get("phone"), Some("Invalid phone number"));
        assert!(errors.get("email").is_none());
    }
}
