//! General settings.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::Capability;

use crate::{
    db::SettingsRepository,
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    routes::{Intent, flash_redirect, form_path},
    state::AppState,
};

use super::{Access, AdminNav, permissions, roles, short_date};

/// Route of the settings page.
pub const PATH: &str = "/admin/settings";

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/settings.html")]
pub struct SettingsTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub separate_stocks: bool,
    pub updated_at: String,
    pub roles_path: &'static str,
    pub permissions_path: &'static str,
    pub can_manage_roles: bool,
    pub can_manage_permissions: bool,
}

/// Settings page handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ManageSettings).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };
    let settings = SettingsRepository::new(state.store()).get().await?;

    Ok(SettingsTemplate {
        nav: access.nav(PATH),
        flash,
        separate_stocks: settings.separate_stocks,
        updated_at: short_date(settings.updated_at),
        roles_path: roles::PATH,
        permissions_path: permissions::PATH,
        can_manage_roles: access.can(Capability::ManageRoles),
        can_manage_permissions: access.can(Capability::ManagePermissions),
    }
    .into_response())
}

/// Settings form fields. An unchecked checkbox is absent from the post.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub separate_stocks: Option<String>,
}

/// Settings form handler (`update`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    if let Err(denied) = Access::require(&state, admin, Capability::ManageSettings).await {
        return Ok(denied);
    }
    let path = form_path(form.path.as_deref(), PATH);

    if form.intent != Intent::Update {
        return Ok(flash_redirect(&path, FlashMessage::error("Unsupported action")));
    }

    let enabled = form
        .separate_stocks
        .as_deref()
        .is_some_and(|v| matches!(v, "on" | "true" | "1"));
    let message = match SettingsRepository::new(state.store())
        .set_separate_stocks(enabled)
        .await
    {
        Ok(_) => FlashMessage::success("Settings Updated Successful"),
        Err(e) => {
            tracing::error!(error = %e, "settings update failed");
            FlashMessage::error("Error Updating Settings")
        }
    };

    Ok(flash_redirect(&path, message))
}
