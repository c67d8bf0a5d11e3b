//! Notifications for the logged-in admin.
//!
//! An admin sees the notifications addressed to them plus the broadcast ones,
//! newest first.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::{AdminId, NotificationId};

use crate::{
    db::{DocumentStore, Filter, ListQuery, Page, Repository, RepositoryError, UnitOfWork},
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Notification, notification::MarkRead},
    routes::{Intent, ListParams, Pager, flash_redirect, form_path, parse_id},
    state::AppState,
};

use super::{Access, AdminNav, short_date};

/// Route of the notification list.
pub const PATH: &str = "/admin/notifications";

/// Notification row for templates.
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub message: String,
    pub date: String,
    pub read: bool,
    pub broadcast: bool,
}

/// Notification list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/notifications.html")]
pub struct NotificationsTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub notifications: Vec<NotificationRow>,
    pub unread: u64,
    pub pager: Pager,
}

/// Restrict `query` to notifications addressed to `admin` or to everyone.
#[must_use]
pub fn addressed_to(query: ListQuery, admin: AdminId) -> ListQuery {
    query.with_filter(Filter::EqOrUnset("admin", serde_json::json!(admin)))
}

/// Restrict `query` to unread notifications.
#[must_use]
pub fn unread_only(query: ListQuery) -> ListQuery {
    query.with_filter(Filter::Eq("read", serde_json::Value::Bool(false)))
}

/// Notifications visible to `admin` matching `query`, newest first.
///
/// # Errors
///
/// Returns `RepositoryError` if the notifications cannot be loaded.
pub async fn visible(
    repo: &Repository<'_, Notification>,
    admin: AdminId,
    query: &ListQuery,
) -> std::result::Result<Page<Notification>, RepositoryError> {
    repo.list(&addressed_to(query.clone(), admin)).await
}

/// Number of unread notifications visible to `admin`.
///
/// # Errors
///
/// Returns `RepositoryError` if the count fails.
pub async fn unread_count(
    repo: &Repository<'_, Notification>,
    admin: AdminId,
) -> std::result::Result<u64, RepositoryError> {
    let query = unread_only(addressed_to(ListQuery::new(1, None, 1), admin));
    Ok(repo.list(&query).await?.total)
}

/// Notification list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = Access::load(&state, admin).await?;
    let repo = Repository::<Notification>::new(state.store());

    let unread = unread_count(&repo, access.admin.id).await?;
    let page = visible(
        &repo,
        access.admin.id,
        &params.query(state.config().page_size),
    )
    .await?;
    let pager = Pager::new(PATH, &page, &params);

    Ok(NotificationsTemplate {
        nav: access.nav(PATH),
        flash,
        notifications: page
            .items
            .into_iter()
            .map(|n| NotificationRow {
                id: n.id.to_string(),
                date: short_date(n.created_at),
                read: n.read,
                broadcast: n.admin.is_none(),
                message: n.message,
            })
            .collect(),
        unread,
        pager,
    }
    .into_response())
}

/// Notification form fields. Without an `id`, `mark_read` marks every
/// visible notification read.
#[derive(Debug, Deserialize)]
pub struct NotificationForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Notification form handler (`mark_read`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<NotificationForm>,
) -> Result<Response> {
    let path = form_path(form.path.as_deref(), PATH);
    if form.intent != Intent::MarkRead {
        return Ok(flash_redirect(&path, FlashMessage::error("Unsupported action")));
    }

    let repo = Repository::<Notification>::new(state.store());
    let result = match form.id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(raw) => match parse_id::<NotificationId>(Some(raw)) {
            Some(id) => mark_one(&repo, admin.id, id).await,
            None => Ok(false),
        },
        None => mark_all(state.store(), &repo, admin.id).await.map(|_| true),
    };

    let message = match result {
        Ok(true) => FlashMessage::success("Notifications Updated Successful"),
        Ok(false) => FlashMessage::error("Notification not found"),
        Err(e) => {
            tracing::error!(admin_id = %admin.id, error = %e, "marking notifications failed");
            FlashMessage::error("Error Updating Notifications")
        }
    };
    Ok(flash_redirect(&path, message))
}

/// Mark one notification read if `admin` may see it.
async fn mark_one(
    repo: &Repository<'_, Notification>,
    admin: AdminId,
    id: NotificationId,
) -> std::result::Result<bool, RepositoryError> {
    match repo.get(id).await? {
        Some(notification) if notification.is_for(admin) => Ok(repo
            .update(id, &MarkRead { read: true })
            .await?
            .is_some()),
        _ => Ok(false),
    }
}

/// Mark every unread notification visible to `admin` read, in one unit of work.
async fn mark_all(
    store: &DocumentStore,
    repo: &Repository<'_, Notification>,
    admin: AdminId,
) -> std::result::Result<usize, RepositoryError> {
    let query = unread_only(addressed_to(ListQuery::new(1, None, u32::MAX), admin));
    let unread: Vec<NotificationId> = repo
        .list(&query)
        .await?
        .items
        .into_iter()
        .map(|n| n.id)
        .collect();
    if unread.is_empty() {
        return Ok(0);
    }

    let mut uow = UnitOfWork::new();
    for id in &unread {
        uow.merge::<Notification>(*id, &MarkRead { read: true })?;
    }
    store.commit(&uow).await?;
    tracing::info!(admin_id = %admin, count = unread.len(), "notifications marked read");
    Ok(unread.len())
}
