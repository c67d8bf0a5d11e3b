//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use farmfusion_core::Availability;

use crate::{
    db::{Document, ListQuery, Repository},
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Admin, Customer, InventoryItem, Notification},
    state::AppState,
};

use super::{Access, AdminNav, DASHBOARD_PATH, notifications, short_date};

/// Number of notifications previewed on the dashboard.
const RECENT_NOTIFICATIONS: u32 = 5;

/// A notification line on the dashboard.
#[derive(Debug, Clone)]
pub struct NotificationPreview {
    pub message: String,
    pub date: String,
    pub read: bool,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub admins: u64,
    pub customers: u64,
    pub inventory_items: u64,
    pub out_of_stock: usize,
    pub unread: u64,
    pub recent: Vec<NotificationPreview>,
}

async fn count<D: Document>(state: &AppState) -> Result<u64> {
    Ok(Repository::<D>::new(state.store())
        .list(&ListQuery::new(1, None, 1))
        .await?
        .total)
}

/// Dashboard handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Flash(flash): Flash,
) -> Result<DashboardTemplate> {
    let access = Access::load(&state, admin).await?;

    let out_of_stock = Repository::<InventoryItem>::new(state.store())
        .all()
        .await?
        .iter()
        .filter(|item| item.availability == Availability::OutOfStock || item.quantity <= 0)
        .count();

    let repo = Repository::<Notification>::new(state.store());
    let unread = notifications::unread_count(&repo, access.admin.id).await?;
    let recent = notifications::visible(
        &repo,
        access.admin.id,
        &ListQuery::new(1, None, RECENT_NOTIFICATIONS),
    )
    .await?
    .items
    .into_iter()
    .map(|n| NotificationPreview {
        date: short_date(n.created_at),
        message: n.message,
        read: n.read,
    })
    .collect();

    Ok(DashboardTemplate {
        nav: access.nav(DASHBOARD_PATH),
        flash,
        admins: count::<Admin>(&state).await?,
        customers: count::<Customer>(&state).await?,
        inventory_items: count::<InventoryItem>(&state).await?,
        out_of_stock,
        unread,
        recent,
    })
}
