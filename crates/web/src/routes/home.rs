//! Landing page.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::{
    db::Repository,
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::OptionalCustomer,
    models::Customer,
    state::AppState,
};

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub flash: Option<FlashMessage>,
    pub customer_name: Option<String>,
}

/// Landing page: links to login and registration, or a greeting.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    OptionalCustomer(customer_id): OptionalCustomer,
    Flash(flash): Flash,
) -> Result<HomeTemplate> {
    let customer_name = match customer_id {
        Some(id) => Repository::<Customer>::new(state.store())
            .get(id)
            .await?
            .map(|c| c.full_name),
        None => None,
    };

    Ok(HomeTemplate {
        flash,
        customer_name,
    })
}
