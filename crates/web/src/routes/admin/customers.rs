//! Customer management from the back office.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::{Capability, CustomerId};

use crate::{
    db::Repository,
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Customer, CustomerPatch, NewCustomer},
    routes::{
        Intent, ListParams, Pager, Verb, flash_redirect, form_path, outcome, parse_id,
        validation_failed,
    },
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{Access, AdminNav, short_date};

/// Route of the customer list.
pub const PATH: &str = "/admin/customers";

/// Customer view for templates.
#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub joined: String,
    pub has_login: bool,
}

impl From<Customer> for CustomerRow {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id.to_string(),
            has_login: customer.password_hash.is_some(),
            joined: short_date(customer.created_at),
            full_name: customer.full_name,
            email: customer.email.to_string(),
            phone: customer.phone,
            address: customer.address,
        }
    }
}

/// Customer list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/customers.html")]
pub struct CustomersTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub customers: Vec<CustomerRow>,
    pub pager: Pager,
    pub can_manage: bool,
}

/// Customer list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ViewCustomers).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let page = Repository::<Customer>::new(state.store())
        .list(&params.query(state.config().page_size))
        .await?;
    let pager = Pager::new(PATH, &page, &params);

    Ok(CustomersTemplate {
        nav: access.nav(PATH),
        flash,
        customers: page.items.into_iter().map(CustomerRow::from).collect(),
        pager,
        can_manage: access.can(Capability::ManageCustomers),
    }
    .into_response())
}

/// Customer form fields.
#[derive(Debug, Deserialize)]
pub struct CustomerForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl CustomerForm {
    /// Validate the editable fields, recording failures in `errors`.
    pub fn fields(&self, errors: &mut FieldErrors) -> Option<CustomerPatch> {
        let full_name = errors.check("full_name", validation::name(&self.full_name));
        let email = errors.check("email", validation::email(&self.email));
        let phone = errors.check("phone", validation::phone(&self.phone, false));
        let address = errors.check("address", validation::address(&self.address));
        Some(CustomerPatch {
            full_name: full_name?,
            email: email?,
            phone: phone?,
            address: address?,
        })
    }
}

/// Customer form handler (`create`, `update`, `delete`).
///
/// Customers created here have no password and cannot log in until one is set.
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<CustomerForm>,
) -> Result<Response> {
    if let Err(denied) = Access::require(&state, admin, Capability::ManageCustomers).await {
        return Ok(denied);
    }
    let path = form_path(form.path.as_deref(), PATH);
    let customers = Repository::<Customer>::new(state.store());
    let id: Option<CustomerId> = parse_id(form.id.as_deref());

    let message = match (form.intent, id) {
        (Intent::Create, _) => {
            let mut errors = FieldErrors::new();
            let Some(fields) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            let customer = Customer::new(NewCustomer {
                full_name: fields.full_name,
                email: fields.email,
                phone: fields.phone,
                address: fields.address,
                password_hash: None,
            });
            outcome("Customer", Verb::Add, customers.create(customer).await.map(Some))
        }
        (Intent::Update, Some(id)) => {
            let mut errors = FieldErrors::new();
            let Some(patch) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            outcome("Customer", Verb::Update, customers.update(id, &patch).await)
        }
        (Intent::Delete, Some(id)) => outcome(
            "Customer",
            Verb::Delete,
            customers.delete(id).await.map(|existed| existed.then_some(())),
        ),
        (Intent::Update | Intent::Delete, None) => FlashMessage::error("Customer does not exist!"),
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_accept_blank_phone_and_address() {
        let form = CustomerForm {
            intent: Intent::Create,
            path: None,
            id: None,
            full_name: "Yaw Boateng".into(),
            email: "yaw@farm.test".into(),
            phone: String::new(),
            address: String::new(),
        };
        let mut errors = FieldErrors::new();
        let patch = form.fields(&mut errors).unwrap();
        assert!(errors.is_empty());
        assert_eq!(patch.phone, "");
        assert_eq!(patch.address, "");
    }

    #[test]
    fn test_fields_reject_bad_email() {
        let form = CustomerForm {
            intent: Intent::Update,
            path: None,
            id: None,
            full_name: "Yaw Boateng".into(),
            email: "yaw.farm.test".into(),
            phone: "0244123456".into(),
            address: "Plot 4, Kumasi".into(),
        };
        let mut errors = FieldErrors::new();
        assert!(form.fields(&mut errors).is_none());
        assert_eq!(errors.get("email"), Some("Invalid email"));
    }
}
