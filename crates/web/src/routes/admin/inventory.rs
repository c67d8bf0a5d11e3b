//! Inventory management: the item list, item detail, restocking and images.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::{Availability, Capability, InventoryId, Price};

use crate::{
    db::{InventoryRepository, Repository, RestockInput, SettingsRepository},
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{InventoryItem, InventoryPatch, NewInventoryItem},
    routes::{
        Intent, ListParams, Pager, Verb, flash_redirect, form_path, outcome, parse_id,
        validation_failed,
    },
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{Access, AdminNav, short_date};

/// Route of the inventory list.
pub const PATH: &str = "/admin/inventory";

/// Date format of the `stock_date` input.
const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Inventory row for templates.
#[derive(Debug, Clone)]
pub struct InventoryRow {
    pub id: String,
    pub href: String,
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub price: String,
    pub stock_date: String,
    pub stock_date_input: String,
    pub location: String,
    pub availability: &'static str,
    pub image_count: usize,
}

impl From<InventoryItem> for InventoryRow {
    fn from(item: InventoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            href: format!("{PATH}/{}", item.id),
            quantity: item.quantity,
            price: item.price.map(|p| p.to_string()).unwrap_or_default(),
            stock_date: short_date(item.stock_date),
            stock_date_input: item.stock_date.format(DATE_INPUT_FORMAT).to_string(),
            availability: item.availability.as_str(),
            image_count: item.image_ids.len(),
            code: item.code,
            description: item.description,
            location: item.location,
        }
    }
}

/// Inventory list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/inventory.html")]
pub struct InventoryTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub items: Vec<InventoryRow>,
    pub pager: Pager,
    pub can_manage: bool,
}

/// Inventory list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ViewInventory).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let page = Repository::<InventoryItem>::new(state.store())
        .list(&params.query(state.config().page_size))
        .await?;
    let pager = Pager::new(PATH, &page, &params);

    Ok(InventoryTemplate {
        nav: access.nav(PATH),
        flash,
        items: page.items.into_iter().map(InventoryRow::from).collect(),
        pager,
        can_manage: access.can(Capability::ManageInventory),
    }
    .into_response())
}

/// Inventory form fields.
#[derive(Debug, Deserialize)]
pub struct InventoryForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub stock_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub availability: String,
}

impl InventoryForm {
    /// Validate the item fields, recording failures in `errors`. Blank
    /// quantity, date and availability come back as `None`.
    pub fn fields(&self, errors: &mut FieldErrors) -> Option<InventoryPatch> {
        let code = errors.check("code", validation::required(&self.code, "Code"));
        let quantity = errors.check("quantity", optional(&self.quantity, parse_quantity));
        let stock_date = errors.check("stock_date", optional(&self.stock_date, parse_date));
        let availability = errors.check(
            "availability",
            optional(&self.availability, |raw| {
                raw.parse::<Availability>()
                    .map_err(|_| "Invalid availability".to_string())
            }),
        );
        Some(InventoryPatch {
            code: Some(code?),
            description: Some(self.description.trim().to_string()),
            quantity: quantity?,
            stock_date: stock_date?,
            location: Some(self.location.trim().to_string()),
            availability: availability?,
        })
    }
}

/// `None` for blank input, otherwise the parsed value.
fn optional<T>(
    raw: &str,
    parse: impl FnOnce(&str) -> std::result::Result<T, String>,
) -> std::result::Result<Option<T>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        parse(raw).map(Some)
    }
}

/// Largest quantity (or restock delta, either sign) a form may submit.
const MAX_QUANTITY: i64 = 1_000_000_000;

fn parse_quantity(raw: &str) -> std::result::Result<i64, String> {
    let quantity: i64 = raw.parse().map_err(|_| "Invalid quantity".to_string())?;
    if quantity.abs() > MAX_QUANTITY {
        return Err(format!("Quantity must be within {MAX_QUANTITY}"));
    }
    Ok(quantity)
}

fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(raw, DATE_INPUT_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| "Invalid date".to_string())
}

fn parse_price(raw: &str) -> std::result::Result<Price, String> {
    Price::parse(raw).map_err(|e| e.to_string())
}

/// Inventory form handler (`create`, `update`, `delete`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<InventoryForm>,
) -> Result<Response> {
    if let Err(denied) = Access::require(&state, admin, Capability::ManageInventory).await {
        return Ok(denied);
    }
    let path = form_path(form.path.as_deref(), PATH);
    let items = Repository::<InventoryItem>::new(state.store());
    let id: Option<InventoryId> = parse_id(form.id.as_deref());

    let message = match (form.intent, id) {
        (Intent::Create, _) => {
            let mut errors = FieldErrors::new();
            let Some(fields) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            let item = InventoryItem::new(NewInventoryItem {
                code: fields.code.unwrap_or_default(),
                description: fields.description.unwrap_or_default(),
                quantity: fields.quantity,
                stock_date: fields.stock_date,
                location: fields.location.unwrap_or_default(),
                availability: fields.availability.unwrap_or_default(),
            });
            outcome("Inventory", Verb::Add, items.create(item).await.map(Some))
        }
        (Intent::Update, Some(id)) => {
            let mut errors = FieldErrors::new();
            let Some(patch) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            outcome("Inventory", Verb::Update, items.update(id, &patch).await)
        }
        (Intent::Delete, Some(id)) => outcome(
            "Inventory",
            Verb::Delete,
            items.delete(id).await.map(|existed| existed.then_some(())),
        ),
        (Intent::Update | Intent::Delete, None) => FlashMessage::error("Inventory not found"),
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

// =============================================================================
// Item detail
// =============================================================================

/// A restock record for templates.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub date: String,
    pub admin: String,
    pub quantity: i64,
    pub price: String,
    pub cost_price: String,
    pub note: String,
}

/// Item detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/inventory_item.html")]
pub struct InventoryItemTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub item: InventoryRow,
    pub images: Vec<String>,
    pub history: Vec<HistoryRow>,
    pub separate_stocks: bool,
    pub can_manage: bool,
    pub can_restock: bool,
}

/// Item detail handler: the item, its images and its stock history.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(raw_id): Path<String>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ViewInventory).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let item = match raw_id.parse::<InventoryId>() {
        Ok(id) => Repository::<InventoryItem>::new(state.store()).get(id).await?,
        Err(_) => None,
    };
    let Some(item) = item else {
        return Ok(flash_redirect(PATH, FlashMessage::error("Inventory not found")));
    };

    let inventory = InventoryRepository::new(state.store());
    let images = inventory
        .images(&item)
        .await?
        .into_iter()
        .map(|image| image.url)
        .collect();
    let history = match inventory.stock_history(item.id).await {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| HistoryRow {
                date: short_date(entry.record.created_at),
                admin: entry
                    .user
                    .map_or_else(|| "Unknown".to_string(), |u| u.full_name()),
                quantity: entry.record.quantity,
                price: entry.record.price.map(|p| p.to_string()).unwrap_or_default(),
                cost_price: entry
                    .record
                    .cost_price
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                note: entry.record.note,
            })
            .collect(),
        Err(e) => {
            tracing::error!(item_id = %item.id, error = %e, "failed to load stock history");
            return Ok(flash_redirect(
                PATH,
                FlashMessage::error("Error Getting Stock History"),
            ));
        }
    };
    let settings = SettingsRepository::new(state.store()).get().await?;

    Ok(InventoryItemTemplate {
        nav: access.nav(PATH),
        flash,
        item: InventoryRow::from(item),
        images,
        history,
        separate_stocks: settings.separate_stocks,
        can_manage: access.can(Capability::ManageInventory),
        can_restock: access.can(Capability::RestockInventory),
    }
    .into_response())
}

/// Item detail form fields.
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub cost_price: String,
    #[serde(default)]
    pub note: String,
    /// Image urls separated by whitespace or newlines.
    #[serde(default)]
    pub urls: String,
}

impl ItemForm {
    /// Validate a restock, recording failures in `errors`.
    pub fn restock(&self, errors: &mut FieldErrors) -> Option<RestockInput> {
        let quantity = errors.check(
            "quantity",
            validation::required(&self.quantity, "Quantity").and_then(|q| parse_quantity(&q)),
        );
        let price = errors.check("price", optional(&self.price, parse_price));
        let cost_price = errors.check("cost_price", optional(&self.cost_price, parse_price));
        Some(RestockInput {
            quantity: quantity?,
            price: price?,
            cost_price: cost_price?,
            note: self.note.trim().to_string(),
        })
    }

    /// Validate the image urls (absolute http or https), recording failures
    /// in `errors`.
    pub fn image_urls(&self, errors: &mut FieldErrors) -> Option<Vec<String>> {
        let urls: Vec<String> = self.urls.split_whitespace().map(String::from).collect();
        if urls.is_empty() {
            errors.add("urls", "At least one image URL is required");
            return None;
        }
        let valid = urls.iter().all(|raw| {
            url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
        });
        if valid {
            Some(urls)
        } else {
            errors.add("urls", "Invalid image URL");
            None
        }
    }
}

/// Item detail form handler (`restock`, `attach_images`).
#[instrument(skip_all)]
pub async fn item_action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(raw_id): Path<String>,
    Form(form): Form<ItemForm>,
) -> Result<Response> {
    let access = Access::load(&state, admin).await?;
    let Ok(id) = raw_id.parse::<InventoryId>() else {
        return Ok(flash_redirect(PATH, FlashMessage::error("Inventory not found")));
    };
    let item_path = format!("{PATH}/{id}");
    let path = form_path(form.path.as_deref(), &item_path);
    let inventory = InventoryRepository::new(state.store());

    let message = match form.intent {
        Intent::Restock => {
            if let Err(denied) = access.ensure(Capability::RestockInventory) {
                return Ok(denied);
            }
            let mut errors = FieldErrors::new();
            let Some(input) = form.restock(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            match inventory.restock(id, input, access.admin.id).await {
                Ok(Some(_)) => FlashMessage::success("Inventory Stocked Successful"),
                Ok(None) => FlashMessage::error("Inventory not found"),
                Err(e) => {
                    tracing::error!(item_id = %id, error = %e, "restock failed");
                    FlashMessage::error("Error Stocking Inventory")
                }
            }
        }
        Intent::AttachImages => {
            if let Err(denied) = access.ensure(Capability::ManageInventory) {
                return Ok(denied);
            }
            let mut errors = FieldErrors::new();
            let Some(urls) = form.image_urls(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            match inventory.attach_images(id, &urls).await {
                Ok(Some(_)) => FlashMessage::success("Image Added Successful"),
                Ok(None) => FlashMessage::error("Inventory not found"),
                Err(e) => {
                    tracing::error!(item_id = %id, error = %e, "attaching images failed");
                    FlashMessage::error("Error Adding Image")
                }
            }
        }
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn item_form() -> ItemForm {
        ItemForm {
            intent: Intent::Restock,
            path: None,
            quantity: "-3".into(),
            price: "4.50".into(),
            cost_price: String::new(),
            note: " spoiled crates ".into(),
            urls: String::new(),
        }
    }

    #[test]
    fn test_restock_accepts_negative_delta() {
        let mut errors = FieldErrors::new();
        let input = item_form().restock(&mut errors).unwrap();
        assert_eq!(input.quantity, -3);
        assert_eq!(input.price.unwrap().amount(), Decimal::new(450, 2));
        assert_eq!(input.cost_price, None);
        assert_eq!(input.note, "spoiled crates");
    }

    #[test]
    fn test_restock_requires_quantity() {
        let mut form = item_form();
        form.quantity = " ".into();
        form.price = "-1".into();
        let mut errors = FieldErrors::new();
        assert!(form.restock(&mut errors).is_none());
        assert_eq!(errors.get("quantity"), Some("Quantity is required"));
        assert_eq!(errors.get("price"), Some("price cannot be negative"));
    }

    #[test]
    fn test_restock_rejects_oversized_quantity() {
        let mut form = item_form();
        form.quantity = i64::MAX.to_string();
        let mut errors = FieldErrors::new();
        assert!(form.restock(&mut errors).is_none());
        assert_eq!(
            errors.get("quantity"),
            Some("Quantity must be within 1000000000")
        );

        form.quantity = "-1000000000".into();
        let mut errors = FieldErrors::new();
        assert_eq!(form.restock(&mut errors).unwrap().quantity, -1_000_000_000);
    }

    #[test]
    fn test_image_urls_must_be_web_urls() {
        let mut form = item_form();
        form.urls = "https://cdn.farm.test/a.jpg\nhttp://cdn.farm.test/b.jpg".into();
        let mut errors = FieldErrors::new();
        assert_eq!(form.image_urls(&mut errors).unwrap().len(), 2);

        form.urls = "https://cdn.farm.test/a.jpg javascript:alert(1)".into();
        assert!(form.image_urls(&mut errors).is_none());
        assert_eq!(errors.get("urls"), Some("Invalid image URL"));
    }

    #[test]
    fn test_inventory_fields_parse_optional_values() {
        let form = InventoryForm {
            intent: Intent::Create,
            path: None,
            id: None,
            code: "CAS-07".into(),
            description: "Cassava stems".into(),
            quantity: String::new(),
            stock_date: "2026-03-01".into(),
            location: "Shed B".into(),
            availability: "out-of-stock".into(),
        };
        let mut errors = FieldErrors::new();
        let fields = form.fields(&mut errors).unwrap();
        assert_eq!(fields.quantity, None);
        assert_eq!(
            fields.stock_date.unwrap().format(DATE_INPUT_FORMAT).to_string(),
            "2026-03-01"
        );
        assert_eq!(fields.availability, Some(Availability::OutOfStock));
    }
}
