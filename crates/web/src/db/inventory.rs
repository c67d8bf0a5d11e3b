//! Inventory operations that span several collections.

use chrono::Utc;

use farmfusion_core::{AdminId, InventoryId, Price, RestockId};

use super::{DocumentStore, Repository, RepositoryError, SettingsRepository, UnitOfWork};
use crate::models::{Admin, AdminProfile, InventoryImage, InventoryItem, RestockHistory};

/// Input for a restock.
#[derive(Debug, Clone, Default)]
pub struct RestockInput {
    /// Quantity delta, added to the current stock.
    pub quantity: i64,
    /// New selling price.
    pub price: Option<Price>,
    /// Purchase price, recorded in history only.
    pub cost_price: Option<Price>,
    pub note: String,
}

/// A history entry with the acting admin loaded.
#[derive(Debug, Clone)]
pub struct RestockEntry {
    pub record: RestockHistory,
    /// `None` when the admin has since been deleted.
    pub user: Option<AdminProfile>,
}

/// Repository for restocking and image attachment.
pub struct InventoryRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Add `input.quantity` to the item's stock and record one history entry.
    ///
    /// The selling price is overwritten with `input.price` unless the
    /// `separate_stocks` setting is on. Returns `None` if the item does not
    /// exist; nothing is written in that case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::OutOfRange` if the stock would overflow, or
    /// `RepositoryError::Database` if a query fails.
    pub async fn restock(
        &self,
        id: InventoryId,
        input: RestockInput,
        acting_admin: AdminId,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let settings = SettingsRepository::new(self.store).get().await?;
        let now = Utc::now();
        let record = RestockHistory {
            id: RestockId::generate(),
            user: acting_admin,
            product: id,
            quantity: input.quantity,
            price: input.price,
            cost_price: input.cost_price,
            note: input.note,
            created_at: now,
            updated_at: now,
        };

        let mut uow = UnitOfWork::new();
        uow.increment::<InventoryItem>(id, "quantity", input.quantity);
        if let Some(price) = input.price
            && !settings.separate_stocks
        {
            uow.merge::<InventoryItem>(id, &serde_json::json!({ "price": price }))?;
        }
        uow.insert(&record)?;

        match self.store.commit(&uow).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        }
        tracing::info!(
            item_id = %id,
            admin_id = %acting_admin,
            delta = input.quantity,
            "inventory restocked"
        );
        Repository::<InventoryItem>::new(self.store).get(id).await
    }

    /// Create one image document per url and attach them to the item.
    ///
    /// Returns `None` if the item does not exist; no images are created then.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn attach_images(
        &self,
        id: InventoryId,
        urls: &[String],
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let images: Vec<InventoryImage> = urls
            .iter()
            .map(|url| InventoryImage::new(id, url.clone()))
            .collect();

        let mut uow = UnitOfWork::new();
        for image in &images {
            uow.insert(image)?;
        }
        let ids: Vec<_> = images.iter().map(|image| image.id).collect();
        uow.append::<InventoryItem, _>(id, "image_ids", &ids)?;

        match self.store.commit(&uow).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        }
        Repository::<InventoryItem>::new(self.store).get(id).await
    }

    /// Images attached to the item, in attachment order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn images(&self, item: &InventoryItem) -> Result<Vec<InventoryImage>, RepositoryError> {
        Repository::<InventoryImage>::new(self.store)
            .get_many(&item.image_ids)
            .await
    }

    /// Restock history of an item, newest first, with acting admins loaded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stock_history(&self, id: InventoryId) -> Result<Vec<RestockEntry>, RepositoryError> {
        let mut records = Repository::<RestockHistory>::new(self.store)
            .filter_by("product", &id.to_string())
            .await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut admin_ids: Vec<AdminId> = records.iter().map(|r| r.user).collect();
        admin_ids.sort_unstable();
        admin_ids.dedup();
        let admins = Repository::<Admin>::new(self.store).get_many(&admin_ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let user = admins
                    .iter()
                    .find(|admin| admin.id == record.user)
                    .cloned()
                    .map(AdminProfile::from);
                RestockEntry { record, user }
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use farmfusion_core::{Availability, Email};

    use super::*;
    use crate::models::{NewAdmin, NewInventoryItem};

    async fn seeded(store: &DocumentStore) -> InventoryItem {
        Repository::<InventoryItem>::new(store)
            .create(InventoryItem::new(NewInventoryItem {
                code: "FRT-100".to_string(),
                description: "NPK fertiliser 50kg".to_string(),
                quantity: Some(5),
                stock_date: None,
                location: "Warehouse 2".to_string(),
                availability: Availability::InStock,
            }))
            .await
            .unwrap()
    }

    async fn admin(store: &DocumentStore) -> Admin {
        Repository::<Admin>::new(store)
            .create(Admin::new(NewAdmin {
                email: Email::parse("stock@farm.test").unwrap(),
                password_hash: "hash".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Okafor".to_string(),
                phone: None,
                role: None,
            }))
            .await
            .unwrap()
    }

    fn input(quantity: i64, price: &str) -> RestockInput {
        RestockInput {
            quantity,
            price: Some(Price::parse(price).unwrap()),
            cost_price: Some(Price::parse("10").unwrap()),
            note: "supplier delivery".to_string(),
        }
    }

    #[tokio::test]
    async fn test_restock_adds_delta_and_records_one_entry() {
        let store = DocumentStore::memory();
        let item = seeded(&store).await;
        let admin = admin(&store).await;
        let inventory = InventoryRepository::new(&store);

        let updated = inventory
            .restock(item.id, input(7, "25.50"), admin.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 12);
        assert_eq!(updated.price, Some(Price::parse("25.50").unwrap()));

        let history = inventory.stock_history(item.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.quantity, 7);
        assert_eq!(history[0].record.user, admin.id);
        assert_eq!(
            history[0].user.as_ref().map(AdminProfile::full_name),
            Some("Ada Okafor".to_string())
        );
    }

    #[tokio::test]
    async fn test_restock_keeps_price_when_stocks_are_separate() {
        let store = DocumentStore::memory();
        let item = seeded(&store).await;
        SettingsRepository::new(&store)
            .set_separate_stocks(true)
            .await
            .unwrap();

        let updated = InventoryRepository::new(&store)
            .restock(item.id, input(-2, "99"), AdminId::generate())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 3);
        assert!(updated.price.is_none());
    }

    #[tokio::test]
    async fn test_restock_of_missing_item_writes_nothing() {
        let store = DocumentStore::memory();
        let inventory = InventoryRepository::new(&store);
        let missing = InventoryId::generate();

        assert!(
            inventory
                .restock(missing, input(3, "1"), AdminId::generate())
                .await
                .unwrap()
                .is_none()
        );
        assert!(inventory.stock_history(missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restock_overflow_writes_nothing() {
        let store = DocumentStore::memory();
        let item = seeded(&store).await;
        let inventory = InventoryRepository::new(&store);

        let result = inventory
            .restock(item.id, input(i64::MAX, "1"), AdminId::generate())
            .await;
        assert!(matches!(result, Err(RepositoryError::OutOfRange(field)) if field == "quantity"));

        let unchanged = Repository::<InventoryItem>::new(&store)
            .get(item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.quantity, 5);
        assert!(unchanged.price.is_none());
        assert!(inventory.stock_history(item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = DocumentStore::memory();
        let item = seeded(&store).await;
        let inventory = InventoryRepository::new(&store);
        let admin = AdminId::generate();

        inventory.restock(item.id, input(1, "1"), admin).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        inventory.restock(item.id, input(2, "2"), admin).await.unwrap();

        let history = inventory.stock_history(item.id).await.unwrap();
        let deltas: Vec<i64> = history.iter().map(|e| e.record.quantity).collect();
        assert_eq!(deltas, vec![2, 1]);
        assert!(history.iter().all(|e| e.user.is_none()));
    }

    #[tokio::test]
    async fn test_attach_images_links_new_documents() {
        let store = DocumentStore::memory();
        let item = seeded(&store).await;
        let inventory = InventoryRepository::new(&store);

        let urls = vec![
            "https://cdn.farm.test/a.jpg".to_string(),
            "https://cdn.farm.test/b.jpg".to_string(),
        ];
        let updated = inventory.attach_images(item.id, &urls).await.unwrap().unwrap();
        assert_eq!(updated.image_ids.len(), 2);

        let images = inventory.images(&updated).await.unwrap();
        let stored: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(stored, vec!["https://cdn.farm.test/a.jpg", "https://cdn.farm.test/b.jpg"]);
        assert!(images.iter().all(|i| i.product == item.id));
    }
}
