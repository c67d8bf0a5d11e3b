//! Store-wide settings persistence.

use super::{DocumentStore, Repository, RepositoryError, UnitOfWork};
use crate::models::GeneralSettings;

/// Repository for the single [`GeneralSettings`] document.
pub struct SettingsRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Current settings, or the defaults when none were saved yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<GeneralSettings, RepositoryError> {
        Ok(Repository::<GeneralSettings>::new(self.store)
            .get(GeneralSettings::ID)
            .await?
            .unwrap_or_default())
    }

    /// Save the `separate_stocks` switch, creating the document if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn set_separate_stocks(
        &self,
        separate_stocks: bool,
    ) -> Result<GeneralSettings, RepositoryError> {
        let repo = Repository::<GeneralSettings>::new(self.store);
        let mut uow = UnitOfWork::new();
        if repo.get(GeneralSettings::ID).await?.is_some() {
            uow.merge::<GeneralSettings>(
                GeneralSettings::ID,
                &serde_json::json!({ "separate_stocks": separate_stocks }),
            )?;
        } else {
            uow.insert(&GeneralSettings {
                separate_stocks,
                ..GeneralSettings::default()
            })?;
        }
        self.store.commit(&uow).await?;
        tracing::info!(separate_stocks, "general settings saved");
        self.get().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_then_saved_value() {
        let store = DocumentStore::memory();
        let settings = SettingsRepository::new(&store);

        assert!(!settings.get().await.unwrap().separate_stocks);
        assert!(settings.set_separate_stocks(true).await.unwrap().separate_stocks);
        assert!(!settings.set_separate_stocks(false).await.unwrap().separate_stocks);
        assert!(!settings.get().await.unwrap().separate_stocks);
    }
}
