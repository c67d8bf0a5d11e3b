//! General back-office settings (a single document).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farmfusion_core::SettingsId;

use crate::db::Document;

/// Store-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub id: SettingsId,
    /// When set, restocking records prices in history only and leaves the
    /// item's selling price alone.
    #[serde(default)]
    pub separate_stocks: bool,
    pub updated_at: DateTime<Utc>,
}

impl GeneralSettings {
    /// The fixed id of the settings document.
    pub const ID: SettingsId = SettingsId::new(Uuid::nil());
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            id: Self::ID,
            separate_stocks: false,
            updated_at: Utc::now(),
        }
    }
}

impl Document for GeneralSettings {
    type Id = SettingsId;

    const COLLECTION: &'static str = "settings";
    const SEARCH_FIELDS: &'static [&'static str] = &[];
    const SORT_FIELD: &'static str = "id";

    fn id(&self) -> SettingsId {
        self.id
    }
}
