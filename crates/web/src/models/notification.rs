//! Back-office notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmfusion_core::{AdminId, CustomerId, NotificationId};

use crate::db::Document;

/// A message for an admin (or for every admin when `admin` is unset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub admin: Option<AdminId>,
    /// Customer the notification is about, if any.
    #[serde(default)]
    pub customer: Option<CustomerId>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Build an unread notification.
    #[must_use]
    pub fn new(admin: Option<AdminId>, customer: Option<CustomerId>, message: String) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationId::generate(),
            admin,
            customer,
            message,
            read: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `admin` should see this notification.
    #[must_use]
    pub fn is_for(&self, admin: AdminId) -> bool {
        self.admin.is_none_or(|target| target == admin)
    }
}

impl Document for Notification {
    type Id = NotificationId;

    const COLLECTION: &'static str = "notifications";
    const SEARCH_FIELDS: &'static [&'static str] = &["message"];
    const SORT_FIELD: &'static str = "created_at";
    const SORT_DESCENDING: bool = true;

    fn id(&self) -> NotificationId {
        self.id
    }
}

/// Patch marking a notification read.
#[derive(Debug, Clone, Serialize)]
pub struct MarkRead {
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_notifications_reach_every_admin() {
        let admin = AdminId::generate();
        let other = AdminId::generate();
        let broadcast = Notification::new(None, None, "New customer".to_string());
        let direct = Notification::new(Some(admin), None, "Low stock".to_string());

        assert!(broadcast.is_for(admin));
        assert!(broadcast.is_for(other));
        assert!(direct.is_for(admin));
        assert!(!direct.is_for(other));
        assert!(!direct.read);
    }
}
