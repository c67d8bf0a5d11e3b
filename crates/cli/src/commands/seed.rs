//! Seed the access-control documents.
//!
//! Creates one permission per capability (skipping actions that already have
//! a permission) and a "Super Admin" role holding all of them. Running it
//! again only fills in what is missing.

use std::collections::HashSet;

use farmfusion_core::{Capability, PermissionId};
use farmfusion_web::db::{DocumentStore, Repository, RepositoryError};
use farmfusion_web::models::{Permission, Role, RolePatch};
use thiserror::Error;

use super::{ConnectError, connect};

/// Name of the role granted every capability.
pub const SUPER_ADMIN_ROLE: &str = "Super Admin";

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a seed run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub role_created: bool,
}

/// Seed the database named by `DATABASE_URL`.
///
/// # Errors
///
/// Returns `SeedError` if the database is unreachable or a write fails.
pub async fn run() -> Result<SeedReport, SeedError> {
    let store = DocumentStore::postgres(connect().await?);
    let report = seed(&store).await?;
    tracing::info!(
        permissions_created = report.permissions_created,
        role_created = report.role_created,
        "Seed complete!"
    );
    Ok(report)
}

/// Seed `store`.
///
/// # Errors
///
/// Returns `RepositoryError` if a read or write fails.
pub async fn seed(store: &DocumentStore) -> Result<SeedReport, RepositoryError> {
    let permissions = Repository::<Permission>::new(store);
    let existing = permissions.all().await?;
    let known_actions: HashSet<&str> = existing.iter().map(|p| p.action.as_str()).collect();

    let mut report = SeedReport::default();
    let mut ids: Vec<PermissionId> = existing
        .iter()
        .filter(|p| p.capability().is_some())
        .map(|p| p.id)
        .collect();

    for capability in Capability::ALL {
        if known_actions.contains(capability.as_str()) {
            continue;
        }
        let created = permissions
            .create(Permission::new(
                title_case(capability.describe()),
                format!("Allows an admin to {}", capability.describe()),
                capability.as_str().to_string(),
            ))
            .await?;
        tracing::info!(action = %capability, "permission created");
        ids.push(created.id);
        report.permissions_created += 1;
    }

    let roles = Repository::<Role>::new(store);
    match roles.find_by("name", SUPER_ADMIN_ROLE).await? {
        Some(role) => {
            let mut granted = role.permissions.clone();
            for id in ids {
                if !granted.contains(&id) {
                    granted.push(id);
                }
            }
            if granted.len() != role.permissions.len() {
                let patch = RolePatch {
                    name: role.name.clone(),
                    permissions: granted,
                };
                roles.update(role.id, &patch).await?;
                tracing::info!(role_id = %role.id, "super admin role updated");
            }
        }
        None => {
            let role = roles
                .create(Role::new(SUPER_ADMIN_ROLE.to_string(), ids))
                .await?;
            tracing::info!(role_id = %role.id, "super admin role created");
            report.role_created = true;
        }
    }

    Ok(report)
}

/// "view admins" -> "View Admins".
fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("restock inventory"), "Restock Inventory");
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = DocumentStore::memory();

        let first = seed(&store).await.unwrap();
        assert_eq!(first.permissions_created, Capability::ALL.len());
        assert!(first.role_created);

        let second = seed(&store).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let role = Repository::<Role>::new(&store)
            .find_by("name", SUPER_ADMIN_ROLE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(role.permissions.len(), Capability::ALL.len());
    }
}
