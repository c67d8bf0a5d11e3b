//! Capability checks on back-office pages and actions.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use farmfusion_core::Capability;
use farmfusion_integration_tests::TestApp;
use farmfusion_web::db::Repository;
use farmfusion_web::models::{Admin, Customer, Role};

#[tokio::test]
async fn test_missing_capability_redirects_with_message() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[]).await;
    app.login_admin("ama@farm.example").await;

    let response = app.get("/admin/customers").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/admin"));

    let dashboard = app.follow(&response).await;
    assert!(dashboard.body.contains("You are not allowed to view customers"));
}

#[tokio::test]
async fn test_view_without_manage_cannot_write() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ViewCustomers])
        .await;
    app.login_admin("ama@farm.example").await;

    assert_eq!(app.get("/admin/customers").await.status, StatusCode::OK);

    let response = app
        .post_form(
            "/admin/customers",
            &[
                ("intent", "create"),
                ("full_name", "Esi Owusu"),
                ("email", "esi@farm.example"),
            ],
        )
        .await;
    assert_eq!(response.location(), Some("/admin"));
    let customers = Repository::<Customer>::new(app.store()).all().await.unwrap();
    assert!(customers.is_empty());
}

#[tokio::test]
async fn test_navigation_lists_only_granted_sections() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ViewInventory])
        .await;
    app.login_admin("ama@farm.example").await;

    let dashboard = app.get("/admin").await;
    assert!(dashboard.body.contains("href=\"/admin/inventory\""));
    assert!(!dashboard.body.contains("href=\"/admin/users\""));
}

#[tokio::test]
async fn test_deleting_a_role_revokes_its_grants() {
    let mut app = TestApp::new();
    let id = app
        .seed_admin("ama@farm.example", &[Capability::ViewInventory])
        .await;
    app.login_admin("ama@farm.example").await;
    assert_eq!(app.get("/admin/inventory").await.status, StatusCode::OK);

    let admin = Repository::<Admin>::new(app.store())
        .get(id)
        .await
        .unwrap()
        .unwrap();
    let role = admin.role.unwrap();
    assert!(Repository::<Role>::new(app.store()).delete(role).await.unwrap());

    // The admin keeps the dangling role id but no longer gets its grants.
    let admin = Repository::<Admin>::new(app.store())
        .get(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.role, Some(role));
    assert_eq!(app.get("/admin/inventory").await.status, StatusCode::SEE_OTHER);
    assert_eq!(app.get("/admin").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_management_accepts_multiple_permissions() {
    let mut app = TestApp::new();
    app.seed_admin(
        "ama@farm.example",
        &[Capability::ManageRoles, Capability::ViewAdmins, Capability::ViewCustomers],
    )
    .await;
    app.login_admin("ama@farm.example").await;

    let store = app.store().clone();
    let roles = Repository::<Role>::new(&store);
    let existing = roles.all().await.unwrap();
    let granted = &existing[0].permissions;
    let first = granted[1].to_string();
    let second = granted[2].to_string();

    let response = app
        .post_form(
            "/admin/settings/roles",
            &[
                ("intent", "create"),
                ("name", "Clerk"),
                ("permissions", &first),
                ("permissions", &second),
            ],
        )
        .await;
    let page = app.follow(&response).await;
    assert!(page.body.contains("Role Added Successful"));

    let clerk = roles.find_by("name", "Clerk").await.unwrap().unwrap();
    assert_eq!(clerk.permissions, vec![granted[1], granted[2]]);
}

#[tokio::test]
async fn test_invalid_management_input_returns_field_errors() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ManageCustomers])
        .await;
    app.login_admin("ama@farm.example").await;

    let response = app
        .post_form(
            "/admin/customers",
            &[("intent", "create"), ("full_name", "E"), ("email", "nope")],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["errors"]["email"], "Invalid email");
}
