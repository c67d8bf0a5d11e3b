//! Flash messages survive exactly one redirect.

use axum::http::StatusCode;
use farmfusion_core::Capability;
use farmfusion_integration_tests::TestApp;

#[tokio::test]
async fn test_flash_is_shown_once() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ManageSettings])
        .await;
    app.login_admin("ama@farm.example").await;

    let response = app
        .post_form(
            "/admin/settings",
            &[("intent", "update"), ("separate_stocks", "on")],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let first = app.follow(&response).await;
    assert!(first.body.contains("Settings Updated Successful"));

    let second = app.get("/admin/settings").await;
    assert!(!second.body.contains("Settings Updated Successful"));
}

#[tokio::test]
async fn test_flash_cookie_from_another_browser_is_ignored() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[]).await;

    let response = app
        .post_form(
            "/admin/login",
            &[("email", "ama@farm.example"), ("password", "Nope12345!")],
        )
        .await;
    app.clear_cookies();

    let page = app.follow(&response).await;
    assert!(!page.body.contains("Invalid Credentials"));
}
