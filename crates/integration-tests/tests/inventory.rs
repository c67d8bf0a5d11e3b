//! Inventory listing, restocking and images through the back office.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use farmfusion_core::{Availability, Capability};
use farmfusion_integration_tests::TestApp;
use farmfusion_web::db::{InventoryRepository, Repository};
use farmfusion_web::models::{InventoryItem, NewInventoryItem};

async fn seed_item(app: &TestApp, code: &str) -> InventoryItem {
    Repository::<InventoryItem>::new(app.store())
        .create(InventoryItem::new(NewInventoryItem {
            code: code.to_string(),
            description: format!("{code} sacks"),
            quantity: Some(5),
            stock_date: None,
            location: "Shed A".to_string(),
            availability: Availability::InStock,
        }))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_search_without_matches_shows_empty_list() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ViewInventory])
        .await;
    app.login_admin("ama@farm.example").await;
    seed_item(&app, "MAIZE-01").await;

    let page = app.get("/admin/inventory?search_term=cassava").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("No inventory found."));
    assert!(!page.body.contains("MAIZE-01</a>"));
    assert!(!page.body.contains("rel=\"next\""));

    let page = app.get("/admin/inventory?searchTerm=maize").await;
    assert!(page.body.contains("MAIZE-01"));
}

#[tokio::test]
async fn test_restock_adds_quantity_and_records_history() {
    let mut app = TestApp::new();
    let admin = app
        .seed_admin(
            "ama@farm.example",
            &[Capability::ViewInventory, Capability::RestockInventory],
        )
        .await;
    app.login_admin("ama@farm.example").await;
    let item = seed_item(&app, "MAIZE-01").await;
    let path = format!("/admin/inventory/{}", item.id);

    let response = app
        .post_form(
            &path,
            &[
                ("intent", "restock"),
                ("quantity", "7"),
                ("price", "12.50"),
                ("note", "Harvest"),
            ],
        )
        .await;
    assert_eq!(response.location(), Some(path.as_str()));
    let page = app.follow(&response).await;
    assert!(page.body.contains("Inventory Stocked Successful"));

    let inventory = InventoryRepository::new(app.store());
    let stocked = Repository::<InventoryItem>::new(app.store())
        .get(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stocked.quantity, 12);

    let history = inventory.stock_history(item.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.quantity, 7);
    assert_eq!(history[0].record.user, admin);
}

#[tokio::test]
async fn test_restock_requires_its_capability() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ViewInventory])
        .await;
    app.login_admin("ama@farm.example").await;
    let item = seed_item(&app, "MAIZE-01").await;

    let response = app
        .post_form(
            &format!("/admin/inventory/{}", item.id),
            &[("intent", "restock"), ("quantity", "7")],
        )
        .await;
    assert_eq!(response.location(), Some("/admin"));

    let unchanged = Repository::<InventoryItem>::new(app.store())
        .get(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.quantity, 5);
}

#[tokio::test]
async fn test_unknown_item_redirects_to_list() {
    let mut app = TestApp::new();
    app.seed_admin("ama@farm.example", &[Capability::ViewInventory])
        .await;
    app.login_admin("ama@farm.example").await;

    let response = app.get("/admin/inventory/not-an-id").await;
    assert_eq!(response.location(), Some("/admin/inventory"));
    assert!(app.follow(&response).await.body.contains("Inventory not found"));
}

#[tokio::test]
async fn test_attach_images() {
    let mut app = TestApp::new();
    app.seed_admin(
        "ama@farm.example",
        &[Capability::ViewInventory, Capability::ManageInventory],
    )
    .await;
    app.login_admin("ama@farm.example").await;
    let item = seed_item(&app, "MAIZE-01").await;
    let path = format!("/admin/inventory/{}", item.id);

    let response = app
        .post_form(
            &path,
            &[
                ("intent", "attach_images"),
                ("urls", "https://cdn.farm.example/maize.jpg\nhttps://cdn.farm.example/sack.jpg"),
            ],
        )
        .await;
    let page = app.follow(&response).await;
    assert!(page.body.contains("Image Added Successful"));
    assert!(page.body.contains("https://cdn.farm.example/sack.jpg"));

    let bad = app
        .post_form(&path, &[("intent", "attach_images"), ("urls", "ftp://x")])
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_page_links_back_and_keeps_search() {
    let mut app = TestApp::new();
    app.seed_admin(
        "ama@farm.example",
        &[Capability::ViewInventory, Capability::ManageInventory],
    )
    .await;
    app.login_admin("ama@farm.example").await;
    for n in 1..=12 {
        seed_item(&app, &format!("SEED-{n:02}")).await;
    }

    let page = app.get("/admin/inventory?page=2&search_term=seed").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("SEED-12"));
    assert!(!page.body.contains("SEED-01</a>"));
    assert!(page.body.contains(r#"href="/admin/inventory?page=1&amp;search_term=seed" rel="prev""#));
    assert!(!page.body.contains("rel=\"next\""));
    assert!(page.body.contains(r#"name="path" value="/admin/inventory?page=2&amp;search_term=seed""#));

    // Admin chrome and the site layout both render.
    assert!(page.body.contains("class=\"sidebar\""));
    assert!(page.body.contains("site-footer"));

    let first = app.get("/admin/inventory").await;
    assert!(first.body.contains(r#"href="/admin/inventory?page=2" rel="next""#));
}
