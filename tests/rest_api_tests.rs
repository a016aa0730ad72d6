//! End-to-end tests of the REST exposure over the catalog
//!
//! These tests drive the router built by `ServerBuilder` through
//! `axum-test`, from HTTP request to the JSON envelope.

mod store_harness;

use axum::http::StatusCode;
use axum_test::TestServer;
use compose::catalog::{self, Category, Product};
use compose::core::service::DataService;
use compose::core::source::DataSource;
use compose::server::ServerBuilder;
use compose::storage::InMemoryStore;
use serde_json::{Value, json};
use std::sync::Arc;
use store_harness::FailingStore;

// =============================================================================
// Test Server Setup
// =============================================================================

async fn create_test_server(seed: bool) -> (TestServer, Arc<DataSource>) {
    let source = Arc::new(DataSource::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(catalog::schema()),
    ));
    if seed {
        catalog::seed(source.clone()).await.expect("seed should succeed");
    }

    let products = Arc::new(DataService::<Product>::new(source.clone()));
    let app = ServerBuilder::new()
        .with_data_source(source.clone())
        .register_resource::<Product>()
        .register_resource::<Category>()
        .with_custom_routes(catalog::routes(products))
        .build()
        .expect("Failed to build router");

    let server = TestServer::new(app);
    (server, source)
}

fn create_failing_server() -> TestServer {
    let source = Arc::new(DataSource::new(
        Arc::new(FailingStore::always()),
        Arc::new(catalog::schema()),
    ));
    let app = ServerBuilder::new()
        .with_data_source(source)
        .register_resource::<Product>()
        .build()
        .expect("Failed to build router");
    TestServer::new(app)
}

fn new_product() -> Value {
    json!({
        "documentId": "prod_book",
        "title": "The Rust Book",
        "slug": "the-rust-book",
        "SKU": "BOOK-001",
        "vertical": ["TECH"],
        "type": "Libro"
    })
}

// =============================================================================
// Health Tests
// =============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoints() {
        let (server, _) = create_test_server(false).await;

        for path in ["/health", "/healthz"] {
            let response = server.get(path).await;
            response.assert_status_ok();

            let body: Value = response.json();
            assert_eq!(body["status"], "ok");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (server, _) = create_test_server(false).await;

        let response = server.get("/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "ROUTE_NOT_FOUND");
        assert_eq!(body["message"], "Route /nope not found");
        assert_eq!(body["statusCode"], 404);
    }
}

// =============================================================================
// Resource CRUD Tests
// =============================================================================

mod crud_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_empty() {
        let (server, _) = create_test_server(false).await;

        let response = server.get("/products").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Products retrieved successfully");
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (server, _) = create_test_server(false).await;

        let response = server.post("/products").json(&new_product()).await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["message"], "Product created successfully");
        assert_eq!(body["data"]["title"], "The Rust Book");
        assert_eq!(body["data"]["SKU"], "BOOK-001");
        let id = body["data"]["id"].as_i64().expect("numeric id");

        let response = server.get(&format!("/products/{}", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Product retrieved successfully");
        assert_eq!(body["data"]["type"], "Libro");
        assert!(body["data"]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_create_ignores_client_id() {
        let (server, _) = create_test_server(false).await;

        let mut product = new_product();
        product["id"] = json!(500);
        let response = server.post("/products").json(&product).await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["data"]["id"], 1);
    }

    #[tokio::test]
    async fn test_create_validation_error() {
        let (server, _) = create_test_server(false).await;

        let mut product = new_product();
        product["documentId"] = json!("");
        product["slug"] = json!("Not A Slug");
        let response = server.post("/products").json(&product).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        let fields = body["details"]["fields"].as_array().expect("field errors");
        assert!(fields.iter().any(|f| f["field"] == "documentId"));
        assert!(fields.iter().all(|f| f["field"] != "document_id"));
        assert!(fields.iter().any(|f| f["field"] == "slug"));
    }

    #[tokio::test]
    async fn test_create_without_optional_slug() {
        let (server, _) = create_test_server(false).await;

        let mut product = new_product();
        product.as_object_mut().unwrap().remove("slug");
        let response = server.post("/products").json(&product).await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.json::<Value>()["data"].get("slug").is_none_or(Value::is_null));
    }

    #[tokio::test]
    async fn test_storage_failure_hides_details() {
        let server = create_failing_server();

        let response = server.get("/products").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "STORAGE_ERROR");
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["statusCode"], 500);
        assert!(!body.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_body() {
        let (server, _) = create_test_server(false).await;

        let response = server.post("/products").text("{not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let mut product = new_product();
        product["type"] = json!("Podcast");
        let response = server.post("/products").json(&product).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_and_missing_ids() {
        let (server, _) = create_test_server(false).await;

        for path in ["/products/abc", "/products/0", "/products/-3"] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }

        let response = server.get("/products/abc").await;
        let body: Value = response.json();
        assert_eq!(body["message"], "Invalid ID provided: 'abc'");

        let response = server.get("/products/42").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
        assert_eq!(body["message"], "Product with ID 42 not found");
    }

    #[tokio::test]
    async fn test_partial_update() {
        let (server, _) = create_test_server(false).await;
        server.post("/products").json(&new_product()).await;

        let response = server
            .patch("/products/1")
            .json(&json!({"title": "The Rust Book, 2nd ed.", "isPremium": true}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["message"], "Product updated successfully");
        assert_eq!(body["data"]["title"], "The Rust Book, 2nd ed.");
        assert_eq!(body["data"]["isPremium"], true);
        assert_eq!(body["data"]["SKU"], "BOOK-001");
        assert_eq!(body["data"]["id"], 1);
    }

    #[tokio::test]
    async fn test_update_validates_merged_row() {
        let (server, _) = create_test_server(false).await;
        server.post("/products").json(&new_product()).await;

        let response = server.put("/products/1").json(&json!({"title": ""})).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.put("/products/7").json(&json!({"title": "x"})).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_returns_removed_row() {
        let (server, _) = create_test_server(false).await;
        server.post("/products").json(&new_product()).await;

        let response = server.delete("/products/1").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Product deleted successfully");
        assert_eq!(body["data"]["documentId"], "prod_book");

        server
            .get("/products/1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/products/1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Include Tests
// =============================================================================

mod include_tests {
    use super::*;

    #[tokio::test]
    async fn test_include_components() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/products/1")
            .add_query_param("include", "fullPrice,cardTags")
            .await;
        response.assert_status_ok();

        let data = &response.json::<Value>()["data"];
        assert_eq!(data["fullPrice"]["price"], 1990.0);
        assert_eq!(data["cardTags"]["leftTag"], "Online");
        assert!(data.get("components").is_none());
    }

    #[tokio::test]
    async fn test_unrequested_components_absent() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/products")
            .add_query_param("include", "cardTags")
            .await;
        response.assert_status_ok();

        let data = &response.json::<Value>()["data"][0];
        assert!(data.get("cardTags").is_some());
        assert!(data.get("fullPrice").is_none());

        let response = server.get("/products/1").await;
        let data = &response.json::<Value>()["data"];
        assert!(data.get("cardTags").is_none());
        assert!(data.get("components").is_none());
    }

    #[tokio::test]
    async fn test_include_nested_relation() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/products/1")
            .add_query_param("include", "categories.seo, fullPrice")
            .await;
        response.assert_status_ok();

        let data = &response.json::<Value>()["data"];
        assert_eq!(data["categories"][0]["name"], "Courses");
        assert_eq!(data["categories"][0]["seo"]["metaTitle"], "Courses");
        assert_eq!(data["fullPrice"]["discountPercentage"], 25);
    }

    #[tokio::test]
    async fn test_include_from_category_side() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/categories")
            .add_query_param("include", "products.fullPrice")
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["message"], "Categories retrieved successfully");
        let product = &body["data"][0]["products"][0];
        assert_eq!(product["title"], "Full Stack Developer Course");
        assert_eq!(product["fullPrice"]["price"], 1990.0);
    }

    #[tokio::test]
    async fn test_include_errors() {
        let (server, _) = create_test_server(true).await;

        let cases = [
            ("categories;drop", "VALIDATION_ERROR"),
            ("a.b.c.d", "VALIDATION_ERROR"),
            ("a,b,c,d,e,f,g,h,i,j,k", "VALIDATION_ERROR"),
            ("categories.se-o", "VALIDATION_ERROR"),
        ];
        for (include, code) in cases {
            let response = server
                .get("/products")
                .add_query_param("include", include)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["code"], code, "include={}", include);
        }

        let response = server
            .get("/products")
            .add_query_param("include", "a.b.c.d")
            .await;
        let details = &response.json::<Value>()["details"];
        assert_eq!(details["max"], 3);
        assert_eq!(details["found"], 4);
    }

    #[tokio::test]
    async fn test_repeated_include_means_no_relations() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/products/1")
            .add_query_param("include", "fullPrice")
            .add_query_param("include", "cardTags")
            .await;
        response.assert_status_ok();

        let data = &response.json::<Value>()["data"];
        assert_eq!(data["documentId"], "prod_fullstack");
        assert!(data.get("fullPrice").is_none());
        assert!(data.get("cardTags").is_none());

        let response = server
            .get("/products")
            .add_query_param("include", "a;b")
            .add_query_param("include", "c")
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_empty_include_is_ignored() {
        let (server, _) = create_test_server(true).await;

        let response = server
            .get("/products/1")
            .add_query_param("include", "")
            .await;
        response.assert_status_ok();
        assert!(response.json::<Value>()["data"].get("fullPrice").is_none());
    }
}

// =============================================================================
// Catalog Route Tests
// =============================================================================

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn test_products_by_type() {
        let (server, _) = create_test_server(true).await;
        server.post("/products").json(&new_product()).await;

        let response = server.get("/products/type/Libro").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"][0]["documentId"], "prod_book");

        let response = server.get("/products/type/Programa%20largo").await;
        let body: Value = response.json();
        assert_eq!(body["data"][0]["documentId"], "prod_fullstack");
    }

    #[tokio::test]
    async fn test_seeded_links_are_removed_with_product() {
        let (server, source) = create_test_server(true).await;

        server.delete("/products/1").await.assert_status_ok();

        let links = source
            .store()
            .count(catalog::PRODUCT_COMPONENTS_TABLE, &Default::default())
            .await
            .unwrap();
        assert_eq!(links, 0);
    }
}
