//! Product catalog served by the `compose-server` binary
//!
//! Products and categories are plain resources; prices, card tags and SEO
//! metadata are components attached through the `products_cmps` and
//! `categories_cmps` link tables.

use crate::core::component::ComponentMetadata;
use crate::core::entity::{Entity, EntityId, Filter, Record};
use crate::core::error::ApiResult;
use crate::core::schema::Schema;
use crate::core::service::DataService;
use crate::core::source::DataSource;
use crate::impl_resource;
use crate::server::handlers::ApiResponse;
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use validator::ValidationError;

pub const PRODUCT_CATEGORIES_TABLE: &str = "products_categories";
pub const PRODUCT_COMPONENTS_TABLE: &str = "products_cmps";
pub const CATEGORY_COMPONENTS_TABLE: &str = "categories_cmps";

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"));

/// `impl_resource!` hands field types to the derive as opaque `ty`
/// fragments, so optional fields reach custom validators wrapped in `Option`
fn validate_slug(slug: &Option<String>) -> Result<(), ValidationError> {
    match slug {
        Some(slug) if !SLUG.is_match(slug) => Err(ValidationError::new("slug")
            .with_message(Cow::Borrowed("Slug must be lowercase words separated by hyphens"))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Programa largo")]
    LongProgram,
    #[serde(rename = "Programa medio")]
    MediumProgram,
    #[serde(rename = "Curso corto")]
    ShortCourse,
    #[serde(rename = "Curso presencial")]
    OnSiteCourse,
    #[serde(rename = "Suscripción")]
    Subscription,
    #[serde(rename = "Libro")]
    Book,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseType {
    #[serde(rename = "Compra directa")]
    Direct,
    #[serde(rename = "Compra consultiva")]
    Consultative,
}

impl_resource!(
    Product,
    "product",
    "products",
    {
        #[validate(length(min = 1, max = 255, message = "Document ID must be between 1 and 255 characters"))]
        document_id: String,
        #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
        title: String,
        #[validate(custom(function = "validate_slug"))]
        slug: Option<String>,
        #[validate(range(min = 0, message = "Order must be a positive number"))]
        order: Option<i64>,
        #[serde(rename = "SKU")]
        #[validate(length(min = 1, max = 100, message = "SKU must be between 1 and 100 characters"))]
        sku: String,
        #[serde(default)]
        #[validate(length(min = 1, message = "Vertical must contain at least 1 item"))]
        vertical: Vec<String>,
        #[serde(rename = "type")]
        product_type: ProductType,
        purchase_type: Option<PurchaseType>,
        #[serde(default)]
        is_soon: bool,
        #[serde(default)]
        is_premium: bool,
        #[validate(range(min = 0, message = "Trial period days must be a positive number"))]
        trial_period_days: Option<i64>,
    }
);

impl_resource!(
    Category,
    "category",
    "categories",
    {
        #[validate(length(min = 1, max = 255, message = "Document ID must be between 1 and 255 characters"))]
        document_id: String,
        #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
        name: String,
        #[validate(custom(function = "validate_slug"))]
        slug: Option<String>,
        locale: Option<String>,
    }
);

impl_resource!(
    FullPrice,
    "full_price",
    "full-prices",
    table = "components_products_full_prices",
    {
        #[validate(range(min = 0.0, message = "Price must be a positive number"))]
        price: f64,
        discount_price: Option<f64>,
        stripe_price_id: Option<String>,
        tax: Option<f64>,
        #[validate(range(min = 0, max = 100))]
        discount_percentage: Option<i64>,
    }
);

impl_resource!(
    CardTags,
    "card_tags",
    "card-tags",
    table = "components_cards_card_tags",
    {
        left_tag: Option<String>,
        right_tag: Option<String>,
    }
);

impl_resource!(
    Seo,
    "seo",
    "seos",
    table = "components_shared_seos",
    {
        #[validate(length(max = 60))]
        meta_title: Option<String>,
        #[validate(length(max = 160))]
        meta_description: Option<String>,
    }
);

/// Register the catalog entity types, relations and components
pub fn register(schema: &mut Schema) {
    schema
        .register::<Product>()
        .many_to_many(
            "categories",
            Category::entity_type(),
            PRODUCT_CATEGORIES_TABLE,
            "productId",
            "categoryId",
        )
        .component_table(PRODUCT_COMPONENTS_TABLE)
        .component(ComponentMetadata::new(
            "fullPrice",
            "fullPrice",
            "product.full-price",
            FullPrice::entity_type(),
        ))
        .component(ComponentMetadata::new(
            "cardTags",
            "cardTags",
            "cards.card-tags",
            CardTags::entity_type(),
        ));

    schema
        .register::<Category>()
        .many_to_many(
            "products",
            Product::entity_type(),
            PRODUCT_CATEGORIES_TABLE,
            "categoryId",
            "productId",
        )
        .component_table(CATEGORY_COMPONENTS_TABLE)
        .component(ComponentMetadata::new(
            "seo",
            "seo",
            "shared.seo",
            Seo::entity_type(),
        ));

    schema.register::<FullPrice>();
    schema.register::<CardTags>();
    schema.register::<Seo>();
}

/// A schema holding only the catalog
pub fn schema() -> Schema {
    let mut schema = Schema::new();
    register(&mut schema);
    schema
}

/// Link a product to a category
pub async fn link_category(
    source: &DataSource,
    product: &EntityId,
    category: &EntityId,
) -> ApiResult<()> {
    let mut pair = Record::new();
    pair.insert("productId".to_string(), product.to_value());
    pair.insert("categoryId".to_string(), category.to_value());
    source.store().insert(PRODUCT_CATEGORIES_TABLE, pair).await?;
    Ok(())
}

// =============================================================================
// Catalog routes
// =============================================================================

/// Routes specific to the catalog, merged next to the generic resource routes
pub fn routes(products: Arc<DataService<Product>>) -> Router {
    Router::new()
        .route("/products/type/{product_type}", get(products_by_type))
        .with_state(products)
}

async fn products_by_type(
    State(products): State<Arc<DataService<Product>>>,
    Path(product_type): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Product>>>> {
    let found = products
        .find_by(&Filter::new().eq("type", product_type))
        .await?;
    Ok(Json(ApiResponse::new("Products retrieved successfully", found)))
}

// =============================================================================
// Demo data
// =============================================================================

/// Insert a small demo catalog
pub async fn seed(source: Arc<DataSource>) -> ApiResult<()> {
    let products = DataService::<Product>::new(source.clone());
    let categories = DataService::<Category>::new(source.clone());

    let courses = categories
        .create(Category {
            id: None,
            document_id: "cat_courses".to_string(),
            name: "Courses".to_string(),
            slug: Some("courses".to_string()),
            locale: Some("es".to_string()),
            created_at: None,
            updated_at: None,
        })
        .await?;

    let product = products
        .create(Product {
            id: None,
            document_id: "prod_fullstack".to_string(),
            title: "Full Stack Developer Course".to_string(),
            slug: Some("full-stack-developer".to_string()),
            order: Some(1),
            sku: "FSC-2025-001".to_string(),
            vertical: vec!["TECH".to_string()],
            product_type: ProductType::LongProgram,
            purchase_type: Some(PurchaseType::Direct),
            is_soon: false,
            is_premium: false,
            trial_period_days: None,
            created_at: None,
            updated_at: None,
        })
        .await?;

    if let (Some(product_id), Some(category_id)) = (product.id.as_ref(), courses.id.as_ref()) {
        link_category(&source, product_id, category_id).await?;

        let mut price = Record::new();
        price.insert("price".to_string(), 1990.0.into());
        price.insert("discountPrice".to_string(), 1490.0.into());
        price.insert("discountPercentage".to_string(), 25.into());
        products
            .attach_component(product_id, "fullPrice", price)
            .await?;

        let mut tags = Record::new();
        tags.insert("leftTag".to_string(), "Online".into());
        tags.insert("rightTag".to_string(), "12 months".into());
        products.attach_component(product_id, "cardTags", tags).await?;

        let mut seo = Record::new();
        seo.insert("metaTitle".to_string(), "Courses".into());
        categories.attach_component(category_id, "seo", seo).await?;
    }

    tracing::info!("demo catalog seeded");
    Ok(())
}
