//! Macro for reducing boilerplate when defining resources
//!
//! `impl_resource!` generates the struct (id, timestamps and the declared
//! fields), its serde/validator derives and the [`Entity`] implementation.
//! Field attributes are passed through, so `#[validate(...)]` and
//! `#[serde(...)]` work as usual. The calling crate must depend on `serde`
//! and `validator`.
//!
//! [`Entity`]: crate::core::entity::Entity

/// Create a resource struct with its `Entity` implementation
///
/// # Example
///
/// ```rust,ignore
/// use compose::prelude::*;
///
/// impl_resource!(
///     Category,
///     "category",
///     "categories",
///     {
///         #[validate(length(min = 1, max = 255))]
///         name: String,
///         slug: Option<String>,
///     }
/// );
///
/// // With a table name different from the plural resource name
/// impl_resource!(
///     FullPrice,
///     "full_price",
///     "full-prices",
///     table = "components_products_full_prices",
///     {
///         price: f64,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_resource {
    (
        $(#[$struct_meta:meta])*
        $type:ident,
        $type_name:expr,
        $plural:expr,
        {
            $( $(#[$field_meta:meta])* $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        $crate::impl_resource!(
            $(#[$struct_meta])*
            $type,
            $type_name,
            $plural,
            table = $plural,
            { $( $(#[$field_meta])* $field : $field_type ),* }
        );
    };

    (
        $(#[$struct_meta:meta])*
        $type:ident,
        $type_name:expr,
        $plural:expr,
        table = $table:expr,
        {
            $( $(#[$field_meta:meta])* $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::validator::Validate,
        )]
        #[serde(rename_all = "camelCase")]
        pub struct $type {
            /// Identifier, assigned by the store on creation
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub id: Option<$crate::core::entity::EntityId>,

            $( $(#[$field_meta])* pub $field : $field_type, )*

            /// When this row was created
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub created_at: Option<::chrono::DateTime<::chrono::Utc>>,

            /// When this row was last updated
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub updated_at: Option<::chrono::DateTime<::chrono::Utc>>,
        }

        impl $crate::core::entity::Entity for $type {
            fn entity_type() -> &'static str {
                $type_name
            }

            fn resource_name() -> &'static str {
                $plural
            }

            fn label() -> &'static str {
                stringify!($type)
            }

            fn table_name() -> &'static str {
                $table
            }

            fn id(&self) -> Option<&$crate::core::entity::EntityId> {
                self.id.as_ref()
            }
        }
    };
}
