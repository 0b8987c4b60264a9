//! Built-in domain tools: user and product lookup over seeded in-memory
//! record stores.

use crate::error::ToolError;
use crate::registry::{Lookup, LookupTool, ToolRegistry};
use crate::schema::{ArgKind, ArgSpec, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A user known to the user tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_item: Option<String>,
}

/// A product known to the product tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub description: String,
}

/// Immutable user store; lookups are idempotent.
#[derive(Default, Clone)]
pub struct UserStore {
    users: HashMap<String, UserRecord>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn get(&self, id: &str) -> Option<&UserRecord> {
        self.users.get(id)
    }

    /// Sample users matching the demo conversation flows.
    pub fn seeded() -> Self {
        Self::new()
            .with_user(UserRecord {
                id: "K1234".to_string(),
                name: "Kira Han".to_string(),
                address: "12 Harbor Lane, Busan".to_string(),
                booked_item: Some("SKU-123".to_string()),
            })
            .with_user(UserRecord {
                id: "K5678".to_string(),
                name: "Jun Park".to_string(),
                address: "88 Maple Street, Seoul".to_string(),
                booked_item: None,
            })
    }
}

/// Immutable product store; lookups are idempotent.
#[derive(Default, Clone)]
pub struct ProductStore {
    products: HashMap<String, ProductRecord>,
}

impl ProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: ProductRecord) -> Self {
        self.products.insert(product.sku.clone(), product);
        self
    }

    pub fn get(&self, sku: &str) -> Option<&ProductRecord> {
        self.products.get(sku)
    }

    /// Sample products matching the demo conversation flows.
    pub fn seeded() -> Self {
        Self::new()
            .with_product(ProductRecord {
                sku: "SKU-123".to_string(),
                name: "Insulated Travel Mug".to_string(),
                price: 19.99,
                description: "Keeps drinks hot for six hours.".to_string(),
            })
            .with_product(ProductRecord {
                sku: "PDO1234".to_string(),
                name: "Packable Day Bag".to_string(),
                price: 34.50,
                description: "Folds into its own pocket.".to_string(),
            })
    }
}

/// `lookup_user { id }` over a [`UserStore`].
pub struct UserLookupTool {
    store: Arc<UserStore>,
}

impl UserLookupTool {
    pub fn new(store: UserStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl LookupTool for UserLookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("lookup_user")
            .with_description("Look up a user's name, address and booked item by user id")
            .with_arg(ArgSpec::required("id", ArgKind::String).with_description("the user id"))
    }

    fn lookup(&self, args: &Map<String, Value>) -> Result<Lookup, ToolError> {
        let id = args
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments("lookup_user", "missing id"))?;

        Ok(match self.store.get(id) {
            Some(user) => Lookup::Hit(serde_json::to_value(user)?),
            None => Lookup::Miss,
        })
    }
}

/// `lookup_product { sku }` over a [`ProductStore`].
pub struct ProductLookupTool {
    store: Arc<ProductStore>,
}

impl ProductLookupTool {
    pub fn new(store: ProductStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl LookupTool for ProductLookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("lookup_product")
            .with_description("Look up a product's name, price and description by sku")
            .with_arg(ArgSpec::required("sku", ArgKind::String).with_description("the product sku"))
    }

    fn lookup(&self, args: &Map<String, Value>) -> Result<Lookup, ToolError> {
        let sku = args
            .get("sku")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments("lookup_product", "missing sku"))?;

        Ok(match self.store.get(sku) {
            Some(product) => Lookup::Hit(serde_json::to_value(product)?),
            None => Lookup::Miss,
        })
    }
}

/// Registry with the seeded user tool, for the user tool server role.
pub fn user_registry() -> ToolRegistry {
    ToolRegistry::new().register(UserLookupTool::new(UserStore::seeded()))
}

/// Registry with the seeded product tool, for the product tool server role.
pub fn product_registry() -> ToolRegistry {
    ToolRegistry::new().register(ProductLookupTool::new(ProductStore::seeded()))
}
