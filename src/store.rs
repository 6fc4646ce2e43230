//! Persistence gateway for products, orders and users.
//!
//! The engine talks to storage through the [`ShopStore`] trait: plain
//! synchronous request/response calls, no streaming. [`SqliteStore`]
//! is the production implementation; [`MemStore`] backs tests.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::models::{BuyerProfile, Order, OrderStatus, Product};

/// Mutable product columns addressable by the catalog editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Price,
    Available,
    Category,
    Photo,
    Description,
}

impl ProductField {
    fn column(self) -> &'static str {
        match self {
            ProductField::Name => "name",
            ProductField::Price => "price",
            ProductField::Available => "available",
            ProductField::Category => "category",
            ProductField::Photo => "photo_file_id",
            ProductField::Description => "description",
        }
    }
}

/// Mutable order columns addressable by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    PaymentProof,
    Status,
    HandledAt,
    HandledBy,
    ReactionSeconds,
}

impl OrderField {
    fn column(self) -> &'static str {
        match self {
            OrderField::PaymentProof => "payment_proof",
            OrderField::Status => "status",
            OrderField::HandledAt => "handled_at",
            OrderField::HandledBy => "handled_by",
            OrderField::ReactionSeconds => "reaction_seconds",
        }
    }
}

/// Synchronous record store consumed by the conversation engine.
///
/// Update operations return `Ok(false)` when the target record does
/// not exist; callers decide whether that is worth a warning.
pub trait ShopStore: Send + Sync {
    fn list_products(&self) -> Result<Vec<Product>>;
    fn product_by_id(&self, product_id: &str) -> Result<Option<Product>>;
    /// Appends a product with a fresh identifier and returns it.
    fn append_product(
        &self,
        name: &str,
        price: i64,
        category: &str,
        description: &str,
    ) -> Result<String>;
    fn update_product_field(
        &self,
        product_id: &str,
        field: ProductField,
        value: &str,
    ) -> Result<bool>;

    fn list_orders(&self) -> Result<Vec<Order>>;
    fn order_by_id(&self, order_id: &str) -> Result<Option<Order>>;
    fn append_order(&self, order: &Order) -> Result<()>;
    fn update_order_fields(&self, order_id: &str, updates: &[(OrderField, String)])
        -> Result<bool>;

    /// Registers a first-contact user; returns false if already known.
    fn register_user_if_new(&self, profile: &BuyerProfile, registered_at: &str) -> Result<bool>;
    /// Stores the real name / phone captured during checkout.
    fn save_user_contacts(&self, chat_id: i64, real_name: &str, phone_number: &str)
        -> Result<bool>;
}

fn new_product_id() -> String {
    format!("P{}", &Uuid::new_v4().simple().to_string()[..10])
}

// ---------------------------------------------------------------------------
// sqlite implementation
// ---------------------------------------------------------------------------

/// rusqlite-backed store. The connection is behind a blocking mutex;
/// every call is a short single-statement transaction.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {path}"))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        let conn = self.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                product_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                price INTEGER NOT NULL,
                available INTEGER NOT NULL DEFAULT 1,
                category TEXT NOT NULL,
                photo_file_id TEXT,
                description TEXT
            )",
            [],
        )
        .context("Failed to create products table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                buyer_chat_id INTEGER NOT NULL,
                buyer_username TEXT NOT NULL DEFAULT '',
                items TEXT NOT NULL,
                total INTEGER NOT NULL,
                fulfillment TEXT NOT NULL,
                comment TEXT NOT NULL DEFAULT '',
                payment_proof TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                handled_at TEXT NOT NULL DEFAULT '',
                handled_by TEXT NOT NULL DEFAULT '',
                reaction_seconds INTEGER
            )",
            [],
        )
        .context("Failed to create orders table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                username TEXT NOT NULL DEFAULT '',
                full_name TEXT NOT NULL DEFAULT '',
                registered_at TEXT NOT NULL,
                real_name TEXT NOT NULL DEFAULT '',
                phone_number TEXT NOT NULL DEFAULT ''
            )",
            [],
        )
        .context("Failed to create users table")?;

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a prior statement panicked; continuing
        // with the connection is still sound for sqlite.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        available: row.get::<_, i64>(3)? != 0,
        category: row.get(4)?,
        photo_file_id: row.get(5)?,
        description: row.get(6)?,
    })
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(9)?;
    Ok(Order {
        order_id: row.get(0)?,
        created_at: row.get(1)?,
        buyer_chat_id: row.get(2)?,
        buyer_username: row.get(3)?,
        items: row.get(4)?,
        total: row.get(5)?,
        fulfillment: row.get(6)?,
        comment: row.get(7)?,
        payment_proof: row.get(8)?,
        status: OrderStatus::parse(&status).unwrap_or(OrderStatus::Pending),
        handled_at: row.get(10)?,
        handled_by: row.get(11)?,
        reaction_seconds: row.get(12)?,
    })
}

const ORDER_COLUMNS: &str = "order_id, created_at, buyer_chat_id, buyer_username, items, total, \
     fulfillment, comment, payment_proof, status, handled_at, handled_by, reaction_seconds";

impl ShopStore for SqliteStore {
    fn list_products(&self) -> Result<Vec<Product>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT product_id, name, price, available, category, photo_file_id, description
                 FROM products ORDER BY rowid",
            )
            .context("Failed to prepare product listing")?;
        let rows = stmt
            .query_map([], row_to_product)
            .context("Failed to list products")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read product rows")
    }

    fn product_by_id(&self, product_id: &str) -> Result<Option<Product>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT product_id, name, price, available, category, photo_file_id, description
             FROM products WHERE product_id = ?1",
            params![product_id],
            row_to_product,
        )
        .optional()
        .context("Failed to read product")
    }

    fn append_product(
        &self,
        name: &str,
        price: i64,
        category: &str,
        description: &str,
    ) -> Result<String> {
        let product_id = new_product_id();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO products (product_id, name, price, available, category, photo_file_id, description)
             VALUES (?1, ?2, ?3, 1, ?4, NULL, ?5)",
            params![product_id, name, price, category, description],
        )
        .context("Failed to insert product")?;
        info!(product_id = %product_id, "Product appended");
        Ok(product_id)
    }

    fn update_product_field(
        &self,
        product_id: &str,
        field: ProductField,
        value: &str,
    ) -> Result<bool> {
        let conn = self.lock();
        let sql = format!(
            "UPDATE products SET {} = ?1 WHERE product_id = ?2",
            field.column()
        );
        let changed = match field {
            ProductField::Price => {
                let price: i64 = value.parse().context("Price must be an integer")?;
                conn.execute(&sql, params![price, product_id])
            }
            ProductField::Available => {
                let flag = i64::from(value.eq_ignore_ascii_case("true") || value == "1");
                conn.execute(&sql, params![flag, product_id])
            }
            _ => conn.execute(&sql, params![value, product_id]),
        }
        .context("Failed to update product field")?;
        Ok(changed > 0)
    }

    fn list_orders(&self) -> Result<Vec<Order>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY rowid"))
            .context("Failed to prepare order listing")?;
        let rows = stmt
            .query_map([], row_to_order)
            .context("Failed to list orders")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read order rows")
    }

    fn order_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
            params![order_id],
            row_to_order,
        )
        .optional()
        .context("Failed to read order")
    }

    fn append_order(&self, order: &Order) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            &format!(
                "INSERT INTO orders ({ORDER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                order.order_id,
                order.created_at,
                order.buyer_chat_id,
                order.buyer_username,
                order.items,
                order.total,
                order.fulfillment,
                order.comment,
                order.payment_proof,
                order.status.as_str(),
                order.handled_at,
                order.handled_by,
                order.reaction_seconds,
            ],
        )
        .context("Failed to insert order")?;
        info!(order_id = %order.order_id, "Order appended");
        Ok(())
    }

    fn update_order_fields(
        &self,
        order_id: &str,
        updates: &[(OrderField, String)],
    ) -> Result<bool> {
        if updates.is_empty() {
            return Ok(false);
        }
        let conn = self.lock();
        let mut changed = 0;
        for (field, value) in updates {
            let sql = format!(
                "UPDATE orders SET {} = ?1 WHERE order_id = ?2",
                field.column()
            );
            changed = match field {
                OrderField::ReactionSeconds => {
                    let secs: Option<i64> = value.parse().ok();
                    conn.execute(&sql, params![secs, order_id])
                }
                _ => conn.execute(&sql, params![value, order_id]),
            }
            .context("Failed to update order field")?;
        }
        Ok(changed > 0)
    }

    fn register_user_if_new(&self, profile: &BuyerProfile, registered_at: &str) -> Result<bool> {
        let conn = self.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO users (chat_id, username, full_name, registered_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    profile.chat_id,
                    profile.username,
                    profile.full_name,
                    registered_at
                ],
            )
            .context("Failed to register user")?;
        Ok(inserted > 0)
    }

    fn save_user_contacts(
        &self,
        chat_id: i64,
        real_name: &str,
        phone_number: &str,
    ) -> Result<bool> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE users SET real_name = ?1, phone_number = ?2 WHERE chat_id = ?3",
                params![real_name, phone_number, chat_id],
            )
            .context("Failed to save user contacts")?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// in-memory implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MemUser {
    chat_id: i64,
    real_name: String,
    phone_number: String,
}

/// In-memory store with the same observable behavior as [`SqliteStore`].
/// Used by the test suites; also handy for local dry runs.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

#[derive(Default)]
struct MemInner {
    products: Vec<Product>,
    orders: Vec<Order>,
    users: Vec<MemUser>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product as-is, keeping its identifier.
    pub fn insert_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ShopStore for MemStore {
    fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.lock().products.clone())
    }

    fn product_by_id(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self
            .lock()
            .products
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned())
    }

    fn append_product(
        &self,
        name: &str,
        price: i64,
        category: &str,
        description: &str,
    ) -> Result<String> {
        let product_id = new_product_id();
        self.lock().products.push(Product {
            product_id: product_id.clone(),
            name: name.to_string(),
            price,
            available: true,
            category: category.to_string(),
            photo_file_id: None,
            description: if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            },
        });
        Ok(product_id)
    }

    fn update_product_field(
        &self,
        product_id: &str,
        field: ProductField,
        value: &str,
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(p) = inner
            .products
            .iter_mut()
            .find(|p| p.product_id == product_id)
        else {
            return Ok(false);
        };
        match field {
            ProductField::Name => p.name = value.to_string(),
            ProductField::Price => p.price = value.parse().context("Price must be an integer")?,
            ProductField::Available => {
                p.available = value.eq_ignore_ascii_case("true") || value == "1";
            }
            ProductField::Category => p.category = value.to_string(),
            ProductField::Photo => p.photo_file_id = Some(value.to_string()),
            ProductField::Description => p.description = Some(value.to_string()),
        }
        Ok(true)
    }

    fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.lock().orders.clone())
    }

    fn order_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned())
    }

    fn append_order(&self, order: &Order) -> Result<()> {
        self.lock().orders.push(order.clone());
        Ok(())
    }

    fn update_order_fields(
        &self,
        order_id: &str,
        updates: &[(OrderField, String)],
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(o) = inner.orders.iter_mut().find(|o| o.order_id == order_id) else {
            return Ok(false);
        };
        for (field, value) in updates {
            match field {
                OrderField::PaymentProof => o.payment_proof = value.clone(),
                OrderField::Status => {
                    if let Some(status) = OrderStatus::parse(value) {
                        o.status = status;
                    }
                }
                OrderField::HandledAt => o.handled_at = value.clone(),
                OrderField::HandledBy => o.handled_by = value.clone(),
                OrderField::ReactionSeconds => o.reaction_seconds = value.parse().ok(),
            }
        }
        Ok(true)
    }

    fn register_user_if_new(&self, profile: &BuyerProfile, _registered_at: &str) -> Result<bool> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.chat_id == profile.chat_id) {
            return Ok(false);
        }
        inner.users.push(MemUser {
            chat_id: profile.chat_id,
            ..Default::default()
        });
        Ok(true)
    }

    fn save_user_contacts(
        &self,
        chat_id: i64,
        real_name: &str,
        phone_number: &str,
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(u) = inner.users.iter_mut().find(|u| u.chat_id == chat_id) else {
            return Ok(false);
        };
        u.real_name = real_name.to_string();
        u.phone_number = phone_number.to_string();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order(id: &str) -> Order {
        Order {
            order_id: id.to_string(),
            created_at: "2026-08-01T10:00:00Z".to_string(),
            buyer_chat_id: 42,
            buyer_username: "buyer".to_string(),
            items: "Rose x2".to_string(),
            total: 30000,
            fulfillment: "Pickup".to_string(),
            comment: "-".to_string(),
            payment_proof: String::new(),
            status: OrderStatus::WaitingPayment,
            handled_at: String::new(),
            handled_by: String::new(),
            reaction_seconds: None,
        }
    }

    #[test]
    fn test_product_round_trip_sqlite() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;

        let pid = store.append_product("Rose bouquet", 15000, "Bouquets", "Twelve red roses")?;
        let loaded = store.product_by_id(&pid)?.expect("product should exist");

        assert_eq!(loaded.name, "Rose bouquet");
        assert_eq!(loaded.price, 15000);
        assert!(loaded.available);
        assert_eq!(loaded.category, "Bouquets");
        assert_eq!(loaded.photo_file_id, None);
        Ok(())
    }

    #[test]
    fn test_product_field_updates() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let pid = store.append_product("Rose", 15000, "Bouquets", "")?;

        assert!(store.update_product_field(&pid, ProductField::Price, "18000")?);
        assert!(store.update_product_field(&pid, ProductField::Available, "false")?);
        assert!(store.update_product_field(&pid, ProductField::Photo, "file123")?);

        let p = store.product_by_id(&pid)?.expect("product should exist");
        assert_eq!(p.price, 18000);
        assert!(!p.available);
        assert_eq!(p.photo_file_id.as_deref(), Some("file123"));

        // Unknown product id is reported, not an error.
        assert!(!store.update_product_field("P-missing", ProductField::Price, "1")?);
        Ok(())
    }

    #[test]
    fn test_order_round_trip_sqlite() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let order = sample_order("ord-1");
        store.append_order(&order)?;

        let loaded = store.order_by_id("ord-1")?.expect("order should exist");
        assert_eq!(loaded, order);

        store.update_order_fields(
            "ord-1",
            &[
                (OrderField::Status, "pending".to_string()),
                (OrderField::PaymentProof, "photo-abc".to_string()),
            ],
        )?;
        let loaded = store.order_by_id("ord-1")?.expect("order should exist");
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.payment_proof, "photo-abc");
        Ok(())
    }

    #[test]
    fn test_user_registration_is_once() -> Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let profile = BuyerProfile {
            chat_id: 7,
            username: "u".to_string(),
            full_name: "User".to_string(),
        };

        assert!(store.register_user_if_new(&profile, "2026-08-01T10:00:00Z")?);
        assert!(!store.register_user_if_new(&profile, "2026-08-02T10:00:00Z")?);

        assert!(store.save_user_contacts(7, "Real Name", "010-1234-5678")?);
        assert!(!store.save_user_contacts(8, "Nobody", "x")?);
        Ok(())
    }

    #[test]
    fn test_mem_store_matches_sqlite_behavior() -> Result<()> {
        let store = MemStore::new();
        let pid = store.append_product("Tulip", 8000, "Single", "")?;

        assert!(store.update_product_field(&pid, ProductField::Available, "false")?);
        let p = store.product_by_id(&pid)?.expect("product should exist");
        assert!(!p.available);

        store.append_order(&sample_order("ord-2"))?;
        assert!(store.update_order_fields("ord-2", &[(OrderField::Status, "pending".into())])?);
        assert!(!store.update_order_fields("missing", &[(OrderField::Status, "pending".into())])?);
        Ok(())
    }
}
