//! Inline keyboard builders for every screen.
//!
//! Callback payloads are prefix-routed (`nav:`, `cart:`, `checkout:`,
//! `staff:`, `catalog:`); the vocabulary here must stay in sync with
//! the dispatch in `callback_handler`.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::models::Product;
use crate::texts::fmt_money;

pub fn kb_home() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("💐 Catalog", "home:catalog")],
        vec![InlineKeyboardButton::callback("🧺 Cart", "home:cart")],
        vec![InlineKeyboardButton::callback("ℹ️ How to order", "home:help")],
    ])
}

pub fn kb_categories(categories: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|cat| vec![InlineKeyboardButton::callback(cat.clone(), format!("cat:{cat}"))])
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("🏠 Home", "nav:home")]);
    InlineKeyboardMarkup::new(rows)
}

/// Product picker for one category: one button per available product.
pub fn kb_products(products: &[Product]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = products
        .iter()
        .map(|p| {
            vec![InlineKeyboardButton::callback(
                format!("{} — {}", p.name, fmt_money(p.price)),
                format!("prod:{}", p.product_id),
            )]
        })
        .collect();
    rows.push(vec![
        InlineKeyboardButton::callback("⬅️ Categories", "nav:categories"),
        InlineKeyboardButton::callback("🧺 Cart", "nav:cart"),
    ]);
    rows.push(vec![InlineKeyboardButton::callback("🏠 Home", "nav:home")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn kb_product(product_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("➖", format!("cart:dec:{product_id}")),
            InlineKeyboardButton::callback("➕ Add", format!("cart:inc:{product_id}")),
        ],
        vec![
            InlineKeyboardButton::callback("🧺 Cart", "nav:cart"),
            InlineKeyboardButton::callback("⬅️ Back", "nav:back"),
        ],
        vec![InlineKeyboardButton::callback("🏠 Home", "nav:home")],
    ])
}

pub fn kb_cart(has_items: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if has_items {
        rows.push(vec![InlineKeyboardButton::callback(
            "✅ Check out",
            "checkout:start",
        )]);
        rows.push(vec![InlineKeyboardButton::callback("🧹 Clear", "cart:clear")]);
    }
    rows.push(vec![
        InlineKeyboardButton::callback("💐 Catalog", "nav:catalog"),
        InlineKeyboardButton::callback("🏠 Home", "nav:home"),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn kb_checkout_kind() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🚶 Pickup", "checkout:type:pickup")],
        vec![InlineKeyboardButton::callback("🛵 Delivery", "checkout:type:delivery")],
        vec![InlineKeyboardButton::callback("↩️ Cancel", "checkout:cancel")],
    ])
}

pub fn kb_checkout_preview() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📎 Attach payment photo",
            "checkout:attach",
        )],
        vec![InlineKeyboardButton::callback("❌ Cancel", "checkout:cancel")],
    ])
}

pub fn kb_checkout_send() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📤 Send order",
            "checkout:final_send",
        )],
        vec![InlineKeyboardButton::callback("❌ Cancel", "checkout:cancel")],
    ])
}

/// Approve/reject pair attached to the staff notification.
pub fn kb_staff_order(order_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", format!("staff:approve:{order_id}")),
        InlineKeyboardButton::callback("❌ Reject", format!("staff:reject:{order_id}")),
    ]])
}

pub fn kb_catalog_controls() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "➕ Add product",
        "catalog:add",
    )]])
}

pub fn kb_catalog_category(category: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Open",
        format!("catalog:cat:{category}"),
    )]])
}

pub fn kb_catalog_back() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⬅️ Categories",
        "catalog:back",
    )]])
}

pub fn kb_catalog_item(product_id: &str, available: bool) -> InlineKeyboardMarkup {
    let toggle_label = if available { "🙈 Hide" } else { "👁 Show" };
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(toggle_label, format!("catalog:toggle:{product_id}")),
        InlineKeyboardButton::callback("✏️ Price", format!("catalog:price:{product_id}")),
        InlineKeyboardButton::callback("📝 Description", format!("catalog:desc:{product_id}")),
        InlineKeyboardButton::callback("🖼 Photo", format!("catalog:photo:{product_id}")),
    ]])
}
