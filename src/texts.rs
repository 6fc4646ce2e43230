//! Message copy and formatting helpers for every screen the bot draws.

use std::collections::BTreeMap;

use crate::models::{Order, Product};
use crate::orders::DashboardStats;

/// Formats a KRW amount with thousands separators, e.g. `38,000₩`.
pub fn fmt_money(krw: i64) -> String {
    let negative = krw < 0;
    let digits = krw.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}₩")
    } else {
        format!("{grouped}₩")
    }
}

fn find_product<'a>(products: &'a [Product], product_id: &str) -> Option<&'a Product> {
    products.iter().find(|p| p.product_id == product_id)
}

/// Cart total at current catalog prices. Unknown product ids are
/// skipped (a product hidden mid-session simply drops out).
pub fn cart_total(cart: &BTreeMap<String, u32>, products: &[Product]) -> i64 {
    cart.iter()
        .filter_map(|(pid, qty)| {
            find_product(products, pid).map(|p| p.price * i64::from(*qty))
        })
        .sum()
}

/// One line per cart item plus a total line.
pub fn cart_text(cart: &BTreeMap<String, u32>, products: &[Product]) -> String {
    if cart.is_empty() {
        return "The cart is empty.".to_string();
    }

    let mut lines = Vec::with_capacity(cart.len() + 2);
    for (pid, qty) in cart {
        let Some(p) = find_product(products, pid) else {
            continue;
        };
        lines.push(format!(
            "• {} × {} = {}",
            p.name,
            qty,
            fmt_money(p.price * i64::from(*qty))
        ));
    }
    lines.push(String::new());
    lines.push(format!("Total: {}", fmt_money(cart_total(cart, products))));
    lines.join("\n")
}

pub fn home_text() -> String {
    "🌸 BloomShop 🌸\n\n\
     Premium bouquets and floral arrangements\n\
     for special moments 💐\n\n\
     🚚 Delivery and pickup\n\
     🎁 Individual wrapping\n\n\
     Pick an action below ⬇️"
        .to_string()
}

pub fn help_text(shop_phone: &str) -> String {
    format!(
        "ℹ️ How to order\n\n\
         1) Open the catalog\n\
         2) Pick a bouquet and add it to the cart\n\
         3) Check out (pickup or delivery)\n\n\
         We will contact you to confirm after the order is sent.\n\n\
         Contact: {shop_phone}"
    )
}

pub fn product_card_text(product: &Product, in_cart: u32) -> String {
    let desc_block = product
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| format!("\n{d}\n"))
        .unwrap_or_default();
    format!(
        "💐 {}\n{}\nPrice: {}\nIn cart: {}",
        product.name,
        desc_block,
        fmt_money(product.price),
        in_cart
    )
}

/// Order preview shown after the comment step, before the payment
/// photo is attached.
pub fn checkout_preview(
    cart: &BTreeMap<String, u32>,
    products: &[Product],
    kind_label: &str,
    comment: &str,
) -> String {
    let comment = if comment.is_empty() { "—" } else { comment };
    format!(
        "🧾 Review your order\n\n{}\n\nMethod: {}\nComment: {}\n\n\
         Attach a photo of your payment to send the order ⬇️",
        cart_text(cart, products),
        kind_label,
        comment
    )
}

/// Caption for the staff notification photo message.
pub fn staff_order_caption(order: &Order) -> String {
    let comment = if order.comment.is_empty() {
        "—"
    } else {
        order.comment.as_str()
    };
    format!(
        "🛎 New order\n\nID: {}\n{}\n\nTotal: {}\nMethod: {}\nComment: {}",
        order.order_id,
        order.items,
        fmt_money(order.total),
        order.fulfillment,
        comment
    )
}

pub fn order_sent_text() -> String {
    "✅ Order sent\n\n\
     We received your payment and passed the order on.\n\
     We will contact you soon 💐"
        .to_string()
}

pub fn order_failed_text() -> String {
    "❗ Could not send the order. Please try again.".to_string()
}

pub fn buyer_decision_text(approved: bool) -> &'static str {
    if approved {
        "💐 Your order has been accepted!"
    } else {
        "❗ We need to clarify your order details and will contact you."
    }
}

pub fn dashboard_text(stats: &DashboardStats) -> String {
    let avg_reaction_min = stats.avg_reaction_secs.map_or(0.0, |s| s / 60.0);
    format!(
        "📊 Owner dashboard\n\n\
         💰 Revenue\n\
         • Today: {}\n\
         • Last 7 days: {}\n\
         • Last 30 days: {}\n\n\
         📦 Order statuses\n\
         • Pending: {}\n\
         • Approved: {}\n\
         • Rejected: {}\n\n\
         ⏱ Average reaction time\n\
         • {:.1} min",
        fmt_money(stats.revenue_today),
        fmt_money(stats.revenue_week),
        fmt_money(stats.revenue_month),
        stats.pending,
        stats.approved,
        stats.rejected,
        avg_reaction_min
    )
}
